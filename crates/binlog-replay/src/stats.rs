//! Stats - per-method latency histograms

use crate::conversation::Conversation;
use std::collections::BTreeMap;
use std::time::Duration;

/// Lower bounds of the cumulative latency buckets
pub const LATENCY_BUCKETS: [Duration; 8] = [
    Duration::ZERO,
    Duration::from_millis(50),
    Duration::from_millis(100),
    Duration::from_millis(200),
    Duration::from_millis(500),
    Duration::from_secs(1),
    Duration::from_secs(10),
    Duration::from_secs(100),
];

/// Latency histogram of one method
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodStats {
    /// Method path
    pub method: String,
    /// Completed calls whose elapsed time is at least each bucket bound
    pub buckets: [usize; LATENCY_BUCKETS.len()],
    /// Completed calls with a non-OK status
    pub errors: usize,
    /// Calls without a trailer, not counted in any bucket
    pub incomplete: usize,
}

impl MethodStats {
    fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            ..Default::default()
        }
    }

    /// Calls counted in the histogram
    #[must_use]
    pub fn counted(&self) -> usize {
        self.buckets[0]
    }

    fn observe(&mut self, conversation: &Conversation) {
        let Some(elapsed) = conversation.elapsed() else {
            self.incomplete += 1;
            return;
        };
        // A trailer stamped before its header (clock skew) falls below every bound.
        if let Ok(elapsed) = elapsed.to_std() {
            for (count, bound) in self.buckets.iter_mut().zip(LATENCY_BUCKETS) {
                if elapsed >= bound {
                    *count += 1;
                }
            }
        }
        if conversation.status_code().is_some_and(|code| code != 0) {
            self.errors += 1;
        }
    }
}

/// Histogram per method, sorted by method path
#[must_use]
pub fn collect_stats(conversations: &[Conversation]) -> Vec<MethodStats> {
    let mut by_method: BTreeMap<&str, MethodStats> = BTreeMap::new();
    for conversation in conversations.iter().filter(|c| c.is_displayable()) {
        let method = conversation.method_name();
        by_method
            .entry(method)
            .or_insert_with(|| MethodStats::new(method))
            .observe(conversation);
    }
    by_method.into_values().collect()
}
