//! Conversation - per-call reconstruction
//!
//! Events are grouped by call id in arrival order. Calls are emitted in the
//! order their id was first seen, whether or not they completed.

use crate::error::Result;
use binlog_codec::{CallEvent, EventStream, EventType};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Reconstructed view of one call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    /// Call identifier from the capture
    pub call_id: u64,
    /// Last CLIENT_HEADER seen
    pub request_header: Option<CallEvent>,
    /// CLIENT_MESSAGE events in order
    pub request_messages: Vec<CallEvent>,
    /// Last SERVER_HEADER seen
    pub response_header: Option<CallEvent>,
    /// SERVER_MESSAGE events in order
    pub response_messages: Vec<CallEvent>,
    /// SERVER_TRAILER, absent until the call completed
    pub response_trailer: Option<CallEvent>,
    /// A CLIENT_HALF_CLOSE was recorded
    pub half_closed: bool,
    /// A CANCEL was recorded
    pub cancelled: bool,
}

impl Conversation {
    /// Create an empty conversation
    #[must_use]
    pub fn new(call_id: u64) -> Self {
        Self {
            call_id,
            ..Default::default()
        }
    }

    /// Apply one event of this call
    pub fn record(&mut self, event: CallEvent) {
        match event.kind() {
            EventType::ClientHeader => self.request_header = Some(event),
            EventType::ClientMessage => self.request_messages.push(event),
            EventType::ServerHeader => self.response_header = Some(event),
            EventType::ServerMessage => self.response_messages.push(event),
            EventType::ServerTrailer => self.response_trailer = Some(event),
            EventType::ClientHalfClose => self.half_closed = true,
            EventType::Cancel => self.cancelled = true,
            EventType::Unknown => {
                debug!(call_id = self.call_id, raw = event.r#type, "ignoring unknown event type");
            }
        }
    }

    /// Method path from the client header, empty when none was captured
    #[must_use]
    pub fn method_name(&self) -> &str {
        self.request_header
            .as_ref()
            .map(CallEvent::method_name)
            .unwrap_or("")
    }

    /// Whether display commands should show this call
    #[must_use]
    pub fn is_displayable(&self) -> bool {
        self.call_id != 0 && self.request_header.is_some()
    }

    /// Client header timestamp
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.request_header.as_ref().and_then(CallEvent::occurred_at)
    }

    /// Trailer timestamp
    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.response_trailer.as_ref().and_then(CallEvent::occurred_at)
    }

    /// Trailer time minus header time, `None` while the call is incomplete
    #[must_use]
    pub fn elapsed(&self) -> Option<TimeDelta> {
        Some(self.finished_at()? - self.started_at()?)
    }

    /// Final status code, `None` without a trailer
    #[must_use]
    pub fn status_code(&self) -> Option<u32> {
        self.response_trailer
            .as_ref()
            .and_then(CallEvent::trailer)
            .map(|t| t.status_code)
    }

    /// Final status message, empty without a trailer
    #[must_use]
    pub fn status_message(&self) -> &str {
        self.response_trailer
            .as_ref()
            .and_then(CallEvent::trailer)
            .map(|t| t.status_message.as_str())
            .unwrap_or("")
    }
}

/// Incremental event-to-conversation grouping
#[derive(Debug, Default)]
pub struct Reconstructor {
    calls: HashMap<u64, Conversation>,
    order: Vec<u64>,
}

impl Reconstructor {
    /// Create an empty reconstructor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one event to its conversation
    pub fn apply(&mut self, event: CallEvent) {
        let call_id = event.call_id;
        let order = &mut self.order;
        self.calls
            .entry(call_id)
            .or_insert_with(|| {
                order.push(call_id);
                Conversation::new(call_id)
            })
            .record(event);
    }

    /// Number of distinct calls seen
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// No event has been applied
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Conversations in first-seen order
    #[must_use]
    pub fn finish(mut self) -> Vec<Conversation> {
        self.order
            .iter()
            .filter_map(|id| self.calls.remove(id))
            .collect()
    }
}

impl FromIterator<CallEvent> for Reconstructor {
    fn from_iter<I: IntoIterator<Item = CallEvent>>(iter: I) -> Self {
        let mut reconstructor = Self::new();
        for event in iter {
            reconstructor.apply(event);
        }
        reconstructor
    }
}

/// Drain a decode pipeline into conversations.
///
/// Events are consumed until the stream closes; only then is the terminal
/// decode result checked.
#[instrument(skip(events))]
pub async fn read_conversations(mut events: EventStream) -> Result<Vec<Conversation>> {
    let mut reconstructor = Reconstructor::new();
    while let Some(event) = events.recv().await {
        reconstructor.apply(event);
    }
    events.finish().await?;
    debug!(calls = reconstructor.len(), "reconstructed conversations");
    Ok(reconstructor.finish())
}
