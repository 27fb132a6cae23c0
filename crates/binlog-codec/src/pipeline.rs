//! Pipeline - background frame decoding
//!
//! One task decodes frames and hands events to a single consumer through a
//! bounded channel. The terminal result travels on a separate one-shot slot
//! and is written exactly once, after the event channel has been closed.
//! Consumers drain [`EventStream::recv`] until it returns `None` and only then
//! call [`EventStream::finish`].

use crate::error::{Error, Result};
use crate::event::CallEvent;
use crate::frame::FrameReader;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

/// Default capacity of the event handoff channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Receiving end of a decode pipeline
pub struct EventStream {
    events: mpsc::Receiver<CallEvent>,
    outcome: oneshot::Receiver<Result<()>>,
}

impl EventStream {
    /// Next event in codec order, `None` once the producer has stopped
    pub async fn recv(&mut self) -> Option<CallEvent> {
        self.events.recv().await
    }

    /// Terminal result of the decode.
    ///
    /// Events still queued are discarded, which also releases a producer
    /// blocked on a full channel.
    pub async fn finish(self) -> Result<()> {
        drop(self.events);
        self.outcome.await.map_err(|_| Error::Pipeline)?
    }

    /// Drain every event, then report the terminal result
    pub async fn collect(mut self) -> Result<Vec<CallEvent>> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            events.push(event);
        }
        self.finish().await?;
        Ok(events)
    }
}

/// Spawn a task decoding `source` into a bounded channel of `capacity` events
#[instrument(skip(source))]
pub fn decode_stream<R>(source: R, capacity: usize) -> EventStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, events) = mpsc::channel(capacity.max(1));
    let (done, outcome) = oneshot::channel();

    tokio::spawn(async move {
        let result = pump(source, tx).await;
        if let Err(e) = &result {
            debug!(error = %e, "decode pipeline failed");
        }
        let _ = done.send(result);
    });

    EventStream { events, outcome }
}

async fn pump<R>(source: R, tx: mpsc::Sender<CallEvent>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = FrameReader::new(source);
    while let Some(event) = reader.next_event().await? {
        if tx.send(event).await.is_err() {
            debug!(frames = reader.frames_read(), "event consumer went away");
            break;
        }
    }
    debug!(frames = reader.frames_read(), "decode pipeline finished");
    Ok(())
}
