//! Follow - byte sources over capture files
//!
//! A plain source ends at the file's current end. A followed source keeps
//! polling for appended bytes until its cancellation token fires, at which
//! point it reports end of stream and the file handle is released with it.

use crate::error::Result;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Boxed byte source handed to the frame decoder
pub type ByteSource = Box<dyn AsyncRead + Send + Unpin>;

/// Settings for following a growing file
#[derive(Debug, Clone)]
pub struct FollowOptions {
    /// Wait between polls once the end of the file is reached
    pub poll_interval: Duration,
    /// Stops the follow; the source then reports end of stream
    pub cancel: CancellationToken,
}

impl FollowOptions {
    /// Create options with the given poll interval
    #[must_use]
    pub fn new(poll_interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            poll_interval,
            cancel,
        }
    }
}

/// Open a capture file, following it for appended data when `follow` is set
pub async fn open_source(path: &Path, follow: Option<&FollowOptions>) -> Result<ByteSource> {
    let file = File::open(path).await?;
    match follow {
        Some(options) => {
            info!(path = %path.display(), "following capture file");
            Ok(Box::new(Follow::new(file, path, options.clone())))
        }
        None => Ok(Box::new(file)),
    }
}

/// A file reader that waits for appended bytes instead of ending
pub struct Follow {
    file: File,
    path: PathBuf,
    options: FollowOptions,
    sleep: Option<Pin<Box<Sleep>>>,
    position: u64,
}

impl Follow {
    /// Follow an already opened file
    pub fn new(file: File, path: &Path, options: FollowOptions) -> Self {
        Self {
            file,
            path: path.to_path_buf(),
            options,
            sleep: None,
            position: 0,
        }
    }

    /// Bytes delivered so far
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl AsyncRead for Follow {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if this.options.cancel.is_cancelled() {
                debug!(path = %this.path.display(), position = this.position, "follow cancelled");
                return Poll::Ready(Ok(()));
            }

            if let Some(sleep) = this.sleep.as_mut() {
                ready!(sleep.as_mut().poll(cx));
                this.sleep = None;
            }

            let before = buf.filled().len();
            ready!(Pin::new(&mut this.file).poll_read(cx, buf))?;
            let read = buf.filled().len() - before;
            if read > 0 {
                this.position += read as u64;
                return Poll::Ready(Ok(()));
            }

            // At the current end of file: wait one interval, then poll again.
            this.sleep = Some(Box::pin(tokio::time::sleep(this.options.poll_interval)));
        }
    }
}
