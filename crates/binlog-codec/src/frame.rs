//! Frame - length-prefixed call-event encoding
//!
//! A capture is a sequence of frames:
//! ```text
//! ┌──────────────────┬────────────────────────────┐
//! │ Length           │ CallEvent                  │
//! │ 4 bytes uint32 BE│ `Length` bytes of protobuf │
//! └──────────────────┴────────────────────────────┘
//! ```
//!
//! Producers rotate or truncate capture files mid-write, so a stream that ends
//! inside a length prefix or inside a body is a normal end of stream.

use crate::error::{Error, Result};
use crate::event::CallEvent;
use bytes::{BufMut, Bytes, BytesMut};
use prost::Message as _;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

/// Size of the big-endian length prefix
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Serialize an event and prepend its big-endian length
pub fn encode_event(event: &CallEvent) -> Result<Bytes> {
    let len = event.encoded_len();
    let prefix = u32::try_from(len)
        .map_err(|_| Error::Encode(format!("event of {len} bytes exceeds frame limit")))?;

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_LEN + len);
    buf.put_u32(prefix);
    event
        .encode(&mut buf)
        .map_err(|e| Error::Encode(e.to_string()))?;
    Ok(buf.freeze())
}

/// Reads call events one frame at a time
pub struct FrameReader<R> {
    inner: BufReader<R>,
    frames: u64,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a byte source
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            frames: 0,
        }
    }

    /// Number of events decoded so far
    #[must_use]
    pub fn frames_read(&self) -> u64 {
        self.frames
    }

    /// Read the next event.
    ///
    /// Returns `Ok(None)` at a clean end of stream, at a partial length
    /// prefix, and at a truncated final body. Any other I/O failure and any
    /// undecodable body are errors.
    pub async fn next_event(&mut self) -> Result<Option<CallEvent>> {
        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        match self.inner.read_exact(&mut prefix).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!(frames = self.frames, "end of stream");
                return Ok(None);
            }
            Err(e) => return Err(Error::Io(e)),
        }

        let len = u32::from_be_bytes(prefix) as usize;

        // Grow the buffer as bytes arrive instead of trusting the prefix up front.
        let mut body = Vec::with_capacity(len.min(64 * 1024));
        let read = (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut body)
            .await?;
        if read < len {
            info!(
                frame = self.frames,
                expected = len,
                received = read,
                "last entry truncated, ignoring"
            );
            return Ok(None);
        }

        let event = CallEvent::decode(body.as_slice()).map_err(|source| Error::Decode {
            frame: self.frames,
            source,
        })?;
        self.frames += 1;
        Ok(Some(event))
    }
}

/// Writes call events as frames
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wrap a byte sink
    pub fn new(writer: W) -> Self {
        Self { inner: writer }
    }

    /// Frame and write one event
    pub async fn write_event(&mut self, event: &CallEvent) -> Result<()> {
        let frame = encode_event(event)?;
        self.inner.write_all(&frame).await?;
        Ok(())
    }

    /// Flush buffered frames
    pub async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await?;
        Ok(())
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventType, Message, Payload};

    fn sample(call_id: u64) -> CallEvent {
        CallEvent::new(call_id, EventType::ClientMessage)
            .with_payload(Payload::Message(Message::new(vec![0x0a, 0x01, 0x41])))
    }

    async fn decode_all(bytes: &[u8]) -> Result<Vec<CallEvent>> {
        let mut reader = FrameReader::new(bytes);
        let mut out = Vec::new();
        while let Some(event) = reader.next_event().await? {
            out.push(event);
        }
        Ok(out)
    }

    #[test]
    fn test_encode_prefix_is_big_endian_length() {
        let event = sample(7);
        let frame = encode_event(&event).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - LENGTH_PREFIX_LEN);
        assert_eq!(len, event.encoded_len());
    }

    #[tokio::test]
    async fn test_roundtrip_single_frame() {
        let event = sample(7);
        let frame = encode_event(&event).unwrap();
        let decoded = decode_all(&frame).await.unwrap();
        assert_eq!(decoded, vec![event]);
    }

    #[tokio::test]
    async fn test_empty_stream() {
        assert!(decode_all(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_truncated_body_is_dropped() {
        let mut bytes = Vec::new();
        for id in 1..=3 {
            bytes.extend_from_slice(&encode_event(&sample(id)).unwrap());
        }
        let last = encode_event(&sample(4)).unwrap();
        bytes.extend_from_slice(&last[..last.len() - 1]);

        let decoded = decode_all(&bytes).await.unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[2].call_id, 3);
    }

    #[tokio::test]
    async fn test_truncated_prefix_is_clean_end() {
        let mut bytes = encode_event(&sample(1)).unwrap().to_vec();
        bytes.extend_from_slice(&[0, 0]);

        let decoded = decode_all(&bytes).await.unwrap();
        assert_eq!(decoded.len(), 1);
    }

    #[tokio::test]
    async fn test_every_truncation_point_yields_prefix() {
        let mut bytes = Vec::new();
        let mut boundaries = vec![0];
        for id in 1..=3 {
            bytes.extend_from_slice(&encode_event(&sample(id)).unwrap());
            boundaries.push(bytes.len());
        }

        for cut in 0..=bytes.len() {
            let complete = boundaries.iter().filter(|b| **b <= cut).count() - 1;
            let decoded = decode_all(&bytes[..cut]).await.unwrap();
            assert_eq!(decoded.len(), complete, "cut at {cut}");
        }
    }

    #[tokio::test]
    async fn test_garbage_body_is_an_error() {
        let bytes = [0, 0, 0, 2, 0xff, 0xff];
        let err = decode_all(&bytes).await.unwrap_err();
        assert!(matches!(err, Error::Decode { frame: 0, .. }));
    }

    #[tokio::test]
    async fn test_writer_output_decodes() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_event(&sample(1)).await.unwrap();
        writer.write_event(&sample(2)).await.unwrap();
        writer.flush().await.unwrap();

        let bytes = writer.into_inner();
        let decoded = decode_all(&bytes).await.unwrap();
        assert_eq!(
            decoded.iter().map(|e| e.call_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn test_read_failure_is_fatal() {
        let frame = encode_event(&sample(1)).unwrap();
        let source = tokio_test::io::Builder::new()
            .read(&frame)
            .read_error(std::io::Error::new(ErrorKind::BrokenPipe, "device gone"))
            .build();

        let mut reader = FrameReader::new(source);
        assert_eq!(reader.next_event().await.unwrap().unwrap().call_id, 1);
        let err = reader.next_event().await.unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }
}
