//! Server-sent progress channel for a running import commit.
//!
//! [`ProgressChannel::spawn`] takes an open `text/event-stream` response,
//! decodes it on a background task with [`SseDecoder`], and hands parsed
//! [`ProgressMessage`]s to the owner through an `mpsc` channel. The channel
//! is telemetry only: if it fails, the commit still completes and the
//! request's own result decides the outcome.

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::messages::{parse_message, ProgressMessage};

/// Buffered messages between the reader task and the consumer.
const MESSAGE_CHANNEL_CAPACITY: usize = 64;

/// Longest event-stream line kept; longer lines are dropped.
const MAX_LINE_BYTES: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Event-stream decoding
// ---------------------------------------------------------------------------

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, if the server named the event.
    pub event: Option<String>,
    /// All `data:` lines of the event joined with `\n`.
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes may be pushed in arbitrary chunks; lines split across chunks
/// (including inside a multi-byte character) are reassembled. A line longer
/// than 64 KiB is dropped up to its newline.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
    /// Skipping the rest of an over-long line.
    discarding: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completed.
    pub fn push(&mut self, mut chunk: &[u8]) -> Vec<SseEvent> {
        if self.discarding {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.discarding = false;
                    chunk = &chunk[pos + 1..];
                }
                None => return Vec::new(),
            }
        }
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        if self.buf.len() > MAX_LINE_BYTES {
            tracing::warn!(bytes = self.buf.len(), "Progress stream line too long; dropped");
            self.buf.clear();
            self.discarding = true;
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            if self.data.is_empty() {
                self.event = None;
                return None;
            }
            return Some(SseEvent {
                event: self.event.take(),
                data: std::mem::take(&mut self.data).join("\n"),
            });
        }

        // Comment / keep-alive.
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Errors from the progress channel's transport.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("Progress stream failed: {0}")]
    Stream(#[from] reqwest::Error),
}

/// Consumer side of an open progress channel.
///
/// Remembers the session id from the first message that carries one.
/// Dropping or [`close`](Self::close)-ing the channel stops the reader.
pub struct ProgressChannel {
    rx: mpsc::Receiver<ProgressMessage>,
    cancel: CancellationToken,
    session_id: Option<String>,
}

impl ProgressChannel {
    /// Wrap an already-running message source.
    ///
    /// `cancel` is triggered when the channel is closed.
    pub fn new(rx: mpsc::Receiver<ProgressMessage>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            cancel,
            session_id: None,
        }
    }

    /// Decode an open event-stream response on a background task.
    pub fn spawn(response: reqwest::Response) -> Self {
        Self::from_byte_stream(response.bytes_stream())
    }

    fn from_byte_stream<S, B>(stream: S) -> Self
    where
        S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => {
                    tracing::debug!("Progress channel reader cancelled");
                }
                result = read_event_stream(stream, &tx) => {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "Progress channel transport error");
                    }
                }
            }
        });

        Self::new(rx, cancel)
    }

    /// Wait for the next message. `None` once the channel is closed or the
    /// reader stopped.
    pub async fn next(&mut self) -> Option<ProgressMessage> {
        let message = self.rx.recv().await?;
        if let ProgressMessage::Session { sseid } = &message {
            if self.session_id.is_none() {
                tracing::info!(sseid = %sseid, "Progress channel session opened");
                self.session_id = Some(sseid.clone());
            }
        }
        Some(message)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Stop the reader and forget the session id.
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.rx.close();
        self.session_id = None;
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for ProgressChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Forward every event of `stream` until it ends, the server sends the end
/// marker, or the receiver goes away.
async fn read_event_stream<S, B>(
    stream: S,
    tx: &mpsc::Sender<ProgressMessage>,
) -> Result<(), ProgressError>
where
    S: Stream<Item = Result<B, reqwest::Error>>,
    B: AsRef<[u8]>,
{
    tokio::pin!(stream);
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = stream.next().await {
        let events = decoder.push(chunk?.as_ref());
        for event in events {
            let message = parse_message(&event.data);
            let is_end = message == ProgressMessage::End;
            if tx.send(message).await.is_err() {
                return Ok(());
            }
            if is_end {
                return Ok(());
            }
        }
    }

    tracing::debug!("Progress stream exhausted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: hello\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: None,
                data: "hello".into()
            }]
        );
    }

    #[test]
    fn joins_multi_line_data_and_keeps_event_name() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: progress\ndata: a\ndata: b\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("progress"));
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn reassembles_split_chunks_and_crlf() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"da").is_empty());
        assert!(decoder.push(b"ta: {\"sseid\":").is_empty());
        let events = decoder.push(b"\"x1\"}\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(parse_message(&events[0].data), ProgressMessage::Session { sseid: "x1".into() });
    }

    #[test]
    fn reassembles_multibyte_character_across_chunks() {
        let bytes = "data: 50 % ✓\n\n".as_bytes();
        let split = bytes.len() - 4;
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&bytes[..split]).is_empty());
        let events = decoder.push(&bytes[split..]);
        assert_eq!(events[0].data, "50 % ✓");
    }

    #[test]
    fn ignores_comments_and_empty_events() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": heartbeat\n\nid: 4\n\ndata: end\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(parse_message(&events[0].data), ProgressMessage::End);
    }

    #[test]
    fn data_without_space_after_colon() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data:tight\n\n");
        assert_eq!(events[0].data, "tight");
    }

    #[test]
    fn over_long_line_is_dropped_up_to_its_newline() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&vec![b'x'; MAX_LINE_BYTES + 1]).is_empty());
        assert!(decoder.buf.is_empty());
        assert!(decoder.push(b"xxxx").is_empty());
        assert!(decoder.buf.is_empty());

        let events = decoder.push(b"xx\ndata: ok\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: None,
                data: "ok".into()
            }]
        );
    }

    fn chunks(parts: &[&'static str]) -> Vec<Result<&'static [u8], reqwest::Error>> {
        parts.iter().copied().map(|p| Ok(p.as_bytes())).collect()
    }

    #[tokio::test]
    async fn byte_stream_is_decoded_into_messages() {
        let stream = futures::stream::iter(chunks(&[
            "data: {\"sseid\":\"s-1\"}\n",
            "\ndata: Importing 1 of 2\n\n: ping\n\n",
        ]));
        let mut channel = ProgressChannel::from_byte_stream(stream);

        assert_eq!(
            channel.next().await,
            Some(ProgressMessage::Session { sseid: "s-1".into() })
        );
        assert_eq!(channel.session_id(), Some("s-1"));
        assert_eq!(
            channel.next().await,
            Some(ProgressMessage::Progress("Importing 1 of 2".into()))
        );
        assert_eq!(channel.next().await, None);
    }

    #[tokio::test]
    async fn reader_stops_at_end_marker() {
        let stream = futures::stream::iter(chunks(&[
            "data: step 1\n\ndata: end\n\n",
            "data: after end\n\n",
        ]));
        let mut channel = ProgressChannel::from_byte_stream(stream);

        assert_eq!(channel.next().await, Some(ProgressMessage::Progress("step 1".into())));
        assert_eq!(channel.next().await, Some(ProgressMessage::End));
        assert_eq!(channel.next().await, None);
    }

    #[tokio::test]
    async fn forwarding_stops_when_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let stream = futures::stream::iter(chunks(&["data: a\n\ndata: b\n\n"]));

        assert!(read_event_stream(stream, &tx).await.is_ok());
    }

    #[tokio::test]
    async fn channel_captures_first_session_id() {
        let (tx, rx) = mpsc::channel(8);
        let mut channel = ProgressChannel::new(rx, CancellationToken::new());

        tx.send(ProgressMessage::Session { sseid: "first".into() }).await.unwrap();
        tx.send(ProgressMessage::Session { sseid: "second".into() }).await.unwrap();

        channel.next().await;
        channel.next().await;
        assert_eq!(channel.session_id(), Some("first"));
    }

    #[tokio::test]
    async fn close_cancels_and_clears_session() {
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let mut channel = ProgressChannel::new(rx, cancel.clone());

        tx.send(ProgressMessage::Session { sseid: "s".into() }).await.unwrap();
        channel.next().await;
        channel.close();

        assert!(cancel.is_cancelled());
        assert!(channel.is_closed());
        assert_eq!(channel.session_id(), None);
        assert!(tx.send(ProgressMessage::End).await.is_err());
    }
}
