//! SSE stream translation utilities
//!
//! The upstream backend answers streaming completions as an SSE body whose
//! chunks may not align with line boundaries. [`DataLineBuffer`] reassembles
//! lines across chunks and extracts the payload of each `data:` line;
//! everything else (blank separators, `:` comments) is dropped.
//! [`translate_stream`] drives the buffer over a chunk stream and appends
//! the terminal marker.

use futures::{Stream, StreamExt};
use tracing::warn;

use crate::error::{BridgeError, BridgeResult};

/// Terminal marker appended after the upstream stream closes normally, so
/// consumers get an explicit end-of-stream event instead of relying on
/// connection closure.
pub const STREAM_DONE: &str = "[DONE]";

const DATA_PREFIX: &str = "data: ";

/// Buffer that turns raw SSE byte chunks into `data:` payloads.
///
/// # Example
/// ```
/// use inference_bridge::streaming::DataLineBuffer;
///
/// let mut buffer = DataLineBuffer::new();
///
/// // First chunk ends mid-line
/// assert!(buffer.feed(b"data: {\"content\":\"hel").is_empty());
///
/// // Second chunk completes it
/// assert_eq!(buffer.feed(b"lo\"}\n"), vec!["{\"content\":\"hello\"}"]);
/// ```
#[derive(Debug, Default)]
pub struct DataLineBuffer {
    /// Accumulated incomplete line data
    pending: String,
}

impl DataLineBuffer {
    pub fn new() -> Self {
        Self {
            pending: String::new(),
        }
    }

    /// Feed raw bytes and return the payloads of any completed `data:` lines.
    ///
    /// Line order is preserved exactly. Lines without the `data: ` prefix
    /// are discarded silently.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let text = String::from_utf8_lossy(bytes);
        self.pending.push_str(&text);

        let mut payloads = Vec::new();
        while let Some(newline_pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=newline_pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
                payloads.push(payload.to_string());
            }
        }

        payloads
    }

    /// True if a truncated line is still buffered (stream cut mid-line)
    pub fn has_partial(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drain a buffered unterminated line, returning its payload if it is a
    /// `data:` line.
    ///
    /// Some backends close the stream without terminating the last line;
    /// its payload is still valid and must not be lost.
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        let line = line.trim_end_matches('\r');
        line.strip_prefix(DATA_PREFIX).map(str::to_string)
    }
}

/// Turn an upstream chunk stream into a stream of `data:` payloads.
///
/// Upstream EOF flushes any unterminated final line and appends one
/// [`STREAM_DONE`] payload. A chunk error ends the stream with an error and
/// no terminal marker; partial output may already be with the caller, so
/// the missing marker is the failure signal.
pub fn translate_stream<S, B, E>(
    upstream: S,
) -> impl Stream<Item = BridgeResult<String>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    async_stream::stream! {
        futures::pin_mut!(upstream);
        let mut buffer = DataLineBuffer::new();
        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(chunk) => {
                    for payload in buffer.feed(chunk.as_ref()) {
                        yield Ok(payload);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "upstream stream failed mid-flight");
                    yield Err(BridgeError::UpstreamUnavailable(e.to_string()));
                    return;
                }
            }
        }
        if let Some(payload) = buffer.flush() {
            yield Ok(payload);
        }
        yield Ok(STREAM_DONE.to_string());
    }
}
