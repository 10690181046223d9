//! Streaming event bridge
//!
//! Converts the chunked SSE byte stream of a streaming completion into an
//! ordered sequence of typed events, terminating exactly once. Records are
//! reconstructed across frame boundaries before decoding; a record that
//! fails to decode yields a decode-failure event and the bridge
//! resynchronizes at the next boundary.

mod channel;

pub use channel::{ChatStream, StreamHandle};
pub(crate) use channel::EventSink;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::classify::ErrorEnvelope;
use crate::error::ChatError;
use crate::types::ChatChunk;

/// Record payload that ends a stream
const DONE_SENTINEL: &str = "[DONE]";

/// Mutable state for one streaming session
///
/// Owned exclusively by the bridge for the lifetime of one request; torn
/// down when the session completes or is cancelled.
struct StreamSession {
    /// Partially received record bytes awaiting a blank-line boundary.
    /// Kept raw: a multi-byte character split across frames must survive
    /// reassembly, so text conversion happens per complete record.
    buffer: BytesMut,
    /// Total bytes absorbed from the transport
    consumed: usize,
    /// Set once the completion signal has fired
    completed: bool,
}

impl StreamSession {
    fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
            consumed: 0,
            completed: false,
        }
    }

    /// Absorb one transport frame, returning the `data:` payloads of every
    /// record the frame completed. A record spanning frame boundaries stays
    /// buffered until its boundary arrives; a truncated record is never
    /// decoded as if complete.
    fn absorb(&mut self, frame: &[u8]) -> Vec<Vec<u8>> {
        self.consumed += frame.len();
        self.buffer.extend_from_slice(frame);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let record = self.buffer.split_to(pos + 2);
            for line in record.as_ref().split(|&b| b == b'\n') {
                if let Some(data) = line.strip_prefix(b"data:") {
                    payloads.push(data.trim_ascii_start().to_vec());
                }
            }
        }
        payloads
    }
}

/// One decoded record
enum Segment {
    /// Typed event to forward
    Event(Result<ChatChunk, ChatError>),
    /// Stream-complete sentinel
    Done,
}

/// Decode a single record payload, error shape first.
///
/// Error payloads may appear mid-stream; they become events, not
/// terminations. A payload that is not valid UTF-8 surfaces as a decode
/// failure from the JSON layer rather than being silently repaired.
fn decode_segment(data: &[u8]) -> Segment {
    let data = data.trim_ascii();
    if data == DONE_SENTINEL.as_bytes() {
        return Segment::Done;
    }

    if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(data) {
        return Segment::Event(Err(envelope.error.into()));
    }

    match serde_json::from_slice::<ChatChunk>(data) {
        Ok(chunk) => Segment::Event(Ok(chunk)),
        Err(e) => {
            tracing::debug!(error = %e, data = %String::from_utf8_lossy(data), "undecodable stream segment");
            Segment::Event(Err(ChatError::Decode(e)))
        }
    }
}

/// Bridges transport frames into ordered sink deliveries
pub(crate) struct StreamBridge {
    session: StreamSession,
    sink: EventSink,
    cancel: CancellationToken,
}

impl StreamBridge {
    pub(crate) fn new(sink: EventSink) -> Self {
        Self {
            session: StreamSession::new(),
            sink,
            cancel: CancellationToken::new(),
        }
    }

    /// Token observed before each frame and each delivery
    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive the session until the sentinel, cancellation, consumer
    /// disconnect, or transport close.
    ///
    /// Events are delivered in the exact order their records were observed.
    /// Transport failures are forwarded unchanged as events. An orderly
    /// close without the sentinel still completes the session; only a silent
    /// hang leaves it unresolved, since the bridge has no timer of its own.
    pub(crate) async fn run<S>(mut self, mut frames: S)
    where
        S: Stream<Item = Result<Bytes, ChatError>> + Unpin,
    {
        loop {
            let frame = tokio::select! {
                () = self.cancel.cancelled() => return,
                frame = frames.next() => frame,
            };
            let Some(frame) = frame else { break };

            match frame {
                Ok(bytes) => {
                    for payload in self.session.absorb(&bytes) {
                        // Input already received but not yet decoded is
                        // discarded on cancellation, not flushed.
                        if self.cancel.is_cancelled() {
                            return;
                        }
                        match decode_segment(&payload) {
                            Segment::Done => {
                                tracing::debug!(bytes = self.session.consumed, "stream complete");
                                self.complete();
                                return;
                            }
                            Segment::Event(event) => {
                                if self.sink.deliver(event).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    if self.sink.deliver(Err(e)).await.is_err() {
                        return;
                    }
                }
            }
        }

        self.complete();
    }

    /// Fire the completion signal at most once
    fn complete(&mut self) {
        if !self.session.completed {
            self.session.completed = true;
            self.sink.complete();
        }
    }
}
