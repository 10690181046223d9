//! Result channel adapter
//!
//! Exposes the bridge's output through two equivalent consumption modes: a
//! callback pair invoked on the driver task, and a pull-based stream backed
//! by a bounded channel. Both observe the same events in the same order.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ChatError;
use crate::types::ChatChunk;

/// Pull-mode channel capacity. The bridge awaits capacity before delivering,
/// so a slow consumer backpressures the producer instead of growing a buffer.
const CHANNEL_CAPACITY: usize = 64;

/// Event callback invoked for each stream event
pub(crate) type EventFn = Box<dyn FnMut(Result<ChatChunk, ChatError>) + Send>;

/// Completion callback invoked exactly once
pub(crate) type CompleteFn = Box<dyn FnOnce() + Send>;

/// The consumer went away; the bridge stops forwarding
pub(crate) struct SinkClosed;

/// Destination for bridge output
///
/// One sink type behind both consumption modes, so the adapter is a pure
/// re-expression of the bridge's output rather than a second source of truth.
pub(crate) enum EventSink {
    /// Caller-supplied callback pair
    Callback {
        on_event: EventFn,
        on_complete: Option<CompleteFn>,
    },
    /// Bounded channel feeding a [`ChatStream`]
    Channel {
        tx: Option<mpsc::Sender<Result<ChatChunk, ChatError>>>,
    },
}

impl EventSink {
    pub(crate) fn callback(on_event: EventFn, on_complete: CompleteFn) -> Self {
        Self::Callback {
            on_event,
            on_complete: Some(on_complete),
        }
    }

    /// Create a channel-backed sink and the receiver its stream reads from
    pub(crate) fn channel() -> (Self, mpsc::Receiver<Result<ChatChunk, ChatError>>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (Self::Channel { tx: Some(tx) }, rx)
    }

    /// Deliver one event in order
    pub(crate) async fn deliver(&mut self, event: Result<ChatChunk, ChatError>) -> Result<(), SinkClosed> {
        match self {
            Self::Callback { on_event, .. } => {
                on_event(event);
                Ok(())
            }
            Self::Channel { tx } => match tx {
                Some(tx) => tx.send(event).await.map_err(|_| SinkClosed),
                None => Err(SinkClosed),
            },
        }
    }

    /// Signal completion: fire the callback, or close the channel so the
    /// pull stream ends. Idempotent; the bridge guards exactly-once anyway.
    pub(crate) fn complete(&mut self) {
        match self {
            Self::Callback { on_complete, .. } => {
                if let Some(complete) = on_complete.take() {
                    complete();
                }
            }
            Self::Channel { tx } => {
                tx.take();
            }
        }
    }
}

/// Pull-mode streaming response
///
/// A single-consumption sequence of stream events; each poll suspends the
/// caller until the next event arrives, and the sequence ends exactly when
/// the session completes. Dropping the stream cancels the session.
pub struct ChatStream {
    rx: mpsc::Receiver<Result<ChatChunk, ChatError>>,
    cancel: CancellationToken,
}

impl ChatStream {
    pub(crate) fn new(
        rx: mpsc::Receiver<Result<ChatChunk, ChatError>>,
        cancel: CancellationToken,
    ) -> Self {
        Self { rx, cancel }
    }

    /// Stop the session. No further events are delivered; cancelling after
    /// natural completion is a no-op.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for ChatStream {
    type Item = Result<ChatChunk, ChatError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Handle to a callback-mode streaming session
///
/// Callbacks keep firing on the driver task until completion or
/// [`StreamHandle::cancel`]; dropping the handle does not cancel.
pub struct StreamHandle {
    cancel: CancellationToken,
}

impl StreamHandle {
    pub(crate) const fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Stop the session. No further events are delivered and the completion
    /// callback does not fire; cancelling after completion is a no-op.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
