//! The caller's end of a running dialogue.

use std::pin::Pin;
use std::task::{Context, Poll};

use disclaude_core::DialogueMessage;
use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::DialogueError;
use crate::orchestrator::DialogueOutcome;

/// Live stream of forwarded messages plus the loop's final outcome.
///
/// The stream ends exactly when the loop reaches a terminal state. Dropping
/// it (or calling [`Self::finish`] early) abandons the loop at its next
/// send.
pub struct DialogueStream {
    inner: ReceiverStream<DialogueMessage>,
    handle: JoinHandle<DialogueOutcome>,
}

impl DialogueStream {
    pub(crate) fn new(
        rx: tokio::sync::mpsc::Receiver<DialogueMessage>,
        handle: JoinHandle<DialogueOutcome>,
    ) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
            handle,
        }
    }

    /// The next forwarded message, or `None` once the loop has ended.
    pub async fn recv(&mut self) -> Option<DialogueMessage> {
        self.inner.next().await
    }

    /// Stop reading and wait for the loop's outcome.
    pub async fn finish(self) -> Result<DialogueOutcome, DialogueError> {
        let Self { inner, handle } = self;
        drop(inner);
        handle
            .await
            .map_err(|e| DialogueError::LoopFailed(e.to_string()))
    }

    /// Read every message to the end, then return them with the outcome.
    pub async fn drain(mut self) -> Result<(Vec<DialogueMessage>, DialogueOutcome), DialogueError> {
        let mut messages = Vec::new();
        while let Some(message) = self.recv().await {
            messages.push(message);
        }
        let outcome = self.finish().await?;
        Ok((messages, outcome))
    }
}

impl Stream for DialogueStream {
    type Item = DialogueMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
