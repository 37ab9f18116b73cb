//! Streamed advisory replies.
//!
//! A `ReplyStream` is a finite, single-consumer sequence of text increments
//! from the model collaborator. Order within one stream is guaranteed;
//! cancellation is simply dropping the receiver — the producer's sends fail
//! silently from then on.

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// A chunk of a streamed reply.
#[derive(Debug, Clone)]
pub struct ReplyChunk {
    /// Text increment
    pub text: String,
    /// Whether this is the final chunk
    pub is_final: bool,
}

impl ReplyChunk {
    /// Create a content chunk.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    /// Create a final chunk.
    pub fn final_chunk(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

pin_project! {
    /// Stream of text increments for one advisory reply.
    pub struct ReplyStream {
        #[pin]
        receiver: mpsc::Receiver<ReplyChunk>,
        // Accumulated text (for getting the full reply)
        accumulated: String,
        // Whether the stream has ended
        complete: bool,
    }
}

impl ReplyStream {
    /// Create a stream over a receiver.
    pub fn new(receiver: mpsc::Receiver<ReplyChunk>) -> Self {
        Self {
            receiver,
            accumulated: String::new(),
            complete: false,
        }
    }

    /// Create a sender/stream pair.
    pub fn channel(buffer: usize) -> (ReplyStreamSender, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (ReplyStreamSender { sender: tx }, Self::new(rx))
    }

    /// Wrap an already-complete reply as a single-chunk stream, for
    /// backends that do not stream.
    pub fn from_text(text: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let chunk = ReplyChunk::final_chunk(text);

        tokio::spawn(async move {
            let _ = tx.send(chunk).await;
        });

        Self::new(rx)
    }

    /// Text accumulated so far.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Whether the stream has ended.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Drain the stream and return the full reply text.
    pub async fn collect(mut self) -> String {
        use futures::StreamExt;

        while self.next().await.is_some() {}
        self.accumulated
    }
}

impl Stream for ReplyStream {
    type Item = ReplyChunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(chunk)) => {
                this.accumulated.push_str(&chunk.text);

                if chunk.is_final {
                    *this.complete = true;
                }

                Poll::Ready(Some(chunk))
            }
            Poll::Ready(None) => {
                *this.complete = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Producer side of a reply stream.
pub struct ReplyStreamSender {
    sender: mpsc::Sender<ReplyChunk>,
}

impl ReplyStreamSender {
    /// Send a text increment. Fails silently once the consumer is gone.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), StreamClosed> {
        self.sender
            .send(ReplyChunk::text(text))
            .await
            .map_err(|_| StreamClosed)
    }

    /// Send the final increment and close the stream.
    pub async fn finish(self, text: impl Into<String>) -> Result<(), StreamClosed> {
        self.sender
            .send(ReplyChunk::final_chunk(text))
            .await
            .map_err(|_| StreamClosed)
    }

    /// Close without a final increment (mid-stream failure path: whatever
    /// the consumer already applied stands).
    pub fn abort(self) {
        drop(self.sender);
    }
}

/// The consumer dropped the stream.
#[derive(Debug, thiserror::Error)]
#[error("Reply stream closed")]
pub struct StreamClosed;

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_reply_stream_order_and_accumulation() {
        let (sender, mut stream) = ReplyStream::channel(8);

        tokio::spawn(async move {
            sender.send("Hel").await.unwrap();
            sender.send("lo").await.unwrap();
            sender.finish("!").await.unwrap();
        });

        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk);
        }

        assert_eq!(chunks.len(), 3);
        assert!(chunks.last().unwrap().is_final);
        assert_eq!(stream.accumulated(), "Hello!");
        assert!(stream.is_complete());
    }

    #[tokio::test]
    async fn test_from_text_single_chunk() {
        let stream = ReplyStream::from_text("Complete reply");
        assert_eq!(stream.collect().await, "Complete reply");
    }

    #[tokio::test]
    async fn test_abort_ends_stream_keeping_partials() {
        let (sender, mut stream) = ReplyStream::channel(8);

        tokio::spawn(async move {
            sender.send("partial").await.unwrap();
            sender.abort();
        });

        while stream.next().await.is_some() {}
        assert_eq!(stream.accumulated(), "partial");
        assert!(stream.is_complete());
    }
}
