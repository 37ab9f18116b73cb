//! Advisory session.
//!
//! One long-lived conversational exchange with the model collaborator,
//! bound to a point-in-time ledger snapshot. Replies stream in as text
//! increments folded onto the trailing `ai` transcript message, in arrival
//! order; earlier messages are never touched. Closing the session discards
//! any increments still in flight.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use portfolio::{ActivityKind, ActivityLog, FinancialHealth, SubscriptionRecord};

use crate::backend::{AdvisorBackend, ModelBackend, ModelError};

/// Who authored a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Ai,
}

/// One transcript entry.
///
/// Only the trailing `ai` message of an open query is ever mutated — by
/// successive stream increments — after which it too is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

/// What happened to one advisory query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Reply streamed to completion
    Completed,
    /// Empty/whitespace-only input; nothing happened
    Ignored,
    /// Another query is still pending on this session
    Busy,
    /// The session closed mid-reply; remaining increments were discarded
    Cancelled,
    /// The stream failed; partial text stands, a warning was logged
    Failed,
}

/// A live conversational session.
pub struct AdvisorSession {
    session_id: String,
    live: Arc<AtomicBool>,
    pending: AtomicBool,
    backend: Mutex<Box<dyn AdvisorBackend>>,
    transcript: Arc<RwLock<Vec<ChatMessage>>>,
    activity: Arc<RwLock<ActivityLog>>,
}

impl AdvisorSession {
    /// Open a session bound to a snapshot of the ledger and current health.
    ///
    /// The snapshot is captured once, here; later ledger mutations do not
    /// reach the session.
    pub async fn open(
        model: &dyn ModelBackend,
        snapshot: Vec<SubscriptionRecord>,
        health: Option<FinancialHealth>,
        activity: Arc<RwLock<ActivityLog>>,
    ) -> Result<Self, ModelError> {
        let backend = model.open_session(snapshot, health).await?;
        let session_id = uuid::Uuid::new_v4().to_string();
        debug!(%session_id, "Advisory session opened");

        Ok(Self {
            session_id,
            live: Arc::new(AtomicBool::new(true)),
            pending: AtomicBool::new(false),
            backend: Mutex::new(backend),
            transcript: Arc::new(RwLock::new(Vec::new())),
            activity,
        })
    }

    /// Session identifier.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether the session is still open.
    pub fn is_open(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Full transcript, oldest first.
    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.read().await.clone()
    }

    /// Close the session. Increments still in flight are discarded.
    pub fn close(&self) {
        self.live.store(false, Ordering::SeqCst);
        debug!(session_id = %self.session_id, "Advisory session closed");
    }

    /// Send one query and fold its streamed reply into the transcript.
    ///
    /// Rejects a query while another is pending; the transcript is never
    /// interleaved.
    pub async fn send_query(&self, text: &str) -> QueryOutcome {
        let text = text.trim();
        if text.is_empty() {
            return QueryOutcome::Ignored;
        }
        if !self.is_open() {
            return QueryOutcome::Ignored;
        }
        if self
            .pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return QueryOutcome::Busy;
        }

        {
            let mut transcript = self.transcript.write().await;
            transcript.push(ChatMessage {
                role: ChatRole::User,
                text: text.to_string(),
            });
            // Placeholder the stream folds into
            transcript.push(ChatMessage {
                role: ChatRole::Ai,
                text: String::new(),
            });
        }

        let outcome = self.consume_reply(text).await;
        self.pending.store(false, Ordering::SeqCst);
        outcome
    }

    async fn consume_reply(&self, text: &str) -> QueryOutcome {
        let mut stream = {
            let mut backend = self.backend.lock().await;
            match backend.stream_query(text).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(session_id = %self.session_id, error = %e, "Advisory query failed");
                    self.log_warning(format!("Advisor query failed: {}", e)).await;
                    return QueryOutcome::Failed;
                }
            }
        };

        let mut saw_final = false;
        let mut cancelled = false;

        while let Some(chunk) = stream.next().await {
            if !self.is_open() {
                debug!(session_id = %self.session_id, "Discarding increments for closed session");
                cancelled = true;
                break;
            }

            let mut transcript = self.transcript.write().await;
            if let Some(last) = transcript.last_mut() {
                last.text.push_str(&chunk.text);
            }
            saw_final = chunk.is_final;
        }

        if cancelled {
            QueryOutcome::Cancelled
        } else if saw_final {
            QueryOutcome::Completed
        } else {
            // Stream ended without a final chunk: mid-stream failure.
            // Whatever partial text arrived stands.
            warn!(session_id = %self.session_id, "Advisory stream ended early");
            self.log_warning("Advisor stream ended early; partial reply kept")
                .await;
            QueryOutcome::Failed
        }
    }

    async fn log_warning(&self, message: impl Into<String>) {
        self.activity
            .write()
            .await
            .record(message, ActivityKind::Warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockModel;
    use crate::stream::ReplyStream;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Sends one increment immediately, then the final one after a delay,
    /// so a query stays in flight long enough to race against.
    struct SlowAdvisor {
        delay: Duration,
    }

    #[async_trait]
    impl AdvisorBackend for SlowAdvisor {
        async fn stream_query(&mut self, _text: &str) -> Result<ReplyStream, ModelError> {
            let (sender, stream) = ReplyStream::channel(8);
            let delay = self.delay;
            tokio::spawn(async move {
                let _ = sender.send("thinking").await;
                tokio::time::sleep(delay).await;
                let _ = sender.finish(" done").await;
            });
            Ok(stream)
        }
    }

    fn slow_session(delay: Duration) -> AdvisorSession {
        AdvisorSession {
            session_id: uuid::Uuid::new_v4().to_string(),
            live: Arc::new(AtomicBool::new(true)),
            pending: AtomicBool::new(false),
            backend: Mutex::new(Box::new(SlowAdvisor { delay })),
            transcript: Arc::new(RwLock::new(Vec::new())),
            activity: Arc::new(RwLock::new(ActivityLog::new())),
        }
    }

    async fn session(backend: &MockModel) -> AdvisorSession {
        AdvisorSession::open(
            backend,
            Vec::new(),
            None,
            Arc::new(RwLock::new(ActivityLog::new())),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_streamed_reply_assembles_in_order() {
        let backend = MockModel::default().with_reply_chunks(["Hel", "lo", "!"]);
        let session = session(&backend).await;

        let outcome = session.send_query("What should I do?").await;

        assert_eq!(outcome, QueryOutcome::Completed);
        let transcript = session.transcript().await;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, ChatRole::User);
        assert_eq!(transcript[0].text, "What should I do?");
        assert_eq!(transcript[1].role, ChatRole::Ai);
        assert_eq!(transcript[1].text, "Hello!");
    }

    #[tokio::test]
    async fn test_empty_query_is_a_no_op() {
        let backend = MockModel::default();
        let session = session(&backend).await;

        assert_eq!(session.send_query("   ").await, QueryOutcome::Ignored);
        assert!(session.transcript().await.is_empty());
    }

    #[tokio::test]
    async fn test_session_survives_multiple_queries() {
        let backend = MockModel::default().with_reply_chunks(["ok"]);
        let session = session(&backend).await;

        session.send_query("first").await;
        session.send_query("second").await;

        let transcript = session.transcript().await;
        assert_eq!(transcript.len(), 4);
        // Earlier entries untouched by the second stream
        assert_eq!(transcript[1].text, "ok");
        assert_eq!(transcript[3].text, "ok");
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_partial_text() {
        let backend = MockModel::default()
            .with_reply_chunks(["Hel", "lo", "!"])
            .with_mid_stream_failure();
        let session = session(&backend).await;

        let outcome = session.send_query("hi").await;

        assert_eq!(outcome, QueryOutcome::Failed);
        let transcript = session.transcript().await;
        assert_eq!(transcript[1].text, "Hel");
    }

    #[tokio::test]
    async fn test_query_while_one_is_pending_is_busy() {
        let session = Arc::new(slow_session(Duration::from_millis(200)));

        let first = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.send_query("first").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(session.send_query("second").await, QueryOutcome::Busy);
        assert_eq!(first.await.unwrap(), QueryOutcome::Completed);

        // The rejected query left no trace; the transcript never interleaved
        let transcript = session.transcript().await;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].text, "first");
        assert_eq!(transcript[1].text, "thinking done");
    }

    #[tokio::test]
    async fn test_close_mid_reply_discards_remaining_increments() {
        let session = Arc::new(slow_session(Duration::from_millis(200)));

        let query = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.send_query("hi").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.close();

        assert_eq!(query.await.unwrap(), QueryOutcome::Cancelled);

        // Increments applied before close stand; the rest never landed
        let transcript = session.transcript().await;
        assert_eq!(transcript[1].text, "thinking");
    }

    #[tokio::test]
    async fn test_closed_session_rejects_queries() {
        let backend = MockModel::default();
        let session = session(&backend).await;

        session.close();

        assert!(!session.is_open());
        assert_eq!(session.send_query("hi").await, QueryOutcome::Ignored);
        assert!(session.transcript().await.is_empty());
    }
}
