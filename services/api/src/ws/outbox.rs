//! Best-effort recorder outbox.
//!
//! Accepted exchanges are persisted off the live turn-taking loop through a
//! bounded channel and a worker task. Every write is capped by a short
//! timeout; failures are logged for diagnostics and never reach the learner.

use crate::db::Db;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

const OUTBOX_CAPACITY: usize = 32;

#[derive(Debug)]
enum RecorderMsg {
    Exchange {
        question: String,
        answer: String,
        feedback: Option<Value>,
    },
}

/// Handle for queueing exchange writes; dropping it drains and stops the worker.
pub struct RecorderHandle {
    tx: mpsc::Sender<RecorderMsg>,
}

impl RecorderHandle {
    /// Spawns the worker for one conversation session.
    pub fn spawn(
        db: Arc<Db>,
        session_id: Uuid,
        op_timeout: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(OUTBOX_CAPACITY);
        let worker = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let RecorderMsg::Exchange {
                    question,
                    answer,
                    feedback,
                } = msg;
                let write = async {
                    let question_id = db.record_question(session_id, &question).await?;
                    db.record_answer(question_id, &answer, feedback.as_ref())
                        .await
                };
                match tokio::time::timeout(op_timeout, write).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(%session_id, error = ?e, "Failed to persist exchange");
                    }
                    Err(_) => {
                        warn!(%session_id, "Recorder write timed out");
                    }
                }
            }
        });
        (Self { tx }, worker)
    }

    /// Queues one exchange, fire-and-forget. A full outbox drops the write
    /// rather than blocking the turn loop.
    pub fn record(&self, question: String, answer: String, feedback: Option<Value>) {
        let msg = RecorderMsg::Exchange {
            question,
            answer,
            feedback,
        };
        if self.tx.try_send(msg).is_err() {
            warn!("Recorder outbox full; dropping exchange");
        }
    }
}
