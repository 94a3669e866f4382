//! Conversation recorder: best-effort persistence of session turns.
//!
//! Callers treat every method here as best-effort; failures are logged at the
//! call site and never interrupt the live conversation. Text fields are
//! clamped to the storage column budget before writing.

use uuid::Uuid;

use super::{Db, StoreError};
use crate::models::ConversationSession;

/// Byte budget for persisted question and answer text.
pub const TEXT_BYTE_BUDGET: usize = 1000;

/// Truncates `text` to the byte budget on a UTF-8 character boundary.
pub fn clamp_text(text: &str) -> &str {
    if text.len() <= TEXT_BYTE_BUDGET {
        return text;
    }
    let mut end = TEXT_BYTE_BUDGET;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

impl Db {
    /// Creates the session row spanning one conversation task.
    pub async fn create_conversation_session(
        &self,
        session_id: Uuid,
        task_id: Uuid,
        session_type: &str,
    ) -> Result<ConversationSession, StoreError> {
        let session = sqlx::query_as::<_, ConversationSession>(
            "INSERT INTO interactivesessions (id, task_id, session_type)
             VALUES ($1, $2, $3)
             RETURNING id, task_id, session_type, created_at",
        )
        .bind(session_id)
        .bind(task_id)
        .bind(session_type)
        .fetch_one(self.pool())
        .await?;
        Ok(session)
    }

    /// Persists a question asked by the system; returns its id for the
    /// matching answer update.
    pub async fn record_question(
        &self,
        session_id: Uuid,
        text: &str,
    ) -> Result<Uuid, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO questions (session_id, question_text)
             VALUES ($1, $2)
             RETURNING id",
        )
        .bind(session_id)
        .bind(clamp_text(text))
        .fetch_one(self.pool())
        .await?;
        Ok(id)
    }

    /// Fills in the learner's answer and feedback for a recorded question.
    pub async fn record_answer(
        &self,
        question_id: Uuid,
        answer_text: &str,
        feedback: Option<&serde_json::Value>,
    ) -> Result<(), StoreError> {
        let updated = sqlx::query(
            "UPDATE questions
             SET answer_text = $2, feedback = $3, answered_at = now()
             WHERE id = $1",
        )
        .bind(question_id)
        .bind(clamp_text(answer_text))
        .bind(feedback)
        .execute(self.pool())
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("question '{question_id}'")));
        }
        Ok(())
    }
}
