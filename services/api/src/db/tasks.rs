//! Task lifecycle: idempotent creation and completion.

use lingua_core::topic;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Db, StoreError};
use crate::models::{Task, TaskType};

/// Column list for tasks queries.
pub(crate) const TASK_COLUMNS: &str = "id, user_id, topic_name, level, task_type, \
    start_date, completion_date, task_score, duration_seconds";

/// Result of completing a task. A conversation task that completed but whose
/// level progression failed reports `level_advanced = false`: an explicit
/// partial success, not an error.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub task: Task,
    pub level_advanced: bool,
}

/// Normalizes a topic key and resolves it against the directory, tolerating
/// naming drift. Shared by every path that accepts a client-supplied topic.
async fn resolve_topic_with<'e, E>(executor: E, topic_key: &str) -> Result<String, StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    let requested = topic::display_name(topic_key);
    let known: Vec<String> = sqlx::query_scalar("SELECT name FROM topics")
        .fetch_all(executor)
        .await?;
    let resolved = topic::resolve(&requested, &known)
        .ok_or_else(|| StoreError::NotFound(format!("topic '{requested}'")))?;
    if resolved != requested {
        info!(requested = %requested, resolved = %resolved, "Resolved drifted topic name");
    }
    Ok(resolved.to_string())
}

impl Db {
    /// Resolves a client-supplied topic key with the same drift tolerance
    /// task creation applies.
    pub async fn resolve_topic(&self, topic_key: &str) -> Result<String, StoreError> {
        resolve_topic_with(self.pool(), topic_key).await
    }

    /// Creates a task for (user, topic, level, type), or returns the existing
    /// open one.
    ///
    /// The topic key is normalized from slug form and resolved against the
    /// topic directory with drift tolerance. The level row is created with
    /// default capacity when absent. All steps share one transaction.
    pub async fn create_task(
        &self,
        user_id: &str,
        topic_key: &str,
        level: i32,
        task_type: TaskType,
    ) -> Result<Task, StoreError> {
        let mut tx = self.pool().begin().await?;

        let user_exists: Option<String> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if user_exists.is_none() {
            return Err(StoreError::NotFound(format!("user '{user_id}'")));
        }

        let topic_name = resolve_topic_with(&mut *tx, topic_key).await?;

        sqlx::query(
            "INSERT INTO topiclevels (topic_name, level) VALUES ($1, $2)
             ON CONFLICT (topic_name, level) DO NOTHING",
        )
        .bind(&topic_name)
        .bind(level)
        .execute(&mut *tx)
        .await?;

        // Idempotent create: a repeated request returns the open task.
        let query = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE user_id = $1 AND topic_name = $2 AND level = $3 AND task_type = $4
               AND completion_date IS NULL"
        );
        let existing = sqlx::query_as::<_, Task>(&query)
            .bind(user_id)
            .bind(&topic_name)
            .bind(level)
            .bind(task_type)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(task) = existing {
            tx.commit().await?;
            info!(task_id = %task.id, "Returning existing open task");
            return Ok(task);
        }

        let query = format!(
            "INSERT INTO tasks (user_id, topic_name, level, task_type)
             VALUES ($1, $2, $3, $4)
             RETURNING {TASK_COLUMNS}"
        );
        let task = sqlx::query_as::<_, Task>(&query)
            .bind(user_id)
            .bind(&topic_name)
            .bind(level)
            .bind(task_type)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(task_id = %task.id, topic = %task.topic_name, level, kind = %task.task_type, "Created task");
        Ok(task)
    }

    /// Retrieves a single task by its ID.
    pub async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>, StoreError> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");
        let task = sqlx::query_as::<_, Task>(&query)
            .bind(task_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(task)
    }

    /// Marks a task complete with its score and duration.
    ///
    /// Completing a conversation task also advances the learner's level.
    /// Progression runs in its own transaction: its failure leaves the
    /// completed task persisted and is reported via `level_advanced`, never
    /// rolled back together with the completion.
    pub async fn complete_task(
        &self,
        task_id: Uuid,
        score: i32,
        duration_seconds: i32,
    ) -> Result<CompletionOutcome, StoreError> {
        let query = format!(
            "UPDATE tasks
             SET completion_date = now(), task_score = $2, duration_seconds = $3
             WHERE id = $1
             RETURNING {TASK_COLUMNS}"
        );
        let task = sqlx::query_as::<_, Task>(&query)
            .bind(task_id)
            .bind(score)
            .bind(duration_seconds)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("task '{task_id}'")))?;

        let mut level_advanced = false;
        if task.task_type == TaskType::Conversation {
            match self.advance_level(&task).await {
                Ok(()) => level_advanced = true,
                Err(e) => {
                    warn!(task_id = %task.id, error = ?e,
                        "Level progression failed; task completion stands (partial success)");
                }
            }
        }

        info!(task_id = %task.id, score, level_advanced, "Completed task");
        Ok(CompletionOutcome {
            task,
            level_advanced,
        })
    }
}
