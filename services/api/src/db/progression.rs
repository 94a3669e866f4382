//! Level progression: closing the current level and opening the next.

use tracing::info;

use super::{Db, StoreError};
use crate::models::{Task, UserInLevel};

const LEVEL_COLUMNS: &str = "user_id, topic_name, level, earned_score, completed_at";

impl Db {
    /// Advances the learner past the level of a completed conversation task.
    ///
    /// Runs in one transaction: find (or self-heal) the open row for the
    /// topic, recompute the earned score as the sum of task scores across the
    /// level's source rows, close the row, and open `level + 1` at zero.
    /// Recomputing from source rows means later corrections to any task score
    /// stay reflected in the total.
    ///
    /// Note: nothing guards two concurrent completions for the same topic;
    /// they can race and open duplicate next-level rows. The invariant relies
    /// on read-then-write ordering within this transaction only.
    pub async fn advance_level(&self, task: &Task) -> Result<(), StoreError> {
        let mut tx = self.pool().begin().await?;

        let query = format!(
            "SELECT {LEVEL_COLUMNS} FROM userinlevel
             WHERE user_id = $1 AND topic_name = $2 AND completed_at IS NULL"
        );
        let open = sqlx::query_as::<_, UserInLevel>(&query)
            .bind(&task.user_id)
            .bind(&task.topic_name)
            .fetch_optional(&mut *tx)
            .await?;

        let open = match open {
            Some(row) => row,
            None => {
                // Missing bookkeeping; recreate the row at the task's level.
                let query = format!(
                    "INSERT INTO userinlevel (user_id, topic_name, level)
                     VALUES ($1, $2, $3)
                     ON CONFLICT (user_id, topic_name, level)
                         DO UPDATE SET completed_at = NULL
                     RETURNING {LEVEL_COLUMNS}"
                );
                sqlx::query_as::<_, UserInLevel>(&query)
                    .bind(&task.user_id)
                    .bind(&task.topic_name)
                    .bind(task.level)
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(task_score), 0) FROM tasks
             WHERE user_id = $1 AND topic_name = $2 AND level = $3",
        )
        .bind(&task.user_id)
        .bind(&task.topic_name)
        .bind(open.level)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE userinlevel SET completed_at = now(), earned_score = $4
             WHERE user_id = $1 AND topic_name = $2 AND level = $3",
        )
        .bind(&task.user_id)
        .bind(&task.topic_name)
        .bind(open.level)
        .bind(total as i32)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO userinlevel (user_id, topic_name, level)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, topic_name, level)
                 DO UPDATE SET completed_at = NULL, earned_score = 0",
        )
        .bind(&task.user_id)
        .bind(&task.topic_name)
        .bind(open.level + 1)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(user_id = %task.user_id, topic = %task.topic_name,
            closed_level = open.level, earned_score = total,
            "Closed level and opened the next");
        Ok(())
    }

    /// Upserts a progress row directly (the external level-update interface).
    ///
    /// When the row is marked completed, the next level row is ensured so the
    /// learner always has an open position in the topic.
    pub async fn upsert_level(
        &self,
        user_id: &str,
        topic_name: &str,
        current_level: i32,
        earned_score: i32,
        is_completed: bool,
    ) -> Result<UserInLevel, StoreError> {
        let mut tx = self.pool().begin().await?;

        let query = format!(
            "INSERT INTO userinlevel (user_id, topic_name, level, earned_score, completed_at)
             VALUES ($1, $2, $3, $4, CASE WHEN $5 THEN now() END)
             ON CONFLICT (user_id, topic_name, level)
                 DO UPDATE SET earned_score = EXCLUDED.earned_score,
                               completed_at = EXCLUDED.completed_at
             RETURNING {LEVEL_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserInLevel>(&query)
            .bind(user_id)
            .bind(topic_name)
            .bind(current_level)
            .bind(earned_score)
            .bind(is_completed)
            .fetch_one(&mut *tx)
            .await?;

        if is_completed {
            sqlx::query(
                "INSERT INTO userinlevel (user_id, topic_name, level)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (user_id, topic_name, level) DO NOTHING",
            )
            .bind(user_id)
            .bind(topic_name)
            .bind(current_level + 1)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row)
    }

    /// Returns the learner's open progress row for a topic, if any.
    pub async fn current_progress(
        &self,
        user_id: &str,
        topic_name: &str,
    ) -> Result<Option<UserInLevel>, StoreError> {
        let query = format!(
            "SELECT {LEVEL_COLUMNS} FROM userinlevel
             WHERE user_id = $1 AND topic_name = $2 AND completed_at IS NULL
             ORDER BY level DESC
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, UserInLevel>(&query)
            .bind(user_id)
            .bind(topic_name)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }
}
