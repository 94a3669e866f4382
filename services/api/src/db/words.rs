//! Word assignment: linking vocabulary items to a task.

use tracing::warn;
use uuid::Uuid;

use super::{Db, StoreError};

/// Result of a word-linkage request. `failed_ids` lists ids that could not be
/// inserted even individually; existing links are neither failures nor
/// additions.
#[derive(Debug, Clone, Default)]
pub struct WordLinkOutcome {
    pub added: u64,
    pub failed_ids: Vec<i64>,
}

impl Db {
    /// Links vocabulary items to a task, idempotently.
    ///
    /// One duplicate-safe batch insert is attempted first. If the batch fails
    /// as a whole, each id is retried individually so one bad id never sinks
    /// the rest.
    pub async fn add_words(
        &self,
        task_id: Uuid,
        word_ids: &[i64],
    ) -> Result<WordLinkOutcome, StoreError> {
        if word_ids.is_empty() {
            return Ok(WordLinkOutcome::default());
        }

        let task_exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(self.pool())
            .await?;
        if task_exists.is_none() {
            return Err(StoreError::NotFound(format!("task '{task_id}'")));
        }

        let batch = sqlx::query(
            "INSERT INTO wordintask (task_id, word_id)
             SELECT $1, w FROM UNNEST($2::bigint[]) AS w
             ON CONFLICT (task_id, word_id) DO NOTHING",
        )
        .bind(task_id)
        .bind(word_ids)
        .execute(self.pool())
        .await;

        match batch {
            Ok(result) => Ok(WordLinkOutcome {
                added: result.rows_affected(),
                failed_ids: vec![],
            }),
            Err(e) => {
                warn!(task_id = %task_id, error = ?e,
                    "Batch word insert failed; retrying per id");
                let mut outcome = WordLinkOutcome::default();
                for &word_id in word_ids {
                    let inserted = sqlx::query(
                        "INSERT INTO wordintask (task_id, word_id)
                         VALUES ($1, $2)
                         ON CONFLICT (task_id, word_id) DO NOTHING",
                    )
                    .bind(task_id)
                    .bind(word_id)
                    .execute(self.pool())
                    .await;
                    match inserted {
                        Ok(result) => outcome.added += result.rows_affected(),
                        Err(e) => {
                            warn!(task_id = %task_id, word_id, error = ?e,
                                "Failed to link word");
                            outcome.failed_ids.push(word_id);
                        }
                    }
                }
                Ok(outcome)
            }
        }
    }
}
