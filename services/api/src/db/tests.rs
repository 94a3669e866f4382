//! Database tests against a live Postgres instance.
//!
//! `#[sqlx::test]` provisions an isolated database per test (from
//! `DATABASE_URL`) and applies the migrations before the body runs.

use sqlx::PgPool;
use uuid::Uuid;

use super::{Db, StoreError};
use crate::models::TaskType;

const USER: &str = "learner-7";
const TOPIC: &str = "History And Heritage";

async fn seed(pool: &PgPool) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO users (id) VALUES ($1)")
        .bind(USER)
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO topics (name) VALUES ($1)")
        .bind(TOPIC)
        .execute(pool)
        .await?;
    Ok(())
}

#[sqlx::test]
async fn create_task_is_idempotent_while_open(pool: PgPool) {
    seed(&pool).await.unwrap();
    let db = Db::new(pool);

    let first = db
        .create_task(USER, "history-and-heritage", 2, TaskType::Quiz)
        .await
        .unwrap();
    let second = db
        .create_task(USER, "history-and-heritage", 2, TaskType::Quiz)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    // Completion frees the key for a fresh attempt.
    db.complete_task(first.id, 80, 120).await.unwrap();
    let third = db
        .create_task(USER, "history-and-heritage", 2, TaskType::Quiz)
        .await
        .unwrap();
    assert_ne!(first.id, third.id);
}

#[sqlx::test]
async fn create_task_rejects_unknown_user_and_topic(pool: PgPool) {
    seed(&pool).await.unwrap();
    let db = Db::new(pool);

    let err = db
        .create_task("nobody", TOPIC, 1, TaskType::Flashcard)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    let err = db
        .create_task(USER, "quantum-mechanics", 1, TaskType::Flashcard)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[sqlx::test]
async fn topic_resolution_tolerates_drift_on_reads(pool: PgPool) {
    seed(&pool).await.unwrap();
    let db = Db::new(pool);

    assert_eq!(
        db.resolve_topic("history-and-heritage").await.unwrap(),
        TOPIC
    );
    assert_eq!(db.resolve_topic("heritage").await.unwrap(), TOPIC);

    sqlx::query("INSERT INTO userinlevel (user_id, topic_name, level) VALUES ($1, $2, 2)")
        .bind(USER)
        .bind(TOPIC)
        .execute(db.pool())
        .await
        .unwrap();

    let topic_name = db.resolve_topic("heritage").await.unwrap();
    let row = db
        .current_progress(USER, &topic_name)
        .await
        .unwrap()
        .expect("open progress row");
    assert_eq!(row.level, 2);
}

#[sqlx::test]
async fn conversation_completion_recomputes_level_score(pool: PgPool) {
    seed(&pool).await.unwrap();
    let db = Db::new(pool);

    sqlx::query("INSERT INTO userinlevel (user_id, topic_name, level) VALUES ($1, $2, 2)")
        .bind(USER)
        .bind(TOPIC)
        .execute(db.pool())
        .await
        .unwrap();

    let flashcard = db
        .create_task(USER, TOPIC, 2, TaskType::Flashcard)
        .await
        .unwrap();
    db.complete_task(flashcard.id, 70, 60).await.unwrap();
    let quiz = db.create_task(USER, TOPIC, 2, TaskType::Quiz).await.unwrap();
    db.complete_task(quiz.id, 90, 60).await.unwrap();

    let conversation = db
        .create_task(USER, TOPIC, 2, TaskType::Conversation)
        .await
        .unwrap();
    let outcome = db.complete_task(conversation.id, 85, 300).await.unwrap();
    assert!(outcome.level_advanced);

    // The closed level holds the sum over its source rows, not an increment.
    let closed_score: i32 = sqlx::query_scalar(
        "SELECT earned_score FROM userinlevel
         WHERE user_id = $1 AND topic_name = $2 AND level = 2",
    )
    .bind(USER)
    .bind(TOPIC)
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(closed_score, 245);

    let open = db
        .current_progress(USER, TOPIC)
        .await
        .unwrap()
        .expect("open progress row");
    assert_eq!(open.level, 3);
    assert_eq!(open.earned_score, 0);

    let open_rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM userinlevel
         WHERE user_id = $1 AND topic_name = $2 AND completed_at IS NULL",
    )
    .bind(USER)
    .bind(TOPIC)
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(open_rows, 1);
}

#[sqlx::test]
async fn progression_failure_leaves_completion_standing(pool: PgPool) {
    seed(&pool).await.unwrap();
    let db = Db::new(pool);

    let task = db
        .create_task(USER, TOPIC, 1, TaskType::Conversation)
        .await
        .unwrap();

    // Simulate a storage outage confined to the progression step.
    sqlx::raw_sql(
        "CREATE FUNCTION progression_outage() RETURNS trigger AS $$
         BEGIN RAISE EXCEPTION 'storage unavailable'; END;
         $$ LANGUAGE plpgsql;
         CREATE TRIGGER userinlevel_outage
             BEFORE INSERT OR UPDATE ON userinlevel
             FOR EACH ROW EXECUTE FUNCTION progression_outage();",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let outcome = db.complete_task(task.id, 85, 300).await.unwrap();
    assert!(!outcome.level_advanced);
    assert_eq!(outcome.task.task_score, 85);
    assert!(outcome.task.completion_date.is_some());

    // The completion itself persisted despite the failed progression.
    let persisted = db.get_task(task.id).await.unwrap().unwrap();
    assert!(persisted.completion_date.is_some());
    assert_eq!(persisted.task_score, 85);
}

#[sqlx::test]
async fn word_linkage_is_idempotent(pool: PgPool) {
    seed(&pool).await.unwrap();
    let db = Db::new(pool);

    let task = db
        .create_task(USER, TOPIC, 1, TaskType::Flashcard)
        .await
        .unwrap();

    let first = db.add_words(task.id, &[1, 2]).await.unwrap();
    assert_eq!(first.added, 2);
    assert!(first.failed_ids.is_empty());

    let second = db.add_words(task.id, &[1, 3]).await.unwrap();
    assert_eq!(second.added, 1);
    assert!(second.failed_ids.is_empty());

    let linked: Vec<i64> =
        sqlx::query_scalar("SELECT word_id FROM wordintask WHERE task_id = $1 ORDER BY word_id")
            .bind(task.id)
            .fetch_all(db.pool())
            .await
            .unwrap();
    assert_eq!(linked, vec![1, 2, 3]);
}

#[sqlx::test]
async fn add_words_to_missing_task_is_not_found(pool: PgPool) {
    let db = Db::new(pool);
    let err = db.add_words(Uuid::new_v4(), &[1]).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}
