//! API and Database Models
//!
//! Data structures shared between the database mapping layer (`sqlx`) and the
//! OpenAPI surface (`utoipa`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// The four rungs of the per-topic skill ladder, in order.
#[derive(sqlx::Type, Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "task_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Flashcard,
    Quiz,
    Post,
    Conversation,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Flashcard => write!(f, "flashcard"),
            TaskType::Quiz => write!(f, "quiz"),
            TaskType::Post => write!(f, "post"),
            TaskType::Conversation => write!(f, "conversation"),
        }
    }
}

/// One attempt at a learning-phase activity. Created at phase start, mutated
/// once at completion, never deleted.
#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct Task {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub user_id: String,
    pub topic_name: String,
    pub level: i32,
    #[schema(value_type = String, example = "conversation")]
    pub task_type: TaskType,
    pub start_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
    pub task_score: i32,
    pub duration_seconds: Option<i32>,
}

/// A learner's progress record at one (topic, level) pair. The row with
/// `completed_at = NULL` marks the current position in the topic.
#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct UserInLevel {
    pub user_id: String,
    pub topic_name: String,
    pub level: i32,
    pub earned_score: i32,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One live conversation session, spanning one conversation task.
#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct ConversationSession {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(value_type = String, format = Uuid)]
    pub task_id: Uuid,
    pub session_type: String,
    pub created_at: DateTime<Utc>,
}

/// One question/answer exchange within a conversation session. Created when
/// the system asks, updated once when the learner answers.
#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct Question {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
    pub question_text: String,
    pub answer_text: Option<String>,
    #[schema(value_type = Object)]
    pub feedback: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    /// Topic key, either the display name or a hyphenated slug.
    #[schema(example = "history-and-heritage")]
    pub topic: String,
    pub level: i32,
    #[schema(value_type = String, example = "quiz")]
    pub task_type: TaskType,
}

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTaskPayload {
    pub score: i32,
    pub duration_seconds: i32,
}

/// Outcome of a task completion. `level_advanced` is false both for
/// non-conversation tasks and for the explicit partial-success case where the
/// completion persisted but level progression failed.
#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTaskResponse {
    pub completed: bool,
    pub level_advanced: bool,
}

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AddWordsPayload {
    pub word_ids: Vec<i64>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AddWordsResponse {
    pub added: u64,
    pub failed_ids: Vec<i64>,
}

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLevelPayload {
    #[schema(example = "History And Heritage")]
    pub topic_name: String,
    pub current_level: i32,
    pub earned_score: i32,
    pub is_completed: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TaskType::Conversation).unwrap(),
            "\"conversation\""
        );
        assert_eq!(serde_json::to_string(&TaskType::Quiz).unwrap(), "\"quiz\"");
    }

    #[test]
    fn task_type_deserializes_lowercase() {
        let parsed: TaskType = serde_json::from_str("\"flashcard\"").unwrap();
        assert_eq!(parsed, TaskType::Flashcard);
    }

    #[test]
    fn task_type_rejects_unknown_variant() {
        let result: Result<TaskType, _> = serde_json::from_str("\"essay\"");
        assert!(result.is_err());
    }

    #[test]
    fn task_type_display() {
        assert_eq!(format!("{}", TaskType::Post), "post");
        assert_eq!(format!("{}", TaskType::Conversation), "conversation");
    }

    #[test]
    fn task_round_trips_through_json() {
        let task = Task {
            id: Uuid::new_v4(),
            user_id: "learner-7".to_string(),
            topic_name: "History And Heritage".to_string(),
            level: 2,
            task_type: TaskType::Conversation,
            start_date: Utc::now(),
            completion_date: None,
            task_score: 0,
            duration_seconds: None,
        };

        let json = serde_json::to_string(&task).unwrap();
        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, task.id);
        assert_eq!(parsed.topic_name, task.topic_name);
        assert_eq!(parsed.task_type, task.task_type);
        assert!(parsed.completion_date.is_none());
    }

    #[test]
    fn create_task_payload_uses_camel_case() {
        let payload: CreateTaskPayload = serde_json::from_str(
            r#"{"topic": "history-and-heritage", "level": 2, "taskType": "quiz"}"#,
        )
        .unwrap();
        assert_eq!(payload.topic, "history-and-heritage");
        assert_eq!(payload.level, 2);
        assert_eq!(payload.task_type, TaskType::Quiz);
    }

    #[test]
    fn create_task_payload_missing_field_fails() {
        let result: Result<CreateTaskPayload, _> =
            serde_json::from_str(r#"{"topic": "travel"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn complete_task_payload_deserializes() {
        let payload: CompleteTaskPayload =
            serde_json::from_str(r#"{"score": 85, "durationSeconds": 312}"#).unwrap();
        assert_eq!(payload.score, 85);
        assert_eq!(payload.duration_seconds, 312);
    }

    #[test]
    fn complete_task_response_carries_partial_flag() {
        let json = serde_json::to_string(&CompleteTaskResponse {
            completed: true,
            level_advanced: false,
        })
        .unwrap();
        assert_eq!(json, r#"{"completed":true,"levelAdvanced":false}"#);
    }

    #[test]
    fn update_level_payload_deserializes() {
        let payload: UpdateLevelPayload = serde_json::from_str(
            r#"{"topicName": "Travel", "currentLevel": 3, "earnedScore": 245, "isCompleted": true}"#,
        )
        .unwrap();
        assert_eq!(payload.topic_name, "Travel");
        assert_eq!(payload.current_level, 3);
        assert_eq!(payload.earned_score, 245);
        assert!(payload.is_completed);
    }

    #[test]
    fn user_in_level_open_row_has_null_completed_at() {
        let row = UserInLevel {
            user_id: "learner-7".to_string(),
            topic_name: "Travel".to_string(),
            level: 1,
            earned_score: 0,
            completed_at: None,
        };
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("\"completed_at\":null"));
    }
}
