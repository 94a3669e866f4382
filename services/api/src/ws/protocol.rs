//! Defines the WebSocket message protocol between the practice client and the API server.
//!
//! Speech synthesis and recognition run on the client; the server drives
//! turn-taking. The client reports recognizer and synthesizer events, and the
//! server answers with speak/listen instructions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts a conversation for an open conversation task. This must be the
    /// first message.
    Init { task_id: Uuid },
    /// The recognizer reported speech start.
    SpeechStarted,
    /// A transcription update; only final transcripts advance the turn.
    Transcript { text: String, is_final: bool },
    /// The synthesizer finished the current utterance batch.
    SynthesisFinished,
    /// The learner took the offered exit point; completes the task.
    Complete,
    /// Explicit stop; cancels speech, recognition, and timers.
    Stop,
}

/// Messages sent from the server to the client.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms session start.
    Initialized {
        session_id: Uuid,
        topic_name: String,
        level: i32,
    },
    /// Synthesize these sentence chunks, in order, then report
    /// `synthesis_finished`.
    Speak { utterances: Vec<String> },
    /// Open (`true`) or close (`false`) the microphone.
    Listen { active: bool },
    /// Abort any in-flight synthesis immediately.
    CancelSpeech,
    /// The learner may end the conversation now; continuing is also fine.
    OfferCompletion,
    /// The conversation task was completed.
    Completed {
        task_score: i32,
        level_advanced: bool,
    },
    /// Reports a fatal error to the client.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_message_deserializes() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"type": "init", "task_id": "{id}"}}"#);
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        match msg {
            ClientMessage::Init { task_id } => assert_eq!(task_id, id),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn transcript_message_deserializes() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type": "transcript", "text": "I went hiking", "is_final": true}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Transcript { text, is_final } => {
                assert_eq!(text, "I went hiking");
                assert!(is_final);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type": "telepathy"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn speak_message_serializes_snake_case() {
        let json = serde_json::to_string(&ServerMessage::Speak {
            utterances: vec!["Hello!".to_string()],
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"speak","utterances":["Hello!"]}"#);
    }

    #[test]
    fn listen_message_serializes() {
        let json = serde_json::to_string(&ServerMessage::Listen { active: true }).unwrap();
        assert_eq!(json, r#"{"type":"listen","active":true}"#);
    }

    #[test]
    fn completed_message_serializes() {
        let json = serde_json::to_string(&ServerMessage::Completed {
            task_score: 78,
            level_advanced: true,
        })
        .unwrap();
        assert!(json.contains("\"task_score\":78"));
        assert!(json.contains("\"level_advanced\":true"));
    }
}
