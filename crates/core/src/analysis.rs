//! Conversation analysis service.
//!
//! Each accepted learner turn is sent to an external language model for
//! evaluation. The model grades the answer, flags vocabulary usage, and
//! proposes the next question. The trait keeps the turn engine decoupled from
//! any particular provider; `fallback_reply` supplies a deterministic local
//! substitute so the turn loop never stalls when the provider is down or
//! rate-limited.

use anyhow::{Context, Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Score assigned to a turn when the external analysis is unavailable.
pub const FALLBACK_SCORE: i32 = 50;

/// One vocabulary item the learner was expected to work into the answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsedWord {
    pub word: String,
    pub used: bool,
    #[serde(default)]
    pub context: Option<String>,
}

/// Request sent to the analysis collaborator for one learner turn.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    pub text: String,
    pub topic_name: String,
    pub level: i32,
    pub previous_messages: Vec<String>,
}

/// Structured evaluation of one learner turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReply {
    /// Spoken acknowledgment of the learner's answer.
    pub text: String,
    /// Opaque structured feedback payload, persisted alongside the answer.
    #[serde(default)]
    pub feedback: Option<serde_json::Value>,
    #[serde(default)]
    pub used_words: Vec<UsedWord>,
    pub next_question: String,
    pub score: i32,
    #[serde(default)]
    pub pronunciation_tips: Vec<String>,
    #[serde(default)]
    pub grammar_tips: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Contract the turn engine requires from the response-generation service.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReply>;
}

/// Deterministic local reply substituted when the external call fails.
pub fn fallback_reply(topic_name: &str, level: i32) -> AnalysisReply {
    AnalysisReply {
        text: "Thanks for sharing that. Let's keep practicing.".to_string(),
        feedback: None,
        used_words: vec![],
        next_question: format!(
            "Can you tell me something else about {topic_name}? We're at level {level}, so take your time."
        ),
        score: FALLBACK_SCORE,
        pronunciation_tips: vec![],
        grammar_tips: vec![],
        suggestions: vec![],
    }
}

/// An `AnalysisService` backed by any OpenAI-compatible chat API.
pub struct OpenAiAnalysisService {
    client: Client<OpenAIConfig>,
    model: String,
}

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a language tutor evaluating one spoken answer in a \
practice conversation. Reply with a single JSON object with keys: text (a short spoken \
acknowledgment), feedback (object), used_words (array of {word, used, context}), next_question \
(the follow-up question), score (integer 0-100), pronunciation_tips, grammar_tips and \
suggestions (arrays of strings). Reply with JSON only, no markdown fences.";

impl OpenAiAnalysisService {
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl AnalysisService for OpenAiAnalysisService {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReply> {
        let request_json = serde_json::to_string(request)?;
        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(ANALYSIS_SYSTEM_PROMPT)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(request_json)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(chat_request).await?;
        let content = response
            .choices
            .first()
            .context("No response choice from analysis model")?
            .message
            .content
            .as_ref()
            .context("No content in analysis response")?;

        parse_reply(content)
    }
}

/// Parses the model's reply, tolerating markdown code fences around the JSON.
fn parse_reply(content: &str) -> Result<AnalysisReply> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(body).map_err(|e| anyhow!("Malformed analysis reply: {e}"))
}

/// A canned `AnalysisService` for tests and local development.
pub struct MockAnalysisService {
    pub reply: AnalysisReply,
}

impl MockAnalysisService {
    pub fn with_score(score: i32) -> Self {
        Self {
            reply: AnalysisReply {
                score,
                ..fallback_reply("practice", 1)
            },
        }
    }
}

#[async_trait]
impl AnalysisService for MockAnalysisService {
    async fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisReply> {
        Ok(self.reply.clone())
    }
}
