//! Conversation turn-taking controller.
//!
//! A single controller instance drives one live conversation session. It is a
//! synchronous state machine: the hosting runtime feeds it [`TurnEvent`]s
//! (recognizer callbacks, synthesis completion, timer expiry, analysis
//! results) and executes the [`Effect`]s it returns (speak, open or close the
//! microphone, arm timers, dispatch analysis, persist exchanges). Keeping the
//! machine free of async lets every transition be unit tested without a
//! runtime.
//!
//! The five states make illegal combinations unrepresentable: the microphone
//! is only ever open in `UserTurn`/`UserSpeaking`, and the synthesizer only
//! runs in `AiSpeaking`.

use crate::analysis::AnalysisReply;
use crate::echo::is_echo;
use crate::speech::sentence_chunks;
use std::collections::VecDeque;

/// Seconds without a speech-start event before the controller re-prompts.
pub const DEFAULT_SILENCE_TIMEOUT_SECS: u64 = 20;

/// Seconds of mid-turn silence before the watchdog asks if the learner is
/// still there.
pub const DEFAULT_INACTIVITY_TIMEOUT_SECS: u64 = 30;

/// Exchanges after which the completion exit point is offered.
pub const DEFAULT_COMPLETION_OFFER_AFTER: u32 = 3;

/// Spoken once per silent wait cycle, never repeated within one cycle.
pub const NO_SPEECH_PROMPT: &str = "Sorry, I didn't hear anything, let's try that again.";

/// Spoken once by the inactivity watchdog when speech starts but never ends.
pub const STILL_THERE_PROMPT: &str = "Are you still there?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AiSpeaking,
    /// Microphone open, awaiting a speech-start event.
    UserTurn,
    UserSpeaking,
    /// Awaiting the analysis result for an accepted transcript.
    Processing,
}

#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// Begins the session with the opening question.
    Start { opening_question: String },
    /// The synthesizer finished the current utterance.
    SynthesisFinished,
    /// The recognizer reported speech start.
    SpeechStarted,
    /// The recognizer reported a final transcript.
    TranscriptFinal(String),
    /// No speech-start event arrived within the silence window.
    SilenceTimeout,
    /// The learner went silent mid-turn without a speech-end event.
    InactivityTimeout,
    /// The external analysis of the last transcript arrived.
    AnalysisReady(AnalysisReply),
    /// Explicit stop or cancel from the client.
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Synthesize the given sentence chunks, in order.
    Speak(Vec<String>),
    OpenMic,
    CloseMic,
    ArmSilenceTimer,
    ArmInactivityTimer,
    ClearTimers,
    /// Abort any in-flight synthesis immediately.
    CancelSpeech,
    /// Dispatch the accepted transcript for analysis.
    Analyze { transcript: String },
    /// Persist one question/answer exchange, fire-and-forget.
    RecordExchange {
        question: String,
        answer: String,
        feedback: Option<serde_json::Value>,
    },
    /// Surface the optional "complete" exit point to the client.
    OfferCompletion,
}

pub struct TurnController {
    state: TurnState,
    pending: VecDeque<String>,
    last_ai_utterance: String,
    current_question: String,
    last_transcript: String,
    exchanges: u32,
    completion_offer_after: u32,
    timeout_notified: bool,
    watchdog_notified: bool,
    scores: Vec<i32>,
}

impl TurnController {
    pub fn new(completion_offer_after: u32) -> Self {
        Self {
            state: TurnState::Idle,
            pending: VecDeque::new(),
            last_ai_utterance: String::new(),
            current_question: String::new(),
            last_transcript: String::new(),
            exchanges: 0,
            completion_offer_after,
            timeout_notified: false,
            watchdog_notified: false,
            scores: Vec::new(),
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn exchanges(&self) -> u32 {
        self.exchanges
    }

    /// Rounded mean of per-turn analysis scores; 0 before any exchange.
    pub fn mean_score(&self) -> i32 {
        if self.scores.is_empty() {
            return 0;
        }
        let sum: i64 = self.scores.iter().map(|&s| i64::from(s)).sum();
        (sum as f64 / self.scores.len() as f64).round() as i32
    }

    /// Feeds one event into the machine and returns the effects to execute.
    ///
    /// Events that do not apply to the current state are ignored: a stale
    /// timer firing after the learner already spoke must not disturb the turn.
    pub fn handle(&mut self, event: TurnEvent) -> Vec<Effect> {
        match event {
            TurnEvent::Start { opening_question } => self.on_start(opening_question),
            TurnEvent::SynthesisFinished => self.on_synthesis_finished(),
            TurnEvent::SpeechStarted => self.on_speech_started(),
            TurnEvent::TranscriptFinal(text) => self.on_transcript(text),
            TurnEvent::SilenceTimeout => self.on_silence_timeout(),
            TurnEvent::InactivityTimeout => self.on_inactivity_timeout(),
            TurnEvent::AnalysisReady(reply) => self.on_analysis_ready(reply),
            TurnEvent::Stop => self.on_stop(),
        }
    }

    fn on_start(&mut self, opening_question: String) -> Vec<Effect> {
        if self.state != TurnState::Idle {
            return vec![];
        }
        self.current_question = opening_question.clone();
        self.pending.push_back(opening_question);
        self.begin_ai_turn()
    }

    fn on_synthesis_finished(&mut self) -> Vec<Effect> {
        if self.state != TurnState::AiSpeaking {
            return vec![];
        }
        self.begin_ai_turn()
    }

    fn on_speech_started(&mut self) -> Vec<Effect> {
        if self.state != TurnState::UserTurn {
            return vec![];
        }
        self.state = TurnState::UserSpeaking;
        vec![]
    }

    fn on_transcript(&mut self, text: String) -> Vec<Effect> {
        if !matches!(self.state, TurnState::UserTurn | TurnState::UserSpeaking) {
            return vec![];
        }
        if is_echo(&text, &self.last_ai_utterance) {
            // Own speech re-captured by the mic; keep listening. The host's
            // timers may already have fired and been consumed while the echo
            // was in flight, so fresh windows are armed on the way back.
            self.state = TurnState::UserTurn;
            return vec![Effect::ArmSilenceTimer, Effect::ArmInactivityTimer];
        }
        self.last_transcript = text.clone();
        self.state = TurnState::Processing;
        vec![
            Effect::CloseMic,
            Effect::ClearTimers,
            Effect::Analyze { transcript: text },
        ]
    }

    fn on_silence_timeout(&mut self) -> Vec<Effect> {
        if self.state != TurnState::UserTurn || self.timeout_notified {
            return vec![];
        }
        self.timeout_notified = true;
        // Re-queue the unanswered question behind the reminder and restart
        // the speak/listen cycle.
        self.pending.push_front(self.current_question.clone());
        let mut effects = vec![Effect::CloseMic, Effect::ClearTimers];
        effects.extend(self.speak_now(NO_SPEECH_PROMPT.to_string()));
        effects
    }

    fn on_inactivity_timeout(&mut self) -> Vec<Effect> {
        if self.state != TurnState::UserSpeaking || self.watchdog_notified {
            return vec![];
        }
        self.watchdog_notified = true;
        // One prompt only; the mic stays open and the state is unchanged.
        self.last_ai_utterance = STILL_THERE_PROMPT.to_string();
        vec![Effect::Speak(vec![STILL_THERE_PROMPT.to_string()])]
    }

    fn on_analysis_ready(&mut self, reply: AnalysisReply) -> Vec<Effect> {
        if self.state != TurnState::Processing {
            return vec![];
        }
        self.exchanges += 1;
        self.scores.push(reply.score);

        let mut effects = vec![Effect::RecordExchange {
            question: self.current_question.clone(),
            answer: self.last_transcript.clone(),
            feedback: reply.feedback.clone(),
        }];

        self.current_question = reply.next_question.clone();
        self.pending.push_back(reply.text);
        self.pending.push_back(reply.next_question);
        effects.extend(self.begin_ai_turn());

        if self.exchanges >= self.completion_offer_after {
            effects.push(Effect::OfferCompletion);
        }
        effects
    }

    fn on_stop(&mut self) -> Vec<Effect> {
        self.state = TurnState::Idle;
        self.pending.clear();
        vec![Effect::CancelSpeech, Effect::CloseMic, Effect::ClearTimers]
    }

    /// Dequeues the next non-empty utterance and speaks it, or hands the turn
    /// to the learner once the queue is drained.
    fn begin_ai_turn(&mut self) -> Vec<Effect> {
        while let Some(utterance) = self.pending.pop_front() {
            let chunks = sentence_chunks(&utterance);
            if chunks.is_empty() {
                continue;
            }
            self.state = TurnState::AiSpeaking;
            self.last_ai_utterance = chunks.join(" ");
            return vec![Effect::Speak(chunks)];
        }
        self.begin_user_turn()
    }

    fn begin_user_turn(&mut self) -> Vec<Effect> {
        self.state = TurnState::UserTurn;
        self.timeout_notified = false;
        self.watchdog_notified = false;
        vec![
            Effect::OpenMic,
            Effect::ArmSilenceTimer,
            Effect::ArmInactivityTimer,
        ]
    }

    fn speak_now(&mut self, utterance: String) -> Vec<Effect> {
        let chunks = sentence_chunks(&utterance);
        self.state = TurnState::AiSpeaking;
        self.last_ai_utterance = chunks.join(" ");
        vec![Effect::Speak(chunks)]
    }
}
