//! The event loop driving one conversation's turn-taking controller.
//!
//! The controller itself is a synchronous state machine in `lingua-core`;
//! this module owns its suspension points: socket messages from the client,
//! the silence and inactivity timers, and the in-flight analysis call. Every
//! analysis dispatch is bounded by a timeout and falls back to the
//! deterministic local reply, so the loop never stalls on the external
//! collaborator.

use super::{
    outbox::RecorderHandle,
    protocol::{ClientMessage, ServerMessage},
    session::send_msg,
};
use crate::{models::Task, state::AppState};
use anyhow::Result;
use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{
    StreamExt,
    stream::{SplitSink, SplitStream},
};
use lingua_core::analysis::{AnalysisReply, AnalysisRequest, fallback_reply};
use lingua_core::turn::{Effect, TurnController, TurnEvent};
use std::pin::Pin;
use std::sync::Arc;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{Sleep, sleep},
};
use tracing::{info, warn};
use uuid::Uuid;

/// The fixed conversation opener for a topic and level.
fn opening_question(task: &Task) -> String {
    format!(
        "Let's practice talking about {}. To start: what comes to mind first when you think about {}?",
        task.topic_name, task.topic_name
    )
}

pub(crate) async fn run_conversation(
    state: Arc<AppState>,
    socket_tx: Arc<Mutex<SplitSink<WebSocket, Message>>>,
    mut socket_rx: SplitStream<WebSocket>,
    session_id: Uuid,
    task: Task,
) -> Result<()> {
    let mut controller = TurnController::new(state.config.completion_offer_after);
    let (recorder, recorder_worker) = RecorderHandle::spawn(
        state.db.clone(),
        session_id,
        state.config.recorder_timeout,
    );

    let mut silence: Option<Pin<Box<Sleep>>> = None;
    let mut inactivity: Option<Pin<Box<Sleep>>> = None;
    let mut analysis: Option<JoinHandle<AnalysisReply>> = None;
    let mut previous_messages: Vec<String> = Vec::new();

    let effects = controller.handle(TurnEvent::Start {
        opening_question: opening_question(&task),
    });
    apply_effects(
        effects,
        &state,
        &socket_tx,
        &task,
        &recorder,
        &mut silence,
        &mut inactivity,
        &mut analysis,
        &mut previous_messages,
    )
    .await?;

    loop {
        tokio::select! {
            maybe_msg = socket_rx.next() => {
                let Some(Ok(ws_msg)) = maybe_msg else {
                    info!("Client disconnected; stopping conversation.");
                    controller.handle(TurnEvent::Stop);
                    break;
                };
                let event = match ws_msg {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => msg,
                            Err(e) => {
                                warn!(error = ?e, "Ignoring malformed client message");
                                continue;
                            }
                        }
                    }
                    Message::Close(_) => {
                        info!("Client sent close frame.");
                        controller.handle(TurnEvent::Stop);
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => continue,
                    Message::Binary(_) => {
                        warn!("Ignoring unexpected binary message.");
                        continue;
                    }
                };
                match event {
                    ClientMessage::Init { .. } => {
                        warn!("Ignoring duplicate init message.");
                    }
                    ClientMessage::SpeechStarted => {
                        let effects = controller.handle(TurnEvent::SpeechStarted);
                        apply_effects(effects, &state, &socket_tx, &task, &recorder,
                            &mut silence, &mut inactivity, &mut analysis,
                            &mut previous_messages).await?;
                    }
                    ClientMessage::Transcript { text, is_final } => {
                        if !is_final {
                            // Partial transcript: the learner is active, so
                            // the watchdog starts over.
                            if inactivity.is_some() {
                                inactivity =
                                    Some(Box::pin(sleep(state.config.inactivity_timeout)));
                            }
                            continue;
                        }
                        let effects = controller.handle(TurnEvent::TranscriptFinal(text));
                        apply_effects(effects, &state, &socket_tx, &task, &recorder,
                            &mut silence, &mut inactivity, &mut analysis,
                            &mut previous_messages).await?;
                    }
                    ClientMessage::SynthesisFinished => {
                        let effects = controller.handle(TurnEvent::SynthesisFinished);
                        apply_effects(effects, &state, &socket_tx, &task, &recorder,
                            &mut silence, &mut inactivity, &mut analysis,
                            &mut previous_messages).await?;
                    }
                    ClientMessage::Complete => {
                        let effects = controller.handle(TurnEvent::Stop);
                        apply_effects(effects, &state, &socket_tx, &task, &recorder,
                            &mut silence, &mut inactivity, &mut analysis,
                            &mut previous_messages).await?;
                        finish_task(&state, &socket_tx, &task, &controller).await;
                        break;
                    }
                    ClientMessage::Stop => {
                        let effects = controller.handle(TurnEvent::Stop);
                        apply_effects(effects, &state, &socket_tx, &task, &recorder,
                            &mut silence, &mut inactivity, &mut analysis,
                            &mut previous_messages).await?;
                        info!("Conversation stopped by client.");
                        break;
                    }
                }
            },
            _ = async { silence.as_mut().unwrap().await }, if silence.is_some() => {
                silence = None;
                let effects = controller.handle(TurnEvent::SilenceTimeout);
                apply_effects(effects, &state, &socket_tx, &task, &recorder,
                    &mut silence, &mut inactivity, &mut analysis,
                    &mut previous_messages).await?;
            },
            _ = async { inactivity.as_mut().unwrap().await }, if inactivity.is_some() => {
                inactivity = None;
                let effects = controller.handle(TurnEvent::InactivityTimeout);
                apply_effects(effects, &state, &socket_tx, &task, &recorder,
                    &mut silence, &mut inactivity, &mut analysis,
                    &mut previous_messages).await?;
            },
            joined = async { analysis.as_mut().unwrap().await }, if analysis.is_some() => {
                analysis = None;
                let reply = joined.unwrap_or_else(|e| {
                    warn!(error = ?e, "Analysis task panicked; using fallback");
                    fallback_reply(&task.topic_name, task.level)
                });
                let effects = controller.handle(TurnEvent::AnalysisReady(reply));
                apply_effects(effects, &state, &socket_tx, &task, &recorder,
                    &mut silence, &mut inactivity, &mut analysis,
                    &mut previous_messages).await?;
            },
        }
    }

    if let Some(handle) = analysis.take() {
        handle.abort();
    }
    // Dropping the handle closes the outbox; awaiting the worker drains what
    // was already queued.
    drop(recorder);
    let _ = recorder_worker.await;
    info!("Turn loop terminated.");
    Ok(())
}

/// Executes the controller's effects against the socket, timers, analysis
/// service, and recorder outbox.
#[allow(clippy::too_many_arguments)]
async fn apply_effects(
    effects: Vec<Effect>,
    state: &Arc<AppState>,
    socket_tx: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
    task: &Task,
    recorder: &RecorderHandle,
    silence: &mut Option<Pin<Box<Sleep>>>,
    inactivity: &mut Option<Pin<Box<Sleep>>>,
    analysis: &mut Option<JoinHandle<AnalysisReply>>,
    previous_messages: &mut Vec<String>,
) -> Result<()> {
    for effect in effects {
        match effect {
            Effect::Speak(utterances) => {
                previous_messages.push(format!("tutor: {}", utterances.join(" ")));
                send_msg(
                    &mut *socket_tx.lock().await,
                    ServerMessage::Speak { utterances },
                )
                .await?;
            }
            Effect::OpenMic => {
                send_msg(
                    &mut *socket_tx.lock().await,
                    ServerMessage::Listen { active: true },
                )
                .await?;
            }
            Effect::CloseMic => {
                send_msg(
                    &mut *socket_tx.lock().await,
                    ServerMessage::Listen { active: false },
                )
                .await?;
            }
            Effect::ArmSilenceTimer => {
                *silence = Some(Box::pin(sleep(state.config.silence_timeout)));
            }
            Effect::ArmInactivityTimer => {
                *inactivity = Some(Box::pin(sleep(state.config.inactivity_timeout)));
            }
            Effect::ClearTimers => {
                *silence = None;
                *inactivity = None;
            }
            Effect::CancelSpeech => {
                send_msg(&mut *socket_tx.lock().await, ServerMessage::CancelSpeech).await?;
            }
            Effect::Analyze { transcript } => {
                previous_messages.push(format!("learner: {transcript}"));
                let request = AnalysisRequest {
                    text: transcript,
                    topic_name: task.topic_name.clone(),
                    level: task.level,
                    previous_messages: previous_messages.clone(),
                };
                let service = state.analysis.clone();
                let call_timeout = state.config.analysis_timeout;
                let topic_name = task.topic_name.clone();
                let level = task.level;
                *analysis = Some(tokio::spawn(async move {
                    match tokio::time::timeout(call_timeout, service.analyze(&request)).await {
                        Ok(Ok(reply)) => reply,
                        Ok(Err(e)) => {
                            warn!(error = ?e, "Analysis call failed; using fallback reply");
                            fallback_reply(&topic_name, level)
                        }
                        Err(_) => {
                            warn!("Analysis call timed out; using fallback reply");
                            fallback_reply(&topic_name, level)
                        }
                    }
                }));
            }
            Effect::RecordExchange {
                question,
                answer,
                feedback,
            } => {
                recorder.record(question, answer, feedback);
            }
            Effect::OfferCompletion => {
                send_msg(&mut *socket_tx.lock().await, ServerMessage::OfferCompletion).await?;
            }
        }
    }
    Ok(())
}

/// Completes the conversation task with the session's mean score and elapsed
/// duration, reporting the progression outcome (including partial success)
/// over the socket.
async fn finish_task(
    state: &Arc<AppState>,
    socket_tx: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
    task: &Task,
    controller: &TurnController,
) {
    let score = controller.mean_score();
    let duration = (Utc::now() - task.start_date)
        .num_seconds()
        .clamp(0, i64::from(i32::MAX)) as i32;

    let response = match state.db.complete_task(task.id, score, duration).await {
        Ok(outcome) => ServerMessage::Completed {
            task_score: score,
            level_advanced: outcome.level_advanced,
        },
        Err(e) => {
            warn!(task_id = %task.id, error = ?e, "Failed to complete conversation task");
            ServerMessage::Error {
                message: "Failed to complete the task.".to_string(),
            }
        }
    };
    if let Err(e) = send_msg(&mut *socket_tx.lock().await, response).await {
        warn!(error = ?e, "Failed to send completion result to client");
    }
}
