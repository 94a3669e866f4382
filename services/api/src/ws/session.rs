//! Manages the WebSocket connection lifecycle for a conversation session.

use super::{
    protocol::{ClientMessage, ServerMessage},
    turn_loop::run_conversation,
};
use crate::{models::TaskType, state::AppState};
use anyhow::{Result, anyhow};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Performs the init handshake (the first message must be `init` naming an
/// open conversation task), registers the session row best-effort, and spawns
/// the turn-taking loop.
#[instrument(name = "ws_conversation", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let temp_id: u32 = rand::random();
    tracing::Span::current().record("session_id", temp_id.to_string());
    info!("New WebSocket connection. Awaiting initialization...");

    let (socket_tx, mut socket_rx) = socket.split();
    let socket_tx_arc = Arc::new(Mutex::new(socket_tx));

    let init = if let Some(Ok(ws_msg)) = socket_rx.next().await {
        match ws_msg {
            Message::Text(text) => initialize_session(&text, &state).await,
            _ => Err(anyhow!("First message was not a text `init` message.")),
        }
    } else {
        info!("Client disconnected before sending init message.");
        return;
    };

    let (session_id, task) = match init {
        Ok(parts) => parts,
        Err(e) => {
            error!("Session initialization failed: {:?}", e);
            let mut sink = socket_tx_arc.lock().await;
            let _ = send_msg(
                &mut sink,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    if send_msg(
        &mut *socket_tx_arc.lock().await,
        ServerMessage::Initialized {
            session_id,
            topic_name: task.topic_name.clone(),
            level: task.level,
        },
    )
    .await
    .is_err()
    {
        error!("Failed to send Initialized message to client.");
        return;
    }

    let session_span = tracing::info_span!("turn_loop", %session_id, topic = %task.topic_name);
    tokio::spawn(
        async move {
            if let Err(e) =
                run_conversation(state, socket_tx_arc, socket_rx, session_id, task).await
            {
                error!(error = ?e, "Conversation session terminated with error.");
            }
            info!("Conversation session finished.");
        }
        .instrument(session_span),
    );
}

/// Parses the `init` message, validates the target task, and registers the
/// session row.
async fn initialize_session(
    init_text: &str,
    state: &Arc<AppState>,
) -> Result<(Uuid, crate::models::Task)> {
    let init_msg: ClientMessage = serde_json::from_str(init_text)?;
    let task_id = if let ClientMessage::Init { task_id } = init_msg {
        task_id
    } else {
        return Err(anyhow!("First message must be `init`"));
    };

    let task = state
        .db
        .get_task(task_id)
        .await?
        .ok_or_else(|| anyhow!("Task '{task_id}' not found"))?;
    if task.task_type != TaskType::Conversation {
        return Err(anyhow!("Task '{task_id}' is not a conversation task"));
    }
    if task.completion_date.is_some() {
        return Err(anyhow!("Task '{task_id}' is already completed"));
    }

    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", session_id.to_string());
    info!(topic = %task.topic_name, level = task.level, "Starting conversation session");

    // Session bookkeeping is best-effort; the conversation proceeds without it.
    if let Err(e) = state
        .db
        .create_conversation_session(session_id, task.id, "conversation")
        .await
    {
        warn!(error = ?e, "Failed to register conversation session row");
    }

    Ok((session_id, task))
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
