//! `/render` websocket: snapshots out, held input and actions in

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::app::{AppState, SessionError};
use crate::game::{ActionInput, GameVariant, HeldInput, Snapshot};

/// Messages a renderer may send
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderMsg {
    Input(HeldInput),
    Action(ActionInput),
    Switch { game: GameVariant },
}

pub async fn render_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = state.session.session_id();
    info!(session_id = %session_id, "Renderer connected");

    let (mut ws_sink, ws_stream) = socket.split();
    let mut snapshots = state.session.subscribe();

    // The current snapshot goes out before any change notification
    let current = snapshots.borrow_and_update().clone();
    if let Err(e) = send_snapshot(&mut ws_sink, &current).await {
        error!(session_id = %session_id, error = %e, "Failed to send initial snapshot");
        return;
    }

    let writer = tokio::spawn(stream_snapshots(ws_sink, snapshots));
    read_loop(ws_stream, &state).await;
    writer.abort();

    info!(session_id = %session_id, "Renderer disconnected");
}

/// Forward every newly published snapshot; intermediate ones may be skipped
async fn stream_snapshots(
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut snapshots: watch::Receiver<Arc<Snapshot>>,
) {
    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();
        if let Err(e) = send_snapshot(&mut ws_sink, &snapshot).await {
            debug!(error = %e, "Renderer send failed");
            break;
        }
    }
}

async fn read_loop(mut ws_stream: SplitStream<WebSocket>, state: &AppState) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if state.input_limiter.check().is_err() {
                    warn!("Rate limited renderer message");
                    continue;
                }

                match serde_json::from_str::<RenderMsg>(&text) {
                    Ok(msg) => {
                        if let Err(SessionError::Closed) = dispatch(state, msg).await {
                            debug!("Session closed, dropping renderer");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to parse renderer message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!("Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                debug!("Renderer initiated close");
                break;
            }
            Err(e) => {
                error!(error = %e, "Renderer socket error");
                break;
            }
        }
    }
}

async fn dispatch(state: &AppState, msg: RenderMsg) -> Result<(), SessionError> {
    match msg {
        RenderMsg::Input(held) => state.session.set_input(held).await,
        RenderMsg::Switch { game } => state.session.switch_variant(game).await,
        RenderMsg::Action(input) => match state.session.submit_player_action(input).await {
            Ok(action) => {
                debug!(action_id = %action.id, game = %action.variant(), "Renderer action dispatched");
                Ok(())
            }
            Err(SessionError::Closed) => Err(SessionError::Closed),
            Err(e) => {
                warn!(error = %e, "Renderer action rejected");
                Ok(())
            }
        },
    }
}

async fn send_snapshot(sink: &mut SplitSink<WebSocket, Message>, snapshot: &Snapshot) -> Result<(), String> {
    let json = serde_json::to_string(snapshot).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
