//! WebSocket handler: one whiteboard controller per connection.
//!
//! DESIGN
//! ======
//! On upgrade the handler resolves the ownership key, builds a `Whiteboard`
//! whose surface is this very socket, loads the stored boards, and enters a
//! `select!` loop over:
//! - inbound client frames -> dispatch by syscall prefix
//! - outbound surface frames (`surface:restore`, `surface:clear`)
//! - persistence notices -> `notice:error`
//!
//! Handlers return an `Outcome`; the dispatch layer turns it into the reply
//! and, for anything that changed the controller, a fresh `board:state`.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade -> `session:connected` with `owner_key`
//! 2. Initial load -> `surface:restore` for the first board + `board:state`
//! 3. Client frames -> dispatch -> reply (+ state)
//! 4. Close -> wait for queued writes to land, then drop the controller

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::frame::{Data, FRAME_CODE, FRAME_MESSAGE, FRAME_RETRYABLE, Frame};
use crate::owner::OwnerKey;
use crate::services::persistence::{NOTICE_CAPACITY, Notice, spawn_writer};
use crate::snapshot::Snapshot;
use crate::state::AppState;
use crate::surface::RemoteSurface;
use crate::whiteboard::Whiteboard;
use crate::whiteboard::tools::Tool;

const OUTBOUND_CAPACITY: usize = 256;

enum Outcome {
    /// Reply done and push a fresh `board:state`.
    Changed,
    /// Reply done; nothing changed (no-op or dropped while restoring).
    Unchanged,
    /// Reply done with data.
    Reply(Data),
}

impl Outcome {
    fn from_changed(changed: bool) -> Self {
        if changed { Self::Changed } else { Self::Unchanged }
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let owner = match params.get("room") {
        Some(raw) => match OwnerKey::parse(raw) {
            Ok(owner) => owner,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        },
        None => OwnerKey::anonymous(),
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, owner))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, owner: OwnerKey) {
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(OUTBOUND_CAPACITY);
    let (notice_tx, mut notice_rx) = mpsc::channel::<Notice>(NOTICE_CAPACITY);
    let (queue, _writer) = spawn_writer(state.gateway.clone(), owner.clone(), state.config.persist, notice_tx);

    let mut board = Whiteboard::new(
        owner.clone(),
        Box::new(RemoteSurface::new(client_tx)),
        queue,
        state.config.history_limit,
    );

    let welcome = Frame::request("session:connected", Data::new()).with_data("owner_key", owner.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }
    info!(%owner, anonymous = owner.is_anonymous(), "ws: client connected");

    board.load(state.gateway.as_ref()).await;
    if send_frame(&mut socket, &state_frame(&board)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let mut delivered = true;
                        for frame in process_inbound_text(&mut board, &text) {
                            if send_frame(&mut socket, &frame).await.is_err() {
                                delivered = false;
                                break;
                            }
                        }
                        if !delivered {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
            Some(notice) = notice_rx.recv() => {
                if send_frame(&mut socket, &notice_frame(&notice)).await.is_err() {
                    break;
                }
            }
        }
    }

    board.flush().await;
    info!(%owner, boards = board.boards().len(), "ws: client disconnected; writes flushed");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
fn process_inbound_text(board: &mut Whiteboard, text: &str) -> Vec<Frame> {
    let req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(owner = %board.owner(), error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data(FRAME_MESSAGE, format!("invalid json: {e}"));
            return vec![err];
        }
    };

    let result = match req.prefix() {
        "surface" => handle_surface(board, &req),
        "history" => handle_history(board, &req),
        "board" => handle_board(board, &req),
        "tool" => handle_tool(board, &req),
        prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    match result {
        Ok(Outcome::Changed) => vec![req.done(), state_frame(board)],
        Ok(Outcome::Unchanged) => vec![req.done()],
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Err(err_frame) => vec![err_frame],
    }
}

fn handle_surface(board: &mut Whiteboard, req: &Frame) -> Result<Outcome, Frame> {
    match req.syscall.as_str() {
        "surface:changed" => {
            let Some(doc) = req.data.get("snapshot") else {
                return Err(req.error("snapshot required"));
            };
            Ok(Outcome::from_changed(board.on_surface_changed(Snapshot::from_stored(doc.clone()))))
        }
        "surface:restored" => {
            let Some(ticket) = req.data_u64("ticket") else {
                return Err(req.error("ticket required"));
            };
            Ok(Outcome::from_changed(board.restore_complete(ticket)))
        }
        _ => Err(req.error(format!("unknown surface op: {}", req.syscall))),
    }
}

fn handle_history(board: &mut Whiteboard, req: &Frame) -> Result<Outcome, Frame> {
    let target = board_index(req)?.unwrap_or(board.active());
    match req.syscall.as_str() {
        "history:undo" => Ok(Outcome::from_changed(board.undo(target))),
        "history:redo" => Ok(Outcome::from_changed(board.redo(target))),
        "history:state" => Ok(Outcome::Reply(state_data(board))),
        _ => Err(req.error(format!("unknown history op: {}", req.syscall))),
    }
}

fn handle_board(board: &mut Whiteboard, req: &Frame) -> Result<Outcome, Frame> {
    match req.syscall.as_str() {
        "board:add" => Ok(Outcome::from_changed(board.add_board().is_some())),
        "board:switch" => {
            let target = required_index(req)?;
            Ok(Outcome::from_changed(board.switch_board(target)))
        }
        "board:delete" => {
            let target = required_index(req)?;
            match board.delete_board(target) {
                Ok(changed) => Ok(Outcome::from_changed(changed)),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "board:clear" => Ok(Outcome::from_changed(board.clear_active_board())),
        _ => Err(req.error(format!("unknown board op: {}", req.syscall))),
    }
}

fn handle_tool(board: &mut Whiteboard, req: &Frame) -> Result<Outcome, Frame> {
    match req.syscall.as_str() {
        "tool:color" => {
            let Some(color) = req.data_str("color") else {
                return Err(req.error("color required"));
            };
            board.select_color(color).map_err(|e| req.error_from(&e))?;
        }
        "tool:size" => {
            let Some(size) = req.data_u64("size") else {
                return Err(req.error("size required"));
            };
            board.select_size(u32::try_from(size).unwrap_or(u32::MAX));
        }
        "tool:select" => {
            let Some(name) = req.data_str("tool") else {
                return Err(req.error("tool required"));
            };
            let tool = name.parse::<Tool>().map_err(|e| req.error_from(&e))?;
            board.select_tool(tool);
        }
        _ => return Err(req.error(format!("unknown tool op: {}", req.syscall))),
    }
    Ok(Outcome::Changed)
}

// =============================================================================
// HELPERS
// =============================================================================

/// Optional `index` field. Present but not a non-negative integer is an error.
fn board_index(req: &Frame) -> Result<Option<usize>, Frame> {
    let Some(raw) = req.data.get("index") else {
        return Ok(None);
    };
    raw.as_u64()
        .and_then(|i| usize::try_from(i).ok())
        .map(Some)
        .ok_or_else(|| req.error("invalid index"))
}

fn required_index(req: &Frame) -> Result<usize, Frame> {
    board_index(req)?.ok_or_else(|| req.error("index required"))
}

fn state_data(board: &Whiteboard) -> Data {
    match serde_json::to_value(board.state()) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => Data::new(),
    }
}

fn state_frame(board: &Whiteboard) -> Frame {
    Frame::request("board:state", state_data(board))
}

fn notice_frame(notice: &Notice) -> Frame {
    Frame::request("notice:error", Data::new())
        .with_data(FRAME_CODE, notice.code)
        .with_data(FRAME_MESSAGE, notice.message.clone())
        .with_data(FRAME_RETRYABLE, notice.retryable)
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
