//! services/api/src/web/ws_handler.rs
//!
//! The dashboard WebSocket. It subscribes to the user's project and profile
//! changes and pushes a fresh snapshot whenever either table changes.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    rest::{ProfileResponse, ProjectResponse},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use humanizer_core::domain::{RowChange, Table};
use humanizer_core::ports::{ChangeFilter, Subscription};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn projects_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    info!("Dashboard WebSocket connected for user: {}", user_id);
    let (mut sender, mut receiver) = socket.split();

    // --- 1. Subscribe before the first snapshot so no change is missed ---
    let (tx, mut rx) = mpsc::unbounded_channel::<Table>();
    let subscriptions: Vec<Subscription> = [Table::Projects, Table::Profiles]
        .into_iter()
        .map(|table| {
            let tx = tx.clone();
            app_state.change_feed.subscribe(
                ChangeFilter { table, user_id },
                Arc::new(move |change: &RowChange| {
                    let _ = tx.send(change.table);
                }),
            )
        })
        .collect();
    drop(tx);

    if !send_message(&mut sender, &ServerMessage::Subscribed).await
        || !send_snapshot(&mut sender, &app_state, user_id, Table::Projects).await
    {
        return;
    }

    // --- 2. Main Loop ---
    loop {
        tokio::select! {
            changed = rx.recv() => {
                let Some(table) = changed else { break };
                let mut delivered = true;
                for table in drain_burst(table, &mut rx) {
                    delivered &= send_snapshot(&mut sender, &app_state, user_id, table).await;
                }
                if !delivered {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(ClientMessage::Refresh) => {
                            if !send_snapshot(&mut sender, &app_state, user_id, Table::Projects).await
                                || !send_snapshot(&mut sender, &app_state, user_id, Table::Profiles).await
                            {
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize client message: {}", e),
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Client sent close message.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
                None => {
                    info!("Client disconnected.");
                    break;
                }
            }
        }
    }

    // --- 3. Cleanup ---
    for subscription in subscriptions {
        subscription.unsubscribe();
    }
    info!("Dashboard WebSocket closed for user: {}", user_id);
}

/// Collapses `first` and whatever else is already queued into one entry per table.
fn drain_burst(first: Table, rx: &mut mpsc::UnboundedReceiver<Table>) -> Vec<Table> {
    let mut tables = vec![first];
    while let Ok(more) = rx.try_recv() {
        if !tables.contains(&more) {
            tables.push(more);
        }
    }
    tables
}

/// Sends the current state of `table` for the user. Returns `false` if the
/// socket is gone.
async fn send_snapshot(
    sender: &mut SplitSink<WebSocket, Message>,
    app_state: &AppState,
    user_id: Uuid,
    table: Table,
) -> bool {
    let message = match table {
        Table::Projects => match app_state.db.list_projects(user_id).await {
            Ok(projects) => ServerMessage::ProjectsChanged {
                projects: projects.into_iter().map(ProjectResponse::from).collect(),
            },
            Err(e) => {
                error!("Failed to load projects for {}: {:?}", user_id, e);
                ServerMessage::Error {
                    message: "Failed to load projects.".to_string(),
                }
            }
        },
        Table::Profiles => match app_state.db.get_profile(user_id).await {
            Ok(profile) => ServerMessage::ProfileChanged {
                profile: ProfileResponse::from_domain(
                    &profile,
                    &app_state.config.plan_allowances,
                ),
            },
            Err(e) => {
                error!("Failed to load profile for {}: {:?}", user_id, e);
                ServerMessage::Error {
                    message: "Failed to load profile.".to_string(),
                }
            }
        },
    };
    send_message(sender, &message).await
}

async fn send_message(sender: &mut SplitSink<WebSocket, Message>, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return true;
        }
    };
    if sender.send(Message::Text(json.into())).await.is_err() {
        warn!("Failed to send message; client may have disconnected.");
        return false;
    }
    true
}
