use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use circle_db::Database;
use circle_types::events::{GatewayCommand, GatewayEvent};
use circle_types::models::User;
use circle_types::token;

use crate::dispatcher::{Dispatcher, WatchList};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on chats a single client may watch at once.
const MAX_WATCHED: usize = 64;

/// Handle a single WebSocket connection: Identify handshake, Ready, then the
/// event loop until either side goes away or the session is logged out.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    jwt_secret: String,
) {
    let (mut sender, mut receiver) = socket.split();

    let (user, session_id) = match wait_for_identify(&mut receiver, &db, &jwt_secret).await {
        Some(identified) => identified,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} ({}) connected to gateway", user.name, user.id);

    let ready = GatewayEvent::Ready { user: user.clone() };
    if !send_event(&mut sender, &ready).await {
        return;
    }

    run_connection_loop(sender, receiver, dispatcher, user, session_id).await;
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    user: User,
    session_id: Uuid,
) {
    let (conn_id, mut session_rx) = dispatcher.register_session_channel(session_id).await;

    // Owned by the send task; released when that task ends or is aborted.
    let mut subscription = dispatcher.subscribe(user.viewer());
    let watch_list = subscription.watch_list();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = subscription.recv() => {
                    let Some(event) = event else { break };
                    if !send_event(&mut sender, &event).await {
                        break;
                    }
                }
                event = session_rx.recv() => {
                    let Some(event) = event else { break };
                    let ended = matches!(event, GatewayEvent::SessionEnded);
                    if !send_event(&mut sender, &event).await || ended {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let name = user.name.clone();
    let user_id = user.id;
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => handle_command(&watch_list, &name, user_id, cmd),
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            name,
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister_session_channel(session_id, conn_id).await;
    info!("{} ({}) disconnected from gateway", user.name, user.id);
}

fn handle_command(watch_list: &WatchList, name: &str, user_id: Uuid, cmd: GatewayCommand) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled

        GatewayCommand::Watch { donation_ids } => {
            debug!("{} ({}) watching {} chats", name, user_id, donation_ids.len());
            watch_list.replace(donation_ids.into_iter().take(MAX_WATCHED));
        }
    }
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &GatewayEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode gateway event: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}

/// Wait for an Identify command whose token maps to a live session.
/// Returns the user and that session's id.
async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    db: &Arc<Database>,
    jwt_secret: &str,
) -> Option<(User, Uuid)> {
    let identify = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    return token::verify(jwt_secret, &token).ok();
                }
            }
        }
        None
    });

    let claims = identify.await.ok().flatten()?;
    let session_id = claims.sid;

    let db = db.clone();
    let user = tokio::task::spawn_blocking(move || db.get_session_user(session_id))
        .await
        .ok()?
        .map_err(|e| warn!("Session lookup failed: {}", e))
        .ok()??;

    (user.id == claims.sub).then_some((user, session_id))
}
