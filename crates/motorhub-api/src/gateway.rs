use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use motorhub_gateway::{CancelHandle, ViewerFeed};
use motorhub_types::events::{GatewayCommand, GatewayEvent};
use motorhub_types::{Participant, ThreadKey};

use crate::error::ApiError;
use crate::middleware::{bearer_token, decode_claims};
use crate::state::AppState;

/// Server sends a Ping every 15 seconds. Two missed Pongs drop the connection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

type Subscriptions = Arc<Mutex<HashMap<ThreadKey, CancelHandle>>>;

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    /// Browsers cannot set headers on a WebSocket upgrade, so the token may
    /// come in the query string instead.
    pub token: Option<String>,
}

/// Authenticate the upgrade request, then hand the socket to the event loop.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers)
        .or(query.token.as_deref())
        .ok_or(ApiError::Unauthorized)?;
    let claims = decode_claims(token, &state.jwt_secret).map_err(|_| ApiError::Unauthorized)?;

    let participant = claims.participant();
    Ok(ws.on_upgrade(move |socket| handle_connection(socket, state, participant)))
}

pub async fn handle_connection(socket: WebSocket, state: AppState, participant: Participant) {
    let (mut sender, mut receiver) = socket.split();
    info!("{} connected to gateway", participant);

    let ready = GatewayEvent::Ready {
        participant: participant.clone(),
    };
    let Ok(text) = serde_json::to_string(&ready) else {
        return;
    };
    if sender.send(WsMessage::Text(text.into())).await.is_err() {
        return;
    }

    // Subscription tasks push here; the send task drains it to the socket
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<GatewayEvent>();
    let subscriptions: Subscriptions = Arc::new(Mutex::new(HashMap::new()));

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    let Some(event) = event else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode gateway event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(WsMessage::Text(text.into())).await.is_err() {
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
                    if sender.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let recv_state = state.clone();
    let recv_participant = participant.clone();
    let recv_subscriptions = subscriptions.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                WsMessage::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&recv_state, &recv_participant, cmd, &recv_subscriptions, &event_tx).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            recv_participant,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                        let _ = event_tx.send(GatewayEvent::Error {
                            message: format!("unrecognised command: {}", e),
                        });
                    }
                },
                WsMessage::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let handles: Vec<CancelHandle> = lock(&subscriptions).drain().map(|(_, h)| h).collect();
    for handle in handles {
        handle.cancel();
    }
    info!("{} disconnected from gateway", participant);
}

async fn handle_command(
    state: &AppState,
    participant: &Participant,
    cmd: GatewayCommand,
    subscriptions: &Subscriptions,
    events: &mpsc::UnboundedSender<GatewayEvent>,
) {
    match cmd {
        GatewayCommand::Subscribe { threads } => {
            debug!("{} subscribing to {} threads", participant, threads.len());
            for thread in threads {
                let live = lock(subscriptions)
                    .get(&thread)
                    .is_some_and(|h| !h.is_cancelled());
                if live {
                    continue;
                }

                match state.chat.feed(&thread, participant).await {
                    Ok(feed) => {
                        lock(subscriptions).insert(thread.clone(), feed.cancel_handle());
                        tokio::spawn(forward_feed(feed, events.clone()));
                    }
                    Err(e) => {
                        let _ = events.send(GatewayEvent::Error {
                            message: format!("cannot subscribe to {}: {}", thread, e),
                        });
                    }
                }
            }
        }

        GatewayCommand::Unsubscribe { threads } => {
            let mut subs = lock(subscriptions);
            for thread in threads {
                if let Some(handle) = subs.remove(&thread) {
                    handle.cancel();
                }
            }
        }
    }
}

/// Relay one thread's feed to the socket until it is cancelled or lost.
async fn forward_feed(mut feed: ViewerFeed, events: mpsc::UnboundedSender<GatewayEvent>) {
    let own_handle = feed.cancel_handle();
    let thread = feed.thread().clone();

    while let Some(item) = feed.next().await {
        let event = match item {
            Ok(message) => GatewayEvent::MessageUpsert {
                thread: thread.clone(),
                message,
            },
            Err(e) => GatewayEvent::SubscriptionLost {
                thread: thread.clone(),
                reason: e.to_string(),
            },
        };
        if events.send(event).is_err() {
            break;
        }
    }

    // Marks the slot reusable so a later Subscribe for this thread starts fresh
    own_handle.cancel();
}

fn lock(subscriptions: &Subscriptions) -> std::sync::MutexGuard<'_, HashMap<ThreadKey, CancelHandle>> {
    subscriptions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
