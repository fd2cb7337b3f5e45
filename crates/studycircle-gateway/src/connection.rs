use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use studycircle_db::Database;
use studycircle_rules::policy::{Actor, Operation, Target, authorize};
use studycircle_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;
use crate::subscriptions::GroupSubscriptions;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh socket has to send Identify.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Drive one gateway connection: Identify handshake, then the event loop
/// until either side goes away.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, db: Arc<Database>, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    let user_id = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} connected to gateway", user_id);

    let group_ids = match db.groups_for_user(user_id) {
        Ok(ids) => ids,
        Err(e) => {
            error!("Failed to load groups for {}: {}", user_id, e);
            Vec::new()
        }
    };

    if !send_event(&mut sender, &GatewayEvent::Ready { user_id, group_ids }).await {
        return;
    }

    run_connection_loop(sender, receiver, dispatcher, db, user_id).await;
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    user_id: Uuid,
) {
    // Notifications arrive on the per-user channel, chat and acks on the outbound queue.
    let (conn_id, mut user_rx) = dispatcher.register_user_channel(user_id).await;
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<GatewayEvent>();
    let mut subscriptions = GroupSubscriptions::new(dispatcher.clone(), outbound_tx.clone());

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = outbound_rx.recv() => {
                    let Some(event) = event else { break };
                    if !send_event(&mut sender, &event).await {
                        break;
                    }
                }
                event = user_rx.recv() => {
                    let Some(event) = event else { break };
                    if !send_event(&mut sender, &event).await {
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
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => handle_command(&db, user_id, cmd, &mut subscriptions, &outbound_tx).await,
                    Err(e) => {
                        warn!("{} bad command: {} -- raw: {}", user_id, e, truncate(&text, 200));
                    }
                },
                Message::Pong(_) => pong_flag_recv.store(true, Ordering::Release),
                Message::Close(_) => break,
                _ => {}
            }
        }
        subscriptions.cancel_all();
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Aborting the recv task drops its subscriptions, which cancels every forwarder.
    dispatcher.unregister_user_channel(user_id, conn_id).await;
    info!("{} disconnected from gateway", user_id);
}

async fn handle_command(
    db: &Database,
    user_id: Uuid,
    cmd: GatewayCommand,
    subscriptions: &mut GroupSubscriptions,
    outbound: &mpsc::UnboundedSender<GatewayEvent>,
) {
    match cmd {
        GatewayCommand::Identify { .. } => {} // Already handled

        GatewayCommand::Subscribe { group_ids } => {
            let mut subscribed = Vec::new();
            let mut rejected = Vec::new();

            for group_id in group_ids {
                if can_read_group_chat(db, user_id, group_id) {
                    subscriptions.subscribe(group_id).await;
                    subscribed.push(group_id);
                } else {
                    rejected.push(group_id);
                }
            }

            debug!(
                "{} subscribed to {} groups, {} rejected",
                user_id,
                subscribed.len(),
                rejected.len()
            );
            let _ = outbound.send(GatewayEvent::SubscribeAck { subscribed, rejected });
        }

        GatewayCommand::Unsubscribe { group_ids } => {
            for group_id in group_ids {
                subscriptions.unsubscribe(group_id);
            }
        }
    }
}

/// Live chat follows the same rule as reading message history: members only.
fn can_read_group_chat(db: &Database, user_id: Uuid, group_id: Uuid) -> bool {
    let actor_is_member = match db.is_group_member(group_id, user_id) {
        Ok(is_member) => is_member,
        Err(e) => {
            error!("Membership lookup failed for {} in {}: {}", user_id, group_id, e);
            return false;
        }
    };

    let target = Target::Message {
        user_id,
        actor_is_member,
    };
    authorize(Actor::User(user_id), Operation::Read, &target).is_allowed()
}

async fn wait_for_identify(receiver: &mut SplitStream<WebSocket>, jwt_secret: &str) -> Option<Uuid> {
    use jsonwebtoken::{DecodingKey, Validation, decode};
    use studycircle_types::api::Claims;

    let timeout = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) = serde_json::from_str::<GatewayCommand>(&text) {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some(token_data.claims.sub);
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &GatewayEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to encode gateway event: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studycircle_db::models::NewGroup;
    use studycircle_types::models::PrivacyLevel;

    #[test]
    fn test_only_members_may_follow_group_chat() {
        let db = Database::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        db.create_user_with_profile(owner, "owner@school.edu", "hash", "Owner").unwrap();
        db.create_user_with_profile(outsider, "out@school.edu", "hash", "Outsider").unwrap();
        let group = db
            .create_group(&NewGroup {
                id: Uuid::new_v4(),
                creator_id: owner,
                subject_id: None,
                name: "Algebra".into(),
                description: None,
                privacy: PrivacyLevel::Public,
                max_members: 5,
            })
            .unwrap();

        assert!(can_read_group_chat(&db, owner, group.id));
        assert!(!can_read_group_chat(&db, outsider, group.id));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
