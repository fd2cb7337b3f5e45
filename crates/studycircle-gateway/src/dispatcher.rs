use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

use studycircle_types::events::GatewayEvent;

/// Per-topic buffer. A subscriber that falls further behind than this
/// loses the oldest events.
const TOPIC_CAPACITY: usize = 256;

/// Routes gateway events: group-scoped events go to that group's topic,
/// user-targeted events go to every live connection of the user.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// group_id -> topic sender
    topics: RwLock<HashMap<Uuid, broadcast::Sender<GatewayEvent>>>,

    /// user_id -> (conn_id -> sender)
    user_channels: RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::UnboundedSender<GatewayEvent>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a group's topic, creating it on first use.
    pub async fn subscribe_group(&self, group_id: Uuid) -> broadcast::Receiver<GatewayEvent> {
        if let Some(tx) = self.inner.topics.read().await.get(&group_id) {
            return tx.subscribe();
        }
        let mut topics = self.inner.topics.write().await;
        topics
            .entry(group_id)
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Publish a group-scoped event. Returns how many subscribers received it;
    /// nobody listening is not an error.
    pub async fn publish(&self, event: GatewayEvent) -> usize {
        let Some(group_id) = event.group_id() else {
            return 0;
        };

        let delivered = {
            let topics = self.inner.topics.read().await;
            match topics.get(&group_id) {
                Some(tx) => tx.send(event).unwrap_or(0),
                None => return 0,
            }
        };

        if delivered == 0 {
            self.prune_topic(group_id).await;
        }
        delivered
    }

    /// Drop a topic once its last subscriber is gone.
    async fn prune_topic(&self, group_id: Uuid) {
        let mut topics = self.inner.topics.write().await;
        if topics.get(&group_id).is_some_and(|tx| tx.receiver_count() == 0) {
            topics.remove(&group_id);
            debug!("Pruned idle chat topic {}", group_id);
        }
    }

    pub async fn subscriber_count(&self, group_id: Uuid) -> usize {
        self.inner
            .topics
            .read()
            .await
            .get(&group_id)
            .map_or(0, |tx| tx.receiver_count())
    }

    /// Register a per-connection targeted channel. Returns (conn_id, receiver).
    pub async fn register_user_channel(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(conn_id, tx);
        (conn_id, rx)
    }

    pub async fn unregister_user_channel(&self, user_id: Uuid, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some(conns) = channels.get_mut(&user_id) {
            conns.remove(&conn_id);
            if conns.is_empty() {
                channels.remove(&user_id);
            }
        }
    }

    /// Send a targeted event to every connection of a user. Offline users
    /// simply miss it.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        let channels = self.inner.user_channels.read().await;
        if let Some(conns) = channels.get(&user_id) {
            for tx in conns.values() {
                let _ = tx.send(event.clone());
            }
        }
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.user_channels.read().await.contains_key(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use studycircle_types::models::{Message, MessageType};

    fn message(group_id: Uuid, content: &str) -> GatewayEvent {
        GatewayEvent::MessageCreate {
            message: Message {
                id: Uuid::new_v4(),
                group_id,
                user_id: Uuid::new_v4(),
                content: content.to_string(),
                message_type: MessageType::Text,
                created_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_only_that_group() {
        let dispatcher = Dispatcher::new();
        let g1 = Uuid::new_v4();
        let g2 = Uuid::new_v4();
        let mut rx1 = dispatcher.subscribe_group(g1).await;
        let mut rx2 = dispatcher.subscribe_group(g2).await;

        assert_eq!(dispatcher.publish(message(g1, "hello")).await, 1);

        match rx1.recv().await.unwrap() {
            GatewayEvent::MessageCreate { message } => assert_eq!(message.content, "hello"),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_idle_topic_is_pruned() {
        let dispatcher = Dispatcher::new();
        let g = Uuid::new_v4();
        let rx = dispatcher.subscribe_group(g).await;
        assert_eq!(dispatcher.subscriber_count(g).await, 1);
        drop(rx);

        assert_eq!(dispatcher.publish(message(g, "anyone?")).await, 0);
        assert_eq!(dispatcher.subscriber_count(g).await, 0);
        assert!(dispatcher.inner.topics.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_user_channels_fan_out_per_connection() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (c1, mut rx1) = dispatcher.register_user_channel(user).await;
        let (_c2, mut rx2) = dispatcher.register_user_channel(user).await;

        let ready = GatewayEvent::Ready {
            user_id: user,
            group_ids: vec![],
        };
        dispatcher.send_to_user(user, ready).await;
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());

        dispatcher.unregister_user_channel(user, c1).await;
        assert!(dispatcher.is_online(user).await);
    }
}
