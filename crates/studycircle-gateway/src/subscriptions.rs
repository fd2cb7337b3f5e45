use std::collections::HashMap;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};
use uuid::Uuid;

use studycircle_types::events::GatewayEvent;

use crate::dispatcher::Dispatcher;

/// The set of group topics one connection is listening to.
///
/// Each group gets a forwarding task that copies topic events into the
/// connection's outbound queue. Every forwarder hangs off one root token, so
/// dropping the set (or calling `cancel_all`) stops them all.
pub struct GroupSubscriptions {
    dispatcher: Dispatcher,
    outbound: mpsc::UnboundedSender<GatewayEvent>,
    root: CancellationToken,
    active: HashMap<Uuid, CancellationToken>,
}

impl GroupSubscriptions {
    pub fn new(dispatcher: Dispatcher, outbound: mpsc::UnboundedSender<GatewayEvent>) -> Self {
        Self {
            dispatcher,
            outbound,
            root: CancellationToken::new(),
            active: HashMap::new(),
        }
    }

    /// Start forwarding a group's events. Returns false if already subscribed.
    pub async fn subscribe(&mut self, group_id: Uuid) -> bool {
        if self.active.contains_key(&group_id) {
            return false;
        }

        let rx = self.dispatcher.subscribe_group(group_id).await;
        let token = self.root.child_token();
        tokio::spawn(forward(group_id, rx, self.outbound.clone(), token.clone()));
        self.active.insert(group_id, token);
        true
    }

    /// Stop forwarding a group's events. Returns false if not subscribed.
    pub fn unsubscribe(&mut self, group_id: Uuid) -> bool {
        match self.active.remove(&group_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self, group_id: Uuid) -> bool {
        self.active.contains_key(&group_id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn cancel_all(&mut self) {
        self.root.cancel();
        self.active.clear();
    }
}

impl Drop for GroupSubscriptions {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

async fn forward(
    group_id: Uuid,
    mut rx: broadcast::Receiver<GatewayEvent>,
    outbound: mpsc::UnboundedSender<GatewayEvent>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            result = rx.recv() => match result {
                Ok(event) => {
                    if outbound.send(event).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Subscriber to group {} lagged, skipped {} events", group_id, n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
    trace!("Stopped forwarding group {}", group_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;
    use studycircle_types::models::{Message, MessageType};

    fn message(group_id: Uuid) -> GatewayEvent {
        GatewayEvent::MessageCreate {
            message: Message {
                id: Uuid::new_v4(),
                group_id,
                user_id: Uuid::new_v4(),
                content: "hi".into(),
                message_type: MessageType::Text,
                created_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn test_subscribed_group_events_are_forwarded() {
        let dispatcher = Dispatcher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subs = GroupSubscriptions::new(dispatcher.clone(), tx);
        let g = Uuid::new_v4();

        assert!(subs.subscribe(g).await);
        assert!(!subs.subscribe(g).await);

        dispatcher.publish(message(g)).await;
        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(event.group_id(), Some(g));
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let dispatcher = Dispatcher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subs = GroupSubscriptions::new(dispatcher.clone(), tx);
        let g = Uuid::new_v4();

        subs.subscribe(g).await;
        assert!(subs.unsubscribe(g));
        assert!(!subs.unsubscribe(g));

        // Let the forwarder observe the cancellation and drop its receiver.
        tokio::time::sleep(Duration::from_millis(20)).await;
        dispatcher.publish(message(g)).await;

        let got = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(got.is_err());
    }

    #[tokio::test]
    async fn test_drop_cancels_every_forwarder() {
        let dispatcher = Dispatcher::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let g1 = Uuid::new_v4();
        let g2 = Uuid::new_v4();
        {
            let mut subs = GroupSubscriptions::new(dispatcher.clone(), tx);
            subs.subscribe(g1).await;
            subs.subscribe(g2).await;
            assert_eq!(subs.len(), 2);
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(dispatcher.subscriber_count(g1).await, 0);
        assert_eq!(dispatcher.subscriber_count(g2).await, 0);
    }
}
