//! Per-topic state: subscriber set, bounded history, message counter

use std::collections::{HashMap, VecDeque};

use crate::core::constants::TOPIC_HISTORY_CAPACITY;
use crate::domain::frames::{MessagePayload, ServerFrame};

use super::connection::ConnectionHandle;

/// A named channel: the unit of subscription and publication
pub struct Topic {
    name: String,
    subscribers: HashMap<String, ConnectionHandle>,
    history: VecDeque<MessagePayload>,
    message_count: u64,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribers: HashMap::new(),
            history: VecDeque::with_capacity(TOPIC_HISTORY_CAPACITY),
            message_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Total successful publishes on this topic; monotonically non-decreasing
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Install a subscriber, replacing any prior handle for the same client id
    pub fn insert_subscriber(&mut self, client_id: String, conn: ConnectionHandle) {
        self.subscribers.insert(client_id, conn);
    }

    /// Remove a subscriber; missing membership is a no-op
    pub fn remove_subscriber(&mut self, client_id: &str) {
        self.subscribers.remove(client_id);
    }

    pub fn subscribers(&self) -> impl Iterator<Item = (&String, &ConnectionHandle)> {
        self.subscribers.iter()
    }

    /// Append a payload to the bounded history and bump the counter
    pub fn record(&mut self, payload: MessagePayload) {
        if self.history.len() == TOPIC_HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(payload);
        self.message_count += 1;
    }

    /// The most recent `min(n, |history|)` payloads, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &MessagePayload> {
        self.history
            .iter()
            .skip(self.history.len().saturating_sub(n))
    }

    /// Fan a payload out to every current subscriber.
    ///
    /// Subscribers whose connection is closed, or whose send fails, are
    /// collected and purged from the subscriber set at the end of the
    /// fan-out. The SubscriptionIndex is not touched here; that cleanup
    /// belongs to `disconnect_client`.
    pub fn broadcast(&mut self, payload: &MessagePayload) {
        let mut dead: Vec<String> = Vec::new();

        for (client_id, conn) in &self.subscribers {
            if !conn.is_connected() {
                dead.push(client_id.clone());
                continue;
            }
            let event = ServerFrame::event(self.name.clone(), payload.clone());
            if conn.send(event).is_err() {
                dead.push(client_id.clone());
            }
        }

        for client_id in dead {
            self.subscribers.remove(&client_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::connection::Outgoing;
    use serde_json::Map;
    use uuid::Uuid;

    fn payload(n: u64) -> MessagePayload {
        let mut map = Map::new();
        map.insert("n".to_string(), n.into());
        MessagePayload {
            id: Uuid::from_u128(n as u128),
            payload: map,
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let mut topic = Topic::new("t");
        for n in 0..101 {
            topic.record(payload(n));
        }

        assert_eq!(topic.message_count(), 101);
        let ids: Vec<Uuid> = topic.recent(usize::MAX).map(|p| p.id).collect();
        assert_eq!(ids.len(), 100);
        assert_eq!(ids.first().copied(), Some(Uuid::from_u128(1)));
        assert_eq!(ids.last().copied(), Some(Uuid::from_u128(100)));
    }

    #[test]
    fn test_recent_edge_cases() {
        let mut topic = Topic::new("t");
        for n in 0..3 {
            topic.record(payload(n));
        }

        assert_eq!(topic.recent(0).count(), 0);
        assert_eq!(topic.recent(10).count(), 3);

        let last_two: Vec<Uuid> = topic.recent(2).map(|p| p.id).collect();
        assert_eq!(last_two, vec![Uuid::from_u128(1), Uuid::from_u128(2)]);
    }

    #[test]
    fn test_resubscribe_replaces_handle() {
        let mut topic = Topic::new("t");
        let (old, mut old_rx) = ConnectionHandle::channel();
        let (new, mut new_rx) = ConnectionHandle::channel();

        topic.insert_subscriber("c1".to_string(), old);
        topic.insert_subscriber("c1".to_string(), new);
        assert_eq!(topic.subscriber_count(), 1);

        topic.broadcast(&payload(7));
        assert!(old_rx.try_recv().is_err());
        assert!(matches!(
            new_rx.try_recv().unwrap(),
            Outgoing::Frame(ServerFrame::Event { .. })
        ));
    }

    #[test]
    fn test_broadcast_purges_dead_subscribers() {
        let mut topic = Topic::new("t");
        let (live, mut live_rx) = ConnectionHandle::channel();
        let (dead, dead_rx) = ConnectionHandle::channel();
        drop(dead_rx);

        topic.insert_subscriber("live".to_string(), live);
        topic.insert_subscriber("dead".to_string(), dead);

        topic.broadcast(&payload(1));

        assert_eq!(topic.subscriber_count(), 1);
        match live_rx.try_recv().unwrap() {
            Outgoing::Frame(ServerFrame::Event { topic, message, .. }) => {
                assert_eq!(topic, "t");
                assert_eq!(message.id, Uuid::from_u128(1));
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }
}
