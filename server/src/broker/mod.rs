//! In-memory pub/sub broker core
//!
//! The broker owns the whole state graph: the topic registry, each topic's
//! subscriber set and bounded history, and the inverse subscription index
//! (client id → subscribed topic names) that makes disconnect cleanup
//! O(subscriptions) instead of a registry scan.
//!
//! ## Locking discipline
//!
//! One `parking_lot::Mutex` serializes every operation. Critical sections
//! never await: "sending" to a subscriber is a non-blocking enqueue onto
//! that connection's outgoing queue (see [`connection`]). This preserves the
//! two ordering guarantees the surfaces rely on:
//!
//! - per subscriber, events arrive in publish order (one FIFO queue per
//!   connection, one writer task draining it)
//! - a subscribe's history replay can never interleave with a concurrent
//!   publish on the same topic (both run under the same mutex)

mod connection;
mod error;
mod topic;

use std::collections::{BTreeMap, HashMap, HashSet};

use parking_lot::Mutex;

pub use connection::{CLOSE_NORMAL, ConnectionClosed, ConnectionHandle, Outgoing};
pub use error::BrokerError;
pub use topic::Topic;

use crate::domain::frames::{MessagePayload, ServerFrame};

/// Counts reported by `GET /health`
#[derive(Debug, Clone, Copy)]
pub struct HealthStats {
    pub topics: usize,
    pub subscribers: usize,
}

/// Per-topic counts reported by `GET /stats`
#[derive(Debug, Clone, Copy)]
pub struct TopicStats {
    pub messages: u64,
    pub subscribers: usize,
}

#[derive(Default)]
struct BrokerState {
    /// Topic registry: single source of truth for existence
    topics: HashMap<String, Topic>,
    /// Subscription index: client id → subscribed topic names.
    /// A client appears here iff it has at least one subscription.
    clients: HashMap<String, HashSet<String>>,
}

/// The broker engine shared by the REST and stream adapters
#[derive(Default)]
pub struct Broker {
    state: Mutex<BrokerState>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, empty topic. Name constraints are validated upstream.
    pub fn create_topic(&self, name: &str) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        if state.topics.contains_key(name) {
            return Err(BrokerError::TopicExists(name.to_string()));
        }
        state.topics.insert(name.to_string(), Topic::new(name));
        tracing::debug!(topic = name, "topic created");
        Ok(())
    }

    /// Remove a topic, force-disconnecting its current subscribers.
    ///
    /// Connected subscribers receive an `info{msg:"topic_deleted"}` frame
    /// followed by a normal-closure close; every subscriber loses the topic
    /// from its index entry, purging entries that become empty.
    pub fn delete_topic(&self, name: &str) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        let Some(topic) = state.topics.remove(name) else {
            return Err(BrokerError::TopicNotFound(name.to_string()));
        };

        for (client_id, conn) in topic.subscribers() {
            if conn.is_connected() {
                let _ = conn.send(ServerFrame::info(Some(name.to_string()), "topic_deleted"));
                conn.close(CLOSE_NORMAL);
            }

            if let Some(subs) = state.clients.get_mut(client_id) {
                subs.remove(name);
                if subs.is_empty() {
                    state.clients.remove(client_id);
                }
            }
        }

        tracing::debug!(topic = name, "topic deleted");
        Ok(())
    }

    /// Snapshot of current topic names; order is unspecified
    pub fn list_topics(&self) -> Vec<String> {
        self.state.lock().topics.keys().cloned().collect()
    }

    /// Subscribe a client's connection to a topic.
    ///
    /// A prior handle for the same client id on this topic is replaced.
    /// With `last_n > 0`, the most recent `min(last_n, |history|)` payloads
    /// are replayed in historical order before the lock is released, so no
    /// concurrently published event can interleave with the replay.
    pub fn subscribe(
        &self,
        topic_name: &str,
        client_id: &str,
        conn: ConnectionHandle,
        last_n: usize,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        let topic = state
            .topics
            .get_mut(topic_name)
            .ok_or_else(|| BrokerError::TopicNotFound(topic_name.to_string()))?;

        topic.insert_subscriber(client_id.to_string(), conn.clone());

        if last_n > 0 {
            for payload in topic.recent(last_n) {
                let _ = conn.send(ServerFrame::event(topic_name.to_string(), payload.clone()));
            }
        }

        state
            .clients
            .entry(client_id.to_string())
            .or_default()
            .insert(topic_name.to_string());

        tracing::debug!(topic = topic_name, client_id, last_n, "subscribed");
        Ok(())
    }

    /// Remove a client's subscription. Missing membership is a no-op, but
    /// the topic itself must exist.
    pub fn unsubscribe(&self, topic_name: &str, client_id: &str) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        let topic = state
            .topics
            .get_mut(topic_name)
            .ok_or_else(|| BrokerError::TopicNotFound(topic_name.to_string()))?;

        topic.remove_subscriber(client_id);

        if let Some(subs) = state.clients.get_mut(client_id) {
            subs.remove(topic_name);
            if subs.is_empty() {
                state.clients.remove(client_id);
            }
        }

        tracing::debug!(topic = topic_name, client_id, "unsubscribed");
        Ok(())
    }

    /// Record a payload in the topic's history and fan it out to every
    /// current subscriber. Dead connections found during the fan-out are
    /// purged from the subscriber set (not from the index).
    pub fn publish(&self, topic_name: &str, payload: MessagePayload) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        let topic = state
            .topics
            .get_mut(topic_name)
            .ok_or_else(|| BrokerError::TopicNotFound(topic_name.to_string()))?;

        topic.record(payload.clone());
        topic.broadcast(&payload);
        Ok(())
    }

    /// Drop every subscription held by a client. Idempotent; tolerates
    /// topics that have been deleted since the index entry was written.
    pub fn disconnect_client(&self, client_id: &str) {
        let mut state = self.state.lock();
        let Some(topic_names) = state.clients.remove(client_id) else {
            return;
        };

        for name in &topic_names {
            if let Some(topic) = state.topics.get_mut(name) {
                topic.remove_subscriber(client_id);
            }
        }

        tracing::debug!(client_id, subscriptions = topic_names.len(), "client disconnected");
    }

    pub fn health_stats(&self) -> HealthStats {
        let state = self.state.lock();
        HealthStats {
            topics: state.topics.len(),
            subscribers: state.topics.values().map(Topic::subscriber_count).sum(),
        }
    }

    pub fn full_stats(&self) -> BTreeMap<String, TopicStats> {
        let state = self.state.lock();
        state
            .topics
            .iter()
            .map(|(name, topic)| {
                (
                    name.clone(),
                    TopicStats {
                        messages: topic.message_count(),
                        subscribers: topic.subscriber_count(),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use tokio::sync::mpsc::UnboundedReceiver;
    use uuid::Uuid;

    fn payload(n: u64) -> MessagePayload {
        let mut map = Map::new();
        map.insert("n".to_string(), n.into());
        MessagePayload {
            id: Uuid::from_u128(n as u128),
            payload: map,
        }
    }

    fn recv_event(rx: &mut UnboundedReceiver<Outgoing>) -> (String, MessagePayload) {
        match rx.try_recv().expect("expected a queued frame") {
            Outgoing::Frame(ServerFrame::Event { topic, message, .. }) => (topic, message),
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn test_create_duplicate_conflicts() {
        let broker = Broker::new();
        broker.create_topic("a").unwrap();
        assert_eq!(
            broker.create_topic("a"),
            Err(BrokerError::TopicExists("a".to_string()))
        );
    }

    #[test]
    fn test_create_delete_round_trip() {
        let broker = Broker::new();
        broker.create_topic("a").unwrap();
        assert_eq!(broker.list_topics(), vec!["a".to_string()]);

        broker.delete_topic("a").unwrap();
        assert!(broker.list_topics().is_empty());
        assert_eq!(
            broker.delete_topic("a"),
            Err(BrokerError::TopicNotFound("a".to_string()))
        );
    }

    #[test]
    fn test_operations_on_missing_topic() {
        let broker = Broker::new();
        let (conn, _rx) = ConnectionHandle::channel();

        assert_eq!(
            broker.subscribe("ghost", "c1", conn, 0),
            Err(BrokerError::TopicNotFound("ghost".to_string()))
        );
        assert_eq!(
            broker.unsubscribe("ghost", "c1"),
            Err(BrokerError::TopicNotFound("ghost".to_string()))
        );
        assert_eq!(
            broker.publish("ghost", payload(1)),
            Err(BrokerError::TopicNotFound("ghost".to_string()))
        );
    }

    #[test]
    fn test_publish_fans_out_in_order() {
        let broker = Broker::new();
        broker.create_topic("t").unwrap();

        let (c1, mut rx1) = ConnectionHandle::channel();
        let (c2, mut rx2) = ConnectionHandle::channel();
        broker.subscribe("t", "c1", c1, 0).unwrap();
        broker.subscribe("t", "c2", c2, 0).unwrap();

        broker.publish("t", payload(1)).unwrap();
        broker.publish("t", payload(2)).unwrap();

        for rx in [&mut rx1, &mut rx2] {
            let (topic, first) = recv_event(rx);
            assert_eq!(topic, "t");
            assert_eq!(first.id, Uuid::from_u128(1));
            let (_, second) = recv_event(rx);
            assert_eq!(second.id, Uuid::from_u128(2));
        }
    }

    #[test]
    fn test_replay_returns_most_recent_in_order() {
        let broker = Broker::new();
        broker.create_topic("t").unwrap();
        for n in 1..=3 {
            broker.publish("t", payload(n)).unwrap();
        }

        let (conn, mut rx) = ConnectionHandle::channel();
        broker.subscribe("t", "late", conn, 2).unwrap();

        let (_, first) = recv_event(&mut rx);
        let (_, second) = recv_event(&mut rx);
        assert_eq!(first.id, Uuid::from_u128(2));
        assert_eq!(second.id, Uuid::from_u128(3));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_replay_precedes_live_events() {
        let broker = Broker::new();
        broker.create_topic("t").unwrap();
        broker.publish("t", payload(1)).unwrap();

        let (conn, mut rx) = ConnectionHandle::channel();
        broker.subscribe("t", "late", conn, 10).unwrap();
        broker.publish("t", payload(2)).unwrap();

        let (_, replayed) = recv_event(&mut rx);
        let (_, live) = recv_event(&mut rx);
        assert_eq!(replayed.id, Uuid::from_u128(1));
        assert_eq!(live.id, Uuid::from_u128(2));
    }

    #[test]
    fn test_last_n_zero_skips_replay() {
        let broker = Broker::new();
        broker.create_topic("t").unwrap();
        broker.publish("t", payload(1)).unwrap();

        let (conn, mut rx) = ConnectionHandle::channel();
        broker.subscribe("t", "c1", conn, 0).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_restores_counts() {
        let broker = Broker::new();
        broker.create_topic("t").unwrap();

        let (conn, _rx) = ConnectionHandle::channel();
        broker.subscribe("t", "c1", conn, 0).unwrap();
        assert_eq!(broker.health_stats().subscribers, 1);

        broker.unsubscribe("t", "c1").unwrap();
        assert_eq!(broker.health_stats().subscribers, 0);

        // idempotent with respect to membership
        broker.unsubscribe("t", "c1").unwrap();
        assert_eq!(broker.health_stats().subscribers, 0);
    }

    #[test]
    fn test_delete_notifies_then_closes_subscribers() {
        let broker = Broker::new();
        broker.create_topic("t").unwrap();

        let (conn, mut rx) = ConnectionHandle::channel();
        broker.subscribe("t", "c1", conn, 0).unwrap();
        broker.delete_topic("t").unwrap();

        match rx.try_recv().unwrap() {
            Outgoing::Frame(ServerFrame::Info { topic, msg, .. }) => {
                assert_eq!(topic.as_deref(), Some("t"));
                assert_eq!(msg, "topic_deleted");
            }
            other => panic!("expected info, got {other:?}"),
        }
        match rx.try_recv().unwrap() {
            Outgoing::Close(code) => assert_eq!(code, CLOSE_NORMAL),
            other => panic!("expected close, got {other:?}"),
        }

        // index entry is gone: a later disconnect is a no-op
        broker.disconnect_client("c1");
        assert_eq!(broker.health_stats().topics, 0);
    }

    #[test]
    fn test_publish_after_delete_fails() {
        let broker = Broker::new();
        broker.create_topic("t").unwrap();
        broker.delete_topic("t").unwrap();
        assert_eq!(
            broker.publish("t", payload(1)),
            Err(BrokerError::TopicNotFound("t".to_string()))
        );
    }

    #[test]
    fn test_disconnect_cleans_all_subscriptions() {
        let broker = Broker::new();
        broker.create_topic("t1").unwrap();
        broker.create_topic("t2").unwrap();

        let (conn, _rx) = ConnectionHandle::channel();
        broker.subscribe("t1", "c1", conn.clone(), 0).unwrap();
        broker.subscribe("t2", "c1", conn, 0).unwrap();

        broker.disconnect_client("c1");

        let stats = broker.full_stats();
        assert_eq!(stats["t1"].subscribers, 0);
        assert_eq!(stats["t2"].subscribers, 0);

        // idempotent
        broker.disconnect_client("c1");
    }

    #[test]
    fn test_disconnect_tolerates_deleted_topic() {
        let broker = Broker::new();
        broker.create_topic("t1").unwrap();
        broker.create_topic("t2").unwrap();

        let (conn, rx) = ConnectionHandle::channel();
        broker.subscribe("t1", "c1", conn.clone(), 0).unwrap();
        broker.subscribe("t2", "c1", conn, 0).unwrap();

        // the close queued by delete leaves the receiver intact; drop it so
        // the handle reads as closed, as a torn-down session's would
        drop(rx);
        broker.delete_topic("t1").unwrap();

        broker.disconnect_client("c1");
        assert_eq!(broker.full_stats()["t2"].subscribers, 0);
    }

    #[test]
    fn test_publish_purges_dead_but_not_index() {
        let broker = Broker::new();
        broker.create_topic("t").unwrap();

        let (conn, rx) = ConnectionHandle::channel();
        broker.subscribe("t", "c1", conn, 0).unwrap();
        drop(rx);

        broker.publish("t", payload(1)).unwrap();
        assert_eq!(broker.health_stats().subscribers, 0);

        // the index still remembers c1 until disconnect_client runs
        broker.disconnect_client("c1");
        assert_eq!(broker.health_stats().subscribers, 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let broker = Broker::new();
        broker.create_topic("a").unwrap();
        broker.create_topic("b").unwrap();

        let (conn, _rx) = ConnectionHandle::channel();
        broker.subscribe("a", "c1", conn, 0).unwrap();
        broker.publish("a", payload(1)).unwrap();
        broker.publish("a", payload(2)).unwrap();

        let health = broker.health_stats();
        assert_eq!(health.topics, 2);
        assert_eq!(health.subscribers, 1);

        let stats = broker.full_stats();
        assert_eq!(stats["a"].messages, 2);
        assert_eq!(stats["a"].subscribers, 1);
        assert_eq!(stats["b"].messages, 0);
        assert_eq!(stats["b"].subscribers, 0);
    }

    #[test]
    fn test_message_count_survives_history_eviction() {
        let broker = Broker::new();
        broker.create_topic("t").unwrap();
        for n in 0..150 {
            broker.publish("t", payload(n)).unwrap();
        }

        assert_eq!(broker.full_stats()["t"].messages, 150);

        // replay is capped by the bounded history
        let (conn, mut rx) = ConnectionHandle::channel();
        broker.subscribe("t", "late", conn, usize::MAX).unwrap();
        let mut replayed = 0;
        while rx.try_recv().is_ok() {
            replayed += 1;
        }
        assert_eq!(replayed, 100);
    }
}
