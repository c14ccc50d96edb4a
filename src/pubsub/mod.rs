//! Topic broker. Sessions subscribe to topics; publishers (the signal
//! dispatcher, or clients through PUBLISH) fan events out to them.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::trace;

use crate::frontend::outbox::Outbox;
use crate::shared_types::SessionId;
use crate::wamp::WampMessage;

// -----------------------------------------------------------------------------
// ----- Audience --------------------------------------------------------------

/// Which subscribers of a topic receive one publication.
#[derive(Debug, Clone, Default)]
pub struct Audience {
    pub exclude: Vec<String>,
    pub eligible: Option<Vec<String>>,
}

impl Audience {
    pub fn everyone() -> Self {
        Self::default()
    }

    pub fn everyone_but(session: &SessionId) -> Self {
        Self {
            exclude: vec![session.to_string()],
            eligible: None,
        }
    }

    fn admits(&self, session: &SessionId) -> bool {
        if self.exclude.iter().any(|id| id == session.as_str()) {
            return false;
        }

        match &self.eligible {
            Some(eligible) => eligible.iter().any(|id| id == session.as_str()),
            None => true,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Broker ----------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Broker {
    topics: RwLock<HashMap<String, HashMap<SessionId, Outbox>>>,
}

// -----------------------------------------------------------------------------
// ----- Broker: Public --------------------------------------------------------

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: &str, session: &SessionId, outbox: Outbox) {
        self.topics
            .write()
            .entry(topic.to_string())
            .or_default()
            .insert(session.clone(), outbox);
    }

    pub fn unsubscribe(&self, topic: &str, session: &SessionId) {
        let mut topics = self.topics.write();

        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.remove(session);
            if subscribers.is_empty() {
                topics.remove(topic);
            }
        }
    }

    pub fn remove_session(&self, session: &SessionId) {
        let mut topics = self.topics.write();
        topics.retain(|_, subscribers| {
            subscribers.remove(session);
            !subscribers.is_empty()
        });
    }

    /// Sends an EVENT to every admitted subscriber of `topic`. Returns how
    /// many sessions it was queued for.
    pub fn publish(&self, topic: &str, event: Value, audience: &Audience) -> usize {
        let topics = self.topics.read();

        let Some(subscribers) = topics.get(topic) else {
            trace!("no subscribers for {topic}");
            return 0;
        };

        let mut delivered = 0;
        for (session, outbox) in subscribers {
            if !audience.admits(session) {
                continue;
            }

            let message = WampMessage::Event {
                topic: topic.to_string(),
                event: event.clone(),
            };

            if outbox.send(message) {
                delivered += 1;
            }
        }

        delivered
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, HashMap::len)
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::outbox::Outbound;
    use serde_json::json;

    fn subscriber(
        broker: &Broker,
        topic: &str,
    ) -> (SessionId, tokio::sync::mpsc::UnboundedReceiver<Outbound>) {
        let session = SessionId::random();
        let (outbox, rx) = Outbox::channel();
        broker.subscribe(topic, &session, outbox);
        (session, rx)
    }

    fn next_event(
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<Outbound>,
    ) -> Option<WampMessage> {
        match rx.try_recv() {
            Ok(Outbound::Message(message)) => Some(message),
            _ => None,
        }
    }

    #[test]
    fn delivers_only_to_topic_subscribers() {
        let broker = Broker::new();
        let (_a, mut rx_a) = subscriber(&broker, "t1");
        let (_b, mut rx_b) = subscriber(&broker, "t2");

        assert_eq!(broker.publish("t1", json!("[1]"), &Audience::everyone()), 1);

        assert_eq!(
            next_event(&mut rx_a),
            Some(WampMessage::Event {
                topic: "t1".into(),
                event: json!("[1]"),
            })
        );
        assert_eq!(next_event(&mut rx_b), None);
    }

    #[test]
    fn audience_filters() {
        let broker = Broker::new();
        let (a, mut rx_a) = subscriber(&broker, "t");
        let (_b, mut rx_b) = subscriber(&broker, "t");

        assert_eq!(broker.publish("t", json!(1), &Audience::everyone_but(&a)), 1);
        assert!(next_event(&mut rx_a).is_none());
        assert!(next_event(&mut rx_b).is_some());

        let audience = Audience {
            exclude: vec![],
            eligible: Some(vec![a.to_string()]),
        };
        assert_eq!(broker.publish("t", json!(2), &audience), 1);
        assert!(next_event(&mut rx_a).is_some());
        assert!(next_event(&mut rx_b).is_none());
    }

    #[test]
    fn unsubscribe_and_session_removal() {
        let broker = Broker::new();
        let (a, _rx_a) = subscriber(&broker, "t");
        let (b, _rx_b) = subscriber(&broker, "t");
        assert_eq!(broker.subscriber_count("t"), 2);

        broker.unsubscribe("t", &a);
        assert_eq!(broker.subscriber_count("t"), 1);

        broker.remove_session(&b);
        assert_eq!(broker.subscriber_count("t"), 0);
        assert_eq!(broker.publish("t", json!(1), &Audience::everyone()), 0);
    }

    #[test]
    fn closed_outbox_is_not_counted() {
        let broker = Broker::new();
        let (_a, rx_a) = subscriber(&broker, "t");
        drop(rx_a);
        assert_eq!(broker.publish("t", json!(1), &Audience::everyone()), 0);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
