use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::SignalStream;
use crate::errors::GatewayError;
use crate::pubsub::{Audience, Broker};
use crate::shared_types::{hash_id, to_json_text};

use super::resolver::ProxyResolver;

/// `[bus, sender, object, interface, signal]`
const REGISTER_FIELDS: usize = 5;

// -----------------------------------------------------------------------------
// ----- SignalSubscription ----------------------------------------------------

/// One live bus signal handler. Dropping it detaches the handler.
#[derive(Debug)]
pub struct SignalSubscription {
    topic: String,
    forwarder: JoinHandle<()>,
}

impl Drop for SignalSubscription {
    fn drop(&mut self) {
        self.forwarder.abort();
        debug!("detached signal {}", self.topic);
    }
}

// -----------------------------------------------------------------------------
// ----- SignalDispatcher ------------------------------------------------------

/// Process-wide signal subscriptions keyed by `(sender, object, interface,
/// signal)`. The key is also the topic the signal's payloads are published
/// under.
pub struct SignalDispatcher {
    broker: Arc<Broker>,
    subscriptions: Mutex<HashMap<String, SignalSubscription>>,
}

// -----------------------------------------------------------------------------
// ----- SignalDispatcher: Static ----------------------------------------------

impl SignalDispatcher {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self {
            broker,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- SignalDispatcher: Public ----------------------------------------------

impl SignalDispatcher {
    /// Returns the topic id. Registering an identity that already has a live
    /// subscription returns the same id and wires nothing new.
    pub async fn register(
        &self,
        resolver: &mut ProxyResolver,
        fields: &[String],
    ) -> Result<String, GatewayError> {
        if fields.len() < REGISTER_FIELDS {
            return Err(GatewayError::argument(format!(
                "dbusRegister expects {REGISTER_FIELDS} fields \
                 [bus, sender, object, interface, signal], got {}",
                fields.len()
            )));
        }

        let (bus_name, sender, object, interface, signal) =
            (&fields[0], &fields[1], &fields[2], &fields[3], &fields[4]);

        let topic = hash_id(&[sender, object, interface, signal])?;

        // Held until the new subscription is stored, so concurrent
        // registrations of one identity wire the bus once.
        let mut subscriptions = self.subscriptions.lock().await;

        if subscriptions.contains_key(&topic) {
            debug!("signal {topic} already registered");
            return Ok(topic);
        }

        let proxy = resolver.resolve_object(bus_name, sender, object).await?;
        let signals = proxy.subscribe(interface, signal).await?;

        let forwarder = spawn_forwarder(self.broker.clone(), topic.clone(), signals);
        subscriptions.insert(
            topic.clone(),
            SignalSubscription {
                topic: topic.clone(),
                forwarder,
            },
        );

        info!("registered signal {topic}");
        Ok(topic)
    }

    /// Detaches every bus signal handler.
    pub async fn reset(&self) {
        let mut subscriptions = self.subscriptions.lock().await;
        if !subscriptions.is_empty() {
            info!("dropping {} signal subscription(s)", subscriptions.len());
        }
        subscriptions.clear();
    }

    pub async fn len(&self) -> usize {
        self.subscriptions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn spawn_forwarder(broker: Arc<Broker>, topic: String, mut signals: SignalStream) -> JoinHandle<()> {
    tokio::spawn(async move {
        // One signal at a time: bus emission order is publish order.
        while let Some(args) = signals.next().await {
            let payload = match to_json_text(&args) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("cannot serialize signal {topic}: {e}");
                    continue;
                }
            };

            let delivered = broker.publish(&topic, Value::String(payload), &Audience::everyone());
            debug!("signal {topic} delivered to {delivered} session(s)");
        }

        debug!("signal stream for {topic} ended");
    })
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
