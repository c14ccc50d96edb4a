//! In-memory bus used by tests and local demos. It counts every connection,
//! proxy, binding and subscription it hands out, lets callers emit signals,
//! and replies to method calls from a script (echoing the arguments by
//! default).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{Notify, mpsc};

use crate::errors::GatewayError;
use crate::shared_types::{BusKind, hash_id};

use super::{BusConnection, BusConnector, ProxyMethod, ProxyObject, SignalStream};

// -----------------------------------------------------------------------------
// ----- MockReply -------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum MockReply {
    Values(Vec<Value>),
    Error(String),
    /// Waits for the gate to be notified, then replies with the values.
    Gated(Arc<Notify>, Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub bus: BusKind,
    pub service: String,
    pub path: String,
    pub interface: String,
    pub method: String,
    pub args: Vec<Value>,
}

// -----------------------------------------------------------------------------
// ----- MockBus ---------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MockBus {
    state: Arc<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    connections: AtomicUsize,
    objects: AtomicUsize,
    methods: AtomicUsize,
    subscriptions: AtomicUsize,
    refused: Mutex<HashSet<BusKind>>,
    listeners: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Vec<Value>>>>>,
    replies: Mutex<HashMap<String, MockReply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

// -----------------------------------------------------------------------------
// ----- MockBus: Static -------------------------------------------------------

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }
}

// -----------------------------------------------------------------------------
// ----- MockBus: Public -------------------------------------------------------

impl MockBus {
    pub fn connector(&self) -> Arc<dyn BusConnector> {
        Arc::new(self.clone())
    }

    pub fn connections_opened(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn objects_created(&self) -> usize {
        self.state.objects.load(Ordering::SeqCst)
    }

    pub fn methods_bound(&self) -> usize {
        self.state.methods.load(Ordering::SeqCst)
    }

    pub fn subscriptions_created(&self) -> usize {
        self.state.subscriptions.load(Ordering::SeqCst)
    }

    pub fn refuse_connections(&self, bus: BusKind) {
        self.state.refused.lock().insert(bus);
    }

    pub fn reply_with(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        method: &str,
        reply: MockReply,
    ) {
        let key = member_key(service, path, interface, method);
        self.state.replies.lock().insert(key, reply);
    }

    /// Emits a signal to every live handler. Returns how many received it.
    pub fn emit(
        &self,
        service: &str,
        path: &str,
        interface: &str,
        signal: &str,
        args: Vec<Value>,
    ) -> usize {
        let key = member_key(service, path, interface, signal);
        let mut listeners = self.state.listeners.lock();

        let Some(senders) = listeners.get_mut(&key) else {
            return 0;
        };

        senders.retain(|tx| tx.send(args.clone()).is_ok());
        senders.len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().clone()
    }
}

#[async_trait]
impl BusConnector for MockBus {
    async fn connect(&self, bus: BusKind) -> Result<Arc<dyn BusConnection>, GatewayError> {
        if self.state.refused.lock().contains(&bus) {
            return Err(GatewayError::bus(format!("{bus} bus unavailable")));
        }

        self.state.connections.fetch_add(1, Ordering::SeqCst);

        Ok(Arc::new(MockConnection {
            bus,
            state: self.state.clone(),
        }))
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Proxies -----------------------------------------------------

struct MockConnection {
    bus: BusKind,
    state: Arc<MockState>,
}

impl BusConnection for MockConnection {
    fn bus(&self) -> BusKind {
        self.bus
    }

    fn object(&self, service: &str, path: &str) -> Arc<dyn ProxyObject> {
        self.state.objects.fetch_add(1, Ordering::SeqCst);

        Arc::new(MockObject {
            bus: self.bus,
            service: service.to_string(),
            path: path.to_string(),
            state: self.state.clone(),
        })
    }
}

struct MockObject {
    bus: BusKind,
    service: String,
    path: String,
    state: Arc<MockState>,
}

#[async_trait]
impl ProxyObject for MockObject {
    fn service(&self) -> &str {
        &self.service
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn method(&self, interface: &str, method: &str) -> Arc<dyn ProxyMethod> {
        self.state.methods.fetch_add(1, Ordering::SeqCst);

        Arc::new(MockMethod {
            bus: self.bus,
            service: self.service.clone(),
            path: self.path.clone(),
            interface: interface.to_string(),
            method: method.to_string(),
            state: self.state.clone(),
        })
    }

    async fn subscribe(
        &self,
        interface: &str,
        signal: &str,
    ) -> Result<SignalStream, GatewayError> {
        self.state.subscriptions.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::unbounded_channel();
        let key = member_key(&self.service, &self.path, interface, signal);
        self.state.listeners.lock().entry(key).or_default().push(tx);

        let signals = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|args| (args, rx))
        });

        Ok(signals.boxed())
    }
}

struct MockMethod {
    bus: BusKind,
    service: String,
    path: String,
    interface: String,
    method: String,
    state: Arc<MockState>,
}

#[async_trait]
impl ProxyMethod for MockMethod {
    async fn invoke(&self, args: Vec<Value>) -> Result<Vec<Value>, GatewayError> {
        self.state.calls.lock().push(RecordedCall {
            bus: self.bus,
            service: self.service.clone(),
            path: self.path.clone(),
            interface: self.interface.clone(),
            method: self.method.clone(),
            args: args.clone(),
        });

        let key = member_key(&self.service, &self.path, &self.interface, &self.method);
        let reply = self.state.replies.lock().get(&key).cloned();

        match reply {
            None => Ok(args),
            Some(MockReply::Values(values)) => Ok(values),
            Some(MockReply::Error(message)) => Err(GatewayError::RemoteCall(message)),
            Some(MockReply::Gated(gate, values)) => {
                gate.notified().await;
                Ok(values)
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn member_key(service: &str, path: &str, interface: &str, member: &str) -> String {
    // Four non-empty parts; hash_id cannot fail here.
    hash_id(&[service, path, interface, member]).unwrap_or_default()
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
