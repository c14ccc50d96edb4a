//! The message-bus collaborator seam.
//!
//! The gateway never speaks the bus wire protocol itself. It consumes four
//! small traits: a connector that opens one connection per [`BusKind`], a
//! connection that hands out object proxies, an object proxy that binds
//! methods and attaches signal handlers, and a method proxy with a uniform
//! `invoke(args) -> values` call. Values cross the seam as JSON.

pub mod dbus;
pub mod json;
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::Value;

use crate::errors::GatewayError;
use crate::shared_types::BusKind;

pub use dbus::DbusConnector;
pub use mock::MockBus;

/// Positional argument values of each emitted signal, in bus delivery order.
pub type SignalStream = BoxStream<'static, Vec<Value>>;

// -----------------------------------------------------------------------------
// ----- Traits ----------------------------------------------------------------

#[async_trait]
pub trait BusConnector: Send + Sync + 'static {
    async fn connect(&self, bus: BusKind) -> Result<Arc<dyn BusConnection>, GatewayError>;
}

pub trait BusConnection: Send + Sync {
    fn bus(&self) -> BusKind;

    /// Local handle for a remote object. Nothing is validated on the bus.
    fn object(&self, service: &str, path: &str) -> Arc<dyn ProxyObject>;
}

#[async_trait]
pub trait ProxyObject: Send + Sync {
    fn service(&self) -> &str;

    fn path(&self) -> &str;

    /// Binds a method by name. Nothing is validated on the bus.
    fn method(&self, interface: &str, method: &str) -> Arc<dyn ProxyMethod>;

    /// Attaches a handler for one signal of this object. The stream ends
    /// when the subscription is dropped.
    async fn subscribe(&self, interface: &str, signal: &str)
    -> Result<SignalStream, GatewayError>;
}

#[async_trait]
pub trait ProxyMethod: Send + Sync {
    /// Invokes the remote method. A bus-reported failure comes back as
    /// [`GatewayError::RemoteCall`] carrying the remote message.
    async fn invoke(&self, args: Vec<Value>) -> Result<Vec<Value>, GatewayError>;
}
