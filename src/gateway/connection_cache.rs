use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::bus::{BusConnection, BusConnector};
use crate::errors::GatewayError;
use crate::shared_types::BusKind;

// -----------------------------------------------------------------------------
// ----- BusConnectionCache ----------------------------------------------------

/// Process-wide map from bus name to its live connection. A connection is
/// opened on first reference and kept until [`BusConnectionCache::reset`].
pub struct BusConnectionCache {
    connector: Arc<dyn BusConnector>,
    connections: Mutex<HashMap<BusKind, Arc<dyn BusConnection>>>,
}

// -----------------------------------------------------------------------------
// ----- BusConnectionCache: Static --------------------------------------------

impl BusConnectionCache {
    pub fn new(connector: Arc<dyn BusConnector>) -> Self {
        Self {
            connector,
            connections: Mutex::new(HashMap::with_capacity(2)),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- BusConnectionCache: Public --------------------------------------------

impl BusConnectionCache {
    /// `bus_name` must be `"session"` or `"system"`.
    pub async fn get_or_create(
        &self,
        bus_name: &str,
    ) -> Result<Arc<dyn BusConnection>, GatewayError> {
        let bus: BusKind = bus_name.parse()?;

        // Held across connect so two callers never open the same bus twice.
        let mut connections = self.connections.lock().await;

        if let Some(conn) = connections.get(&bus) {
            return Ok(conn.clone());
        }

        let conn = self.connector.connect(bus).await?;
        connections.insert(bus, conn.clone());
        debug!("cached connection to the {bus} bus");

        Ok(conn)
    }

    /// Drops every cached connection. Connections close once the last
    /// handle to them goes away.
    pub async fn reset(&self) {
        let mut connections = self.connections.lock().await;
        if !connections.is_empty() {
            info!("closing {} bus connection(s)", connections.len());
        }
        connections.clear();
    }

    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MockBus;

    #[tokio::test]
    async fn opens_each_bus_once() {
        let bus = MockBus::new();
        let cache = BusConnectionCache::new(bus.connector());

        let a = cache.get_or_create("session").await.unwrap();
        let b = cache.get_or_create("session").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(bus.connections_opened(), 1);

        let system = cache.get_or_create("system").await.unwrap();
        assert_eq!(system.bus(), BusKind::System);
        assert_eq!(bus.connections_opened(), 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn invalid_bus_name() {
        let bus = MockBus::new();
        let cache = BusConnectionCache::new(bus.connector());

        let err = cache.get_or_create("starter").await.err().unwrap();
        assert_eq!(err, GatewayError::InvalidBus("starter".into()));
        assert_eq!(bus.connections_opened(), 0);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn failed_connect_is_not_cached() {
        let bus = MockBus::new();
        bus.refuse_connections(BusKind::System);
        let cache = BusConnectionCache::new(bus.connector());

        assert!(matches!(
            cache.get_or_create("system").await,
            Err(GatewayError::Bus(_))
        ));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn reset_forces_reconnect() {
        let bus = MockBus::new();
        let cache = BusConnectionCache::new(bus.connector());

        cache.get_or_create("session").await.unwrap();
        cache.reset().await;
        assert!(cache.is_empty().await);

        cache.get_or_create("session").await.unwrap();
        assert_eq!(bus.connections_opened(), 2);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
