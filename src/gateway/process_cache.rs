use std::sync::Arc;

use tracing::info;

use crate::bus::BusConnector;
use crate::pubsub::Broker;

use super::connection_cache::BusConnectionCache;
use super::signals::SignalDispatcher;

// -----------------------------------------------------------------------------
// ----- ProcessCache ----------------------------------------------------------

/// State shared by every authenticated session: the bus connections and the
/// signal subscriptions. Owned by the server and reset only when the last
/// authenticated session closes.
pub struct ProcessCache {
    connections: Arc<BusConnectionCache>,
    signals: SignalDispatcher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub connections: usize,
    pub subscriptions: usize,
}

// -----------------------------------------------------------------------------
// ----- ProcessCache: Static --------------------------------------------------

impl ProcessCache {
    pub fn init(connector: Arc<dyn BusConnector>, broker: Arc<Broker>) -> Arc<Self> {
        Arc::new(Self {
            connections: Arc::new(BusConnectionCache::new(connector)),
            signals: SignalDispatcher::new(broker),
        })
    }
}

// -----------------------------------------------------------------------------
// ----- ProcessCache: Public --------------------------------------------------

impl ProcessCache {
    pub fn connections(&self) -> &Arc<BusConnectionCache> {
        &self.connections
    }

    pub fn signals(&self) -> &SignalDispatcher {
        &self.signals
    }

    /// Subscriptions go first so no handler outlives its connection.
    pub async fn reset(&self) {
        self.signals.reset().await;
        self.connections.reset().await;
        info!("process cache cleared");
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            connections: self.connections.len().await,
            subscriptions: self.signals.len().await,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MockBus;
    use crate::gateway::resolver::ProxyResolver;

    #[tokio::test]
    async fn reset_clears_everything() {
        let bus = MockBus::new();
        let cache = ProcessCache::init(bus.connector(), Arc::new(Broker::new()));
        let mut resolver = ProxyResolver::new(cache.connections().clone());

        let fields: Vec<String> = ["session", "org.example", "/", "org.example.I", "Changed"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        cache.signals().register(&mut resolver, &fields).await.unwrap();
        cache.connections().get_or_create("system").await.unwrap();

        assert_eq!(
            cache.stats().await,
            CacheStats {
                connections: 2,
                subscriptions: 1,
            }
        );

        cache.reset().await;
        assert_eq!(
            cache.stats().await,
            CacheStats {
                connections: 0,
                subscriptions: 0,
            }
        );
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
