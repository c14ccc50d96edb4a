use std::sync::Arc;

use crate::errors::GatewayError;

use super::calls::{AsyncCallManager, Deferred};
use super::process_cache::ProcessCache;
use super::resolver::ProxyResolver;

// -----------------------------------------------------------------------------
// ----- GatewaySession --------------------------------------------------------

/// The RPC surface of one authenticated client. Created by the session gate
/// on successful authentication and dropped with the connection.
pub struct GatewaySession {
    cache: Arc<ProcessCache>,
    resolver: ProxyResolver,
    calls: AsyncCallManager,
}

impl GatewaySession {
    pub fn new(cache: Arc<ProcessCache>) -> Self {
        Self {
            resolver: ProxyResolver::new(cache.connections().clone()),
            calls: AsyncCallManager::new(),
            cache,
        }
    }

    /// `dbusRegister`: returns the topic id of the signal.
    pub async fn register(&mut self, fields: &[String]) -> Result<String, GatewayError> {
        self.cache
            .signals()
            .register(&mut self.resolver, fields)
            .await
    }

    /// `dbusSend`: starts the call and hands back its pending reply.
    pub async fn send(&mut self, fields: &[String]) -> Result<Deferred, GatewayError> {
        self.calls.send(&mut self.resolver, fields).await
    }

    pub fn resolver(&self) -> &ProxyResolver {
        &self.resolver
    }

    pub fn calls(&self) -> &AsyncCallManager {
        &self.calls
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MockBus;
    use crate::pubsub::Broker;

    fn fields(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn register_and_send_share_the_session_resolver() {
        let bus = MockBus::new();
        let cache = ProcessCache::init(bus.connector(), Arc::new(Broker::new()));
        let mut session = GatewaySession::new(cache);

        session
            .register(&fields(&["system", "org.ofono", "/", "org.ofono.Manager", "ModemAdded"]))
            .await
            .unwrap();
        let reply = session
            .send(&fields(&["system", "org.ofono", "/", "org.ofono.Manager", "GetModems"]))
            .await
            .unwrap();

        assert_eq!(reply.wait().await.unwrap(), "[]");
        assert_eq!(session.resolver().object_count(), 1);
        assert_eq!(session.resolver().method_count(), 1);
        assert_eq!(session.calls().pending_len(), 1);
        assert_eq!(bus.objects_created(), 1);
    }

    #[tokio::test]
    async fn registration_is_shared_across_sessions() {
        let bus = MockBus::new();
        let cache = ProcessCache::init(bus.connector(), Arc::new(Broker::new()));
        let mut first = GatewaySession::new(cache.clone());
        let mut second = GatewaySession::new(cache.clone());

        let signal = fields(&["session", "org.example", "/", "org.example.I", "Changed"]);
        let a = first.register(&signal).await.unwrap();
        let b = second.register(&signal).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(bus.subscriptions_created(), 1);
        // The second session never had to resolve the object.
        assert_eq!(second.resolver().object_count(), 0);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
