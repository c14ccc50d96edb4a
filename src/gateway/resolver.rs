use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::bus::{ProxyMethod, ProxyObject};
use crate::errors::GatewayError;
use crate::shared_types::hash_id;

use super::connection_cache::BusConnectionCache;

// -----------------------------------------------------------------------------
// ----- ProxyResolver ---------------------------------------------------------

/// Per-session cache of object and method proxies.
///
/// Object keys are `(service, object)` and method keys
/// `(service, object, interface, method)`. The bus name is not part of either
/// key, so the first bus a target was resolved on wins for the session.
pub struct ProxyResolver {
    connections: Arc<BusConnectionCache>,
    objects: HashMap<String, Arc<dyn ProxyObject>>,
    methods: HashMap<String, Arc<dyn ProxyMethod>>,
}

// -----------------------------------------------------------------------------
// ----- ProxyResolver: Static -------------------------------------------------

impl ProxyResolver {
    pub fn new(connections: Arc<BusConnectionCache>) -> Self {
        Self {
            connections,
            objects: HashMap::new(),
            methods: HashMap::new(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ProxyResolver: Public -------------------------------------------------

impl ProxyResolver {
    pub async fn resolve_object(
        &mut self,
        bus_name: &str,
        service: &str,
        object: &str,
    ) -> Result<Arc<dyn ProxyObject>, GatewayError> {
        let key = hash_id(&[service, object])?;

        if let Some(proxy) = self.objects.get(&key) {
            return Ok(proxy.clone());
        }

        let conn = self.connections.get_or_create(bus_name).await?;
        let proxy = conn.object(service, object);
        debug!("new object proxy {key}");

        self.objects.insert(key, proxy.clone());
        Ok(proxy)
    }

    pub async fn resolve_method(
        &mut self,
        bus_name: &str,
        service: &str,
        object: &str,
        interface: &str,
        method: &str,
    ) -> Result<Arc<dyn ProxyMethod>, GatewayError> {
        let key = hash_id(&[service, object, interface, method])?;

        if let Some(bound) = self.methods.get(&key) {
            return Ok(bound.clone());
        }

        let proxy = self.resolve_object(bus_name, service, object).await?;
        let bound = proxy.method(interface, method);
        debug!("new method proxy {key}");

        self.methods.insert(key, bound.clone());
        Ok(bound)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
