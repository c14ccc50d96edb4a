use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{StreamExt, future};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use zbus::fdo::IntrospectableProxy;
use zbus::proxy::{Builder as ProxyBuilder, CacheProperties};
use zbus::{Connection, Proxy};
use zbus_xml::{ArgDirection, Node};

use crate::errors::GatewayError;
use crate::shared_types::BusKind;

use super::json::{args_for_signature, args_to_structure, message_to_json};
use super::{BusConnection, BusConnector, ProxyMethod, ProxyObject, SignalStream};

/// Input types of each introspected method, keyed by `(interface, method)`.
type MethodTypes = HashMap<(String, String), Vec<String>>;

// -----------------------------------------------------------------------------
// ----- DbusConnector ---------------------------------------------------------

/// Opens real D-Bus connections through zbus.
#[derive(Debug, Default, Clone, Copy)]
pub struct DbusConnector;

#[async_trait]
impl BusConnector for DbusConnector {
    async fn connect(&self, bus: BusKind) -> Result<Arc<dyn BusConnection>, GatewayError> {
        let conn = match bus {
            BusKind::Session => Connection::session().await,
            BusKind::System => Connection::system().await,
        }
        .map_err(|e| GatewayError::bus(format!("cannot connect to the {bus} bus: {e}")))?;

        debug!("connected to the {bus} bus");

        Ok(Arc::new(DbusConnection { bus, conn }))
    }
}

// -----------------------------------------------------------------------------
// ----- DbusConnection --------------------------------------------------------

struct DbusConnection {
    bus: BusKind,
    conn: Connection,
}

impl BusConnection for DbusConnection {
    fn bus(&self) -> BusKind {
        self.bus
    }

    fn object(&self, service: &str, path: &str) -> Arc<dyn ProxyObject> {
        Arc::new(DbusObject {
            target: Arc::new(ObjectTarget {
                conn: self.conn.clone(),
                service: service.to_string(),
                path: path.to_string(),
                methods: OnceCell::new(),
            }),
        })
    }
}

// -----------------------------------------------------------------------------
// ----- ObjectTarget ----------------------------------------------------------

/// One remote object, shared by its proxy and every method bound on it.
struct ObjectTarget {
    conn: Connection,
    service: String,
    path: String,

    /// Filled by the first call. Objects that cannot be introspected keep an
    /// empty table and their calls fall back to guessed argument types.
    methods: OnceCell<MethodTypes>,
}

impl ObjectTarget {
    async fn in_types(&self, interface: &str, method: &str) -> Option<&[String]> {
        let methods = self
            .methods
            .get_or_init(|| async {
                match self.introspect().await {
                    Ok(methods) => methods,
                    Err(e) => {
                        debug!("{}{} is not introspectable: {e}", self.service, self.path);
                        MethodTypes::new()
                    }
                }
            })
            .await;

        methods
            .get(&(interface.to_string(), method.to_string()))
            .map(Vec::as_slice)
    }

    async fn introspect(&self) -> Result<MethodTypes, GatewayError> {
        let proxy = IntrospectableProxy::builder(&self.conn)
            .destination(self.service.as_str())
            .and_then(|b| b.path(self.path.as_str()))
            .map_err(|e| GatewayError::bus(e.to_string()))?
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(|e| GatewayError::bus(e.to_string()))?;

        let xml = proxy
            .introspect()
            .await
            .map_err(|e| GatewayError::bus(e.to_string()))?;

        method_types(&xml)
    }
}

// -----------------------------------------------------------------------------
// ----- DbusObject ------------------------------------------------------------

struct DbusObject {
    target: Arc<ObjectTarget>,
}

#[async_trait]
impl ProxyObject for DbusObject {
    fn service(&self) -> &str {
        &self.target.service
    }

    fn path(&self) -> &str {
        &self.target.path
    }

    fn method(&self, interface: &str, method: &str) -> Arc<dyn ProxyMethod> {
        Arc::new(DbusMethod {
            target: self.target.clone(),
            interface: interface.to_string(),
            method: method.to_string(),
        })
    }

    /// Signals are matched on the current owner of the service name, so two
    /// services never see each other's emissions.
    async fn subscribe(
        &self,
        interface: &str,
        signal: &str,
    ) -> Result<SignalStream, GatewayError> {
        let invalid = |e: zbus::Error| GatewayError::bus(format!("invalid signal match: {e}"));

        let proxy: Proxy<'static> = ProxyBuilder::new(&self.target.conn)
            .destination(self.target.service.clone())
            .and_then(|b| b.path(self.target.path.clone()))
            .and_then(|b| b.interface(interface.to_string()))
            .map_err(invalid)?
            .cache_properties(CacheProperties::No)
            .build()
            .await
            .map_err(invalid)?;

        let stream = proxy
            .receive_signal(signal.to_string())
            .await
            .map_err(|e| GatewayError::bus(format!("cannot attach signal handler: {e}")))?;

        let signals = stream.filter_map(move |message| {
            // The proxy lives as long as the subscription.
            let _owner = &proxy;

            future::ready(match message_to_json(&message) {
                Ok(args) => Some(args),
                Err(e) => {
                    warn!("dropping signal with unsupported body: {e}");
                    None
                }
            })
        });

        Ok(signals.boxed())
    }
}

// -----------------------------------------------------------------------------
// ----- DbusMethod ------------------------------------------------------------

struct DbusMethod {
    target: Arc<ObjectTarget>,
    interface: String,
    method: String,
}

#[async_trait]
impl ProxyMethod for DbusMethod {
    async fn invoke(&self, args: Vec<Value>) -> Result<Vec<Value>, GatewayError> {
        let body = match self.target.in_types(&self.interface, &self.method).await {
            Some(in_types) => args_for_signature(&args, in_types)?,
            None => args_to_structure(&args)?,
        };

        let conn = &self.target.conn;
        let destination = Some(self.target.service.as_str());
        let path = self.target.path.as_str();
        let interface = Some(self.interface.as_str());
        let method = self.method.as_str();

        let reply = match &body {
            Some(body) => {
                conn.call_method(destination, path, interface, method, body)
                    .await
            }
            None => conn.call_method(destination, path, interface, method, &()).await,
        };

        match reply {
            Ok(message) => message_to_json(&message),
            Err(zbus::Error::MethodError(name, description, _)) => Err(GatewayError::RemoteCall(
                description.unwrap_or_else(|| name.to_string()),
            )),
            Err(e) => Err(GatewayError::RemoteCall(e.to_string())),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

/// Method input types from introspection XML. Arguments without a direction
/// are inputs.
fn method_types(xml: &str) -> Result<MethodTypes, GatewayError> {
    let node = Node::from_reader(xml.as_bytes())
        .map_err(|e| GatewayError::bus(format!("malformed introspection data: {e}")))?;

    let mut methods = MethodTypes::new();
    for interface in node.interfaces() {
        for method in interface.methods() {
            let in_types = method
                .args()
                .iter()
                .filter(|arg| !matches!(arg.direction(), Some(ArgDirection::Out)))
                .map(|arg| arg.ty().to_string())
                .collect();

            methods.insert(
                (interface.name().to_string(), method.name().to_string()),
                in_types,
            );
        }
    }

    Ok(methods)
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const NOTIFICATIONS_XML: &str = r#"
<!DOCTYPE node PUBLIC "-//freedesktop//DTD D-BUS Object Introspection 1.0//EN"
 "http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd">
<node>
  <interface name="org.freedesktop.Notifications">
    <method name="Notify">
      <arg type="s" name="app_name" direction="in"/>
      <arg type="u" name="replaces_id" direction="in"/>
      <arg type="s" name="app_icon" direction="in"/>
      <arg type="s" name="summary" direction="in"/>
      <arg type="s" name="body" direction="in"/>
      <arg type="as" name="actions" direction="in"/>
      <arg type="a{sv}" name="hints" direction="in"/>
      <arg type="i" name="expire_timeout" direction="in"/>
      <arg type="u" name="id" direction="out"/>
    </method>
    <method name="GetServerInformation">
      <arg type="s" name="name" direction="out"/>
    </method>
    <signal name="NotificationClosed">
      <arg type="u" name="id"/>
      <arg type="u" name="reason"/>
    </signal>
  </interface>
  <interface name="org.ofono.Modem">
    <method name="SetProperty">
      <arg type="s"/>
      <arg type="v"/>
    </method>
  </interface>
</node>
"#;

    fn key(interface: &str, method: &str) -> (String, String) {
        (interface.to_string(), method.to_string())
    }

    #[test]
    fn introspection_yields_input_types_only() {
        let methods = method_types(NOTIFICATIONS_XML).unwrap();

        assert_eq!(
            methods[&key("org.freedesktop.Notifications", "Notify")],
            vec!["s", "u", "s", "s", "s", "as", "a{sv}", "i"]
        );
        assert!(methods[&key("org.freedesktop.Notifications", "GetServerInformation")].is_empty());
        assert_eq!(methods[&key("org.ofono.Modem", "SetProperty")], vec!["s", "v"]);
        assert!(!methods.contains_key(&key("org.freedesktop.Notifications", "NotificationClosed")));
    }

    #[test]
    fn malformed_introspection_is_a_bus_error() {
        assert!(matches!(
            method_types("<node><interface"),
            Err(GatewayError::Bus(_))
        ));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
