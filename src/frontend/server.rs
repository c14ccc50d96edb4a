use std::future::{Future, pending};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket};
use tracing::{error, info};

use crate::bus::BusConnector;
use crate::config::CredentialsConfig;
use crate::gateway::ProcessCache;
use crate::pubsub::Broker;

use super::connection::FrontendConnection;
use super::registry::SessionRegistry;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const LISTEN_BACKLOG: u32 = 1024;

// -----------------------------------------------------------------------------
// ----- ServerState -----------------------------------------------------------

/// Shared by every connection task.
pub(crate) struct ServerState {
    pub(crate) cache: Arc<ProcessCache>,
    pub(crate) broker: Arc<Broker>,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) credentials: CredentialsConfig,
}

// -----------------------------------------------------------------------------
// ----- Server ----------------------------------------------------------------

pub struct Server {
    listener: TcpListener,
    state: Arc<ServerState>,
}

// -----------------------------------------------------------------------------
// ----- Server: Static --------------------------------------------------------

impl Server {
    /// Binds the WebSocket listener. Must run inside a tokio runtime.
    pub fn bind(
        addr: SocketAddr,
        connector: Arc<dyn BusConnector>,
        credentials: CredentialsConfig,
    ) -> io::Result<Self> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };

        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(LISTEN_BACKLOG)?;

        let broker = Arc::new(Broker::new());
        let cache = ProcessCache::init(connector, broker.clone());
        let registry = Arc::new(SessionRegistry::new(cache.clone()));

        Ok(Self {
            listener,
            state: Arc::new(ServerState {
                cache,
                broker,
                registry,
                credentials,
            }),
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Server: Public --------------------------------------------------------

impl Server {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn process_cache(&self) -> Arc<ProcessCache> {
        self.state.cache.clone()
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        self.state.registry.clone()
    }

    pub async fn run(self) -> io::Result<()> {
        self.run_until(pending::<()>()).await
    }

    /// Accepts connections until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future,
    {
        let addr = self.local_addr()?;
        info!("ws://{addr} ready");

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("listener on {addr} stopped");
                    break;
                }

                accept_res = self.listener.accept() => {
                    let (stream, peer) = match accept_res {
                        Ok(v) => v,
                        Err(e) => { error!("accept error: {e}"); continue; }
                    };

                    let _ = stream.set_nodelay(true);

                    let conn = FrontendConnection::new(peer, self.state.clone());
                    tokio::spawn(async move {
                        if let Err(e) = conn.serve(stream).await {
                            error!("client {peer} error: {e}");
                        }
                    });
                }
            }
        }

        Ok(())
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
