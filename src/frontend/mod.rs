pub mod connection;
pub mod outbox;
pub mod registry;
pub mod server;

pub(crate) mod context;
pub(crate) mod handlers;

pub use connection::FrontendConnection;
pub use outbox::{Outbound, Outbox};
pub use registry::SessionRegistry;
pub use server::Server;
