//! The bridging core: bus connection cache, per-session proxy resolution,
//! process-wide signal subscriptions and per-session call tracking.

pub mod calls;
pub mod connection_cache;
pub mod process_cache;
pub mod resolver;
pub mod session;
pub mod signals;

pub use calls::{AsyncCallManager, Deferred, PendingCall};
pub use connection_cache::BusConnectionCache;
pub use process_cache::{CacheStats, ProcessCache};
pub use resolver::ProxyResolver;
pub use session::GatewaySession;
pub use signals::{SignalDispatcher, SignalSubscription};
