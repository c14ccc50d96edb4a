//! WAMP v1 framing carried in WebSocket text messages, plus the
//! challenge-response authentication helpers.

pub mod cra;
pub mod message;
pub mod message_type;
pub mod prefixes;
pub mod uri;

pub use message::WampMessage;
pub use message_type::MessageType;
pub use prefixes::PrefixMap;
