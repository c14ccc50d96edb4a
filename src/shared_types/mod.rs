pub mod bus_kind;
pub mod hash_id;
pub mod json_text;
pub mod session_id;
pub mod session_stage;

pub use bus_kind::BusKind;
pub use hash_id::hash_id;
pub use json_text::to_json_text;
pub use session_id::SessionId;
pub use session_stage::SessionStage;
