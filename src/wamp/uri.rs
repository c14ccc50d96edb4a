// -----------------------------------------------------------------------------
// ----- Well-known URIs -------------------------------------------------------

pub const WAMP_BASE: &str = "http://api.wamp.ws/";

pub const PROCEDURE_AUTHREQ: &str = "http://api.wamp.ws/procedure#authreq";
pub const PROCEDURE_AUTH: &str = "http://api.wamp.ws/procedure#auth";

pub const ERROR_GENERIC: &str = "http://api.wamp.ws/error#generic";
pub const ERROR_INTERNAL: &str = "http://api.wamp.ws/error#internal";
pub const ERROR_NO_SUCH_RPC_ENDPOINT: &str = "http://api.wamp.ws/error#no-such-rpc-endpoint";
pub const ERROR_INVALID_AUTHKEY: &str = "http://api.wamp.ws/error#invalid-authkey";
pub const ERROR_INVALID_SIGNATURE: &str = "http://api.wamp.ws/error#invalid-signature";
pub const ERROR_NOT_AUTHORIZED: &str = "http://api.wamp.ws/error#not-authorized";

// Exported gateway procedures. Clients call them by bare name.
pub const PROCEDURE_REGISTER: &str = "dbusRegister";
pub const PROCEDURE_SEND: &str = "dbusSend";

pub const PROTOCOL_VERSION: u64 = 1;
