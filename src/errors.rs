use thiserror::Error;

use crate::wamp::{WampMessage, uri};

// -----------------------------------------------------------------------------
// ----- GatewayError ----------------------------------------------------------

/// Every failure the gateway can report. Argument, bus and remote errors stay
/// local to the operation that raised them; authentication errors end only the
/// offending session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Too few positional fields, or a malformed JSON argument payload.
    #[error("{0}")]
    Argument(String),

    #[error("invalid bus: {0}")]
    InvalidBus(String),

    /// Failure reported by the bus for one invocation. The message is the
    /// remote text, verbatim.
    #[error("{0}")]
    RemoteCall(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Empty identity key sequence. Validated call sites never produce this.
    #[error("cannot build a key from an empty sequence")]
    Key,

    /// The bus collaborator could not connect or subscribe.
    #[error("bus error: {0}")]
    Bus(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl GatewayError {
    pub fn argument(message: impl Into<String>) -> Self {
        GatewayError::Argument(message.into())
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        GatewayError::Authentication(message.into())
    }

    pub fn bus(message: impl Into<String>) -> Self {
        GatewayError::Bus(message.into())
    }
}

// -----------------------------------------------------------------------------
// ----- CallError -------------------------------------------------------------

/// The error half of an RPC reply, sent to the client as a CALLERROR.
#[derive(Clone, Debug, PartialEq)]
pub struct CallError {
    pub error_uri: String,
    pub description: String,
}

// -----------------------------------------------------------------------------
// ----- CallError: Static -----------------------------------------------------

impl CallError {
    pub fn new(error_uri: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            error_uri: error_uri.into(),
            description: description.into(),
        }
    }

    pub fn generic(description: impl Into<String>) -> Self {
        Self::new(uri::ERROR_GENERIC, description)
    }

    pub fn no_such_endpoint(proc_uri: &str) -> Self {
        Self::new(
            uri::ERROR_NO_SUCH_RPC_ENDPOINT,
            format!("no RPC endpoint registered for '{proc_uri}'"),
        )
    }

    pub fn invalid_authkey(key: &str) -> Self {
        Self::new(
            uri::ERROR_INVALID_AUTHKEY,
            format!("authentication key '{key}' does not exist"),
        )
    }

    pub fn invalid_signature() -> Self {
        Self::new(
            uri::ERROR_INVALID_SIGNATURE,
            "signature for authentication request is invalid",
        )
    }

    pub fn not_authorized(description: impl Into<String>) -> Self {
        Self::new(uri::ERROR_NOT_AUTHORIZED, description)
    }
}

// -----------------------------------------------------------------------------
// ----- CallError: Public -----------------------------------------------------

impl CallError {
    pub fn into_message(self, call_id: impl Into<String>) -> WampMessage {
        WampMessage::CallError {
            call_id: call_id.into(),
            error_uri: self.error_uri,
            description: self.description,
            details: None,
        }
    }
}

impl From<GatewayError> for CallError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Authentication(message) => CallError::not_authorized(message),
            GatewayError::Protocol(message) => CallError::new(uri::ERROR_INTERNAL, message),
            // Remote and argument messages reach the caller verbatim.
            other => CallError::generic(other.to_string()),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_message_is_verbatim() {
        let err = GatewayError::RemoteCall("org.ofono.Error.NotFound: no modem".into());
        let call_error = CallError::from(err);
        assert_eq!(call_error.error_uri, uri::ERROR_GENERIC);
        assert_eq!(call_error.description, "org.ofono.Error.NotFound: no modem");
    }

    #[test]
    fn invalid_bus_names_the_bus() {
        let call_error = CallError::from(GatewayError::InvalidBus("starter".into()));
        assert_eq!(call_error.description, "invalid bus: starter");
    }

    #[test]
    fn builds_callerror_message() {
        let msg = CallError::generic("boom").into_message("c1");

        match msg {
            WampMessage::CallError {
                call_id,
                error_uri,
                description,
                details,
            } => {
                assert_eq!(call_id, "c1");
                assert_eq!(error_uri, uri::ERROR_GENERIC);
                assert_eq!(description, "boom");
                assert_eq!(details, None);
            }
            other => panic!("expected CallError, got {other:?}"),
        }
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
