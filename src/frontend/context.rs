use secrecy::SecretString;
use serde_json::Value;

use crate::errors::CallError;
use crate::gateway::GatewaySession;
use crate::shared_types::{SessionId, SessionStage};
use crate::wamp::{PrefixMap, WampMessage};

use super::outbox::Outbox;

// -----------------------------------------------------------------------------
// ----- PendingAuth -----------------------------------------------------------

/// What `authreq` left behind for the `auth` call that answers it.
#[derive(Debug)]
pub(crate) struct PendingAuth {
    /// `None` for an anonymous request.
    pub(crate) key: Option<String>,
    pub(crate) permissions: Vec<String>,
    pub(crate) challenge: Option<String>,
    pub(crate) secret: Option<SecretString>,
}

// -----------------------------------------------------------------------------
// ----- FrontendContext -------------------------------------------------------

pub(crate) struct FrontendContext {
    pub(crate) session_id: SessionId,
    pub(crate) stage: SessionStage,
    pub(crate) prefixes: PrefixMap,
    pub(crate) outbox: Outbox,
    pub(crate) pending_auth: Option<PendingAuth>,
    pub(crate) gateway_session: Option<GatewaySession>,
    close_after_flush: bool,
}

impl FrontendContext {
    pub(crate) fn new(outbox: Outbox) -> Self {
        Self {
            session_id: SessionId::random(),
            stage: SessionStage::Unauthenticated,
            prefixes: PrefixMap::new(),
            outbox,
            pending_auth: None,
            gateway_session: None,
            close_after_flush: false,
        }
    }

    pub(crate) fn request_close(&mut self) {
        self.close_after_flush = true;
    }

    pub(crate) fn should_close(&self) -> bool {
        self.close_after_flush
    }

    pub(crate) fn reply(&self, call_id: &str, result: Value) {
        self.outbox.send(WampMessage::CallResult {
            call_id: call_id.to_string(),
            result,
        });
    }

    pub(crate) fn reply_error(&self, call_id: &str, error: CallError) {
        self.outbox.send(error.into_message(call_id));
    }

    /// Replies with the error, then drops the connection once it is flushed.
    pub(crate) fn reject(&mut self, call_id: &str, error: CallError) {
        self.reply_error(call_id, error);
        self.request_close();
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
