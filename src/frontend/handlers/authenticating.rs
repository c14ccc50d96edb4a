use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::errors::CallError;
use crate::frontend::context::{FrontendContext, PendingAuth};
use crate::frontend::server::ServerState;
use crate::gateway::GatewaySession;
use crate::shared_types::SessionStage;
use crate::wamp::cra::{Challenge, verify_signature};
use crate::wamp::uri;

// -----------------------------------------------------------------------------
// ----- Authreq Handler -------------------------------------------------------

/// `authreq(authKey | null, authExtra?)`. Issues the challenge the client has
/// to sign. Anonymous requests get a `null` challenge.
pub(crate) fn handle_authreq(
    context: &mut FrontendContext,
    state: &ServerState,
    call_id: &str,
    args: &[Value],
) {
    match context.stage {
        SessionStage::Unauthenticated => {}
        SessionStage::Authenticating => {
            context.reply_error(call_id, CallError::generic("authentication already requested"));
            return;
        }
        _ => {
            context.reply_error(call_id, CallError::generic("already authenticated"));
            return;
        }
    }

    let key = match args.first() {
        None | Some(Value::Null) => None,
        Some(Value::String(key)) => Some(key.clone()),
        Some(other) => {
            context.reply_error(
                call_id,
                CallError::generic(format!("authentication key must be a string or null, got {other}")),
            );
            return;
        }
    };

    let extra = match args.get(1) {
        None | Some(Value::Null) => json!({}),
        Some(extra @ Value::Object(_)) => extra.clone(),
        Some(other) => {
            context.reply_error(
                call_id,
                CallError::generic(format!("authentication extra must be an object, got {other}")),
            );
            return;
        }
    };

    let permissions = match requested_permissions(&extra) {
        Ok(permissions) => permissions,
        Err(description) => {
            context.reply_error(call_id, CallError::generic(description));
            return;
        }
    };

    let Some(key) = key else {
        context.pending_auth = Some(PendingAuth {
            key: None,
            permissions,
            challenge: None,
            secret: None,
        });
        context.stage = SessionStage::Authenticating;
        context.reply(call_id, Value::Null);
        return;
    };

    let Some(secret) = state.credentials.secret_for(&key) else {
        warn!("session {} used unknown key '{key}'", context.session_id);
        context.reject(call_id, CallError::invalid_authkey(&key));
        return;
    };

    let challenge = Challenge::new(&key, &context.session_id, &extra, &permissions).to_text();
    let challenge = match challenge {
        Ok(challenge) => challenge,
        Err(e) => {
            context.reply_error(call_id, e.into());
            return;
        }
    };

    context.reply(call_id, Value::String(challenge.clone()));
    context.pending_auth = Some(PendingAuth {
        key: Some(key),
        permissions,
        challenge: Some(challenge),
        secret: Some(secret),
    });
    context.stage = SessionStage::Authenticating;
}

// -----------------------------------------------------------------------------
// ----- Auth Handler ----------------------------------------------------------

/// `auth(signature | null)`. Verifies the signature, then lets the session
/// in only with a known key and whitelisted permissions. Any failure closes
/// the connection.
pub(crate) async fn handle_auth(
    context: &mut FrontendContext,
    state: &ServerState,
    call_id: &str,
    args: &[Value],
) {
    if context.stage != SessionStage::Authenticating {
        let error = match context.stage {
            SessionStage::Authenticated => CallError::generic("already authenticated"),
            _ => CallError::generic("no authentication previously requested"),
        };
        context.reply_error(call_id, error);
        return;
    }

    let Some(pending) = context.pending_auth.take() else {
        context.reply_error(call_id, CallError::generic("no authentication previously requested"));
        return;
    };

    let signature = match args.first() {
        None | Some(Value::Null) => None,
        Some(Value::String(signature)) => Some(signature.as_str()),
        Some(_) => {
            context.reject(call_id, CallError::invalid_signature());
            return;
        }
    };

    let signed = match (&pending.challenge, &pending.secret, signature) {
        (Some(challenge), Some(secret), Some(signature)) => {
            verify_signature(challenge, secret.expose_secret(), signature)
        }
        // Anonymous: nothing to sign, nothing may be sent.
        (None, _, None) => true,
        _ => false,
    };

    if !signed {
        warn!("session {} sent an invalid signature", context.session_id);
        context.reject(call_id, CallError::invalid_signature());
        return;
    }

    // Session gate: a resolved key and only whitelisted permissions.
    let Some(key) = pending.key else {
        warn!("session {} rejected: anonymous login", context.session_id);
        context.reject(
            call_id,
            CallError::not_authorized("anonymous sessions are not allowed"),
        );
        return;
    };

    if let Err(e) = state.credentials.check_permissions(&pending.permissions) {
        warn!("session {} rejected: {e}", context.session_id);
        context.reject(call_id, CallError::not_authorized(e.to_string()));
        return;
    }

    context.gateway_session = Some(GatewaySession::new(state.cache.clone()));
    context.stage = SessionStage::Authenticated;
    let active = state.registry.enter().await;

    info!(
        "session {} authenticated with key '{key}' ({active} active)",
        context.session_id
    );

    context.reply(call_id, granted(&pending.permissions));
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

/// `authExtra.permissions` is a JSON array encoded as a string. Absent means
/// no permissions.
fn requested_permissions(extra: &Value) -> Result<Vec<String>, String> {
    let raw = match extra.get("permissions") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::String(raw)) => raw,
        Some(other) => return Err(format!("permissions must be a JSON string, got {other}")),
    };

    serde_json::from_str::<Vec<String>>(raw)
        .map_err(|e| format!("permissions must be a JSON array of service names: {e}"))
}

/// What an authenticated session may use: the whole topic namespace and the
/// two bus procedures.
fn granted(permissions: &[String]) -> Value {
    json!({
        "pubsub": [{"uri": "", "prefix": true, "pub": true, "sub": true}],
        "rpc": [
            {"uri": uri::PROCEDURE_REGISTER},
            {"uri": uri::PROCEDURE_SEND},
        ],
        "services": permissions,
    })
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
