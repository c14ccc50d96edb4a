use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::bus::ProxyMethod;
use crate::errors::GatewayError;
use crate::shared_types::to_json_text;

use super::resolver::ProxyResolver;

/// `[bus, service, object, interface, method]`, then optional JSON args.
const SEND_FIELDS: usize = 5;

// -----------------------------------------------------------------------------
// ----- Deferred --------------------------------------------------------------

/// Result of one remote call, fulfilled exactly once: the reply values as a
/// JSON array string, or the remote error.
#[derive(Debug)]
pub struct Deferred {
    rx: oneshot::Receiver<Result<String, GatewayError>>,
}

impl Deferred {
    pub async fn wait(self) -> Result<String, GatewayError> {
        self.rx
            .await
            .map_err(|_| GatewayError::RemoteCall("call was dropped before replying".into()))?
    }
}

// -----------------------------------------------------------------------------
// ----- PendingCall -----------------------------------------------------------

/// One in-flight call. The invocation task owns the bound method until the
/// reply arrives.
pub struct PendingCall {
    /// `interface.method`, for logging.
    target: String,
    args: Vec<Value>,
    completed: Arc<AtomicBool>,
}

impl PendingCall {
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}

// -----------------------------------------------------------------------------
// ----- AsyncCallManager ------------------------------------------------------

/// In-flight remote calls of one session. Completed calls stay listed until
/// the next [`AsyncCallManager::send`] sweeps them.
#[derive(Default)]
pub struct AsyncCallManager {
    pending: Vec<PendingCall>,
}

// -----------------------------------------------------------------------------
// ----- AsyncCallManager: Public ----------------------------------------------

impl AsyncCallManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the call and returns at once. The reply arrives on the returned
    /// [`Deferred`]; replies to distinct calls complete in arrival order.
    pub async fn send(
        &mut self,
        resolver: &mut ProxyResolver,
        fields: &[String],
    ) -> Result<Deferred, GatewayError> {
        self.sweep();

        if fields.len() < SEND_FIELDS {
            return Err(GatewayError::argument(format!(
                "dbusSend expects at least {SEND_FIELDS} fields \
                 [bus, service, object, interface, method, args?], got {}",
                fields.len()
            )));
        }

        let args = match fields.get(SEND_FIELDS) {
            Some(text) => parse_call_args(text)?,
            None => Vec::new(),
        };

        let method = resolver
            .resolve_method(&fields[0], &fields[1], &fields[2], &fields[3], &fields[4])
            .await?;

        let (tx, rx) = oneshot::channel();
        let completed = Arc::new(AtomicBool::new(false));

        let target = format!("{}.{}", fields[3], fields[4]);
        spawn_invocation(method, args.clone(), completed.clone(), tx, target.clone());

        self.pending.push(PendingCall {
            target,
            args,
            completed,
        });

        Ok(Deferred { rx })
    }

    pub fn pending(&self) -> &[PendingCall] {
        &self.pending
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

// -----------------------------------------------------------------------------
// ----- AsyncCallManager: Private ---------------------------------------------

impl AsyncCallManager {
    fn sweep(&mut self) {
        let before = self.pending.len();
        self.pending.retain(|call| {
            let done = call.is_completed();
            if done {
                trace!("dropping finished call to {}", call.target);
            }
            !done
        });

        let swept = before - self.pending.len();
        if swept > 0 {
            debug!("swept {swept} completed call(s)");
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn parse_call_args(text: &str) -> Result<Vec<Value>, GatewayError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(args)) => Ok(args),
        Ok(other) => Err(GatewayError::argument(format!(
            "call arguments must be a JSON array, got {other}"
        ))),
        Err(e) => Err(GatewayError::argument(format!(
            "malformed JSON call arguments: {e}"
        ))),
    }
}

fn spawn_invocation(
    method: Arc<dyn ProxyMethod>,
    args: Vec<Value>,
    completed: Arc<AtomicBool>,
    tx: oneshot::Sender<Result<String, GatewayError>>,
    target: String,
) {
    tokio::spawn(async move {
        let outcome = match method.invoke(args).await {
            Ok(values) => to_json_text(&values)
                .map_err(|e| GatewayError::RemoteCall(format!("cannot serialize reply: {e}"))),
            Err(e) => {
                warn!("{target} failed: {e}");
                Err(e)
            }
        };

        completed.store(true, Ordering::Release);

        // The session may be gone; nobody is waiting then.
        let _ = tx.send(outcome);
    });
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
