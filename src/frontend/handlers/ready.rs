use serde_json::Value;
use tracing::debug;

use crate::errors::{CallError, GatewayError};
use crate::frontend::context::FrontendContext;
use crate::pubsub::{Audience, Broker};
use crate::wamp::{WampMessage, uri};

// -----------------------------------------------------------------------------
// ----- Register Handler ------------------------------------------------------

pub(crate) async fn handle_register(context: &mut FrontendContext, call_id: &str, args: &[Value]) {
    let fields = match positional_fields(args) {
        Ok(fields) => fields,
        Err(e) => {
            context.reply_error(call_id, e.into());
            return;
        }
    };

    let Some(session) = context.gateway_session.as_mut() else {
        context.reply_error(call_id, CallError::no_such_endpoint(uri::PROCEDURE_REGISTER));
        return;
    };

    match session.register(&fields).await {
        Ok(topic) => context.reply(call_id, Value::String(topic)),
        Err(e) => context.reply_error(call_id, e.into()),
    }
}

// -----------------------------------------------------------------------------
// ----- Send Handler ----------------------------------------------------------

/// Starts the bus call and returns without waiting for it; the reply is sent
/// from a separate task whenever the bus answers.
pub(crate) async fn handle_send(context: &mut FrontendContext, call_id: &str, args: &[Value]) {
    let fields = match positional_fields(args) {
        Ok(fields) => fields,
        Err(e) => {
            context.reply_error(call_id, e.into());
            return;
        }
    };

    let Some(session) = context.gateway_session.as_mut() else {
        context.reply_error(call_id, CallError::no_such_endpoint(uri::PROCEDURE_SEND));
        return;
    };

    let deferred = match session.send(&fields).await {
        Ok(deferred) => deferred,
        Err(e) => {
            context.reply_error(call_id, e.into());
            return;
        }
    };

    let outbox = context.outbox.clone();
    let call_id = call_id.to_string();

    tokio::spawn(async move {
        let reply = match deferred.wait().await {
            Ok(result) => WampMessage::CallResult {
                call_id,
                result: Value::String(result),
            },
            Err(e) => CallError::from(e).into_message(call_id),
        };

        if !outbox.send(reply) {
            debug!("session closed before its call completed");
        }
    });
}

// -----------------------------------------------------------------------------
// ----- Pub/Sub Handlers ------------------------------------------------------

pub(crate) fn handle_subscribe(context: &FrontendContext, broker: &Broker, topic: &str) {
    let topic = context.prefixes.resolve(topic);
    debug!("session {} subscribed to {topic}", context.session_id);
    broker.subscribe(&topic, &context.session_id, context.outbox.clone());
}

pub(crate) fn handle_unsubscribe(context: &FrontendContext, broker: &Broker, topic: &str) {
    let topic = context.prefixes.resolve(topic);
    broker.unsubscribe(&topic, &context.session_id);
}

pub(crate) fn handle_publish(
    context: &FrontendContext,
    broker: &Broker,
    topic: &str,
    event: Value,
    exclude_me: bool,
    exclude: Vec<String>,
    eligible: Option<Vec<String>>,
) {
    let topic = context.prefixes.resolve(topic);

    let audience = if !exclude.is_empty() || eligible.is_some() {
        Audience { exclude, eligible }
    } else if exclude_me {
        Audience::everyone_but(&context.session_id)
    } else {
        Audience::everyone()
    };

    let delivered = broker.publish(&topic, event, &audience);
    debug!("session {} published {topic} to {delivered} session(s)", context.session_id);
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

/// Both procedures take one argument: the list of positional string fields.
fn positional_fields(args: &[Value]) -> Result<Vec<String>, GatewayError> {
    let Some(Value::Array(items)) = args.first() else {
        return Err(GatewayError::argument(
            "expected a single list of positional fields",
        ));
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(field) => Ok(field.clone()),
            other => Err(GatewayError::argument(format!(
                "field {i} must be a string, got {other}"
            ))),
        })
        .collect()
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
