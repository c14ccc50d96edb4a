use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing::{debug, info, trace, warn};

use crate::errors::{CallError, GatewayError};
use crate::shared_types::SessionStage;
use crate::wamp::{WampMessage, uri};

use super::context::FrontendContext;
use super::handlers;
use super::outbox::{Outbound, Outbox};
use super::server::ServerState;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const SERVER_NAME: &str = "busgate";

// -----------------------------------------------------------------------------
// ----- FrontendConnection ----------------------------------------------------

/// One client WebSocket. Reads frames in order and runs them through the
/// session gate; everything sent back goes through the connection's
/// [`Outbox`] and a dedicated writer task.
pub struct FrontendConnection {
    peer: SocketAddr,
    state: Arc<ServerState>,
}

// -----------------------------------------------------------------------------
// ----- FrontendConnection: Static --------------------------------------------

impl FrontendConnection {
    pub(crate) fn new(peer: SocketAddr, state: Arc<ServerState>) -> Self {
        Self { peer, state }
    }
}

// -----------------------------------------------------------------------------
// ----- FrontendConnection: Public --------------------------------------------

impl FrontendConnection {
    pub async fn serve(self, stream: TcpStream) -> Result<(), GatewayError> {
        let ws = accept_async(stream)
            .await
            .map_err(|e| GatewayError::Protocol(format!("websocket handshake failed: {e}")))?;

        let (sink, mut source) = ws.split();
        let (outbox, rx) = Outbox::channel();
        let writer = spawn_writer_task(sink, rx);

        let mut context = FrontendContext::new(outbox.clone());
        info!("client {} connected as session {}", self.peer, context.session_id);

        outbox.send(WampMessage::Welcome {
            session_id: context.session_id.to_string(),
            protocol_version: uri::PROTOCOL_VERSION,
            server_ident: format!("{SERVER_NAME}/{}", env!("CARGO_PKG_VERSION")),
        });

        while let Some(frame) = source.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    debug!("session {} read error: {e}", context.session_id);
                    break;
                }
            };

            match frame {
                Message::Text(text) => {
                    trace!("<- {}: {}", context.session_id, text.as_str());
                    self.process_frame(&mut context, text.as_str()).await;
                }
                Message::Close(_) => break,
                // Ping/pong is answered by tungstenite itself.
                _ => {}
            }

            if context.should_close() {
                break;
            }
        }

        self.close(&mut context).await;

        outbox.close();
        let _ = writer.await;

        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- FrontendConnection: Private -------------------------------------------

impl FrontendConnection {
    async fn process_frame(&self, context: &mut FrontendContext, text: &str) {
        let message = match WampMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("session {} sent a bad frame: {e}", context.session_id);
                return;
            }
        };

        let authenticated = context.stage.is_authenticated();
        let broker = &self.state.broker;

        match message {
            WampMessage::Prefix { prefix, uri: base } => context.prefixes.add(prefix, base),

            WampMessage::Call {
                call_id,
                proc_uri,
                args,
            } => self.process_call(context, &call_id, &proc_uri, &args).await,

            WampMessage::Subscribe { topic } if authenticated => {
                handlers::handle_subscribe(context, broker, &topic)
            }

            WampMessage::Unsubscribe { topic } if authenticated => {
                handlers::handle_unsubscribe(context, broker, &topic)
            }

            WampMessage::Publish {
                topic,
                event,
                exclude_me,
                exclude,
                eligible,
            } if authenticated => handlers::handle_publish(
                context, broker, &topic, event, exclude_me, exclude, eligible,
            ),

            other => debug!(
                "session {} ignored {:?} in stage {:?}",
                context.session_id,
                other.message_type(),
                context.stage
            ),
        }
    }

    async fn process_call(
        &self,
        context: &mut FrontendContext,
        call_id: &str,
        proc_uri: &str,
        args: &[Value],
    ) {
        let procedure = context.prefixes.resolve(proc_uri);

        match procedure.as_str() {
            uri::PROCEDURE_AUTHREQ => handlers::handle_authreq(context, &self.state, call_id, args),
            uri::PROCEDURE_AUTH => handlers::handle_auth(context, &self.state, call_id, args).await,

            uri::PROCEDURE_REGISTER if context.stage.is_authenticated() => {
                handlers::handle_register(context, call_id, args).await
            }

            uri::PROCEDURE_SEND if context.stage.is_authenticated() => {
                handlers::handle_send(context, call_id, args).await
            }

            other => context.reply_error(call_id, CallError::no_such_endpoint(other)),
        }
    }

    async fn close(&self, context: &mut FrontendContext) {
        self.state.broker.remove_session(&context.session_id);

        // Drops the resolver and the pending call list with it.
        context.gateway_session = None;
        context.pending_auth = None;

        if context.stage.is_authenticated() {
            let left = self.state.registry.leave().await;
            info!("session {} closed ({left} active)", context.session_id);
        } else {
            info!("unauthenticated session {} closed", context.session_id);
        }

        context.stage = SessionStage::Closed;
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn spawn_writer_task(mut sink: WsSink, mut rx: mpsc::UnboundedReceiver<Outbound>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut closing = false;

        while let Some(next) = rx.recv().await {
            let mut pending = Some(next);

            // coalesce bursts into one flush
            while let Some(outbound) = pending.take() {
                let Outbound::Message(message) = outbound else {
                    closing = true;
                    break;
                };

                let text = message.encode();
                trace!("-> {text}");

                if sink.feed(Message::text(text)).await.is_err() {
                    return;
                }

                pending = rx.try_recv().ok();
            }

            if sink.flush().await.is_err() || closing {
                break;
            }
        }

        let _ = sink.close().await;
    })
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
