use tokio::sync::mpsc;

use crate::wamp::WampMessage;

// -----------------------------------------------------------------------------
// ----- Outbound --------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(WampMessage),
    /// Flush whatever is queued, then close the socket.
    Close,
}

// -----------------------------------------------------------------------------
// ----- Outbox ----------------------------------------------------------------

/// Sending half of one connection's writer task. Cloned into the broker and
/// into every call completion task of the session.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// False once the writer task is gone.
    pub fn send(&self, message: WampMessage) -> bool {
        self.tx.send(Outbound::Message(message)).is_ok()
    }

    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
