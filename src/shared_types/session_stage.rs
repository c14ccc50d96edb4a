/// Represents the stages of a client connection in the gateway's session
/// gate.
///
/// A connection enters `Unauthenticated` when the WebSocket opens, moves to
/// `Authenticating` once the client issues an authentication request, and
/// becomes `Authenticated` only after the challenge is answered and every
/// requested permission is whitelisted. Every path ends in `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    /// Connection open, no authentication request seen yet.
    Unauthenticated,

    /// A challenge was issued (or an anonymous request accepted) and the
    /// server is waiting for the client's signature.
    Authenticating,

    /// Credentials and permissions accepted; the per-session gateway exists.
    Authenticated,

    /// Connection dropped, either after a failed authentication or on
    /// disconnect.
    Closed,
}

impl SessionStage {
    pub fn is_authenticated(self) -> bool {
        self == SessionStage::Authenticated
    }
}
