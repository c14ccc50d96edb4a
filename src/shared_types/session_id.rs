use rand::Rng;
use rand::distr::Alphanumeric;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const SESSION_ID_LEN: usize = 16;

// -----------------------------------------------------------------------------
// ----- SessionId -------------------------------------------------------------

/// Random identifier handed to a client in the WELCOME message. Also used as
/// the CRA `authid` and as the subscriber key in the pub/sub broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

// -----------------------------------------------------------------------------
// ----- SessionId: Static -----------------------------------------------------

impl SessionId {
    pub fn random() -> Self {
        let id = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_ID_LEN)
            .map(char::from)
            .collect();

        SessionId(id)
    }
}

// -----------------------------------------------------------------------------
// ----- SessionId: Public -----------------------------------------------------

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
