use std::fmt;
use std::str::FromStr;

use crate::errors::GatewayError;

// -----------------------------------------------------------------------------
// ----- BusKind ---------------------------------------------------------------

/// The two message buses a client may address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusKind {
    Session,
    System,
}

impl BusKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BusKind::Session => "session",
            BusKind::System => "system",
        }
    }
}

impl FromStr for BusKind {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(BusKind::Session),
            "system" => Ok(BusKind::System),
            other => Err(GatewayError::InvalidBus(other.to_string())),
        }
    }
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
