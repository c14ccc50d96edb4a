use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::gateway::ProcessCache;

// -----------------------------------------------------------------------------
// ----- SessionRegistry -------------------------------------------------------

/// Counts authenticated sessions. The process cache is reset when the count
/// drops from one to zero.
pub struct SessionRegistry {
    cache: Arc<ProcessCache>,
    active: Mutex<usize>,
}

impl SessionRegistry {
    pub fn new(cache: Arc<ProcessCache>) -> Self {
        Self {
            cache,
            active: Mutex::new(0),
        }
    }

    /// Returns the number of authenticated sessions including this one.
    pub async fn enter(&self) -> usize {
        let mut active = self.active.lock().await;
        *active += 1;
        *active
    }

    /// Returns the number of authenticated sessions left.
    pub async fn leave(&self) -> usize {
        let mut active = self.active.lock().await;
        *active = active.saturating_sub(1);

        if *active == 0 {
            // Still locked: a session authenticating now waits for the reset
            // and then starts from an empty cache.
            info!("last session closed");
            self.cache.reset().await;
        }

        *active
    }

    pub async fn active(&self) -> usize {
        *self.active.lock().await
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
