//! Stub implementations for testing.
//!
//! These implementations stand in for real timers so retry behavior can be
//! asserted without sleeping.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::ports::RetryDelay;

// =============================================================================
// Recording Delay
// =============================================================================

/// Delay that records every requested duration.
///
/// By default each wait returns immediately. A delay built with
/// [`RecordingDelay::interrupting`] instead cancels the given token when the
/// wait starts and never completes, simulating an interrupt that arrives
/// mid-pause.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    /// Requested durations, in order
    waits: Mutex<Vec<Duration>>,
    /// Token to cancel on the wait with this zero-based index
    interrupt: Option<(usize, CancellationToken)>,
}

impl RecordingDelay {
    /// Create a delay that returns immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a delay that cancels `token` during wait number `at` (zero-based).
    pub fn interrupting(at: usize, token: CancellationToken) -> Self {
        Self {
            waits: Mutex::new(Vec::new()),
            interrupt: Some((at, token)),
        }
    }

    /// Durations requested so far.
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Number of waits requested so far.
    pub fn count(&self) -> usize {
        self.waits.lock().map(|w| w.len()).unwrap_or_default()
    }
}

#[async_trait]
impl RetryDelay for RecordingDelay {
    async fn wait(&self, duration: Duration) {
        let index = match self.waits.lock() {
            Ok(mut waits) => {
                waits.push(duration);
                waits.len() - 1
            },
            Err(_) => return,
        };

        if let Some((at, token)) = &self.interrupt {
            if *at == index {
                token.cancel();
                std::future::pending::<()>().await;
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
