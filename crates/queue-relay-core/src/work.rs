//! The work performed for each message.
//!
//! A message body carries a complexity factor: the digits it contains, read
//! as one unsigned integer. [`SimulatedWorkload`] sleeps for that many work
//! units and stops early when the interrupt signal is raised.

use async_trait::async_trait;
use queue_relay_runtime::ReceivedMessage;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Default duration of one unit of simulated work
pub const DEFAULT_WORK_UNIT: Duration = Duration::from_millis(100);

/// Amount of work a message asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ComplexityFactor(u64);

impl ComplexityFactor {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Read the factor from a message body by discarding every non-digit
    /// character, so `"cost:3"` yields 3 and `"1a2b"` yields 12.
    ///
    /// Returns `None` when the body holds no digits or the digits overflow.
    pub fn from_body(body: &str) -> Option<Self> {
        let digits: String = body.chars().filter(char::is_ascii_digit).collect();
        digits.parse::<u64>().ok().map(Self)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Total time for this factor at the given unit, saturating on overflow
    pub fn duration(&self, work_unit: Duration) -> Duration {
        let unit_millis = u64::try_from(work_unit.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(unit_millis.saturating_mul(self.0))
    }
}

/// Errors raised while performing work
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkError {
    #[error("Work interrupted by shutdown")]
    Interrupted,

    #[error("Work failed: {message}")]
    Failed { message: String },
}

/// Work performed for a message after it has been claimed
#[async_trait]
pub trait Workload: Send + Sync {
    async fn run(
        &self,
        message: &ReceivedMessage,
        complexity: ComplexityFactor,
    ) -> Result<(), WorkError>;
}

/// Create the interrupt channel shared between the shutdown handler and
/// [`SimulatedWorkload`]. Sending `true` interrupts all running work.
pub fn interrupt_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Sleeps for `complexity × work_unit`
#[derive(Debug, Clone)]
pub struct SimulatedWorkload {
    work_unit: Duration,
    interrupt: watch::Receiver<bool>,
}

impl SimulatedWorkload {
    pub fn new(work_unit: Duration, interrupt: watch::Receiver<bool>) -> Self {
        Self {
            work_unit,
            interrupt,
        }
    }

    pub fn work_unit(&self) -> Duration {
        self.work_unit
    }
}

#[async_trait]
impl Workload for SimulatedWorkload {
    async fn run(
        &self,
        _message: &ReceivedMessage,
        complexity: ComplexityFactor,
    ) -> Result<(), WorkError> {
        let mut interrupt = self.interrupt.clone();
        if *interrupt.borrow_and_update() {
            return Err(WorkError::Interrupted);
        }

        tokio::select! {
            _ = tokio::time::sleep(complexity.duration(self.work_unit)) => Ok(()),
            _ = wait_for_interrupt(&mut interrupt) => Err(WorkError::Interrupted),
        }
    }
}

/// Resolves when the signal turns true. A closed channel can no longer
/// interrupt, so it never resolves in that case.
async fn wait_for_interrupt(interrupt: &mut watch::Receiver<bool>) {
    if interrupt.wait_for(|raised| *raised).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
#[path = "work_tests.rs"]
mod tests;
