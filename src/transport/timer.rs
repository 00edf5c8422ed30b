//! Retransmission timer.
//!
//! A timer is a deadline, not a task. The owner of the stack asks for the
//! earliest deadline, sleeps until then, and polls; expired timers fire on
//! that poll.

use std::time::{Duration, Instant};

/// At most one pending retransmission deadline for one connection.
#[derive(Debug, Clone, Default)]
pub struct RetransmitTimer {
    deadline: Option<Instant>,
}

impl RetransmitTimer {
    /// Create an unarmed timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer to fire `rto` after `now`.
    pub fn arm(&mut self, now: Instant, rto: Duration) {
        self.deadline = Some(now + rto);
    }

    /// Cancel the pending deadline. No-op if unarmed.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// The pending deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the pending deadline is at or before `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}
