//! Per-request authentication finite state machine (FSM).
//!
//! Phases:
//! - Unauthenticated
//! - TokenPresented
//! - TokenVerified
//! - Predicted
//!
//! `Rejected` is reachable from every non-terminal phase. Tracks how long
//! each phase lasted for request tracing.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RequestPhase { Unauthenticated, TokenPresented, TokenVerified, Predicted, Rejected }

impl RequestPhase {
    pub fn is_terminal(self) -> bool { matches!(self, RequestPhase::Predicted | RequestPhase::Rejected) }

    /// Snake-case name, used as a metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            RequestPhase::Unauthenticated => "unauthenticated",
            RequestPhase::TokenPresented => "token_presented",
            RequestPhase::TokenVerified => "token_verified",
            RequestPhase::Predicted => "predicted",
            RequestPhase::Rejected => "rejected",
        }
    }

    fn next(self) -> Option<RequestPhase> {
        match self {
            RequestPhase::Unauthenticated => Some(RequestPhase::TokenPresented),
            RequestPhase::TokenPresented => Some(RequestPhase::TokenVerified),
            RequestPhase::TokenVerified => Some(RequestPhase::Predicted),
            RequestPhase::Predicted | RequestPhase::Rejected => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition { from: RequestPhase, to: RequestPhase },
}

#[derive(Debug)]
pub struct RequestLifecycle {
    phase: RequestPhase,
    started_at: Instant,
    phase_started_at: Instant,
    phase_durations: Vec<(RequestPhase, Duration)>,
    rejection: Option<String>,
}

impl Default for RequestLifecycle {
    fn default() -> Self { Self::new() }
}

impl RequestLifecycle {
    pub fn new() -> Self {
        let now = Instant::now();
        Self { phase: RequestPhase::Unauthenticated, started_at: now, phase_started_at: now, phase_durations: Vec::new(), rejection: None }
    }

    pub fn phase(&self) -> RequestPhase { self.phase }

    fn enter(&mut self, to: RequestPhase) {
        let now = Instant::now();
        self.phase_durations.push((self.phase, now - self.phase_started_at));
        self.phase = to;
        self.phase_started_at = now;
    }

    /// Moves to `to` if it is the single legal successor of the current phase.
    pub fn advance(&mut self, to: RequestPhase) -> Result<(), LifecycleError> {
        if self.phase.next() != Some(to) {
            return Err(LifecycleError::IllegalTransition { from: self.phase, to });
        }
        self.enter(to);
        Ok(())
    }

    pub fn reject(&mut self, reason: impl Into<String>) -> Result<(), LifecycleError> {
        if self.phase.is_terminal() {
            return Err(LifecycleError::IllegalTransition { from: self.phase, to: RequestPhase::Rejected });
        }
        self.rejection = Some(reason.into());
        self.enter(RequestPhase::Rejected);
        Ok(())
    }

    pub fn rejection(&self) -> Option<&str> { self.rejection.as_deref() }
    pub fn durations(&self) -> &[(RequestPhase, Duration)] { &self.phase_durations }
    pub fn elapsed(&self) -> Duration { self.started_at.elapsed() }
}
