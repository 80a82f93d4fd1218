//! Per-request state machine.
//!
//! ```text
//!   Created ──► ConfigResolved ──► PlanBuilt ──► ChainAssembled
//!                                                     │
//!                        ┌──────── body pending ──────┤
//!                        ▼                            │ body available
//!                  AwaitingBody ──► BodyDrained ──┐   │
//!                                                 ▼   ▼
//!                                              HeadersSent ──► BodySent
//!
//!   any non-terminal state ──► Errored(kind)
//! ```
//!
//! `AwaitingBody` is the only state in which a request is suspended. A
//! header-only response ends in `HeadersSent`.

use crate::ErrorKind;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestState {
    #[default]
    Created,
    ConfigResolved,
    PlanBuilt,
    ChainAssembled,
    AwaitingBody,
    BodyDrained,
    HeadersSent,
    BodySent,
    Errored(ErrorKind),
}

impl RequestState {
    /// Check if terminal state.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::BodySent | Self::Errored(_))
    }

    /// Whether `next` may follow this state.
    pub const fn can_advance(self, next: RequestState) -> bool {
        use RequestState::*;
        match (self, next) {
            (Created, ConfigResolved)
            | (ConfigResolved, PlanBuilt)
            | (PlanBuilt, ChainAssembled)
            | (ChainAssembled, AwaitingBody)
            | (ChainAssembled, HeadersSent)
            | (AwaitingBody, BodyDrained)
            | (BodyDrained, HeadersSent)
            | (HeadersSent, BodySent) => true,
            (from, Errored(_)) => !from.is_terminal(),
            _ => false,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::ConfigResolved => "config_resolved",
            Self::PlanBuilt => "plan_built",
            Self::ChainAssembled => "chain_assembled",
            Self::AwaitingBody => "awaiting_body",
            Self::BodyDrained => "body_drained",
            Self::HeadersSent => "headers_sent",
            Self::BodySent => "body_sent",
            Self::Errored(_) => "errored",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one request through [`RequestState`]s.
#[derive(Debug, Clone)]
pub struct RequestLifecycle {
    state: RequestState,
    /// Last state reached before an error
    stage: RequestState,
    created_at: Instant,
    transitions: u8,
}

impl RequestLifecycle {
    pub fn new() -> Self {
        Self {
            state: RequestState::Created,
            stage: RequestState::Created,
            created_at: Instant::now(),
            transitions: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// The last non-error state reached.
    #[inline]
    pub fn stage(&self) -> RequestState {
        self.stage
    }

    pub fn transitions(&self) -> u8 {
        self.transitions
    }

    /// Time since the request was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Move to `next`, returning `false` (and staying put) for an illegal
    /// transition.
    pub fn advance(&mut self, next: RequestState) -> bool {
        if !self.state.can_advance(next) {
            tracing::warn!(from = %self.state, to = %next, "Illegal request transition");
            return false;
        }
        tracing::trace!(from = %self.state, to = %next, "Request transition");
        if !matches!(next, RequestState::Errored(_)) {
            self.stage = next;
        }
        self.state = next;
        self.transitions = self.transitions.saturating_add(1);
        true
    }

    /// Move to `Errored(kind)` from any non-terminal state.
    pub fn fail(&mut self, kind: ErrorKind) -> bool {
        self.advance(RequestState::Errored(kind))
    }
}

impl Default for RequestLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_age_follows_the_clock() {
        let lifecycle = RequestLifecycle::new();
        tokio::time::advance(Duration::from_millis(5)).await;
        assert!(lifecycle.age() >= Duration::from_millis(5));
    }

    #[test]
    fn test_synchronous_path() {
        let mut lifecycle = RequestLifecycle::new();
        for state in [
            RequestState::ConfigResolved,
            RequestState::PlanBuilt,
            RequestState::ChainAssembled,
            RequestState::HeadersSent,
            RequestState::BodySent,
        ] {
            assert!(lifecycle.advance(state), "{state}");
        }
        assert!(lifecycle.state().is_terminal());
        assert_eq!(lifecycle.transitions(), 5);
    }

    #[test]
    fn test_suspended_path() {
        let mut lifecycle = RequestLifecycle::new();
        for state in [
            RequestState::ConfigResolved,
            RequestState::PlanBuilt,
            RequestState::ChainAssembled,
            RequestState::AwaitingBody,
            RequestState::BodyDrained,
            RequestState::HeadersSent,
            RequestState::BodySent,
        ] {
            assert!(lifecycle.advance(state), "{state}");
        }
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let mut lifecycle = RequestLifecycle::new();
        assert!(!lifecycle.advance(RequestState::HeadersSent));
        assert_eq!(lifecycle.state(), RequestState::Created);
    }

    #[test]
    fn test_error_from_any_non_terminal_state() {
        let mut lifecycle = RequestLifecycle::new();
        lifecycle.advance(RequestState::ConfigResolved);
        lifecycle.advance(RequestState::PlanBuilt);

        assert!(lifecycle.fail(ErrorKind::DeviceOpenFailure));
        assert_eq!(
            lifecycle.state(),
            RequestState::Errored(ErrorKind::DeviceOpenFailure)
        );
        assert_eq!(lifecycle.stage(), RequestState::PlanBuilt);
        assert!(!lifecycle.fail(ErrorKind::Io));
    }

    #[test]
    fn test_no_error_after_body_sent() {
        assert!(!RequestState::BodySent.can_advance(RequestState::Errored(
            ErrorKind::BodySendFailure
        )));
        assert!(RequestState::HeadersSent.can_advance(RequestState::Errored(
            ErrorKind::BodySendFailure
        )));
    }
}
