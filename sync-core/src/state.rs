//! Sync engine state machine for roomsync.
//!
//! This module provides a pure, side-effect-free state machine for the poll
//! loop. The state machine takes events as input and produces a new phase
//! plus a list of actions to execute.
//!
//! The actual I/O (fetching, sleeping) is performed by sync-client, not by
//! this module. This enables instant unit testing without transport mocks.

use std::time::Duration;

/// Poll loop phase - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    /// Engine constructed, loop not started.
    Idle,
    /// Fetching and processing responses.
    Polling {
        /// Consecutive failed iterations before this poll.
        failures: u32,
    },
    /// Waiting before the next poll after a failure.
    Backoff {
        /// Which consecutive failure this is (1-based).
        attempt: u32,
        /// Delay chosen by the failure policy.
        delay: Duration,
    },
    /// Loop ended by an explicit stop (terminal).
    Stopped,
}

impl SyncPhase {
    /// Create a new state machine in the Idle phase.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new phase plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: PhaseEvent) -> (Self, Vec<Action>) {
        match (self, event) {
            // Stop wins from any live phase
            (Self::Stopped, _) => (Self::Stopped, vec![]),
            (_, PhaseEvent::StopRequested) => (Self::Stopped, vec![Action::Halt]),

            // From Idle
            (Self::Idle, PhaseEvent::Started) => (Self::Polling { failures: 0 }, vec![Action::Poll]),

            // From Polling
            (Self::Polling { .. }, PhaseEvent::IterationSucceeded) => {
                (Self::Polling { failures: 0 }, vec![Action::Poll])
            }
            // A processing fault is iteration-scoped: poll again right away.
            (Self::Polling { failures }, PhaseEvent::ProcessingFailed) => (
                Self::Polling {
                    failures: failures.saturating_add(1),
                },
                vec![Action::Poll],
            ),
            (Self::Polling { failures }, PhaseEvent::FetchFailed { delay })
            | (Self::Polling { failures }, PhaseEvent::StoreFailed { delay }) => {
                let attempt = failures.saturating_add(1);
                (
                    Self::Backoff { attempt, delay },
                    vec![Action::Sleep { delay }],
                )
            }

            // From Backoff
            (Self::Backoff { attempt, .. }, PhaseEvent::BackoffElapsed) => (
                Self::Polling { failures: attempt },
                vec![Action::Poll],
            ),

            // Invalid transitions - stay in current phase
            (phase, _) => (phase, vec![]),
        }
    }

    /// Number of consecutive failures so far (0 when healthy).
    pub fn failures(&self) -> u32 {
        match self {
            Self::Polling { failures } => *failures,
            Self::Backoff { attempt, .. } => *attempt,
            Self::Idle | Self::Stopped => 0,
        }
    }

    /// Check if the loop is actively polling.
    pub fn is_polling(&self) -> bool {
        matches!(self, Self::Polling { .. })
    }

    /// Check if the loop is waiting out a backoff.
    pub fn is_backing_off(&self) -> bool {
        matches!(self, Self::Backoff { .. })
    }

    /// Check if the loop has stopped.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl Default for SyncPhase {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur in the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseEvent {
    /// The loop was started.
    Started,
    /// A response was fetched, processed and its cursor persisted.
    IterationSucceeded,
    /// The fetch failed; the failure policy chose `delay`.
    FetchFailed {
        /// Delay before the next poll.
        delay: Duration,
    },
    /// The cursor store failed; the failure policy chose `delay`.
    StoreFailed {
        /// Delay before the next poll.
        delay: Duration,
    },
    /// Processing a fetched response failed.
    ProcessingFailed,
    /// The backoff delay elapsed.
    BackoffElapsed,
    /// The owning process asked the loop to stop.
    StopRequested,
}

/// Actions to be executed by the sync-client.
///
/// These are instructions, not side effects. The sync-client interprets
/// these and performs the actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Fetch and process the next response.
    Poll,
    /// Sleep before polling again.
    Sleep {
        /// How long to sleep.
        delay: Duration,
    },
    /// Leave the loop.
    Halt,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEN: Duration = Duration::from_secs(10);

    fn polling() -> SyncPhase {
        let (phase, _) = SyncPhase::new().on_event(PhaseEvent::Started);
        phase
    }

    #[test]
    fn starts_idle() {
        let phase = SyncPhase::new();
        assert!(matches!(phase, SyncPhase::Idle));
        assert_eq!(phase.failures(), 0);
    }

    #[test]
    fn start_transitions_to_polling() {
        let (phase, actions) = SyncPhase::new().on_event(PhaseEvent::Started);
        assert_eq!(phase, SyncPhase::Polling { failures: 0 });
        assert_eq!(actions, vec![Action::Poll]);
    }

    #[test]
    fn success_keeps_polling() {
        let (phase, actions) = polling().on_event(PhaseEvent::IterationSucceeded);
        assert!(phase.is_polling());
        assert_eq!(actions, vec![Action::Poll]);
    }

    #[test]
    fn fetch_failure_enters_backoff() {
        let (phase, actions) = polling().on_event(PhaseEvent::FetchFailed { delay: TEN });
        assert_eq!(phase, SyncPhase::Backoff { attempt: 1, delay: TEN });
        assert_eq!(actions, vec![Action::Sleep { delay: TEN }]);
    }

    #[test]
    fn store_failure_enters_backoff() {
        let (phase, _) = polling().on_event(PhaseEvent::StoreFailed { delay: TEN });
        assert!(phase.is_backing_off());
    }

    #[test]
    fn backoff_elapsed_returns_to_polling_and_remembers_failures() {
        let (phase, _) = polling().on_event(PhaseEvent::FetchFailed { delay: TEN });
        let (phase, actions) = phase.on_event(PhaseEvent::BackoffElapsed);
        assert_eq!(phase, SyncPhase::Polling { failures: 1 });
        assert_eq!(actions, vec![Action::Poll]);

        let (phase, _) = phase.on_event(PhaseEvent::FetchFailed { delay: TEN });
        assert_eq!(phase, SyncPhase::Backoff { attempt: 2, delay: TEN });
    }

    #[test]
    fn success_resets_failure_count() {
        let (phase, _) = polling().on_event(PhaseEvent::FetchFailed { delay: TEN });
        let (phase, _) = phase.on_event(PhaseEvent::BackoffElapsed);
        let (phase, _) = phase.on_event(PhaseEvent::IterationSucceeded);
        assert_eq!(phase.failures(), 0);
    }

    #[test]
    fn processing_failure_polls_again_without_backoff() {
        let (phase, actions) = polling().on_event(PhaseEvent::ProcessingFailed);
        assert_eq!(phase, SyncPhase::Polling { failures: 1 });
        assert_eq!(actions, vec![Action::Poll]);
    }

    #[test]
    fn stop_from_polling_halts() {
        let (phase, actions) = polling().on_event(PhaseEvent::StopRequested);
        assert!(phase.is_stopped());
        assert_eq!(actions, vec![Action::Halt]);
    }

    #[test]
    fn stop_from_backoff_halts() {
        let (phase, _) = polling().on_event(PhaseEvent::FetchFailed { delay: TEN });
        let (phase, actions) = phase.on_event(PhaseEvent::StopRequested);
        assert!(phase.is_stopped());
        assert_eq!(actions, vec![Action::Halt]);
    }

    #[test]
    fn stopped_is_terminal() {
        let (phase, _) = polling().on_event(PhaseEvent::StopRequested);
        for event in [
            PhaseEvent::Started,
            PhaseEvent::IterationSucceeded,
            PhaseEvent::BackoffElapsed,
            PhaseEvent::StopRequested,
        ] {
            let (next, actions) = phase.clone().on_event(event);
            assert!(next.is_stopped());
            assert!(actions.is_empty());
        }
    }

    #[test]
    fn invalid_transition_is_ignored() {
        let (phase, actions) = SyncPhase::new().on_event(PhaseEvent::BackoffElapsed);
        assert_eq!(phase, SyncPhase::Idle);
        assert!(actions.is_empty());
    }
}
