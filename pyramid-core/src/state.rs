//! Session state machine for the serial link.
//!
//! This module provides a pure, side-effect-free state machine for managing
//! the link lifecycle and automatic reconnection. The state machine takes
//! events as input and produces a new state plus a list of actions to execute.
//!
//! ```text
//!                 Opened                      LinkLost
//!  Disconnected ─────────► Connected ─────────────────────► Reconnecting
//!       ▲                    ▲   │                           │   ▲    │
//!       │ CloseRequested /   │   │                           │   │    │
//!       │ OpenFailed         │   │                           │   │    │
//!       ├────────────────────┼───┘         ReconnectTimer /  │   │    │
//!       │                    │             ReopenFailed      └───┘    │
//!       │                    │  ReopenSucceeded                       │
//!       │                    └────────────────────────────────────────┤
//!       │                        CancelRequested                      │
//!       └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The actual I/O (closing the port, probing endpoints, running the retry
//! timer) is performed by pyramid-client, not by this module.

/// Link state - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No link open.
    #[default]
    Disconnected,
    /// Link open and reset; exchanges may run.
    Connected {
        /// Endpoint the link is open on.
        endpoint: String,
    },
    /// Link lost, retrying the same endpoint on a fixed interval.
    Reconnecting {
        /// Endpoint captured when the link was lost.
        endpoint: String,
        /// Reopen attempts made so far.
        attempt: u32,
    },
}

impl SessionState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (pyramid-client)
    /// is responsible for executing the returned actions in order.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // User-initiated open, from any state
            (Self::Reconnecting { .. }, Event::Opened { endpoint }) => (
                Self::Connected {
                    endpoint: endpoint.clone(),
                },
                vec![
                    Action::CancelReconnect,
                    Action::EmitEvent(SessionEvent::Connected { endpoint }),
                ],
            ),
            (_, Event::Opened { endpoint }) => (
                Self::Connected {
                    endpoint: endpoint.clone(),
                },
                vec![Action::EmitEvent(SessionEvent::Connected { endpoint })],
            ),

            // From Connected
            (Self::Connected { endpoint }, Event::LinkLost { reason }) => (
                Self::Reconnecting {
                    endpoint: endpoint.clone(),
                    attempt: 0,
                },
                vec![
                    Action::CloseLink,
                    Action::InvalidateBoard,
                    Action::EmitEvent(SessionEvent::ConnectionLost { endpoint, reason }),
                    Action::ScheduleRetry,
                ],
            ),
            // The old link was closed to make way for the new one
            (Self::Connected { .. }, Event::OpenFailed { .. }) => (
                Self::Disconnected,
                vec![
                    Action::CloseLink,
                    Action::InvalidateBoard,
                    Action::EmitEvent(SessionEvent::Disconnected),
                ],
            ),
            (Self::Connected { .. }, Event::CloseRequested) => (
                Self::Disconnected,
                vec![
                    Action::CloseLink,
                    Action::EmitEvent(SessionEvent::Disconnected),
                ],
            ),

            // From Reconnecting
            (Self::Reconnecting { endpoint, attempt }, Event::ReconnectTimer) => {
                let next_attempt = attempt.saturating_add(1);
                (
                    Self::Reconnecting {
                        endpoint: endpoint.clone(),
                        attempt: next_attempt,
                    },
                    vec![Action::ProbeEndpoint { endpoint }],
                )
            }
            (Self::Reconnecting { endpoint, .. }, Event::ReopenSucceeded) => (
                Self::Connected {
                    endpoint: endpoint.clone(),
                },
                vec![
                    Action::InvalidateBoard,
                    Action::EmitEvent(SessionEvent::Reconnected { endpoint }),
                    Action::IssueStart,
                ],
            ),
            (Self::Reconnecting { endpoint, attempt }, Event::ReopenFailed { error }) => (
                Self::Reconnecting { endpoint, attempt },
                vec![
                    Action::EmitEvent(SessionEvent::ReconnectFailed { attempt, error }),
                    Action::ScheduleRetry,
                ],
            ),
            (
                Self::Reconnecting { endpoint, .. },
                Event::CancelRequested | Event::CloseRequested,
            ) => (
                Self::Disconnected,
                vec![
                    Action::CancelReconnect,
                    Action::CloseLink,
                    Action::EmitEvent(SessionEvent::ReconnectCancelled { endpoint }),
                ],
            ),

            // A second loss while already retrying must not start another loop.
            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Check if the retry loop should be running.
    pub fn is_reconnecting(&self) -> bool {
        matches!(self, Self::Reconnecting { .. })
    }

    /// Endpoint in use or being retried.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Disconnected => None,
            Self::Connected { endpoint } | Self::Reconnecting { endpoint, .. } => Some(endpoint),
        }
    }
}

/// Events that can occur in the link lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A user-initiated open and reset pulse succeeded.
    Opened {
        /// Endpoint that was opened.
        endpoint: String,
    },
    /// A user-initiated open failed. A retry loop, if any, keeps running.
    OpenFailed {
        /// Endpoint that would not open.
        endpoint: String,
        /// Error message describing the failure.
        error: String,
    },
    /// A read timed out or a write failed during an exchange.
    LinkLost {
        /// What failed.
        reason: String,
    },
    /// Retry interval elapsed.
    ReconnectTimer,
    /// The captured endpoint was reopened and reset.
    ReopenSucceeded,
    /// The endpoint was absent or would not open.
    ReopenFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// User stopped the retry loop.
    CancelRequested,
    /// User closed the session.
    CloseRequested,
}

/// Actions to be executed by pyramid-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Close the serial link.
    CloseLink,
    /// Clear selection and refuse moves until a fresh board arrives.
    InvalidateBoard,
    /// Arm the retry timer for one interval.
    ScheduleRetry,
    /// Enumerate endpoints and, if present, open and reset this one.
    ProbeEndpoint {
        /// Endpoint to look for.
        endpoint: String,
    },
    /// Stop the retry loop.
    CancelReconnect,
    /// Send a fresh START to resynchronise the board.
    IssueStart,
    /// Emit an event to the application.
    EmitEvent(SessionEvent),
}

/// Events emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Link opened.
    Connected {
        /// Endpoint in use.
        endpoint: String,
    },
    /// Link lost; the client is retrying.
    ConnectionLost {
        /// Endpoint being retried.
        endpoint: String,
        /// What failed.
        reason: String,
    },
    /// A reopen attempt failed; retrying continues.
    ReconnectFailed {
        /// Which attempt this was.
        attempt: u32,
        /// Error message describing the failure.
        error: String,
    },
    /// Link reopened after a loss.
    Reconnected {
        /// Endpoint in use.
        endpoint: String,
    },
    /// User stopped the retry loop.
    ReconnectCancelled {
        /// Endpoint that was being retried.
        endpoint: String,
    },
    /// User closed the session.
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> SessionState {
        SessionState::Connected {
            endpoint: "/dev/ttyACM0".into(),
        }
    }

    fn reconnecting(attempt: u32) -> SessionState {
        SessionState::Reconnecting {
            endpoint: "/dev/ttyACM0".into(),
            attempt,
        }
    }

    fn lost() -> Event {
        Event::LinkLost {
            reason: "read timed out".into(),
        }
    }

    #[test]
    fn starts_disconnected() {
        let state = SessionState::new();
        assert!(matches!(state, SessionState::Disconnected));
        assert_eq!(state.endpoint(), None);
    }

    #[test]
    fn open_transitions_to_connected() {
        let (state, actions) = SessionState::Disconnected.on_event(Event::Opened {
            endpoint: "COM3".into(),
        });

        assert_eq!(state.endpoint(), Some("COM3"));
        assert!(state.is_connected());
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::EmitEvent(SessionEvent::Connected { .. }))));
    }

    #[test]
    fn link_loss_starts_reconnecting() {
        let (state, actions) = connected().on_event(lost());

        assert_eq!(state, reconnecting(0));
        assert_eq!(
            actions,
            vec![
                Action::CloseLink,
                Action::InvalidateBoard,
                Action::EmitEvent(SessionEvent::ConnectionLost {
                    endpoint: "/dev/ttyACM0".into(),
                    reason: "read timed out".into(),
                }),
                Action::ScheduleRetry,
            ]
        );
    }

    #[test]
    fn second_loss_while_reconnecting_is_ignored() {
        let (state, _) = connected().on_event(lost());
        let (state, actions) = state.on_event(lost());

        assert_eq!(state, reconnecting(0));
        assert!(actions.is_empty(), "must not schedule a second retry loop");
    }

    #[test]
    fn loss_while_disconnected_is_ignored() {
        let (state, actions) = SessionState::Disconnected.on_event(lost());
        assert_eq!(state, SessionState::Disconnected);
        assert!(actions.is_empty());
    }

    #[test]
    fn timer_probes_captured_endpoint() {
        let (state, actions) = reconnecting(0).on_event(Event::ReconnectTimer);

        assert_eq!(state, reconnecting(1));
        assert_eq!(
            actions,
            vec![Action::ProbeEndpoint {
                endpoint: "/dev/ttyACM0".into()
            }]
        );
    }

    #[test]
    fn failed_reopen_stays_reconnecting_and_reschedules() {
        let (state, actions) = reconnecting(3).on_event(Event::ReopenFailed {
            error: "endpoint not present".into(),
        });

        assert_eq!(state, reconnecting(3));
        assert!(actions.iter().any(|a| matches!(a, Action::ScheduleRetry)));
        assert!(actions.iter().any(|a| matches!(
            a,
            Action::EmitEvent(SessionEvent::ReconnectFailed { attempt: 3, .. })
        )));
    }

    #[test]
    fn successful_reopen_resumes_with_fresh_start() {
        let (state, actions) = reconnecting(2).on_event(Event::ReopenSucceeded);

        assert_eq!(state, connected());
        assert_eq!(
            actions,
            vec![
                Action::InvalidateBoard,
                Action::EmitEvent(SessionEvent::Reconnected {
                    endpoint: "/dev/ttyACM0".into()
                }),
                Action::IssueStart,
            ]
        );
    }

    #[test]
    fn cancel_stops_reconnecting() {
        let (state, actions) = reconnecting(1).on_event(Event::CancelRequested);

        assert_eq!(state, SessionState::Disconnected);
        assert!(actions.iter().any(|a| matches!(a, Action::CancelReconnect)));
    }

    #[test]
    fn cancel_when_not_reconnecting_is_ignored() {
        let (state, actions) = connected().on_event(Event::CancelRequested);
        assert_eq!(state, connected());
        assert!(actions.is_empty());
    }

    #[test]
    fn manual_open_during_reconnect_cancels_loop() {
        let (state, actions) = reconnecting(4).on_event(Event::Opened {
            endpoint: "COM5".into(),
        });

        assert_eq!(state.endpoint(), Some("COM5"));
        assert!(actions.iter().any(|a| matches!(a, Action::CancelReconnect)));
    }

    #[test]
    fn close_from_connected() {
        let (state, actions) = connected().on_event(Event::CloseRequested);

        assert_eq!(state, SessionState::Disconnected);
        assert!(actions.iter().any(|a| matches!(a, Action::CloseLink)));
    }

    #[test]
    fn failed_open_from_connected_disconnects() {
        let (state, actions) = connected().on_event(Event::OpenFailed {
            endpoint: "COM9".into(),
            error: "no such device".into(),
        });

        assert_eq!(state, SessionState::Disconnected);
        assert_eq!(
            actions,
            vec![
                Action::CloseLink,
                Action::InvalidateBoard,
                Action::EmitEvent(SessionEvent::Disconnected),
            ]
        );
    }

    #[test]
    fn failed_open_while_reconnecting_keeps_retrying() {
        let (state, actions) = reconnecting(2).on_event(Event::OpenFailed {
            endpoint: "COM9".into(),
            error: "no such device".into(),
        });

        assert_eq!(state, reconnecting(2));
        assert!(actions.is_empty());
    }

    #[test]
    fn stray_reopen_result_after_cancel_is_ignored() {
        let (state, _) = reconnecting(1).on_event(Event::CancelRequested);
        let (state, actions) = state.on_event(Event::ReopenSucceeded);
        assert_eq!(state, SessionState::Disconnected);
        assert!(actions.is_empty());
    }

    #[test]
    fn full_reconnect_flow() {
        let (state, _) = connected().on_event(lost());
        let (state, _) = state.on_event(Event::ReconnectTimer);
        let (state, _) = state.on_event(Event::ReopenFailed {
            error: "busy".into(),
        });
        let (state, _) = state.on_event(Event::ReconnectTimer);
        assert_eq!(state, reconnecting(2));
        let (state, _) = state.on_event(Event::ReopenSucceeded);
        assert!(state.is_connected());
    }
}
