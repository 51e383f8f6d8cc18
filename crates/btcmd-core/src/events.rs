//! Session event system.
//!
//! The runner publishes a [`SessionEvent`] for every observable step of a
//! transaction. Events fan out over a `tokio::sync::broadcast` channel, so
//! any number of front ends can watch a session without slowing it down.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::broadcast;

use btcmd_types::{RadioState, SessionStateKind};

use crate::error::TransactionError;
use crate::session::{Response, TransactionId, TransactionOutcome, TransactionReport};

/// Events emitted by a running session.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionEvent {
    /// The radio reported a new state.
    RadioStateChanged { state: RadioState },
    /// The session moved to a new phase.
    StateChanged {
        from: SessionStateKind,
        to: SessionStateKind,
    },
    /// A command was refused without starting a transaction.
    CommandRejected { error: TransactionError },
    /// The scan found a peripheral and the session is connecting to it.
    PeripheralDiscovered {
        transaction: TransactionId,
        peripheral: String,
    },
    /// A response characteristic was read.
    ResponseReceived {
        transaction: TransactionId,
        response: Response,
    },
    /// A transaction ended.
    TransactionFinished {
        transaction: TransactionId,
        #[serde(with = "time::serde::rfc3339")]
        finished_at: OffsetDateTime,
        outcome: FinishedOutcome,
    },
}

/// Serializable form of a transaction outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FinishedOutcome {
    /// The command was written and every response read.
    Completed { report: TransactionReport },
    /// The transaction was abandoned.
    Failed { error: TransactionError },
}

impl FinishedOutcome {
    /// Whether the transaction completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

impl From<TransactionOutcome> for FinishedOutcome {
    fn from(outcome: TransactionOutcome) -> Self {
        match outcome {
            Ok(report) => Self::Completed { report },
            Err(error) => Self::Failed { error },
        }
    }
}

impl From<FinishedOutcome> for TransactionOutcome {
    fn from(outcome: FinishedOutcome) -> Self {
        match outcome {
            FinishedOutcome::Completed { report } => Ok(report),
            FinishedOutcome::Failed { error } => Err(error),
        }
    }
}

/// Sender for session events.
pub type EventSender = broadcast::Sender<SessionEvent>;

/// Receiver for session events.
pub type EventReceiver = broadcast::Receiver<SessionEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: SessionEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = SessionEvent::StateChanged {
            from: SessionStateKind::Idle,
            to: SessionStateKind::Scanning,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"state_changed\""));
        assert!(json.contains("\"to\":\"Scanning\""));
    }

    #[test]
    fn test_finished_event_uses_rfc3339() {
        let event = SessionEvent::TransactionFinished {
            transaction: serde_json::from_str("3").unwrap(),
            finished_at: OffsetDateTime::UNIX_EPOCH,
            outcome: FinishedOutcome::Failed {
                error: TransactionError::Busy,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("1970-01-01T00:00:00Z"));
        assert!(json.contains("\"status\":\"failed\""));

        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_outcome_conversion() {
        let outcome: TransactionOutcome = Err(TransactionError::Shutdown);
        let finished = FinishedOutcome::from(outcome.clone());
        assert!(!finished.is_completed());
        assert_eq!(TransactionOutcome::from(finished), outcome);
    }

    #[tokio::test]
    async fn test_dispatcher() {
        let dispatcher = EventDispatcher::new(10);
        let mut rx = dispatcher.subscribe();
        assert_eq!(dispatcher.receiver_count(), 1);

        dispatcher.send(SessionEvent::RadioStateChanged {
            state: RadioState::PoweredOn,
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            SessionEvent::RadioStateChanged {
                state: RadioState::PoweredOn
            }
        ));
    }

    #[test]
    fn test_send_without_receivers() {
        let dispatcher = EventDispatcher::default();
        dispatcher.send(SessionEvent::CommandRejected {
            error: TransactionError::Busy,
        });
    }
}
