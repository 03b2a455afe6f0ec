//! Evaluation status and the transition table
//!
//! Every status change goes through [`EvalStatus::apply`]. Erasure is not a
//! transition: it removes the evaluation from the registry in any status.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{TransitionError, TransitionResult};
use super::ids::EvalId;

/// Lifecycle status of an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalStatus {
    /// Sent, awaiting a reply
    Pending,
    /// Interrupt requested, awaiting a reply
    Interrupt,
    /// Completed with a value
    Success,
    /// Completed with a value that reports failed assertions or errors
    Failure,
    /// Completed by raising
    Exception,
    /// Symbol lookup resolved
    Lookup,
}

impl EvalStatus {
    /// True for `pending` and `interrupt`.
    pub fn is_in_flight(self) -> bool {
        matches!(self, EvalStatus::Pending | EvalStatus::Interrupt)
    }

    /// True once no further transition is accepted.
    pub fn is_terminal(self) -> bool {
        !self.is_in_flight()
    }

    /// True for the statuses whose label carries elapsed time.
    pub fn is_completed_eval(self) -> bool {
        matches!(
            self,
            EvalStatus::Success | EvalStatus::Failure | EvalStatus::Exception
        )
    }

    /// Lowercase name, as used in configuration keys.
    pub fn as_str(self) -> &'static str {
        match self {
            EvalStatus::Pending => "pending",
            EvalStatus::Interrupt => "interrupt",
            EvalStatus::Success => "success",
            EvalStatus::Failure => "failure",
            EvalStatus::Exception => "exception",
            EvalStatus::Lookup => "lookup",
        }
    }

    /// Compute the status after `event`, or reject the event.
    pub fn apply(self, id: EvalId, event: EvalEvent) -> TransitionResult<EvalStatus> {
        use EvalEvent as E;
        use EvalStatus as S;

        let next = match (self, event) {
            (S::Pending, E::Interrupt) => S::Interrupt,
            (S::Pending | S::Interrupt, E::Reply { failed: false }) => S::Success,
            (S::Pending | S::Interrupt, E::Reply { failed: true }) => S::Failure,
            (S::Pending | S::Interrupt, E::Raise) => S::Exception,
            (S::Pending, E::LookupResolved) => S::Lookup,
            (from, event) => return Err(TransitionError::Illegal { id, from, event }),
        };
        Ok(next)
    }
}

impl fmt::Display for EvalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that drive status transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalEvent {
    /// Backend returned a value; `failed` if it carries a nonzero fail/error count
    Reply {
        /// Classification of the reply payload
        failed: bool,
    },
    /// Backend reported an exception
    Raise,
    /// User asked to interrupt
    Interrupt,
    /// Backend answered a symbol lookup
    LookupResolved,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: EvalId = EvalId(10);

    #[test]
    fn test_pending_transitions() {
        let pending = EvalStatus::Pending;
        assert_eq!(
            pending.apply(ID, EvalEvent::Interrupt),
            Ok(EvalStatus::Interrupt)
        );
        assert_eq!(
            pending.apply(ID, EvalEvent::Reply { failed: false }),
            Ok(EvalStatus::Success)
        );
        assert_eq!(
            pending.apply(ID, EvalEvent::Reply { failed: true }),
            Ok(EvalStatus::Failure)
        );
        assert_eq!(pending.apply(ID, EvalEvent::Raise), Ok(EvalStatus::Exception));
        assert_eq!(
            pending.apply(ID, EvalEvent::LookupResolved),
            Ok(EvalStatus::Lookup)
        );
    }

    #[test]
    fn test_interrupt_resolves_but_cannot_reinterrupt() {
        let interrupt = EvalStatus::Interrupt;
        assert_eq!(
            interrupt.apply(ID, EvalEvent::Reply { failed: false }),
            Ok(EvalStatus::Success)
        );
        assert_eq!(interrupt.apply(ID, EvalEvent::Raise), Ok(EvalStatus::Exception));
        assert!(interrupt.apply(ID, EvalEvent::Interrupt).is_err());
        assert!(interrupt.apply(ID, EvalEvent::LookupResolved).is_err());
    }

    #[test]
    fn test_terminal_statuses_reject_everything() {
        let events = [
            EvalEvent::Reply { failed: false },
            EvalEvent::Raise,
            EvalEvent::Interrupt,
            EvalEvent::LookupResolved,
        ];
        for status in [
            EvalStatus::Success,
            EvalStatus::Failure,
            EvalStatus::Exception,
            EvalStatus::Lookup,
        ] {
            assert!(status.is_terminal());
            for event in events {
                let err = status.apply(ID, event).unwrap_err();
                assert_eq!(
                    err,
                    TransitionError::Illegal {
                        id: ID,
                        from: status,
                        event
                    }
                );
            }
        }
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&EvalStatus::Exception).unwrap();
        assert_eq!(json, "\"exception\"");
    }
}
