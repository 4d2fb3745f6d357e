//! Maps raw queue payloads onto mutation handlers and decides what the queue
//! should do with each message afterwards.

use crate::actions::{decode_action, decode_kind, ActionKind, Discriminator};
use crate::error::MutationError;
use crate::mutations::{MutationService, Outcome};

/// What the consumer tells the queue about a processed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Remove the message from the queue.
    Ack,
    /// Hand the message back for redelivery.
    Requeue,
}

/// Result of routing one payload.
#[derive(Debug)]
pub enum Verdict {
    Applied { kind: ActionKind, outcome: Outcome },
    /// The `action` field named nothing this consumer handles.
    Unknown(String),
    /// Permanent failure; redelivering the same payload cannot succeed.
    Rejected {
        kind: Option<ActionKind>,
        error: MutationError,
    },
    /// Transient store failure.
    Retry { kind: ActionKind, error: MutationError },
}

impl Verdict {
    pub fn disposition(&self) -> Disposition {
        match self {
            Verdict::Retry { .. } => Disposition::Requeue,
            _ => Disposition::Ack,
        }
    }
}

#[derive(Clone)]
pub struct Router {
    service: MutationService,
}

impl Router {
    pub fn new(service: MutationService) -> Self {
        Self { service }
    }

    /// Decodes and applies one payload. Never panics on bad input; every
    /// failure is folded into the returned [`Verdict`].
    pub fn route(&self, payload: &[u8]) -> Verdict {
        let kind = match decode_kind(payload) {
            Ok(Discriminator::Known(kind)) => kind,
            Ok(Discriminator::Unknown(name)) => {
                tracing::warn!(action = %name, "ignoring message with unknown action");
                return Verdict::Unknown(name);
            }
            Err(err) => {
                tracing::warn!(error = %err, bytes = payload.len(), "dropping undecodable message");
                return Verdict::Rejected {
                    kind: None,
                    error: err.into(),
                };
            }
        };

        let result = decode_action(payload)
            .map_err(MutationError::from)
            .and_then(|action| self.service.apply(action));

        match result {
            Ok(outcome) => {
                tracing::info!(action = %kind, ?outcome, "action applied");
                Verdict::Applied { kind, outcome }
            }
            Err(error) if error.is_retryable() => {
                tracing::warn!(action = %kind, error = %error, kind = error.kind(), "action failed; requeueing");
                Verdict::Retry { kind, error }
            }
            Err(error @ MutationError::IdCollision { .. }) => {
                tracing::error!(action = %kind, error = %error, "id counter handed out an existing id");
                Verdict::Rejected {
                    kind: Some(kind),
                    error,
                }
            }
            Err(error) => {
                tracing::warn!(action = %kind, error = %error, kind = error.kind(), "action rejected");
                Verdict::Rejected {
                    kind: Some(kind),
                    error,
                }
            }
        }
    }
}
