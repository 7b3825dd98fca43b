use crate::phase::PhaseKind;
use crate::{BodyId, ParticipantId};
use thiserror::Error;

/// Failures raised by coordination components.
///
/// None of these are fatal: the session logs them at its boundary and keeps
/// ticking, so a misbehaving observer never stalls a race other people are in.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RaceError {
    #[error("permission denied: {operation} requires authority")]
    PermissionDenied { operation: &'static str },

    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: PhaseKind, to: PhaseKind },

    #[error("unknown phase code {0}")]
    UnknownPhase(u8),

    #[error("participant {participant} has no body")]
    MissingBody { participant: ParticipantId },

    #[error("unknown participant {0}")]
    UnknownParticipant(ParticipantId),

    #[error("participant {participant} already owns body {body}")]
    BodyAlreadyAssigned {
        participant: ParticipantId,
        body: BodyId,
    },
}

impl RaceError {
    /// Whether the error came from an observer trying to act as the authority.
    pub fn is_permission(&self) -> bool {
        matches!(self, RaceError::PermissionDenied { .. })
    }
}
