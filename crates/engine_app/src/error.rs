//! Coordinator error types.

use engine_component::StoreError;
use engine_event::{EventError, SimTime};
use engine_record::RecordError;

/// Errors that halt a run.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// A store operation failed outside system logic.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The event queue rejected an operation.
    #[error(transparent)]
    Event(#[from] EventError),

    /// A system published the wrong number of handles.
    #[error("system `{system}` published {count} handles, expected exactly one")]
    ProtocolViolation {
        /// The offending system.
        system: String,
        /// How many handles it published.
        count: usize,
    },

    /// A system's update or cleanup returned an error.
    #[error("system `{system}` faulted: {error:#}")]
    SystemFault {
        /// The faulting system.
        system: String,
        /// What it returned.
        error: anyhow::Error,
    },

    /// The recorder failed.
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// The category of a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A component was added twice.
    DuplicateComponent,
    /// A component or entity lookup missed.
    NotFound,
    /// The entity identifier space ran out.
    ResourceExhausted,
    /// The store changed structurally under an open cursor.
    ConcurrentModification,
    /// Something was scheduled in the past.
    CausalityViolation,
    /// A NaN or infinite time reached the queue.
    InvalidTime,
    /// A system broke the engine's contract: wrong handle count, undeclared
    /// access, or misuse of an event.
    ProtocolViolation,
    /// An error inside system logic.
    SystemFault,
    /// Snapshotting or recording failed.
    Persistence,
}

impl From<&StoreError> for ErrorKind {
    fn from(error: &StoreError) -> Self {
        match error {
            StoreError::DuplicateComponent { .. } => Self::DuplicateComponent,
            StoreError::ComponentNotFound { .. } | StoreError::EntityNotFound(_) => Self::NotFound,
            StoreError::ResourceExhausted => Self::ResourceExhausted,
            StoreError::ConcurrentModification => Self::ConcurrentModification,
            StoreError::TypeConflict { .. } | StoreError::AccessNotDeclared { .. } => {
                Self::ProtocolViolation
            }
            StoreError::Snapshot { .. } => Self::Persistence,
        }
    }
}

impl From<&EventError> for ErrorKind {
    fn from(error: &EventError) -> Self {
        match error {
            EventError::CausalityViolation { .. } => Self::CausalityViolation,
            EventError::InvalidTime(_) => Self::InvalidTime,
            EventError::UnknownEvent(_)
            | EventError::AlreadyScheduled(_)
            | EventError::NotPending { .. }
            | EventError::PendingBefore { .. } => Self::ProtocolViolation,
        }
    }
}

impl CycleError {
    /// The category of this error. A system fault caused by a store error
    /// reports the store error's category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(error) => error.into(),
            Self::Event(error) => error.into(),
            Self::ProtocolViolation { .. } => ErrorKind::ProtocolViolation,
            Self::SystemFault { error, .. } => error
                .downcast_ref::<StoreError>()
                .map_or(ErrorKind::SystemFault, ErrorKind::from),
            Self::Record(_) => ErrorKind::Persistence,
        }
    }
}

/// A fatal error and the virtual time it happened at.
#[derive(Debug, thiserror::Error)]
#[error("run failed at {time}: {error}")]
pub struct RunError {
    /// Virtual time of the failure.
    pub time: SimTime,
    /// What went wrong.
    #[source]
    pub error: CycleError,
}

impl RunError {
    /// The category of the underlying error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

#[cfg(test)]
mod tests {
    use engine_component::Entity;

    use super::*;

    #[test]
    fn test_store_fault_reports_store_kind() {
        let error = CycleError::SystemFault {
            system: "move".into(),
            error: StoreError::EntityNotFound(Entity::from_parts(1, 0)).into(),
        };
        assert_eq!(error.kind(), ErrorKind::NotFound);

        let error = CycleError::SystemFault {
            system: "move".into(),
            error: anyhow::anyhow!("boom"),
        };
        assert_eq!(error.kind(), ErrorKind::SystemFault);
    }

    #[test]
    fn test_run_error_display_includes_time() {
        let error = RunError {
            time: SimTime::new(4.0).unwrap(),
            error: CycleError::ProtocolViolation {
                system: "a".into(),
                count: 2,
            },
        };
        assert_eq!(error.kind(), ErrorKind::ProtocolViolation);
        assert_eq!(
            error.to_string(),
            "run failed at t=4: system `a` published 2 handles, expected exactly one"
        );
    }
}
