//! User-facing flow errors

use thiserror::Error;

/// Failures the flow reports to the user
///
/// `InvalidInput` and `DuplicateProject` keep the session so the user can
/// retry; every other kind clears it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("Could not extract any tasks from the messages")]
    EmptyExtraction,

    #[error("Project '{0}' already exists")]
    DuplicateProject(String),

    #[error("Storage failed after saving {created} of {total} tasks")]
    PersistenceFailure { created: usize, total: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("The extracted tasks are no longer available")]
    TasksLost,
}

impl FlowError {
    /// Whether the session survives this error
    pub fn keeps_session(&self) -> bool {
        matches!(self, FlowError::InvalidInput(_) | FlowError::DuplicateProject(_))
    }
}
