use a2p_core::FormError;
use a2p_storage::StorageError;

/// Errors that abort a registration or webhook request outright.
///
/// Stage failures are not errors at this level: they are reported in a
/// [`RegistrationOutcome`](crate::RegistrationOutcome) with `success: false`.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The form was rejected before anything was created.
    #[error("invalid registration form: {0}")]
    InvalidForm(#[from] FormError),

    /// `run` was given a registration whose steps have already moved.
    #[error("registration {id} has already been started")]
    AlreadyStarted { id: String },

    /// A store read or write failed; the request cannot continue.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
