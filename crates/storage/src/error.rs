/// All errors that can be returned by a RegistrationStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No registration with the given internal ID.
    #[error("registration not found: {id}")]
    RegistrationNotFound { id: String },

    /// The provider SID is already linked to a different registration.
    /// SIDs must identify exactly one registration so that webhook
    /// correlation is unambiguous.
    #[error("sid {sid} is already linked to registration {registration_id}")]
    DuplicateSid {
        sid: String,
        registration_id: String,
    },

    /// A backend-specific storage error (I/O, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
