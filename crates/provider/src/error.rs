/// Errors returned by a [`TrustHub`](crate::TrustHub) implementation.
///
/// `Display` is the text a registrant sees in a failed step, so the
/// `Api` variant renders the provider's own message and nothing else.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered with a non-2xx status.
    #[error("{message}")]
    Api {
        status: u16,
        /// Provider error code, when the body carried one.
        code: Option<u64>,
        message: String,
    },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("provider request failed: {0}")]
    Transport(String),

    /// A 2xx response whose body could not be understood.
    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// HTTP status of an `Api` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
