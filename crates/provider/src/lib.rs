//! a2p-provider: the remote resource client.
//!
//! [`TrustHub`] is the seam the registration stages call through;
//! [`TwilioClient`] is the production implementation against the Trust
//! Hub, Messaging and Address APIs.

mod error;
mod trust_hub;
mod twilio;

pub use error::ProviderError;
pub use trust_hub::{BundleKind, TrustHub};
pub use twilio::{
    TwilioClient, TwilioCredentials, TwilioEndpoints, DEFAULT_API_URL, DEFAULT_MESSAGING_URL,
    DEFAULT_TRUSTHUB_URL,
};
