//! a2p-storage: persistence for A2P registrations.
//!
//! - [`RegistrationStore`] -- the backend-agnostic store contract
//! - [`MemoryStore`] -- in-process backend with an optional snapshot file
//! - [`conformance`] -- the suite every backend must pass

pub mod conformance;
mod error;
mod ids;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use ids::{generate_id, now_timestamp};
pub use memory::MemoryStore;
pub use record::WebhookDump;
pub use traits::RegistrationStore;
