//! a2p-workflow: the A2P 10DLC registration workflow.
//!
//! - [`stages`] -- one executor per registration stage
//! - [`Registrar`] -- runs the stages in order and persists every step
//! - [`WebhookIngestor`] -- dumps and correlates provider status callbacks
//! - [`ActivityLog`] -- bounded recent-activity log shared by all of the above

mod activity;
mod error;
mod orchestrator;
pub mod stages;
mod webhook;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use activity::{ActivityEntry, ActivityLevel, ActivityLog, DEFAULT_ACTIVITY_CAPACITY};
pub use error::WorkflowError;
pub use orchestrator::{Registrar, RegistrationOutcome, RunState};
pub use stages::StageResult;
pub use webhook::{payload_digest, IngestReport, WebhookIngestor};
