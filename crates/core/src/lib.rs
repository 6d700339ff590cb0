//! a2p-core: the A2P 10DLC registration model.
//!
//! Everything in this crate is pure: no I/O, no clocks, no randomness.
//!
//! - [`Stage`] / [`StepStatus`] -- the five-stage execution log
//! - [`Registration`] / [`RegistrationPatch`] -- the persisted record and
//!   its typed partial update
//! - [`RegistrationForm`] -- the submitted business details and their
//!   validation
//! - [`payload`] -- one request schema per provider endpoint, built from
//!   the form by pure mapping functions
//! - [`event`] -- normalisation of provider status callbacks

pub mod event;
pub mod form;
pub mod payload;
pub mod registration;
pub mod stage;

pub use event::{parse_status_events, strip_nulls, EventKind, StatusEvent};
pub use form::{AuthorizedRepresentative, BusinessAddress, FormError, RegistrationForm};
pub use registration::{ProviderSids, Registration, RegistrationPatch, RegistrationStatus};
pub use stage::{initial_steps, Stage, StepState, StepStatus};
