use async_trait::async_trait;
use tokio::sync::watch;

use a2p_core::{Registration, RegistrationForm, RegistrationPatch};

use crate::error::StorageError;
use crate::record::WebhookDump;

/// The storage trait for A2P registration backends.
///
/// A `RegistrationStore` holds two collections: `registrations`, keyed by
/// an internal ID the store generates, and `webhook-dumps`, an append-only
/// audit log of every provider callback.
///
/// ## Write semantics
///
/// `update` is a merge-write: fields absent from the patch are left alone,
/// steps are merged per stage, and the record's `updated_at` is stamped on
/// every call (including an empty patch). A step update that would move a
/// step backwards is dropped; the rest of the patch still applies. There is
/// no version check, so concurrent writers to the same field resolve
/// last-write-wins.
///
/// A write that returns `Err` leaves nothing behind: readers never see it
/// and subscribers are not notified.
///
/// ## SID uniqueness
///
/// A provider SID may be linked to at most one registration. `update`
/// returns `Err(StorageError::DuplicateSid)` when a patch would link a SID
/// that another registration already carries, which keeps `get_by_sid`
/// unambiguous.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait RegistrationStore: Send + Sync + 'static {
    // ── Registrations ─────────────────────────────────────────────────────────

    /// Create a registration for `user_id` with every step pending.
    async fn create(
        &self,
        user_id: &str,
        form: RegistrationForm,
    ) -> Result<Registration, StorageError>;

    /// Merge `patch` into the registration and return the stored result.
    ///
    /// Returns `Err(StorageError::RegistrationNotFound)` if `id` is unknown.
    async fn update(
        &self,
        id: &str,
        patch: RegistrationPatch,
    ) -> Result<Registration, StorageError>;

    /// Point lookup by internal ID.
    async fn get_by_id(&self, id: &str) -> Result<Option<Registration>, StorageError>;

    /// Find the registration linked to a provider SID.
    ///
    /// Matches the `sid` alias and each of the five stage SIDs.
    async fn get_by_sid(&self, sid: &str) -> Result<Option<Registration>, StorageError>;

    /// All registrations owned by `user_id`, newest first.
    async fn list_by_owner(&self, user_id: &str) -> Result<Vec<Registration>, StorageError>;

    /// Live view of `list_by_owner(user_id)`.
    ///
    /// The receiver starts with the current list and is re-published after
    /// every change to one of the owner's registrations.
    async fn subscribe_by_owner(
        &self,
        user_id: &str,
    ) -> Result<watch::Receiver<Vec<Registration>>, StorageError>;

    // ── Webhook audit log ─────────────────────────────────────────────────────

    /// Append a raw callback payload. Nulls are stripped before writing.
    async fn insert_webhook_dump(
        &self,
        source: &str,
        digest: &str,
        payload: serde_json::Value,
    ) -> Result<WebhookDump, StorageError>;

    /// Most recent dumps first.
    ///
    /// - `limit`: maximum number of results (0 = no limit)
    async fn list_webhook_dumps(&self, limit: usize) -> Result<Vec<WebhookDump>, StorageError>;
}
