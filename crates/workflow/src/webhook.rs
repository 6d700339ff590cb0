//! Provider status callbacks.
//!
//! Every payload is dumped to the audit collection before anything else
//! happens. Correlation is best effort: an event naming an unknown SID, or
//! a patch the store refuses, is logged and skipped so the provider is not
//! asked to redeliver a callback that can never apply.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use a2p_core::{parse_status_events, strip_nulls, EventKind, StatusEvent};
use a2p_storage::RegistrationStore;

use crate::activity::ActivityLog;
use crate::error::WorkflowError;

/// Result of one ingested callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub dump_id: String,
    pub digest: String,
    /// Registrations that received an update.
    pub updated: Vec<String>,
    /// SIDs whose event could not be applied (no linked registration, or
    /// the store refused the update).
    pub unmatched: Vec<String>,
}

/// Hex SHA-256 of the payload's JSON rendering.
///
/// Object keys serialize in sorted order, so equal payloads hash equally
/// regardless of the order the provider sent them in.
pub fn payload_digest(payload: &Value) -> String {
    let bytes = serde_json::to_vec(payload).unwrap_or_default();
    Sha256::digest(&bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub struct WebhookIngestor {
    store: Arc<dyn RegistrationStore>,
    activity: Arc<ActivityLog>,
}

impl WebhookIngestor {
    pub fn new(store: Arc<dyn RegistrationStore>, activity: Arc<ActivityLog>) -> Self {
        Self { store, activity }
    }

    /// Dump a brand or campaign status callback and apply its events.
    ///
    /// Only a failed dump is an error.
    pub async fn ingest_status(
        &self,
        kind: EventKind,
        payload: Value,
    ) -> Result<IngestReport, WorkflowError> {
        let source = match kind {
            EventKind::Brand => "a2p/brand",
            EventKind::Campaign => "a2p/campaign",
        };
        let payload = strip_nulls(payload);
        let mut report = self.dump(source, &payload).await?;

        for event in parse_status_events(&payload, Some(kind)) {
            match self.apply(&event).await {
                Some(registration_id) => report.updated.push(registration_id),
                None => report.unmatched.push(event.sid),
            }
        }
        if report.updated.is_empty() && report.unmatched.is_empty() {
            tracing::warn!(source, dump_id = %report.dump_id, "callback carried no status events");
        }
        Ok(report)
    }

    /// Dump a messaging-service callback (`inbound`, `fallback`, `status`).
    pub async fn record_callback(
        &self,
        kind: &str,
        payload: Value,
    ) -> Result<IngestReport, WorkflowError> {
        let source = format!("twilio/{}", kind);
        self.dump(&source, &strip_nulls(payload)).await
    }

    async fn dump(&self, source: &str, payload: &Value) -> Result<IngestReport, WorkflowError> {
        let digest = payload_digest(payload);
        let dump = match self
            .store
            .insert_webhook_dump(source, &digest, payload.clone())
            .await
        {
            Ok(dump) => dump,
            Err(e) => {
                tracing::error!(source, error = %e, "webhook dump failed");
                self.activity
                    .error(None, format!("Failed to record {source} callback: {e}"));
                return Err(e.into());
            }
        };
        tracing::debug!(source, dump_id = %dump.id, %digest, "webhook dumped");
        Ok(IngestReport {
            dump_id: dump.id,
            digest,
            ..IngestReport::default()
        })
    }

    /// Patch the registration linked to the event's SID. Returns its ID.
    async fn apply(&self, event: &StatusEvent) -> Option<String> {
        let sid = event.sid.as_str();
        let registration = match self.store.get_by_sid(sid).await {
            Ok(Some(registration)) => registration,
            Ok(None) => {
                tracing::info!(sid, "no registration linked to callback sid");
                self.activity
                    .warn(None, format!("Callback for unknown SID {sid}"));
                return None;
            }
            Err(e) => {
                tracing::error!(sid, error = %e, "callback lookup failed");
                return None;
            }
        };

        let id = registration.id;
        match self.store.update(&id, event.to_patch()).await {
            Ok(updated) => {
                tracing::info!(
                    registration_id = %id,
                    sid,
                    status = %updated.status,
                    "callback applied"
                );
                let status = event.status.as_deref().unwrap_or("unknown");
                self.activity.info(
                    Some(&id),
                    format!("{:?} {} is now {}", event.kind, sid, status),
                );
                Some(id)
            }
            Err(e) => {
                tracing::error!(registration_id = %id, sid, error = %e, "callback update failed");
                self.activity
                    .error(Some(&id), format!("Failed to apply callback for {sid}: {e}"));
                None
            }
        }
    }
}
