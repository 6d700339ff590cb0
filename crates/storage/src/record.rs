use serde::{Deserialize, Serialize};

/// A raw inbound webhook, as stored in the `webhook-dumps` collection.
///
/// Written for every callback before any correlation is attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDump {
    pub id: String,
    /// Endpoint the callback arrived on, e.g. `a2p/brand` or `twilio/status`.
    pub source: String,
    /// Server-side receipt timestamp.
    pub received_at: String,
    /// Hex SHA-256 of the stored payload, computed after nulls are removed.
    pub digest: String,
    /// The payload with nulls removed.
    pub payload: serde_json::Value,
}
