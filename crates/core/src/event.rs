//! Provider status callbacks.
//!
//! The provider delivers brand and campaign status changes in several
//! shapes: flat form fields (`BrandSid=...&BrandStatus=...`), a single JSON
//! object, or an array of event envelopes whose `data` member carries the
//! fields. [`parse_status_events`] normalises all of them into
//! [`StatusEvent`]s. Keys are compared case-insensitively with `_` and `-`
//! removed, so `BrandSid`, `brand_sid` and `brandsid` are the same key.

use serde_json::{Map, Value};

use crate::registration::{RegistrationPatch, RegistrationStatus};

/// Which resource a status event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Brand,
    Campaign,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub kind: EventKind,
    /// The provider SID the event is about.
    pub sid: String,
    /// Provider status, lowercased.
    pub status: Option<String>,
    pub identity_status: Option<String>,
    pub errors: Vec<String>,
}

const APPROVED: &[&str] = &["approved", "registered", "verified", "success", "active"];
const REJECTED: &[&str] = &["failed", "failure", "rejected", "suspended"];

impl StatusEvent {
    fn is_approved(&self) -> bool {
        self.status.as_deref().is_some_and(|s| APPROVED.contains(&s))
    }

    fn is_rejected(&self) -> bool {
        self.status.as_deref().is_some_and(|s| REJECTED.contains(&s))
    }

    /// The registration update this event implies.
    ///
    /// A rejected brand or campaign rejects the registration; only an
    /// approved campaign approves it.
    pub fn to_patch(&self) -> RegistrationPatch {
        let mut patch = RegistrationPatch {
            sid: Some(self.sid.clone()),
            ..RegistrationPatch::default()
        };
        match self.kind {
            EventKind::Brand => {
                patch.brand_status = self.status.clone();
                patch.identity_status = self.identity_status.clone();
                if !self.errors.is_empty() {
                    patch.brand_status_errors = Some(self.errors.clone());
                }
            }
            EventKind::Campaign => {
                patch.campaign_status = self.status.clone();
                if self.is_approved() {
                    patch.status = Some(RegistrationStatus::Approved);
                }
            }
        }
        if self.is_rejected() {
            patch.status = Some(RegistrationStatus::Rejected);
        }
        patch
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// A flattened view of one event's fields with normalised keys.
struct Fields {
    map: Map<String, Value>,
    event_type: Option<String>,
}

impl Fields {
    fn from_object(obj: &Map<String, Value>) -> Self {
        let mut event_type = None;
        let mut source = obj;
        if let Some(Value::Object(data)) = obj.get("data") {
            event_type = obj.get("type").and_then(Value::as_str).map(str::to_lowercase);
            source = data;
        }
        let map = source
            .iter()
            .map(|(k, v)| (normalize_key(k), v.clone()))
            .collect();
        Self { map, event_type }
    }

    fn text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| match self.map.get(*k) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    fn errors(&self, keys: &[&str]) -> Vec<String> {
        for key in keys {
            match self.map.get(*key) {
                Some(Value::String(s)) if !s.trim().is_empty() => return vec![s.trim().to_string()],
                Some(Value::Array(items)) => {
                    let errors: Vec<String> = items
                        .iter()
                        .filter_map(|item| match item {
                            Value::String(s) => Some(s.clone()),
                            Value::Null => None,
                            other => Some(other.to_string()),
                        })
                        .collect();
                    if !errors.is_empty() {
                        return errors;
                    }
                }
                _ => {}
            }
        }
        Vec::new()
    }

    /// Status implied by an envelope type such as
    /// `com.twilio.messaging.compliance.campaign-registration.campaign-approved`.
    fn status_from_type(&self) -> Option<String> {
        let ty = self.event_type.as_deref()?;
        let last = ty.rsplit('.').next()?;
        let status = last.rsplit('-').next()?;
        Some(status.to_string())
    }
}

fn parse_one(obj: &Map<String, Value>, hint: Option<EventKind>) -> Option<StatusEvent> {
    let fields = Fields::from_object(obj);

    let campaign_sid = fields.text(&["campaignsid", "campaignregistrationsid"]);
    let brand_sid = fields.text(&["brandsid", "brandregistrationsid"]);
    let generic_sid = fields.text(&["sid", "resourcesid"]);

    let kind = match (&campaign_sid, &brand_sid, hint) {
        (_, _, Some(k)) => k,
        (Some(_), _, None) => EventKind::Campaign,
        (None, Some(_), None) => EventKind::Brand,
        (None, None, None) => match fields.event_type.as_deref() {
            Some(t) if t.contains("campaign") => EventKind::Campaign,
            Some(t) if t.contains("brand") => EventKind::Brand,
            _ => return None,
        },
    };

    let sid = match kind {
        EventKind::Campaign => campaign_sid.or(generic_sid).or(brand_sid),
        EventKind::Brand => brand_sid.or(generic_sid),
    }?;

    let status = match kind {
        EventKind::Brand => fields.text(&["brandstatus", "status"]),
        EventKind::Campaign => fields.text(&[
            "campaignstatus",
            "campaignregistrationstatus",
            "externalstatus",
            "status",
        ]),
    }
    .or_else(|| fields.status_from_type())
    .map(|s| s.to_lowercase());

    Some(StatusEvent {
        kind,
        sid,
        status,
        identity_status: fields
            .text(&["identitystatus"])
            .map(|s| s.to_lowercase()),
        errors: fields.errors(&[
            "brandstatuserrors",
            "errors",
            "failurereason",
            "brandfailurereason",
            "failurereasons",
        ]),
    })
}

/// Extract every status event from a callback payload.
///
/// `hint` is the kind implied by the endpoint the payload arrived on; when
/// absent, the kind is inferred from the fields present. Entries that name
/// no SID are skipped.
pub fn parse_status_events(payload: &Value, hint: Option<EventKind>) -> Vec<StatusEvent> {
    match payload {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|obj| parse_one(obj, hint))
            .collect(),
        Value::Object(obj) => parse_one(obj, hint).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Remove `null` members from objects, recursively.
///
/// Null array elements are removed too; the document store rejects nulls
/// anywhere in a written value.
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(obj) => Value::Object(
            obj.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(strip_nulls)
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_form_brand_event() {
        let payload = json!({"BrandSid": "BN123", "BrandStatus": "APPROVED", "IdentityStatus": "VERIFIED"});
        let events = parse_status_events(&payload, None);
        assert_eq!(
            events,
            vec![StatusEvent {
                kind: EventKind::Brand,
                sid: "BN123".to_string(),
                status: Some("approved".to_string()),
                identity_status: Some("verified".to_string()),
                errors: vec![],
            }]
        );
    }

    #[test]
    fn approved_brand_patch_keeps_registration_pending() {
        let payload = json!({"brand_sid": "BN123", "status": "approved"});
        let patch = parse_status_events(&payload, Some(EventKind::Brand))[0].to_patch();
        assert_eq!(patch.brand_status.as_deref(), Some("approved"));
        assert_eq!(patch.sid.as_deref(), Some("BN123"));
        assert_eq!(patch.status, None);
    }

    #[test]
    fn failed_brand_rejects_with_errors() {
        let payload = json!({"brandsid": "BN1", "brandstatus": "FAILED", "errors": ["TAX_ID mismatch", null]});
        let patch = parse_status_events(&payload, None)[0].to_patch();
        assert_eq!(patch.status, Some(RegistrationStatus::Rejected));
        assert_eq!(patch.brand_status_errors, Some(vec!["TAX_ID mismatch".to_string()]));
    }

    #[test]
    fn envelope_array_with_type_derived_status() {
        let payload = json!([
            {
                "type": "com.twilio.messaging.compliance.campaign-registration.campaign-approved",
                "data": {"campaignsid": "QE1", "messagingservicesid": "MG1"}
            },
            {"type": "com.twilio.other", "data": {"nothing": true}}
        ]);
        let events = parse_status_events(&payload, None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Campaign);
        assert_eq!(events[0].status.as_deref(), Some("approved"));
        assert_eq!(events[0].to_patch().status, Some(RegistrationStatus::Approved));
    }

    #[test]
    fn event_without_sid_is_skipped() {
        assert!(parse_status_events(&json!({"status": "approved"}), Some(EventKind::Brand)).is_empty());
        assert!(parse_status_events(&json!("approved"), None).is_empty());
    }

    #[test]
    fn strip_nulls_recurses() {
        let cleaned = strip_nulls(json!({"a": null, "b": {"c": null, "d": 1}, "e": [null, 2]}));
        assert_eq!(cleaned, json!({"b": {"d": 1}, "e": [2]}));
    }
}
