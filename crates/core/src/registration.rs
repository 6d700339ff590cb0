//! The persisted registration record and its typed partial update.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::form::RegistrationForm;
use crate::stage::{initial_steps, Stage, StepStatus};

/// Overall outcome of a registration.
///
/// Only a provider callback or an unrecoverable stage failure moves a
/// registration out of `pending`; finishing the five stages does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Provider-assigned identifiers, one per stage, filled in as stages succeed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSids {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_profile_sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_product_sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_registration_sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messaging_service_sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_sid: Option<String>,
}

impl ProviderSids {
    pub fn get(&self, stage: Stage) -> Option<&str> {
        let slot = match stage {
            Stage::CustomerProfile => &self.customer_profile_sid,
            Stage::TrustProduct => &self.trust_product_sid,
            Stage::BrandRegistration => &self.brand_registration_sid,
            Stage::MessagingService => &self.messaging_service_sid,
            Stage::Campaign => &self.campaign_sid,
        };
        slot.as_deref()
    }

    pub fn set(&mut self, stage: Stage, sid: impl Into<String>) {
        let slot = match stage {
            Stage::CustomerProfile => &mut self.customer_profile_sid,
            Stage::TrustProduct => &mut self.trust_product_sid,
            Stage::BrandRegistration => &mut self.brand_registration_sid,
            Stage::MessagingService => &mut self.messaging_service_sid,
            Stage::Campaign => &mut self.campaign_sid,
        };
        *slot = Some(sid.into());
    }

    /// Present SIDs in stage order.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, &str)> + '_ {
        Stage::ALL
            .into_iter()
            .filter_map(move |stage| self.get(stage).map(|sid| (stage, sid)))
    }

    fn merge(&mut self, other: &ProviderSids) {
        for (stage, sid) in other.iter() {
            self.set(stage, sid);
        }
    }
}

/// A registration record as stored in the `registrations` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    /// Owning tenant / location.
    pub user_id: String,
    pub status: RegistrationStatus,

    /// Correlation alias: the SID the most recent provider callback referenced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(flatten)]
    pub sids: ProviderSids,

    #[serde(default, skip_serializing_if = "Option::is_none", rename = "brandstatus")]
    pub brand_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub brand_status_errors: Vec<String>,

    pub steps: BTreeMap<Stage, StepStatus>,
    pub form_data: RegistrationForm,

    pub created_at: String,
    pub updated_at: String,
}

impl Registration {
    /// A new registration with all five steps pending.
    pub fn new(id: String, user_id: String, form_data: RegistrationForm, now: String) -> Self {
        Self {
            id,
            user_id,
            status: RegistrationStatus::Pending,
            sid: None,
            sids: ProviderSids::default(),
            brand_status: None,
            identity_status: None,
            campaign_status: None,
            brand_status_errors: Vec::new(),
            steps: initial_steps(),
            form_data,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Every provider SID linked to this record, including the alias.
    pub fn linked_sids(&self) -> impl Iterator<Item = &str> + '_ {
        self.sid
            .as_deref()
            .into_iter()
            .chain(self.sids.iter().map(|(_, sid)| sid))
    }

    pub fn is_linked_to(&self, sid: &str) -> bool {
        self.linked_sids().any(|s| s == sid)
    }

    /// Merge a patch into this record and stamp `updated_at`.
    ///
    /// Absent patch fields leave the record untouched. Steps are merged per
    /// stage, and a step update that would move a step backwards (or out of
    /// a terminal state) is dropped. Returns the stages whose update was
    /// dropped.
    pub fn apply(&mut self, patch: &RegistrationPatch, now: String) -> Vec<Stage> {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(sid) = &patch.sid {
            self.sid = Some(sid.clone());
        }
        self.sids.merge(&patch.sids);
        if let Some(v) = &patch.brand_status {
            self.brand_status = Some(v.clone());
        }
        if let Some(v) = &patch.identity_status {
            self.identity_status = Some(v.clone());
        }
        if let Some(v) = &patch.campaign_status {
            self.campaign_status = Some(v.clone());
        }
        if let Some(v) = &patch.brand_status_errors {
            self.brand_status_errors = v.clone();
        }

        let mut rejected = Vec::new();
        for (stage, next) in &patch.steps {
            match self.steps.get(stage) {
                Some(current) if !current.status.can_transition_to(next.status) => {
                    rejected.push(*stage);
                }
                _ => {
                    self.steps.insert(*stage, next.clone());
                }
            }
        }

        self.updated_at = now;
        rejected
    }
}

/// A partial update to a [`Registration`].
///
/// `None` means "leave as is": a patch cannot write a null, so nullish
/// values never reach the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RegistrationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(flatten)]
    pub sids: ProviderSids,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "brandstatus")]
    pub brand_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_status_errors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub steps: BTreeMap<Stage, StepStatus>,
}

impl RegistrationPatch {
    pub fn step(stage: Stage, status: StepStatus) -> Self {
        let mut patch = Self::default();
        patch.steps.insert(stage, status);
        patch
    }

    /// Record a stage's success: its SID and its completed step together.
    pub fn stage_completed(stage: Stage, sid: &str, message: impl Into<String>) -> Self {
        let mut patch = Self::step(stage, StepStatus::completed(message));
        patch.sids.set(stage, sid);
        patch
    }

    /// SIDs this patch would link to the record.
    pub fn linked_sids(&self) -> impl Iterator<Item = &str> + '_ {
        self.sid
            .as_deref()
            .into_iter()
            .chain(self.sids.iter().map(|(_, sid)| sid))
    }
}
