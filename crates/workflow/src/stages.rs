//! The five stage executors.
//!
//! Each executor turns the form (plus SIDs from earlier stages) into one
//! or more provider calls and reports a [`StageResult`]. Provider errors
//! stop at this boundary: an executor never returns `Err`.

use serde::Serialize;

use a2p_core::payload::{
    AddressRequest, BrandRegistrationRequest, CampaignRequest, CustomerProfileRequest,
    EndUserRequest, MessagingServiceRequest, SupportingDocumentRequest, TrustProductRequest,
};
use a2p_core::{ProviderSids, RegistrationForm, Stage};
use a2p_provider::{BundleKind, ProviderError, TrustHub};

const UNKNOWN_ERROR: &str = "Unknown error";

/// Normalised outcome of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    pub stage: Stage,
    pub success: bool,
    pub message: String,
    /// SID of the resource the stage created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageResult {
    fn completed(stage: Stage, sid: String) -> Self {
        Self {
            stage,
            success: true,
            message: format!("{} created successfully", capitalized(stage.label())),
            sid: Some(sid),
            error: None,
        }
    }

    fn failed(stage: Stage, error: impl ToString) -> Self {
        let error = error.to_string();
        let error = if error.trim().is_empty() {
            UNKNOWN_ERROR.to_string()
        } else {
            error
        };
        Self {
            stage,
            success: false,
            message: format!("Failed to create {}", stage.label()),
            sid: None,
            error: Some(error),
        }
    }

    fn from_provider(stage: Stage, result: Result<String, ProviderError>) -> Self {
        match result {
            Ok(sid) => Self::completed(stage, sid),
            Err(e) => Self::failed(stage, e),
        }
    }
}

fn capitalized(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// What every stage may draw on.
pub struct StageInput<'a> {
    pub form: &'a RegistrationForm,
    /// Public base URL of this service, for messaging webhooks.
    pub base_url: &'a str,
    /// SIDs produced by stages that have already succeeded.
    pub sids: &'a ProviderSids,
}

/// Run `stage` with the SIDs it depends on.
///
/// A missing prerequisite SID fails the stage without calling the
/// provider.
pub async fn execute(stage: Stage, hub: &dyn TrustHub, input: &StageInput<'_>) -> StageResult {
    let require = |dep: Stage| {
        input
            .sids
            .get(dep)
            .ok_or_else(|| StageResult::failed(stage, format!("missing {} SID", dep.label())))
    };

    match stage {
        Stage::CustomerProfile => customer_profile(hub, input.form).await,
        Stage::TrustProduct => match require(Stage::CustomerProfile) {
            Ok(cp) => trust_product(hub, input.form, cp).await,
            Err(failed) => failed,
        },
        Stage::BrandRegistration => {
            match (require(Stage::CustomerProfile), require(Stage::TrustProduct)) {
                (Ok(cp), Ok(tp)) => brand_registration(hub, cp, tp).await,
                (Err(failed), _) | (_, Err(failed)) => failed,
            }
        }
        Stage::MessagingService => messaging_service(hub, input.form, input.base_url).await,
        Stage::Campaign => {
            match (require(Stage::BrandRegistration), require(Stage::MessagingService)) {
                (Ok(bn), Ok(ms)) => campaign(hub, input.form, bn, ms).await,
                (Err(failed), _) | (_, Err(failed)) => failed,
            }
        }
    }
}

// ── Customer profile ─────────────────────────────────────────────────────────

/// Create the secondary customer profile and everything it must carry,
/// then submit it for review.
pub async fn customer_profile(hub: &dyn TrustHub, form: &RegistrationForm) -> StageResult {
    StageResult::from_provider(
        Stage::CustomerProfile,
        build_customer_profile(hub, form).await,
    )
}

async fn build_customer_profile(
    hub: &dyn TrustHub,
    form: &RegistrationForm,
) -> Result<String, ProviderError> {
    let profile = hub
        .create_customer_profile(&CustomerProfileRequest::from_form(form))
        .await?;

    let business = hub
        .create_end_user(&EndUserRequest::business_information(form))
        .await?;
    let representative = hub
        .create_end_user(&EndUserRequest::authorized_representative(form))
        .await?;
    let address = hub.create_address(&AddressRequest::from_form(form)).await?;
    let document = hub
        .create_supporting_document(&SupportingDocumentRequest::for_address(form, &address))
        .await?;

    for object in [&business, &representative, &document] {
        hub.assign_entity(BundleKind::CustomerProfile, &profile, object)
            .await?;
    }
    hub.submit_for_review(BundleKind::CustomerProfile, &profile)
        .await?;

    Ok(profile)
}

// ── Trust product ────────────────────────────────────────────────────────────

pub async fn trust_product(
    hub: &dyn TrustHub,
    form: &RegistrationForm,
    customer_profile_sid: &str,
) -> StageResult {
    StageResult::from_provider(
        Stage::TrustProduct,
        build_trust_product(hub, form, customer_profile_sid).await,
    )
}

async fn build_trust_product(
    hub: &dyn TrustHub,
    form: &RegistrationForm,
    customer_profile_sid: &str,
) -> Result<String, ProviderError> {
    let product = hub
        .create_trust_product(&TrustProductRequest::from_form(form))
        .await?;
    let messaging_profile = hub
        .create_end_user(&EndUserRequest::messaging_profile_information(form))
        .await?;

    hub.assign_entity(BundleKind::TrustProduct, &product, &messaging_profile)
        .await?;
    hub.assign_entity(BundleKind::TrustProduct, &product, customer_profile_sid)
        .await?;
    hub.submit_for_review(BundleKind::TrustProduct, &product)
        .await?;

    Ok(product)
}

// ── Brand registration ───────────────────────────────────────────────────────

pub async fn brand_registration(
    hub: &dyn TrustHub,
    customer_profile_sid: &str,
    trust_product_sid: &str,
) -> StageResult {
    let req = BrandRegistrationRequest::new(customer_profile_sid, trust_product_sid);
    StageResult::from_provider(
        Stage::BrandRegistration,
        hub.create_brand_registration(&req).await,
    )
}

// ── Messaging service ────────────────────────────────────────────────────────

pub async fn messaging_service(
    hub: &dyn TrustHub,
    form: &RegistrationForm,
    base_url: &str,
) -> StageResult {
    let req = MessagingServiceRequest::from_form(form, base_url);
    StageResult::from_provider(
        Stage::MessagingService,
        hub.create_messaging_service(&req).await,
    )
}

// ── Campaign ─────────────────────────────────────────────────────────────────

pub async fn campaign(
    hub: &dyn TrustHub,
    form: &RegistrationForm,
    brand_registration_sid: &str,
    messaging_service_sid: &str,
) -> StageResult {
    let req = CampaignRequest::from_form(form, brand_registration_sid);
    StageResult::from_provider(
        Stage::Campaign,
        hub.create_campaign(messaging_service_sid, &req).await,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_form, Operation, RecordingTrustHub};

    #[test]
    fn messages_name_the_resource() {
        let ok = StageResult::completed(Stage::BrandRegistration, "BN1".to_string());
        assert_eq!(ok.message, "Brand registration created successfully");
        let failed = StageResult::failed(Stage::TrustProduct, "limit exceeded");
        assert_eq!(failed.message, "Failed to create trust product");
        assert_eq!(failed.error.as_deref(), Some("limit exceeded"));
    }

    #[test]
    fn empty_error_becomes_unknown_error() {
        let failed = StageResult::failed(Stage::Campaign, "  ");
        assert_eq!(failed.error.as_deref(), Some("Unknown error"));
    }

    #[tokio::test]
    async fn customer_profile_links_three_entities_then_submits() {
        let hub = RecordingTrustHub::new();
        let result = customer_profile(&hub, &sample_form()).await;
        assert!(result.success, "{result:?}");
        assert_eq!(result.sid.as_deref(), Some("CP1"));

        let ops = hub.operations();
        assert_eq!(ops.first(), Some(&Operation::CreateCustomerProfile));
        assert_eq!(ops.last(), Some(&Operation::SubmitForReview));
        assert_eq!(hub.count(Operation::AssignEntity), 3);

        let first_assign = ops
            .iter()
            .position(|o| *o == Operation::AssignEntity)
            .unwrap();
        let last_create = ops
            .iter()
            .rposition(|o| {
                matches!(
                    o,
                    Operation::CreateEndUser
                        | Operation::CreateAddress
                        | Operation::CreateSupportingDocument
                )
            })
            .unwrap();
        assert!(last_create < first_assign, "assigned before creating: {ops:?}");
    }

    #[tokio::test]
    async fn supporting_document_references_the_address() {
        let hub = RecordingTrustHub::new();
        customer_profile(&hub, &sample_form()).await;
        let doc = hub
            .calls()
            .into_iter()
            .find(|c| c.operation == Operation::CreateSupportingDocument)
            .unwrap();
        assert!(doc.param("Attributes").unwrap().contains("AD1"));
    }

    #[tokio::test]
    async fn trust_product_links_the_customer_profile() {
        let hub = RecordingTrustHub::new();
        let result = trust_product(&hub, &sample_form(), "CP9").await;
        assert!(result.success);

        let assigned: Vec<String> = hub
            .calls()
            .into_iter()
            .filter(|c| c.operation == Operation::AssignEntity)
            .filter_map(|c| c.param("ObjectSid").map(str::to_string))
            .collect();
        assert!(assigned.contains(&"CP9".to_string()), "{assigned:?}");
        assert_eq!(hub.operations().last(), Some(&Operation::SubmitForReview));
    }

    #[tokio::test]
    async fn failure_inside_a_stage_is_normalised() {
        let hub = RecordingTrustHub::new();
        hub.fail_on(Operation::CreateAddress, "address invalid");
        let result = customer_profile(&hub, &sample_form()).await;
        assert!(!result.success);
        assert_eq!(result.message, "Failed to create customer profile");
        assert_eq!(result.error.as_deref(), Some("address invalid"));
        assert_eq!(hub.count(Operation::AssignEntity), 0);
    }

    #[tokio::test]
    async fn campaign_payload_carries_opt_in_and_opt_out_text() {
        let hub = RecordingTrustHub::new();
        let result = campaign(&hub, &sample_form(), "BN1", "MG1").await;
        assert!(result.success);

        let call = hub
            .calls()
            .into_iter()
            .find(|c| c.operation == Operation::CreateCampaign)
            .unwrap();
        assert_eq!(call.target.as_deref(), Some("MG1"));
        assert_eq!(
            call.param("OptInMessage"),
            Some("You are now opted-in to receive messages from Acme Realty. Reply HELP for help, STOP to cancel.")
        );
        assert_eq!(
            call.param("OptOutMessage"),
            Some("You have been unsubscribed from Acme Realty. You will no longer receive messages from this number.")
        );
        assert_eq!(call.param("BrandRegistrationSid"), Some("BN1"));
    }

    #[tokio::test]
    async fn execute_refuses_missing_prerequisites() {
        let hub = RecordingTrustHub::new();
        let mut sids = ProviderSids::default();
        sids.customer_profile_sid = Some("CP1".to_string());
        let form = sample_form();
        let input = StageInput {
            form: &form,
            base_url: "https://app.example",
            sids: &sids,
        };

        let result = execute(Stage::BrandRegistration, &hub, &input).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("missing trust product SID"));

        let result = execute(Stage::Campaign, &hub, &input).await;
        assert_eq!(
            result.error.as_deref(),
            Some("missing brand registration SID")
        );
        assert!(hub.calls().is_empty());
    }
}
