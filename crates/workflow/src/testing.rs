//! Test doubles for the remote resource client.
//!
//! Available to this crate's tests and, with the `testing` feature, to
//! downstream crates.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use a2p_core::payload::{
    AddressRequest, BrandRegistrationRequest, CampaignRequest, CustomerProfileRequest,
    EndUserRequest, MessagingServiceRequest, Params, SupportingDocumentRequest,
    TrustProductRequest,
};
use a2p_provider::{BundleKind, ProviderError, TrustHub};

pub use a2p_storage::conformance::sample_form;

/// One `TrustHub` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateCustomerProfile,
    CreateEndUser,
    CreateAddress,
    CreateSupportingDocument,
    AssignEntity,
    SubmitForReview,
    CreateTrustProduct,
    CreateBrandRegistration,
    CreateMessagingService,
    CreateCampaign,
}

impl Operation {
    /// Prefix of the fake SIDs this operation hands out.
    fn sid_prefix(self) -> &'static str {
        match self {
            Operation::CreateCustomerProfile => "CP",
            Operation::CreateEndUser => "IT",
            Operation::CreateAddress => "AD",
            Operation::CreateSupportingDocument => "RD",
            Operation::AssignEntity => "BV",
            Operation::SubmitForReview => "",
            Operation::CreateTrustProduct => "TP",
            Operation::CreateBrandRegistration => "BN",
            Operation::CreateMessagingService => "MG",
            Operation::CreateCampaign => "QE",
        }
    }
}

/// A call as the double saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: Operation,
    /// Bundle or messaging service SID the call was addressed to.
    pub target: Option<String>,
    pub params: Params,
}

impl RecordedCall {
    /// First value of `key` in the request parameters.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct State {
    calls: Vec<RecordedCall>,
    issued: HashMap<Operation, usize>,
    failures: HashMap<Operation, String>,
}

/// A `TrustHub` that records every call and returns predictable SIDs
/// (`CP1`, `TP1`, `BN1`, ...). Individual operations can be told to fail.
#[derive(Default)]
pub struct RecordingTrustHub {
    state: Mutex<State>,
}

impl RecordingTrustHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call to `operation` fail with `message`.
    pub fn fail_on(&self, operation: Operation, message: &str) {
        self.lock().failures.insert(operation, message.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.lock().calls.iter().map(|c| c.operation).collect()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn handle(
        &self,
        operation: Operation,
        target: Option<&str>,
        params: Params,
    ) -> Result<String, ProviderError> {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            operation,
            target: target.map(str::to_string),
            params,
        });
        if let Some(message) = state.failures.get(&operation) {
            return Err(ProviderError::Api {
                status: 400,
                code: None,
                message: message.clone(),
            });
        }
        let n = state.issued.entry(operation).or_insert(0);
        *n += 1;
        Ok(format!("{}{}", operation.sid_prefix(), n))
    }
}

#[async_trait]
impl TrustHub for RecordingTrustHub {
    async fn create_customer_profile(
        &self,
        req: &CustomerProfileRequest,
    ) -> Result<String, ProviderError> {
        self.handle(Operation::CreateCustomerProfile, None, req.to_params())
    }

    async fn create_end_user(&self, req: &EndUserRequest) -> Result<String, ProviderError> {
        self.handle(Operation::CreateEndUser, None, req.to_params())
    }

    async fn create_address(&self, req: &AddressRequest) -> Result<String, ProviderError> {
        self.handle(Operation::CreateAddress, None, req.to_params())
    }

    async fn create_supporting_document(
        &self,
        req: &SupportingDocumentRequest,
    ) -> Result<String, ProviderError> {
        self.handle(Operation::CreateSupportingDocument, None, req.to_params())
    }

    async fn assign_entity(
        &self,
        _bundle: BundleKind,
        bundle_sid: &str,
        object_sid: &str,
    ) -> Result<String, ProviderError> {
        let params = vec![("ObjectSid".to_string(), object_sid.to_string())];
        self.handle(Operation::AssignEntity, Some(bundle_sid), params)
    }

    async fn submit_for_review(
        &self,
        _bundle: BundleKind,
        bundle_sid: &str,
    ) -> Result<(), ProviderError> {
        let params = vec![("Status".to_string(), "pending-review".to_string())];
        self.handle(Operation::SubmitForReview, Some(bundle_sid), params)
            .map(|_| ())
    }

    async fn create_trust_product(
        &self,
        req: &TrustProductRequest,
    ) -> Result<String, ProviderError> {
        self.handle(Operation::CreateTrustProduct, None, req.to_params())
    }

    async fn create_brand_registration(
        &self,
        req: &BrandRegistrationRequest,
    ) -> Result<String, ProviderError> {
        self.handle(Operation::CreateBrandRegistration, None, req.to_params())
    }

    async fn create_messaging_service(
        &self,
        req: &MessagingServiceRequest,
    ) -> Result<String, ProviderError> {
        self.handle(Operation::CreateMessagingService, None, req.to_params())
    }

    async fn create_campaign(
        &self,
        messaging_service_sid: &str,
        req: &CampaignRequest,
    ) -> Result<String, ProviderError> {
        self.handle(
            Operation::CreateCampaign,
            Some(messaging_service_sid),
            req.to_params(),
        )
    }
}
