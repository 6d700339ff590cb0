use std::fmt;

use async_trait::async_trait;

use a2p_core::payload::{
    AddressRequest, BrandRegistrationRequest, CampaignRequest, CustomerProfileRequest,
    EndUserRequest, MessagingServiceRequest, SupportingDocumentRequest, TrustProductRequest,
};

use crate::error::ProviderError;

/// The two Trust Hub bundle types that accept entity assignments and are
/// submitted for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleKind {
    CustomerProfile,
    TrustProduct,
}

impl BundleKind {
    /// Collection name in the Trust Hub URL space.
    pub fn collection(self) -> &'static str {
        match self {
            BundleKind::CustomerProfile => "CustomerProfiles",
            BundleKind::TrustProduct => "TrustProducts",
        }
    }
}

impl fmt::Display for BundleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Remote resource operations used by the registration stages.
///
/// Every `create_*` call creates a durable remote resource and returns its
/// SID. Nothing here retries: a failure is returned to the caller as-is,
/// and resources created by earlier calls are left in place.
///
/// Implementations must be `Send + Sync` so one client can be shared by
/// concurrent registrations behind an `Arc<dyn TrustHub>`.
#[async_trait]
pub trait TrustHub: Send + Sync {
    async fn create_customer_profile(
        &self,
        req: &CustomerProfileRequest,
    ) -> Result<String, ProviderError>;

    /// Create a business-information, authorized-representative or
    /// messaging-profile sub-entity.
    async fn create_end_user(&self, req: &EndUserRequest) -> Result<String, ProviderError>;

    async fn create_address(&self, req: &AddressRequest) -> Result<String, ProviderError>;

    async fn create_supporting_document(
        &self,
        req: &SupportingDocumentRequest,
    ) -> Result<String, ProviderError>;

    /// Link an end user, supporting document, or another bundle to a bundle.
    /// Returns the assignment SID.
    async fn assign_entity(
        &self,
        bundle: BundleKind,
        bundle_sid: &str,
        object_sid: &str,
    ) -> Result<String, ProviderError>;

    /// Move a bundle to `pending-review`.
    async fn submit_for_review(
        &self,
        bundle: BundleKind,
        bundle_sid: &str,
    ) -> Result<(), ProviderError>;

    async fn create_trust_product(
        &self,
        req: &TrustProductRequest,
    ) -> Result<String, ProviderError>;

    async fn create_brand_registration(
        &self,
        req: &BrandRegistrationRequest,
    ) -> Result<String, ProviderError>;

    async fn create_messaging_service(
        &self,
        req: &MessagingServiceRequest,
    ) -> Result<String, ProviderError>;

    /// Create the A2P compliance campaign under a messaging service.
    async fn create_campaign(
        &self,
        messaging_service_sid: &str,
        req: &CampaignRequest,
    ) -> Result<String, ProviderError>;
}
