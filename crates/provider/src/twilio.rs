//! Twilio implementation of [`TrustHub`].
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. Every call is a form-encoded POST with HTTP
//! Basic auth; list parameters go out as repeated keys.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use a2p_core::payload::{
    AddressRequest, BrandRegistrationRequest, CampaignRequest, CustomerProfileRequest,
    EndUserRequest, MessagingServiceRequest, Params, SupportingDocumentRequest,
    TrustProductRequest,
};

use crate::error::ProviderError;
use crate::trust_hub::{BundleKind, TrustHub};

pub const DEFAULT_TRUSTHUB_URL: &str = "https://trusthub.twilio.com/v1";
pub const DEFAULT_MESSAGING_URL: &str = "https://messaging.twilio.com/v1";
pub const DEFAULT_API_URL: &str = "https://api.twilio.com/2010-04-01";

/// Upper bound on a single provider call, connect through body.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Base URLs of the three provider hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwilioEndpoints {
    /// Trust Hub: customer profiles, end users, documents, trust products.
    pub trusthub: String,
    /// Messaging: brand registrations, services, campaigns.
    pub messaging: String,
    /// Core REST API: addresses.
    pub api: String,
}

impl Default for TwilioEndpoints {
    fn default() -> Self {
        Self {
            trusthub: DEFAULT_TRUSTHUB_URL.to_string(),
            messaging: DEFAULT_MESSAGING_URL.to_string(),
            api: DEFAULT_API_URL.to_string(),
        }
    }
}

impl TwilioEndpoints {
    /// Serve all three APIs from one base URL (staging proxies, fakes).
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            trusthub: base.clone(),
            messaging: base.clone(),
            api: base,
        }
    }
}

/// Account credentials. `Debug` never prints the token.
#[derive(Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
}

impl fmt::Debug for TwilioCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

impl TwilioCredentials {
    /// `Authorization` header value for HTTP Basic auth.
    pub fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.account_sid, self.auth_token);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }
}

/// HTTP client for the Trust Hub, Messaging and Address APIs.
pub struct TwilioClient {
    account_sid: String,
    authorization: String,
    endpoints: TwilioEndpoints,
    agent: ureq::Agent,
}

impl TwilioClient {
    pub fn new(credentials: TwilioCredentials, endpoints: TwilioEndpoints) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();
        TwilioClient {
            authorization: credentials.basic_auth(),
            account_sid: credentials.account_sid,
            endpoints,
            agent,
        }
    }

    pub fn endpoints(&self) -> &TwilioEndpoints {
        &self.endpoints
    }

    fn trusthub(&self, path: &str) -> String {
        join_url(&self.endpoints.trusthub, path)
    }

    fn messaging(&self, path: &str) -> String {
        join_url(&self.endpoints.messaging, path)
    }

    fn api(&self, path: &str) -> String {
        join_url(&self.endpoints.api, path)
    }

    /// POST `params` and return the decoded JSON body of a 2xx response.
    async fn post(&self, url: String, params: Params) -> Result<serde_json::Value, ProviderError> {
        let agent = self.agent.clone();
        let authorization = self.authorization.clone();

        tracing::debug!(%url, "provider request");
        let result = tokio::task::spawn_blocking(move || {
            post_form(&agent, &url, &authorization, &params)
        })
        .await
        .map_err(|e| ProviderError::Transport(format!("task join error: {}", e)))?;

        if let Err(e) = &result {
            tracing::warn!(status = ?e.status(), error = %e, "provider request failed");
        }
        result
    }

    /// POST and extract the created resource's SID.
    async fn create(&self, url: String, params: Params) -> Result<String, ProviderError> {
        let body = self.post(url, params).await?;
        sid_of(&body)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn post_form(
    agent: &ureq::Agent,
    url: &str,
    authorization: &str,
    params: &Params,
) -> Result<serde_json::Value, ProviderError> {
    let response = agent
        .post(url)
        .header("Authorization", authorization)
        .header("Accept", "application/json")
        .send_form(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

    let status = response.status().as_u16();
    let body = response
        .into_body()
        .read_to_string()
        .map_err(|e| ProviderError::Decode(format!("failed to read response body: {}", e)))?;

    if !(200..300).contains(&status) {
        return Err(api_error(status, &body));
    }
    serde_json::from_str(&body)
        .map_err(|e| ProviderError::Decode(format!("failed to parse response as JSON: {}", e)))
}

/// Twilio's error body: `{"code": 21601, "message": "...", "status": 400}`.
#[derive(Deserialize)]
struct ApiErrorBody {
    code: Option<u64>,
    message: Option<String>,
}

fn api_error(status: u16, body: &str) -> ProviderError {
    let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
    let code = parsed.as_ref().and_then(|b| b.code);
    let message = parsed
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .or_else(|| {
            let text = body.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
        .unwrap_or_else(|| format!("HTTP {}", status));
    ProviderError::Api {
        status,
        code,
        message,
    }
}

fn sid_of(body: &serde_json::Value) -> Result<String, ProviderError> {
    body.get("sid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Decode("response has no sid".to_string()))
}

#[async_trait]
impl TrustHub for TwilioClient {
    async fn create_customer_profile(
        &self,
        req: &CustomerProfileRequest,
    ) -> Result<String, ProviderError> {
        self.create(self.trusthub("CustomerProfiles"), req.to_params())
            .await
    }

    async fn create_end_user(&self, req: &EndUserRequest) -> Result<String, ProviderError> {
        self.create(self.trusthub("EndUsers"), req.to_params()).await
    }

    async fn create_address(&self, req: &AddressRequest) -> Result<String, ProviderError> {
        let path = format!("Accounts/{}/Addresses.json", self.account_sid);
        self.create(self.api(&path), req.to_params()).await
    }

    async fn create_supporting_document(
        &self,
        req: &SupportingDocumentRequest,
    ) -> Result<String, ProviderError> {
        self.create(self.trusthub("SupportingDocuments"), req.to_params())
            .await
    }

    async fn assign_entity(
        &self,
        bundle: BundleKind,
        bundle_sid: &str,
        object_sid: &str,
    ) -> Result<String, ProviderError> {
        let path = format!("{}/{}/EntityAssignments", bundle.collection(), bundle_sid);
        let params = vec![("ObjectSid".to_string(), object_sid.to_string())];
        self.create(self.trusthub(&path), params).await
    }

    async fn submit_for_review(
        &self,
        bundle: BundleKind,
        bundle_sid: &str,
    ) -> Result<(), ProviderError> {
        let path = format!("{}/{}", bundle.collection(), bundle_sid);
        let params = vec![("Status".to_string(), "pending-review".to_string())];
        self.post(self.trusthub(&path), params).await?;
        Ok(())
    }

    async fn create_trust_product(
        &self,
        req: &TrustProductRequest,
    ) -> Result<String, ProviderError> {
        self.create(self.trusthub("TrustProducts"), req.to_params())
            .await
    }

    async fn create_brand_registration(
        &self,
        req: &BrandRegistrationRequest,
    ) -> Result<String, ProviderError> {
        self.create(self.messaging("a2p/BrandRegistrations"), req.to_params())
            .await
    }

    async fn create_messaging_service(
        &self,
        req: &MessagingServiceRequest,
    ) -> Result<String, ProviderError> {
        self.create(self.messaging("Services"), req.to_params())
            .await
    }

    async fn create_campaign(
        &self,
        messaging_service_sid: &str,
        req: &CampaignRequest,
    ) -> Result<String, ProviderError> {
        let path = format!("Services/{}/Compliance/Usa2p", messaging_service_sid);
        self.create(self.messaging(&path), req.to_params()).await
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> TwilioCredentials {
        TwilioCredentials {
            account_sid: "AC123".to_string(),
            auth_token: "secret".to_string(),
        }
    }

    #[test]
    fn basic_auth_encodes_sid_and_token() {
        // base64("AC123:secret")
        assert_eq!(creds().basic_auth(), "Basic QUMxMjM6c2VjcmV0");
    }

    #[test]
    fn debug_redacts_token() {
        let shown = format!("{:?}", creds());
        assert!(shown.contains("AC123"));
        assert!(!shown.contains("secret"));
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(
            join_url("https://x.test/v1/", "/Services"),
            "https://x.test/v1/Services"
        );
        assert_eq!(join_url("https://x.test/v1", "Services"), "https://x.test/v1/Services");
    }

    #[test]
    fn single_endpoint_shares_base() {
        let e = TwilioEndpoints::single("http://127.0.0.1:9/");
        assert_eq!(e.trusthub, "http://127.0.0.1:9");
        assert_eq!(e.messaging, e.api);
    }

    #[test]
    fn api_error_uses_provider_message_and_code() {
        let err = api_error(400, r#"{"code":21601,"message":"limit exceeded","status":400}"#);
        match err {
            ProviderError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, Some(21601));
                assert_eq!(message, "limit exceeded");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn api_error_falls_back_to_body_then_status() {
        assert_eq!(api_error(502, "Bad Gateway").to_string(), "Bad Gateway");
        assert_eq!(api_error(503, "").to_string(), "HTTP 503");
    }

    #[test]
    fn sid_of_requires_non_empty_sid() {
        assert_eq!(
            sid_of(&serde_json::json!({"sid": "BU1"})).unwrap(),
            "BU1"
        );
        assert!(matches!(
            sid_of(&serde_json::json!({"sid": ""})),
            Err(ProviderError::Decode(_))
        ));
        assert!(matches!(
            sid_of(&serde_json::json!({})),
            Err(ProviderError::Decode(_))
        ));
    }

    #[test]
    fn bundle_collections() {
        assert_eq!(BundleKind::CustomerProfile.collection(), "CustomerProfiles");
        assert_eq!(BundleKind::TrustProduct.to_string(), "TrustProducts");
    }
}
