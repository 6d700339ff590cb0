//! Provider request schemas.
//!
//! One struct per provider endpoint, each built from the registration form
//! (and any SIDs from earlier stages) by a pure `from_form`-style function,
//! and each rendered to the provider's form-encoded parameter list by
//! `to_params()`. List parameters are emitted as repeated keys.

use serde_json::json;

use crate::form::RegistrationForm;

/// Form-encoded request parameters, in order. Keys may repeat.
pub type Params = Vec<(String, String)>;

/// Trust Hub policy for secondary customer profiles.
pub const CUSTOMER_PROFILE_POLICY_SID: &str = "RNdfbf3fae0e1107f8aded0e7cead80bf5";

/// Trust Hub policy for A2P messaging profile trust products.
pub const A2P_TRUST_PRODUCT_POLICY_SID: &str = "RNb0d4771c2c98518d916a3d4cd70a8f8b";

/// Messaging service validity period, in seconds (4 hours).
pub const VALIDITY_PERIOD_SECS: u32 = 14_400;

pub const OPT_IN_KEYWORDS: &[&str] = &["START", "YES", "UNSTOP"];
pub const OPT_OUT_KEYWORDS: &[&str] = &["STOP", "STOPALL", "UNSUBSCRIBE", "CANCEL", "END", "QUIT"];
pub const HELP_KEYWORDS: &[&str] = &["HELP", "INFO"];

fn param(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

fn repeated(params: &mut Params, key: &str, values: &[String]) {
    params.extend(values.iter().map(|v| param(key, v.clone())));
}

// ──────────────────────────────────────────────
// Customer profile
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerProfileRequest {
    pub friendly_name: String,
    pub email: String,
    pub policy_sid: String,
}

impl CustomerProfileRequest {
    pub fn from_form(form: &RegistrationForm) -> Self {
        Self {
            friendly_name: format!("{} Customer Profile", form.legal_company_name),
            email: form.email.clone(),
            policy_sid: CUSTOMER_PROFILE_POLICY_SID.to_string(),
        }
    }

    pub fn to_params(&self) -> Params {
        vec![
            param("FriendlyName", &*self.friendly_name),
            param("Email", &*self.email),
            param("PolicySid", &*self.policy_sid),
        ]
    }
}

/// Sub-entity kinds attached to customer profiles and trust products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndUserKind {
    BusinessInformation,
    AuthorizedRepresentative,
    MessagingProfileInformation,
}

impl EndUserKind {
    pub fn type_name(self) -> &'static str {
        match self {
            EndUserKind::BusinessInformation => "customer_profile_business_information",
            EndUserKind::AuthorizedRepresentative => "authorized_representative_1",
            EndUserKind::MessagingProfileInformation => "us_a2p_messaging_profile_information",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndUserRequest {
    pub kind: EndUserKind,
    pub friendly_name: String,
    pub attributes: serde_json::Value,
}

impl EndUserRequest {
    pub fn business_information(form: &RegistrationForm) -> Self {
        let mut attributes = json!({
            "business_name": form.legal_company_name,
            "business_identity": "direct_customer",
            "business_type": form.business_type,
            "business_industry": form.business_industry,
            "business_registration_identifier": "EIN",
            "business_registration_number": form.ein_digits(),
            "business_regions_of_operation": form.regions_of_operation,
            "website_url": form.website_url,
        });
        if !form.social_media_urls.is_empty() {
            attributes["social_media_profile_urls"] = json!(form.social_media_urls.join(","));
        }
        Self {
            kind: EndUserKind::BusinessInformation,
            friendly_name: format!("{} Business Information", form.legal_company_name),
            attributes,
        }
    }

    pub fn authorized_representative(form: &RegistrationForm) -> Self {
        let rep = &form.authorized_representative;
        Self {
            kind: EndUserKind::AuthorizedRepresentative,
            friendly_name: format!("{} {} Authorized Representative", rep.first_name, rep.last_name),
            attributes: json!({
                "first_name": rep.first_name,
                "last_name": rep.last_name,
                "email": rep.email,
                "phone_number": rep.phone_number,
                "business_title": rep.business_title,
                "job_position": rep.job_position,
            }),
        }
    }

    pub fn messaging_profile_information(form: &RegistrationForm) -> Self {
        let mut attributes = json!({ "company_type": form.company_type.to_lowercase() });
        if let Some(exchange) = &form.stock_exchange {
            attributes["stock_exchange"] = json!(exchange);
        }
        if let Some(ticker) = &form.stock_ticker {
            attributes["stock_ticker"] = json!(ticker);
        }
        Self {
            kind: EndUserKind::MessagingProfileInformation,
            friendly_name: format!("{} Messaging Profile", form.legal_company_name),
            attributes,
        }
    }

    pub fn to_params(&self) -> Params {
        vec![
            param("FriendlyName", &*self.friendly_name),
            param("Type", self.kind.type_name()),
            param("Attributes", self.attributes.to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRequest {
    pub customer_name: String,
    pub street: String,
    pub street_secondary: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub iso_country: String,
}

impl AddressRequest {
    pub fn from_form(form: &RegistrationForm) -> Self {
        let addr = &form.address;
        Self {
            customer_name: form.legal_company_name.clone(),
            street: addr.street.clone(),
            street_secondary: addr
                .street_secondary
                .clone()
                .filter(|s| !s.trim().is_empty()),
            city: addr.city.clone(),
            region: addr.region.clone(),
            postal_code: addr.postal_code.clone(),
            iso_country: addr.iso_country.to_uppercase(),
        }
    }

    pub fn to_params(&self) -> Params {
        let mut params = vec![
            param("CustomerName", &*self.customer_name),
            param("Street", &*self.street),
            param("City", &*self.city),
            param("Region", &*self.region),
            param("PostalCode", &*self.postal_code),
            param("IsoCountry", &*self.iso_country),
        ];
        if let Some(secondary) = &self.street_secondary {
            params.push(param("StreetSecondary", &**secondary));
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupportingDocumentRequest {
    pub friendly_name: String,
    pub attributes: serde_json::Value,
}

impl SupportingDocumentRequest {
    pub const DOCUMENT_TYPE: &'static str = "customer_profile_address";

    pub fn for_address(form: &RegistrationForm, address_sid: &str) -> Self {
        Self {
            friendly_name: format!("{} Address", form.legal_company_name),
            attributes: json!({ "address_sids": address_sid }),
        }
    }

    pub fn to_params(&self) -> Params {
        vec![
            param("FriendlyName", &*self.friendly_name),
            param("Type", Self::DOCUMENT_TYPE),
            param("Attributes", self.attributes.to_string()),
        ]
    }
}

// ──────────────────────────────────────────────
// Trust product
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustProductRequest {
    pub friendly_name: String,
    pub email: String,
    pub policy_sid: String,
}

impl TrustProductRequest {
    pub fn from_form(form: &RegistrationForm) -> Self {
        Self {
            friendly_name: format!("{} A2P Trust Product", form.legal_company_name),
            email: form.email.clone(),
            policy_sid: A2P_TRUST_PRODUCT_POLICY_SID.to_string(),
        }
    }

    pub fn to_params(&self) -> Params {
        vec![
            param("FriendlyName", &*self.friendly_name),
            param("Email", &*self.email),
            param("PolicySid", &*self.policy_sid),
        ]
    }
}

// ──────────────────────────────────────────────
// Brand registration
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandRegistrationRequest {
    pub customer_profile_bundle_sid: String,
    pub a2p_profile_bundle_sid: String,
}

impl BrandRegistrationRequest {
    pub fn new(customer_profile_sid: &str, trust_product_sid: &str) -> Self {
        Self {
            customer_profile_bundle_sid: customer_profile_sid.to_string(),
            a2p_profile_bundle_sid: trust_product_sid.to_string(),
        }
    }

    pub fn to_params(&self) -> Params {
        vec![
            param("CustomerProfileBundleSid", &*self.customer_profile_bundle_sid),
            param("A2PProfileBundleSid", &*self.a2p_profile_bundle_sid),
        ]
    }
}

// ──────────────────────────────────────────────
// Messaging service
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingServiceRequest {
    pub friendly_name: String,
    pub inbound_request_url: String,
    pub fallback_url: String,
    pub status_callback: String,
    pub sticky_sender: bool,
    pub smart_encoding: bool,
    pub validity_period: u32,
}

impl MessagingServiceRequest {
    /// Build the service request, deriving the webhook URLs from the
    /// application's public base URL.
    pub fn from_form(form: &RegistrationForm, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            friendly_name: format!("{} Messaging Service", form.legal_company_name),
            inbound_request_url: format!("{}/webhooks/twilio/inbound", base),
            fallback_url: format!("{}/webhooks/twilio/fallback", base),
            status_callback: format!("{}/webhooks/twilio/status", base),
            sticky_sender: true,
            smart_encoding: true,
            validity_period: VALIDITY_PERIOD_SECS,
        }
    }

    pub fn to_params(&self) -> Params {
        vec![
            param("FriendlyName", &*self.friendly_name),
            param("InboundRequestUrl", &*self.inbound_request_url),
            param("InboundMethod", "POST"),
            param("FallbackUrl", &*self.fallback_url),
            param("FallbackMethod", "POST"),
            param("StatusCallback", &*self.status_callback),
            param("StickySender", self.sticky_sender.to_string()),
            param("SmartEncoding", self.smart_encoding.to_string()),
            param("ValidityPeriod", self.validity_period.to_string()),
        ]
    }
}

// ──────────────────────────────────────────────
// Campaign
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignRequest {
    pub brand_registration_sid: String,
    pub description: String,
    pub message_samples: Vec<String>,
    pub use_case: String,
    pub has_embedded_links: bool,
    pub has_embedded_phone: bool,
    pub message_flow: String,
    pub opt_in_message: String,
    pub opt_out_message: String,
    pub help_message: String,
    pub opt_in_keywords: Vec<String>,
    pub opt_out_keywords: Vec<String>,
    pub help_keywords: Vec<String>,
}

pub fn opt_in_message(company: &str) -> String {
    format!(
        "You are now opted-in to receive messages from {}. Reply HELP for help, STOP to cancel.",
        company
    )
}

pub fn opt_out_message(company: &str) -> String {
    format!(
        "You have been unsubscribed from {}. You will no longer receive messages from this number.",
        company
    )
}

pub fn help_message(company: &str, contact_email: &str) -> String {
    format!(
        "{}: Reply STOP to unsubscribe. For help, contact {}. Msg & data rates may apply.",
        company, contact_email
    )
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl CampaignRequest {
    pub fn from_form(form: &RegistrationForm, brand_registration_sid: &str) -> Self {
        let company = form.legal_company_name.trim();
        Self {
            brand_registration_sid: brand_registration_sid.to_string(),
            description: form.campaign_description.clone(),
            message_samples: vec![form.sample_message1.clone(), form.sample_message2.clone()],
            use_case: form
                .normalized_use_case()
                .map(str::to_string)
                .unwrap_or_else(|| form.use_case.to_uppercase()),
            has_embedded_links: form.has_embedded_links,
            has_embedded_phone: form.has_embedded_phone,
            message_flow: form.message_flow.clone(),
            opt_in_message: opt_in_message(company),
            opt_out_message: opt_out_message(company),
            help_message: help_message(company, &form.email),
            opt_in_keywords: owned(OPT_IN_KEYWORDS),
            opt_out_keywords: owned(OPT_OUT_KEYWORDS),
            help_keywords: owned(HELP_KEYWORDS),
        }
    }

    pub fn to_params(&self) -> Params {
        let mut params = vec![
            param("BrandRegistrationSid", &*self.brand_registration_sid),
            param("Description", &*self.description),
        ];
        repeated(&mut params, "MessageSamples", &self.message_samples);
        params.extend([
            param("UsAppToPersonUsecase", &*self.use_case),
            param("HasEmbeddedLinks", self.has_embedded_links.to_string()),
            param("HasEmbeddedPhone", self.has_embedded_phone.to_string()),
            param("MessageFlow", &*self.message_flow),
            param("OptInMessage", &*self.opt_in_message),
            param("OptOutMessage", &*self.opt_out_message),
            param("HelpMessage", &*self.help_message),
        ]);
        repeated(&mut params, "OptInKeywords", &self.opt_in_keywords);
        repeated(&mut params, "OptOutKeywords", &self.opt_out_keywords);
        repeated(&mut params, "HelpKeywords", &self.help_keywords);
        params
    }
}
