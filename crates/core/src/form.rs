//! The registration form: the submitting business's legal, contact, and
//! campaign details. Immutable once a registration is created.

use serde::{Deserialize, Serialize};

/// A2P use cases the provider accepts for a standard campaign.
pub const USE_CASES: &[&str] = &[
    "MARKETING",
    "MIXED",
    "LOW_VOLUME",
    "CUSTOMER_CARE",
    "ACCOUNT_NOTIFICATION",
    "DELIVERY_NOTIFICATION",
    "FRAUD_ALERT",
    "HIGHER_EDUCATION",
    "POLLING_VOTING",
    "PUBLIC_SERVICE_ANNOUNCEMENT",
    "SECURITY_ALERT",
    "2FA",
];

const SAMPLE_MIN_LEN: usize = 20;
const SAMPLE_MAX_LEN: usize = 1024;

/// Why a submitted form was rejected before any remote call was made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("missing required field '{0}'")]
    Missing(&'static str),

    #[error("invalid field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessAddress {
    pub street: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_secondary: Option<String>,
    pub city: String,
    /// State or province.
    pub region: String,
    pub postal_code: String,
    #[serde(default = "default_iso_country")]
    pub iso_country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedRepresentative {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub business_title: String,
    pub job_position: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    // ── Business identity ─────────────────────────────────────────────
    pub legal_company_name: String,
    pub business_type: String,
    pub business_industry: String,
    /// Employer Identification Number, `123456789` or `12-3456789`.
    pub ein: String,
    pub website_url: String,
    pub email: String,
    #[serde(default = "default_regions")]
    pub regions_of_operation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub social_media_urls: Vec<String>,
    /// `private` or `public`.
    #[serde(default = "default_company_type")]
    pub company_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_exchange: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_ticker: Option<String>,

    pub address: BusinessAddress,
    pub authorized_representative: AuthorizedRepresentative,

    // ── Campaign ──────────────────────────────────────────────────────
    pub campaign_description: String,
    pub sample_message1: String,
    pub sample_message2: String,
    pub use_case: String,
    #[serde(default)]
    pub has_embedded_links: bool,
    #[serde(default)]
    pub has_embedded_phone: bool,
    /// How end users opt in (the provider's "message flow").
    pub message_flow: String,
}

fn default_iso_country() -> String {
    "US".to_string()
}

fn default_regions() -> String {
    "USA_AND_CANADA".to_string()
}

fn default_company_type() -> String {
    "private".to_string()
}

impl RegistrationForm {
    /// Check the form before any registration record or remote resource
    /// is created. Returns the first problem found.
    pub fn validate(&self) -> Result<(), FormError> {
        let required: [(&'static str, &str); 19] = [
            ("legalCompanyName", &self.legal_company_name),
            ("businessType", &self.business_type),
            ("businessIndustry", &self.business_industry),
            ("ein", &self.ein),
            ("websiteUrl", &self.website_url),
            ("email", &self.email),
            ("address.street", &self.address.street),
            ("address.city", &self.address.city),
            ("address.region", &self.address.region),
            ("address.postalCode", &self.address.postal_code),
            ("authorizedRepresentative.firstName", &self.authorized_representative.first_name),
            ("authorizedRepresentative.lastName", &self.authorized_representative.last_name),
            ("authorizedRepresentative.email", &self.authorized_representative.email),
            ("authorizedRepresentative.phoneNumber", &self.authorized_representative.phone_number),
            ("authorizedRepresentative.businessTitle", &self.authorized_representative.business_title),
            ("authorizedRepresentative.jobPosition", &self.authorized_representative.job_position),
            ("campaignDescription", &self.campaign_description),
            ("useCase", &self.use_case),
            ("messageFlow", &self.message_flow),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(FormError::Missing(field));
            }
        }
        if !is_valid_ein(&self.ein) {
            return Err(FormError::Invalid {
                field: "ein",
                reason: "expected 9 digits, optionally formatted XX-XXXXXXX".to_string(),
            });
        }

        for (field, email) in [
            ("email", &self.email),
            ("authorizedRepresentative.email", &self.authorized_representative.email),
        ] {
            if !is_plausible_email(email) {
                return Err(FormError::Invalid {
                    field,
                    reason: format!("'{}' is not an email address", email),
                });
            }
        }

        let country = &self.address.iso_country;
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(FormError::Invalid {
                field: "address.isoCountry",
                reason: "expected a two-letter ISO 3166 country code".to_string(),
            });
        }

        if self.normalized_use_case().is_none() {
            return Err(FormError::Invalid {
                field: "useCase",
                reason: format!("'{}' is not a supported A2P use case", self.use_case),
            });
        }

        for (field, sample) in [
            ("sampleMessage1", &self.sample_message1),
            ("sampleMessage2", &self.sample_message2),
        ] {
            let len = sample.trim().chars().count();
            if len == 0 {
                return Err(FormError::Missing(field));
            }
            if !(SAMPLE_MIN_LEN..=SAMPLE_MAX_LEN).contains(&len) {
                return Err(FormError::Invalid {
                    field,
                    reason: format!(
                        "must be between {} and {} characters",
                        SAMPLE_MIN_LEN, SAMPLE_MAX_LEN
                    ),
                });
            }
        }

        if self.company_type.eq_ignore_ascii_case("public") {
            let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
            if blank(&self.stock_exchange) {
                return Err(FormError::Missing("stockExchange"));
            }
            if blank(&self.stock_ticker) {
                return Err(FormError::Missing("stockTicker"));
            }
        }

        Ok(())
    }

    /// The use case in the provider's canonical spelling, if it is one
    /// the provider accepts.
    pub fn normalized_use_case(&self) -> Option<&'static str> {
        let wanted = self.use_case.trim();
        USE_CASES
            .iter()
            .copied()
            .find(|uc| uc.eq_ignore_ascii_case(wanted))
    }

    /// The EIN with formatting removed.
    pub fn ein_digits(&self) -> String {
        self.ein.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

fn is_valid_ein(raw: &str) -> bool {
    let raw = raw.trim();
    let digits = raw.chars().filter(|c| c.is_ascii_digit()).count();
    if digits != 9 {
        return false;
    }
    match raw.len() {
        9 => true,
        10 => raw.as_bytes()[2] == b'-',
        _ => false,
    }
}

fn is_plausible_email(raw: &str) -> bool {
    match raw.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
pub(crate) fn sample_form() -> RegistrationForm {
    RegistrationForm {
        legal_company_name: "Acme Realty".to_string(),
        business_type: "Limited Liability Corporation".to_string(),
        business_industry: "REAL_ESTATE".to_string(),
        ein: "12-3456789".to_string(),
        website_url: "https://acmerealty.example".to_string(),
        email: "ops@acmerealty.example".to_string(),
        regions_of_operation: default_regions(),
        social_media_urls: vec![],
        company_type: default_company_type(),
        stock_exchange: None,
        stock_ticker: None,
        address: BusinessAddress {
            street: "100 Main St".to_string(),
            street_secondary: None,
            city: "Austin".to_string(),
            region: "TX".to_string(),
            postal_code: "78701".to_string(),
            iso_country: "US".to_string(),
        },
        authorized_representative: AuthorizedRepresentative {
            first_name: "Dana".to_string(),
            last_name: "Reyes".to_string(),
            email: "dana@acmerealty.example".to_string(),
            phone_number: "+15125550100".to_string(),
            business_title: "Owner".to_string(),
            job_position: "CEO".to_string(),
        },
        campaign_description: "Follow-up messages to homeowners who requested a valuation."
            .to_string(),
        sample_message1: "Hi Sam, this is Dana from Acme Realty about your valuation request."
            .to_string(),
        sample_message2: "Your home valuation is ready. Reply STOP to opt out.".to_string(),
        use_case: "MARKETING".to_string(),
        has_embedded_links: false,
        has_embedded_phone: false,
        message_flow: "Homeowners opt in via the valuation form on acmerealty.example."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_form_is_valid() {
        assert_eq!(sample_form().validate(), Ok(()));
    }

    #[test]
    fn blank_company_name_is_missing() {
        let mut form = sample_form();
        form.legal_company_name = "   ".to_string();
        assert_eq!(form.validate(), Err(FormError::Missing("legalCompanyName")));
    }

    #[test]
    fn ein_accepts_plain_and_dashed() {
        assert!(is_valid_ein("123456789"));
        assert!(is_valid_ein("12-3456789"));
        assert!(!is_valid_ein("123-456789"));
        assert!(!is_valid_ein("12345678"));
        assert!(!is_valid_ein("12-34567890"));
    }

    #[test]
    fn ein_digits_strips_dash() {
        assert_eq!(sample_form().ein_digits(), "123456789");
    }

    #[test]
    fn use_case_is_case_insensitive() {
        let mut form = sample_form();
        form.use_case = "customer_care".to_string();
        assert_eq!(form.normalized_use_case(), Some("CUSTOMER_CARE"));
        form.use_case = "SPAM".to_string();
        assert!(matches!(
            form.validate(),
            Err(FormError::Invalid { field: "useCase", .. })
        ));
    }

    #[test]
    fn short_sample_message_rejected() {
        let mut form = sample_form();
        form.sample_message2 = "hi".to_string();
        assert!(matches!(
            form.validate(),
            Err(FormError::Invalid { field: "sampleMessage2", .. })
        ));
    }

    #[test]
    fn public_company_needs_ticker() {
        let mut form = sample_form();
        form.company_type = "public".to_string();
        form.stock_exchange = Some("NASDAQ".to_string());
        assert_eq!(form.validate(), Err(FormError::Missing("stockTicker")));
        form.stock_ticker = Some("ACME".to_string());
        assert_eq!(form.validate(), Ok(()));
    }

    #[test]
    fn bad_email_rejected() {
        let mut form = sample_form();
        form.authorized_representative.email = "dana@".to_string();
        assert!(matches!(
            form.validate(),
            Err(FormError::Invalid { field: "authorizedRepresentative.email", .. })
        ));
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = serde_json::json!({
            "legalCompanyName": "Acme Realty",
            "businessType": "Partnership",
            "businessIndustry": "REAL_ESTATE",
            "ein": "123456789",
            "websiteUrl": "https://acme.example",
            "email": "a@acme.example",
            "address": {
                "street": "1 Elm",
                "city": "Austin",
                "region": "TX",
                "postalCode": "78701"
            },
            "authorizedRepresentative": {
                "firstName": "Dana",
                "lastName": "Reyes",
                "email": "d@acme.example",
                "phoneNumber": "+15125550100",
                "businessTitle": "Owner",
                "jobPosition": "CEO"
            },
            "campaignDescription": "Listing updates",
            "sampleMessage1": "New listing near you: 3bd/2ba on Elm St.",
            "sampleMessage2": "Open house this Saturday at 2pm on Elm St.",
            "useCase": "MARKETING",
            "messageFlow": "Website form"
        });
        let form: RegistrationForm = serde_json::from_value(json).unwrap();
        assert_eq!(form.address.iso_country, "US");
        assert_eq!(form.company_type, "private");
        assert_eq!(form.regions_of_operation, "USA_AND_CANADA");
        assert!(!form.has_embedded_links);
        assert_eq!(form.validate(), Ok(()));
    }
}
