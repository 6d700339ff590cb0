//! Conformance test suite for `RegistrationStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `RegistrationStore` implementation can run to verify correctness. The
//! suite covers:
//!
//! - **Create**: five pending steps, generated IDs, owner linkage
//! - **Update**: merge semantics, empty patches, absent fields, step
//!   monotonicity, unknown IDs
//! - **Lookup**: correlation by any linked SID, SID uniqueness
//! - **Ordering**: owner queries newest first
//! - **Subscription**: live owner views follow every write
//! - **Concurrency**: disjoint fields written concurrently all survive
//! - **Webhook dumps**: append-only, null-stripped, newest first
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use a2p_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_store().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod create;
mod dumps;
mod lookup;
mod subscription;
mod update;

use std::fmt;
use std::future::Future;

use a2p_core::{AuthorizedRepresentative, BusinessAddress, RegistrationForm};

use crate::RegistrationStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "create", "update", "lookup").
    pub category: String,
    /// Test name (e.g. "create_initializes_five_pending_steps").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(create::run_create_tests(&factory).await);
    results.extend(update::run_update_tests(&factory).await);
    results.extend(lookup::run_lookup_tests(&factory).await);
    results.extend(subscription::run_subscription_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);
    results.extend(dumps::run_dump_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// A complete, valid registration form for a fictional brokerage.
pub fn sample_form() -> RegistrationForm {
    RegistrationForm {
        legal_company_name: "Acme Realty".to_string(),
        business_type: "Limited Liability Corporation".to_string(),
        business_industry: "REAL_ESTATE".to_string(),
        ein: "12-3456789".to_string(),
        website_url: "https://acmerealty.example".to_string(),
        email: "ops@acmerealty.example".to_string(),
        regions_of_operation: "USA_AND_CANADA".to_string(),
        social_media_urls: vec![],
        company_type: "private".to_string(),
        stock_exchange: None,
        stock_ticker: None,
        address: BusinessAddress {
            street: "100 Main St".to_string(),
            street_secondary: Some("Suite 4".to_string()),
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

fn err(e: impl fmt::Display) -> String {
    e.to_string()
}
