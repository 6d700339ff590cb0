use std::future::Future;

use a2p_core::{RegistrationPatch, RegistrationStatus, Stage, StepState, StepStatus};

use super::{err, sample_form, TestResult};
use crate::{RegistrationStore, StorageError};

pub(super) async fn run_update_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "update",
            "empty_patch_changes_only_updated_at",
            empty_patch_changes_only_updated_at(factory).await,
        ),
        TestResult::from_result(
            "update",
            "absent_fields_leave_values_unchanged",
            absent_fields_leave_values_unchanged(factory).await,
        ),
        TestResult::from_result(
            "update",
            "steps_merge_per_stage",
            steps_merge_per_stage(factory).await,
        ),
        TestResult::from_result(
            "update",
            "terminal_step_never_reverts",
            terminal_step_never_reverts(factory).await,
        ),
        TestResult::from_result(
            "update",
            "update_unknown_id_is_not_found",
            update_unknown_id_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "update",
            "update_is_durable",
            update_is_durable(factory).await,
        ),
    ]
}

/// `update(id, {})` leaves every field except `updated_at` as it was.
async fn empty_patch_changes_only_updated_at<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let before = s.create("loc-1", sample_form()).await.map_err(err)?;
    let mut after = s
        .update(&before.id, RegistrationPatch::default())
        .await
        .map_err(err)?;

    if after.updated_at < before.updated_at {
        return Err(format!(
            "updated_at went backwards: {} -> {}",
            before.updated_at, after.updated_at
        ));
    }
    after.updated_at = before.updated_at.clone();
    if after != before {
        return Err(format!(
            "empty patch changed more than updated_at: {:?} vs {:?}",
            before, after
        ));
    }
    Ok(())
}

/// A patch with some fields absent writes only the present ones.
async fn absent_fields_leave_values_unchanged<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let reg = s.create("loc-1", sample_form()).await.map_err(err)?;
    s.update(
        &reg.id,
        RegistrationPatch {
            identity_status: Some("unverified".to_string()),
            ..Default::default()
        },
    )
    .await
    .map_err(err)?;

    let after = s
        .update(
            &reg.id,
            RegistrationPatch {
                identity_status: None,
                campaign_status: None,
                brand_status: Some("x".to_string()),
                ..Default::default()
            },
        )
        .await
        .map_err(err)?;

    if after.brand_status.as_deref() != Some("x") {
        return Err(format!("expected brandstatus x, got {:?}", after.brand_status));
    }
    if after.identity_status.as_deref() != Some("unverified") {
        return Err(format!(
            "absent identityStatus overwrote value: {:?}",
            after.identity_status
        ));
    }
    if after.campaign_status.is_some() {
        return Err("absent campaignStatus was written".to_string());
    }
    if after.status != RegistrationStatus::Pending {
        return Err(format!("status changed to {}", after.status));
    }
    Ok(())
}

/// Writing one stage's step leaves the other four untouched.
async fn steps_merge_per_stage<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let reg = s.create("loc-1", sample_form()).await.map_err(err)?;
    s.update(
        &reg.id,
        RegistrationPatch::stage_completed(Stage::CustomerProfile, "BU-cp", "ok"),
    )
    .await
    .map_err(err)?;
    let after = s
        .update(
            &reg.id,
            RegistrationPatch::step(Stage::TrustProduct, StepStatus::in_progress(Stage::TrustProduct)),
        )
        .await
        .map_err(err)?;

    let expect = [
        (Stage::CustomerProfile, StepState::Completed),
        (Stage::TrustProduct, StepState::InProgress),
        (Stage::BrandRegistration, StepState::Pending),
        (Stage::MessagingService, StepState::Pending),
        (Stage::Campaign, StepState::Pending),
    ];
    for (stage, state) in expect {
        let got = after.steps.get(&stage).map(|s| s.status);
        if got != Some(state) {
            return Err(format!("{stage}: expected {state}, got {got:?}"));
        }
    }
    if after.sids.customer_profile_sid.as_deref() != Some("BU-cp") {
        return Err("customer profile SID lost".to_string());
    }
    Ok(())
}

/// A completed or failed step ignores later writes; the rest of the patch lands.
async fn terminal_step_never_reverts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let reg = s.create("loc-1", sample_form()).await.map_err(err)?;
    s.update(
        &reg.id,
        RegistrationPatch::stage_completed(Stage::Campaign, "QE1", "done"),
    )
    .await
    .map_err(err)?;

    let mut stale = RegistrationPatch::step(Stage::Campaign, StepStatus::in_progress(Stage::Campaign));
    stale.campaign_status = Some("pending".to_string());
    let after = s.update(&reg.id, stale).await.map_err(err)?;

    let step = after.steps.get(&Stage::Campaign).ok_or("campaign step missing")?;
    if step.status != StepState::Completed || step.message != "done" {
        return Err(format!("terminal step reverted to {:?}", step));
    }
    if after.campaign_status.as_deref() != Some("pending") {
        return Err("non-step fields of the patch were not applied".to_string());
    }
    Ok(())
}

async fn update_unknown_id_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.update("missing", RegistrationPatch::default()).await {
        Err(StorageError::RegistrationNotFound { id }) if id == "missing" => Ok(()),
        Err(e) => Err(format!("expected RegistrationNotFound, got {e}")),
        Ok(_) => Err("expected RegistrationNotFound, got Ok".to_string()),
    }
}

async fn update_is_durable<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let reg = s.create("loc-1", sample_form()).await.map_err(err)?;
    let updated = s
        .update(
            &reg.id,
            RegistrationPatch {
                status: Some(RegistrationStatus::Rejected),
                ..Default::default()
            },
        )
        .await
        .map_err(err)?;
    let read = s
        .get_by_id(&reg.id)
        .await
        .map_err(err)?
        .ok_or("registration vanished")?;
    if read != updated || read.status != RegistrationStatus::Rejected {
        return Err(format!("read-back mismatch: {:?}", read.status));
    }
    Ok(())
}
