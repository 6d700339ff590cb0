use std::future::Future;

use a2p_core::{RegistrationStatus, Stage, StepState};

use super::{err, sample_form, TestResult};
use crate::RegistrationStore;

pub(super) async fn run_create_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "create",
            "create_initializes_five_pending_steps",
            create_initializes_five_pending_steps(factory).await,
        ),
        TestResult::from_result(
            "create",
            "create_sets_owner_status_and_timestamps",
            create_sets_owner_status_and_timestamps(factory).await,
        ),
        TestResult::from_result(
            "create",
            "create_generates_distinct_ids",
            create_generates_distinct_ids(factory).await,
        ),
        TestResult::from_result(
            "create",
            "created_registration_readable_by_id",
            created_registration_readable_by_id(factory).await,
        ),
        TestResult::from_result(
            "create",
            "unknown_id_reads_as_none",
            unknown_id_reads_as_none(factory).await,
        ),
    ]
}

/// A new registration carries exactly the five stage keys, all pending.
async fn create_initializes_five_pending_steps<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let reg = s.create("loc-1", sample_form()).await.map_err(err)?;

    if reg.steps.len() != 5 {
        return Err(format!("expected 5 steps, got {}", reg.steps.len()));
    }
    for stage in Stage::ALL {
        match reg.steps.get(&stage) {
            Some(step) if step.status == StepState::Pending => {}
            Some(step) => return Err(format!("{stage} starts as {}", step.status)),
            None => return Err(format!("missing step {stage}")),
        }
    }
    if reg.sids.iter().next().is_some() {
        return Err("new registration already has stage SIDs".to_string());
    }
    Ok(())
}

async fn create_sets_owner_status_and_timestamps<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let reg = s.create("loc-1", sample_form()).await.map_err(err)?;

    if reg.user_id != "loc-1" {
        return Err(format!("expected owner loc-1, got {}", reg.user_id));
    }
    if reg.status != RegistrationStatus::Pending {
        return Err(format!("expected pending, got {}", reg.status));
    }
    if reg.created_at.is_empty() || reg.created_at != reg.updated_at {
        return Err(format!(
            "expected equal non-empty timestamps, got {} / {}",
            reg.created_at, reg.updated_at
        ));
    }
    if reg.form_data != sample_form() {
        return Err("form data not stored verbatim".to_string());
    }
    Ok(())
}

async fn create_generates_distinct_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a = s.create("loc-1", sample_form()).await.map_err(err)?;
    let b = s.create("loc-1", sample_form()).await.map_err(err)?;
    if a.id.is_empty() || a.id == b.id {
        return Err(format!("ids not distinct: {:?} / {:?}", a.id, b.id));
    }
    Ok(())
}

async fn created_registration_readable_by_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let reg = s.create("loc-1", sample_form()).await.map_err(err)?;
    let read = s
        .get_by_id(&reg.id)
        .await
        .map_err(err)?
        .ok_or("created registration not found")?;
    if read != reg {
        return Err("stored registration differs from create() result".to_string());
    }
    Ok(())
}

async fn unknown_id_reads_as_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    if s.get_by_id("missing").await.map_err(err)?.is_some() {
        return Err("expected None for unknown id".to_string());
    }
    Ok(())
}
