use std::future::Future;

use a2p_core::{RegistrationPatch, Stage};

use super::{err, sample_form, TestResult};
use crate::{RegistrationStore, StorageError};

pub(super) async fn run_lookup_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "lookup",
            "get_by_sid_matches_stage_sids",
            get_by_sid_matches_stage_sids(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "get_by_sid_matches_alias",
            get_by_sid_matches_alias(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "get_by_sid_unknown_is_none",
            get_by_sid_unknown_is_none(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "sid_linked_twice_is_rejected",
            sid_linked_twice_is_rejected(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "relinking_own_sid_is_allowed",
            relinking_own_sid_is_allowed(factory).await,
        ),
        TestResult::from_result(
            "lookup",
            "list_by_owner_newest_first",
            list_by_owner_newest_first(factory).await,
        ),
    ]
}

async fn get_by_sid_matches_stage_sids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let reg = s.create("loc-1", sample_form()).await.map_err(err)?;
    let _other = s.create("loc-2", sample_form()).await.map_err(err)?;
    s.update(
        &reg.id,
        RegistrationPatch::stage_completed(Stage::BrandRegistration, "BN123", "ok"),
    )
    .await
    .map_err(err)?;

    let found = s
        .get_by_sid("BN123")
        .await
        .map_err(err)?
        .ok_or("BN123 not found")?;
    if found.id != reg.id {
        return Err(format!("expected {}, got {}", reg.id, found.id));
    }
    Ok(())
}

async fn get_by_sid_matches_alias<S, F, Fut>(factory: &F) -> Result<(), String>
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
            sid: Some("QE77".to_string()),
            ..Default::default()
        },
    )
    .await
    .map_err(err)?;

    match s.get_by_sid("QE77").await.map_err(err)? {
        Some(found) if found.id == reg.id => Ok(()),
        Some(found) => Err(format!("alias matched wrong registration {}", found.id)),
        None => Err("alias sid not found".to_string()),
    }
}

async fn get_by_sid_unknown_is_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create("loc-1", sample_form()).await.map_err(err)?;
    if s.get_by_sid("BN-unknown").await.map_err(err)?.is_some() {
        return Err("unknown sid matched a registration".to_string());
    }
    Ok(())
}

/// Linking a SID that another registration already carries fails and
/// leaves the target registration untouched.
async fn sid_linked_twice_is_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let first = s.create("loc-1", sample_form()).await.map_err(err)?;
    let second = s.create("loc-1", sample_form()).await.map_err(err)?;
    s.update(
        &first.id,
        RegistrationPatch::stage_completed(Stage::Campaign, "QE1", "ok"),
    )
    .await
    .map_err(err)?;

    let mut patch = RegistrationPatch::stage_completed(Stage::Campaign, "QE1", "ok");
    patch.brand_status = Some("approved".to_string());
    match s.update(&second.id, patch).await {
        Err(StorageError::DuplicateSid {
            sid,
            registration_id,
        }) if sid == "QE1" && registration_id == first.id => {}
        Err(e) => return Err(format!("expected DuplicateSid, got {e}")),
        Ok(_) => return Err("duplicate SID accepted".to_string()),
    }

    let second_now = s
        .get_by_id(&second.id)
        .await
        .map_err(err)?
        .ok_or("second registration vanished")?;
    if second_now.brand_status.is_some() || second_now.sids.campaign_sid.is_some() {
        return Err("rejected patch was partially applied".to_string());
    }
    Ok(())
}

async fn relinking_own_sid_is_allowed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let reg = s.create("loc-1", sample_form()).await.map_err(err)?;
    s.update(
        &reg.id,
        RegistrationPatch::stage_completed(Stage::BrandRegistration, "BN5", "ok"),
    )
    .await
    .map_err(err)?;
    s.update(
        &reg.id,
        RegistrationPatch {
            sid: Some("BN5".to_string()),
            ..Default::default()
        },
    )
    .await
    .map_err(|e| format!("relinking own sid failed: {e}"))?;
    Ok(())
}

async fn list_by_owner_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a = s.create("loc-1", sample_form()).await.map_err(err)?;
    let _x = s.create("loc-2", sample_form()).await.map_err(err)?;
    let b = s.create("loc-1", sample_form()).await.map_err(err)?;
    let c = s.create("loc-1", sample_form()).await.map_err(err)?;

    let ids: Vec<String> = s
        .list_by_owner("loc-1")
        .await
        .map_err(err)?
        .into_iter()
        .map(|r| r.id)
        .collect();
    let expected = vec![c.id, b.id, a.id];
    if ids != expected {
        return Err(format!("expected {:?}, got {:?}", expected, ids));
    }
    if !s.list_by_owner("nobody").await.map_err(err)?.is_empty() {
        return Err("unknown owner has registrations".to_string());
    }
    Ok(())
}
