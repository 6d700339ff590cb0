use std::future::Future;
use std::time::Duration;

use a2p_core::RegistrationPatch;

use super::{err, sample_form, TestResult};
use crate::RegistrationStore;

const WAIT: Duration = Duration::from_secs(2);

pub(super) async fn run_subscription_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "subscription",
            "subscription_starts_with_current_list",
            subscription_starts_with_current_list(factory).await,
        ),
        TestResult::from_result(
            "subscription",
            "subscription_sees_create_and_update",
            subscription_sees_create_and_update(factory).await,
        ),
        TestResult::from_result(
            "subscription",
            "other_owner_writes_not_published",
            other_owner_writes_not_published(factory).await,
        ),
    ]
}

async fn subscription_starts_with_current_list<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let reg = s.create("loc-1", sample_form()).await.map_err(err)?;
    let rx = s.subscribe_by_owner("loc-1").await.map_err(err)?;
    let current = rx.borrow().clone();
    if current.len() != 1 || current[0].id != reg.id {
        return Err(format!("expected [{}], got {} entries", reg.id, current.len()));
    }
    Ok(())
}

async fn subscription_sees_create_and_update<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut rx = s.subscribe_by_owner("loc-1").await.map_err(err)?;
    if !rx.borrow_and_update().is_empty() {
        return Err("fresh owner has registrations".to_string());
    }

    let reg = s.create("loc-1", sample_form()).await.map_err(err)?;
    tokio::time::timeout(WAIT, rx.changed())
        .await
        .map_err(|_| "no publish after create".to_string())?
        .map_err(err)?;
    if rx.borrow_and_update().first().map(|r| r.id.as_str()) != Some(reg.id.as_str()) {
        return Err("published list misses the new registration".to_string());
    }

    s.update(
        &reg.id,
        RegistrationPatch {
            identity_status: Some("verified".to_string()),
            ..Default::default()
        },
    )
    .await
    .map_err(err)?;
    tokio::time::timeout(WAIT, rx.changed())
        .await
        .map_err(|_| "no publish after update".to_string())?
        .map_err(err)?;
    let seen = rx
        .borrow_and_update()
        .first()
        .and_then(|r| r.identity_status.clone());
    if seen.as_deref() != Some("verified") {
        return Err(format!("published list is stale: {seen:?}"));
    }
    Ok(())
}

async fn other_owner_writes_not_published<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut rx = s.subscribe_by_owner("loc-1").await.map_err(err)?;
    rx.borrow_and_update();
    s.create("loc-2", sample_form()).await.map_err(err)?;
    if rx.has_changed().map_err(err)? {
        return Err("loc-1 subscriber saw a loc-2 write".to_string());
    }
    Ok(())
}
