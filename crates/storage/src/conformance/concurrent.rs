use std::future::Future;
use std::sync::Arc;

use a2p_core::{RegistrationPatch, Stage, StepState, StepStatus};

use super::{err, sample_form, TestResult};
use crate::RegistrationStore;

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "disjoint_field_writes_all_survive",
            disjoint_field_writes_all_survive(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_creates_all_listed",
            concurrent_creates_all_listed(factory).await,
        ),
    ]
}

// ── Disjoint fields ─────────────────────────────────────────────────────────

/// A callback writing `brandstatus` races the orchestrator writing a step.
/// Neither write may clobber the other.
async fn disjoint_field_writes_all_survive<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let reg = storage.create("loc-1", sample_form()).await.map_err(err)?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        let id = reg.id.clone();
        handles.push(tokio::spawn(async move {
            let patch = if i % 2 == 0 {
                RegistrationPatch {
                    brand_status: Some("approved".to_string()),
                    ..Default::default()
                }
            } else {
                RegistrationPatch::step(Stage::Campaign, StepStatus::in_progress(Stage::Campaign))
            };
            s.update(&id, patch).await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panicked: {e}"))?
            .map_err(err)?;
    }

    let final_state = storage
        .get_by_id(&reg.id)
        .await
        .map_err(err)?
        .ok_or("registration vanished")?;
    if final_state.brand_status.as_deref() != Some("approved") {
        return Err("brandstatus write lost".to_string());
    }
    match final_state.steps.get(&Stage::Campaign) {
        Some(step) if step.status == StepState::InProgress => Ok(()),
        other => Err(format!("campaign step write lost: {other:?}")),
    }
}

// ── Concurrent creates ──────────────────────────────────────────────────────

async fn concurrent_creates_all_listed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(
            async move { s.create("loc-1", sample_form()).await },
        ));
    }
    let mut ids = Vec::new();
    for handle in handles {
        let reg = handle
            .await
            .map_err(|e| format!("task panicked: {e}"))?
            .map_err(err)?;
        ids.push(reg.id);
    }

    let listed = storage.list_by_owner("loc-1").await.map_err(err)?;
    if listed.len() != N {
        return Err(format!("expected {N} registrations, got {}", listed.len()));
    }
    ids.sort();
    ids.dedup();
    if ids.len() != N {
        return Err("concurrent creates produced duplicate ids".to_string());
    }
    Ok(())
}
