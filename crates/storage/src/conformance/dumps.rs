use std::future::Future;

use serde_json::json;

use super::{err, TestResult};
use crate::RegistrationStore;

pub(super) async fn run_dump_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "dumps",
            "dump_strips_nulls",
            dump_strips_nulls(factory).await,
        ),
        TestResult::from_result(
            "dumps",
            "dumps_listed_newest_first",
            dumps_listed_newest_first(factory).await,
        ),
        TestResult::from_result(
            "dumps",
            "dump_limit_respected",
            dump_limit_respected(factory).await,
        ),
    ]
}

async fn dump_strips_nulls<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let dump = s
        .insert_webhook_dump(
            "a2p/brand",
            "d1",
            json!({"BrandSid": "BN1", "Errors": null, "nested": {"a": null, "b": 1}}),
        )
        .await
        .map_err(err)?;
    let expected = json!({"BrandSid": "BN1", "nested": {"b": 1}});
    if dump.payload != expected {
        return Err(format!("expected {expected}, got {}", dump.payload));
    }
    let listed = s.list_webhook_dumps(0).await.map_err(err)?;
    match listed.first() {
        Some(d) if d.payload == expected && d.source == "a2p/brand" && d.digest == "d1" => Ok(()),
        other => Err(format!("stored dump mismatch: {other:?}")),
    }
}

async fn dumps_listed_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for n in 0..3 {
        s.insert_webhook_dump("a2p/campaign", &format!("d{n}"), json!({"n": n}))
            .await
            .map_err(err)?;
    }
    let digests: Vec<String> = s
        .list_webhook_dumps(0)
        .await
        .map_err(err)?
        .into_iter()
        .map(|d| d.digest)
        .collect();
    if digests != ["d2", "d1", "d0"] {
        return Err(format!("expected newest first, got {digests:?}"));
    }
    Ok(())
}

async fn dump_limit_respected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RegistrationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for n in 0..5 {
        s.insert_webhook_dump("twilio/status", &format!("d{n}"), json!({"n": n}))
            .await
            .map_err(err)?;
    }
    let limited = s.list_webhook_dumps(2).await.map_err(err)?;
    if limited.len() != 2 || limited[0].digest != "d4" {
        return Err(format!("limit 2 returned {} dumps", limited.len()));
    }
    Ok(())
}
