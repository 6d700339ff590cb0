//! In-process `RegistrationStore` backend.
//!
//! Both collections live behind one async mutex. When opened with a
//! snapshot path, the whole store is rewritten to that file after every
//! mutation (write to a temp file in the same directory, then rename) and
//! loaded back on open, so registrations survive restarts.
//!
//! A mutation only becomes visible once its snapshot write succeeded; a
//! failed write is rolled back before the error is returned.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, MutexGuard};

use a2p_core::{strip_nulls, Registration, RegistrationForm, RegistrationPatch};

use crate::error::StorageError;
use crate::ids::{generate_id, now_timestamp};
use crate::record::WebhookDump;
use crate::traits::RegistrationStore;

struct Stored {
    /// Insertion order; breaks created-at ties.
    seq: u64,
    registration: Registration,
}

#[derive(Default)]
struct Collections {
    registrations: HashMap<String, Stored>,
    webhook_dumps: Vec<WebhookDump>,
    next_seq: u64,
    /// Owner subscriptions, keyed by user ID.
    watchers: HashMap<String, watch::Sender<Vec<Registration>>>,
}

impl Collections {
    fn owned_by(&self, user_id: &str) -> Vec<Registration> {
        let mut owned: Vec<&Stored> = self
            .registrations
            .values()
            .filter(|s| s.registration.user_id == user_id)
            .collect();
        owned.sort_by(|a, b| {
            b.registration
                .created_at
                .cmp(&a.registration.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        owned.into_iter().map(|s| s.registration.clone()).collect()
    }

    /// Push the owner's current list to its subscribers, if any.
    fn publish(&mut self, user_id: &str) {
        let Some(sender) = self.watchers.get(user_id) else {
            return;
        };
        if sender.receiver_count() == 0 {
            self.watchers.remove(user_id);
            return;
        }
        let list = self.owned_by(user_id);
        sender.send_replace(list);
    }

    fn owner_of_sid(&self, sid: &str) -> Option<&Registration> {
        self.registrations
            .values()
            .map(|s| &s.registration)
            .find(|r| r.is_linked_to(sid))
    }
}

/// On-disk layout of the snapshot file.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotFile {
    registrations: Vec<Registration>,
    #[serde(rename = "webhook-dumps")]
    webhook_dumps: Vec<WebhookDump>,
}

/// A `RegistrationStore` held in memory.
pub struct MemoryStore {
    inner: Mutex<Collections>,
    snapshot_path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store with no snapshot file.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Collections::default()),
            snapshot_path: None,
        }
    }

    /// Open a store backed by a snapshot file, loading it if it exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let mut collections = Collections::default();

        if path.exists() {
            let raw = std::fs::read(&path).map_err(|e| {
                StorageError::Backend(format!("read {}: {}", path.display(), e))
            })?;
            let snapshot: SnapshotFile = serde_json::from_slice(&raw).map_err(|e| {
                StorageError::Backend(format!("parse {}: {}", path.display(), e))
            })?;
            for registration in snapshot.registrations {
                let seq = collections.next_seq;
                collections.next_seq += 1;
                collections
                    .registrations
                    .insert(registration.id.clone(), Stored { seq, registration });
            }
            collections.webhook_dumps = snapshot.webhook_dumps;
            tracing::info!(
                path = %path.display(),
                registrations = collections.registrations.len(),
                "loaded registration snapshot"
            );
        }

        Ok(Self {
            inner: Mutex::new(collections),
            snapshot_path: Some(path),
        })
    }

    async fn lock(&self) -> MutexGuard<'_, Collections> {
        self.inner.lock().await
    }

    /// Rewrite the snapshot file, if this store has one.
    ///
    /// Serialization happens on the caller; the file write runs on the
    /// blocking pool. The caller keeps the lock so snapshots land in
    /// mutation order.
    async fn persist(&self, collections: &Collections) -> Result<(), StorageError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let mut ordered: Vec<&Stored> = collections.registrations.values().collect();
        ordered.sort_by_key(|s| s.seq);
        let snapshot = SnapshotFile {
            registrations: ordered.into_iter().map(|s| s.registration.clone()).collect(),
            webhook_dumps: collections.webhook_dumps.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StorageError::Backend(format!("encode snapshot: {}", e)))?;

        let path = path.clone();
        tokio::task::spawn_blocking(move || write_snapshot(&path, &bytes))
            .await
            .map_err(|e| StorageError::Backend(format!("snapshot task failed: {}", e)))?
    }
}

fn write_snapshot(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let backend = |e: &dyn std::fmt::Display| {
        StorageError::Backend(format!("write {}: {}", path.display(), e))
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| backend(&e))?;
    tmp.write_all(bytes).map_err(|e| backend(&e))?;
    tmp.flush().map_err(|e| backend(&e))?;
    tmp.persist(path).map_err(|e| backend(&e))?;
    Ok(())
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    async fn create(
        &self,
        user_id: &str,
        form: RegistrationForm,
    ) -> Result<Registration, StorageError> {
        let now = now_timestamp()?;
        let mut collections = self.lock().await;

        let mut id = generate_id();
        while collections.registrations.contains_key(&id) {
            id = generate_id();
        }
        let registration = Registration::new(id.clone(), user_id.to_string(), form, now);

        let seq = collections.next_seq;
        collections.next_seq += 1;
        collections.registrations.insert(
            id.clone(),
            Stored {
                seq,
                registration: registration.clone(),
            },
        );

        if let Err(e) = self.persist(&collections).await {
            collections.registrations.remove(&id);
            collections.next_seq = seq;
            return Err(e);
        }
        collections.publish(user_id);
        Ok(registration)
    }

    async fn update(
        &self,
        id: &str,
        patch: RegistrationPatch,
    ) -> Result<Registration, StorageError> {
        let now = now_timestamp()?;
        let mut collections = self.lock().await;

        if !collections.registrations.contains_key(id) {
            return Err(StorageError::RegistrationNotFound { id: id.to_string() });
        }
        for sid in patch.linked_sids() {
            if let Some(other) = collections.owner_of_sid(sid) {
                if other.id != id {
                    return Err(StorageError::DuplicateSid {
                        sid: sid.to_string(),
                        registration_id: other.id.clone(),
                    });
                }
            }
        }

        let stored = collections
            .registrations
            .get_mut(id)
            .ok_or_else(|| StorageError::RegistrationNotFound { id: id.to_string() })?;
        let previous = stored.registration.clone();
        let dropped = stored.registration.apply(&patch, now);
        if !dropped.is_empty() {
            tracing::warn!(
                registration_id = id,
                stages = ?dropped,
                "ignored step updates that would leave a terminal state"
            );
        }
        let updated = stored.registration.clone();

        if let Err(e) = self.persist(&collections).await {
            if let Some(stored) = collections.registrations.get_mut(id) {
                stored.registration = previous;
            }
            return Err(e);
        }
        collections.publish(&updated.user_id);
        Ok(updated)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Registration>, StorageError> {
        let collections = self.lock().await;
        Ok(collections
            .registrations
            .get(id)
            .map(|s| s.registration.clone()))
    }

    async fn get_by_sid(&self, sid: &str) -> Result<Option<Registration>, StorageError> {
        let collections = self.lock().await;
        Ok(collections.owner_of_sid(sid).cloned())
    }

    async fn list_by_owner(&self, user_id: &str) -> Result<Vec<Registration>, StorageError> {
        let collections = self.lock().await;
        Ok(collections.owned_by(user_id))
    }

    async fn subscribe_by_owner(
        &self,
        user_id: &str,
    ) -> Result<watch::Receiver<Vec<Registration>>, StorageError> {
        let mut collections = self.lock().await;
        if let Some(sender) = collections.watchers.get(user_id) {
            return Ok(sender.subscribe());
        }
        let (sender, receiver) = watch::channel(collections.owned_by(user_id));
        collections.watchers.insert(user_id.to_string(), sender);
        Ok(receiver)
    }

    async fn insert_webhook_dump(
        &self,
        source: &str,
        digest: &str,
        payload: serde_json::Value,
    ) -> Result<WebhookDump, StorageError> {
        let dump = WebhookDump {
            id: generate_id(),
            source: source.to_string(),
            received_at: now_timestamp()?,
            digest: digest.to_string(),
            payload: strip_nulls(payload),
        };
        let mut collections = self.lock().await;
        collections.webhook_dumps.push(dump.clone());
        if let Err(e) = self.persist(&collections).await {
            collections.webhook_dumps.pop();
            return Err(e);
        }
        Ok(dump)
    }

    async fn list_webhook_dumps(&self, limit: usize) -> Result<Vec<WebhookDump>, StorageError> {
        let collections = self.lock().await;
        let newest_first = collections.webhook_dumps.iter().rev().cloned();
        Ok(if limit == 0 {
            newest_first.collect()
        } else {
            newest_first.take(limit).collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::{run_conformance_suite, sample_form};

    #[tokio::test]
    async fn memory_store_conformance() {
        let report = run_conformance_suite(|| async { MemoryStore::new() }).await;
        assert!(report.failed == 0, "{report}");
    }

    #[tokio::test]
    async fn file_backed_store_conformance() {
        let dir = tempfile::tempdir().unwrap();
        let counter = std::sync::atomic::AtomicUsize::new(0);
        let report = run_conformance_suite(|| {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let path = dir.path().join(format!("store-{n}.json"));
            async move { MemoryStore::open(path).unwrap() }
        })
        .await;
        assert!(report.failed == 0, "{report}");
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a2p.json");

        let id = {
            let store = MemoryStore::open(&path).unwrap();
            let reg = store.create("loc-1", sample_form()).await.unwrap();
            store
                .update(
                    &reg.id,
                    RegistrationPatch {
                        sid: Some("BN9".to_string()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            store
                .insert_webhook_dump("a2p/brand", "abc", serde_json::json!({"BrandSid": "BN9"}))
                .await
                .unwrap();
            reg.id
        };

        let reopened = MemoryStore::open(&path).unwrap();
        let found = reopened.get_by_sid("BN9").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(reopened.list_webhook_dumps(0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_snapshot_write_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let store = MemoryStore::open(sub.join("a2p.json")).unwrap();
        let reg = store.create("loc-1", sample_form()).await.unwrap();
        let mut rx = store.subscribe_by_owner("loc-1").await.unwrap();
        let _ = rx.borrow_and_update();

        std::fs::remove_dir_all(&sub).unwrap();

        let patch = RegistrationPatch {
            brand_status: Some("approved".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            store.update(&reg.id, patch).await,
            Err(StorageError::Backend(_))
        ));
        let current = store.get_by_id(&reg.id).await.unwrap().unwrap();
        assert_eq!(current, reg);

        assert!(store.create("loc-1", sample_form()).await.is_err());
        assert_eq!(store.list_by_owner("loc-1").await.unwrap().len(), 1);

        assert!(store
            .insert_webhook_dump("a2p/brand", "abc", serde_json::json!({"BrandSid": "BN1"}))
            .await
            .is_err());
        assert!(store.list_webhook_dumps(0).await.unwrap().is_empty());

        assert!(!rx.has_changed().unwrap());

        // The next successful write does not resurrect the rolled-back record.
        std::fs::create_dir(&sub).unwrap();
        store.create("loc-2", sample_form()).await.unwrap();
        let reopened = MemoryStore::open(sub.join("a2p.json")).unwrap();
        assert_eq!(reopened.list_by_owner("loc-1").await.unwrap().len(), 1);
        assert!(reopened.list_webhook_dumps(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_a_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            MemoryStore::open(&path),
            Err(StorageError::Backend(_))
        ));
    }
}
