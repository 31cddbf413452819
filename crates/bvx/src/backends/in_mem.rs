//! 🧠 In-memory object store — buckets made of heap, for tests and local tinkering.
//!
//! Containers and objects live in a `BTreeMap` behind an `Arc<tokio::sync::Mutex<...>>`,
//! so every clone and every view sees the same world. `public_view()` hands out a second
//! handle over the same state in `PublicReadonly` mode, which is how the tests check that
//! authenticated and anonymous readers agree about one store.
//!
//! ⚠️ Not for production. If you're deploying this to prod, please also deploy a therapist.
//!
//! 🧪 Fault injection: `refuse_delete` and `refuse_copy` make specific object names fail,
//! and `lose_create_race` makes a container appear "just before" our own create lands,
//! because the unhappy paths deserve tests too.
//!
//! #️⃣ ETags are the MD5 of the body, like a single-part upload to S3.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::trace;

use crate::backends::{AccessMode, ObjectStore};
use crate::error::{DeleteFailure, StoreError, StoreResult};
use crate::policy::PolicyDocument;
use crate::record::{FileRecord, md5_hex};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    hash: String,
    last_modified: DateTime<Utc>,
    meta_mtime: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Container {
    objects: BTreeMap<String, StoredObject>,
    policy: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    containers: BTreeMap<String, Container>,
    refused_deletes: BTreeSet<String>,
    refused_copies: BTreeSet<String>,
    contested_creates: BTreeSet<String>,
}

/// 📦 A whole object store that fits in a `Mutex`.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    mode: AccessMode,
    state: Arc<Mutex<State>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// 🚀 An empty, authenticated store.
    pub fn new() -> Self {
        Self {
            mode: AccessMode::Authenticated,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// 👀 Another handle over the same buckets, minus the credentials.
    pub fn public_view(&self) -> Self {
        Self {
            mode: AccessMode::PublicReadonly,
            state: Arc::clone(&self.state),
        }
    }

    /// ⏰ Stores an object with a chosen modification time (and optional `X-Object-Meta-Mtime`).
    /// Bypasses the access mode, because fixtures are not users.
    pub async fn put_object_at(
        &self,
        container: &str,
        name: &str,
        body: Bytes,
        last_modified: DateTime<Utc>,
        meta_mtime: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let bucket = bucket_mut(&mut state, container)?;
        bucket.objects.insert(
            name.to_string(),
            StoredObject {
                hash: md5_hex(&body),
                body,
                last_modified,
                meta_mtime,
            },
        );
        Ok(())
    }

    /// 🧾 The policy JSON last applied to `container`, if any.
    pub async fn policy_of(&self, container: &str) -> Option<String> {
        let state = self.state.lock().await;
        state.containers.get(container).and_then(|c| c.policy.clone())
    }

    /// 🧪 Every later delete of an object called `name` fails, in any container.
    pub async fn refuse_delete(&self, name: &str) {
        self.state.lock().await.refused_deletes.insert(name.to_string());
    }

    /// 🧪 Every later copy of an object called `name` fails, in any container.
    pub async fn refuse_copy(&self, name: &str) {
        self.state.lock().await.refused_copies.insert(name.to_string());
    }

    /// 🧪 The next create of `container` finds that someone else created it a moment earlier:
    /// the container exists afterwards, and the create reports `AlreadyExists`.
    pub async fn lose_create_race(&self, container: &str) {
        self.state.lock().await.contested_creates.insert(container.to_string());
    }

    fn ensure_writable(&self, operation: &'static str) -> StoreResult<()> {
        match self.mode {
            AccessMode::Authenticated => Ok(()),
            AccessMode::PublicReadonly => Err(StoreError::ReadOnly(operation)),
        }
    }

    fn to_record(&self, name: &str, object: &StoredObject) -> FileRecord {
        let mut record = FileRecord::new(name, &object.hash, object.body.len() as u64, object.last_modified);
        // -- 👀 the public path only learns custom metadata from its per-object request
        if self.mode == AccessMode::PublicReadonly {
            record.meta_mtime = object.meta_mtime;
        }
        record
    }
}

fn bucket_mut<'a>(state: &'a mut State, container: &str) -> StoreResult<&'a mut Container> {
    state
        .containers
        .get_mut(container)
        .ok_or_else(|| StoreError::NotFound(container.to_string()))
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    fn access_mode(&self) -> AccessMode {
        self.mode
    }

    async fn list_containers(&self) -> StoreResult<BTreeSet<String>> {
        Ok(self.state.lock().await.containers.keys().cloned().collect())
    }

    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        Ok(self.state.lock().await.containers.contains_key(container))
    }

    async fn create_container(&self, container: &str) -> StoreResult<()> {
        self.ensure_writable("create_container")?;
        let mut state = self.state.lock().await;
        if state.contested_creates.remove(container) {
            state.containers.entry(container.to_string()).or_default();
        }
        if state.containers.contains_key(container) {
            return Err(StoreError::AlreadyExists(container.to_string()));
        }
        state.containers.insert(container.to_string(), Container::default());
        trace!("🏗️ in-memory container {} exists now", container);
        Ok(())
    }

    async fn apply_policy(&self, container: &str, policy: &PolicyDocument) -> StoreResult<()> {
        self.ensure_writable("apply_policy")?;
        let mut state = self.state.lock().await;
        bucket_mut(&mut state, container)?.policy = Some(policy.to_json());
        Ok(())
    }

    async fn list_objects(&self, container: &str, recursive: bool) -> StoreResult<Vec<FileRecord>> {
        let state = self.state.lock().await;
        let bucket = state
            .containers
            .get(container)
            .ok_or_else(|| StoreError::NotFound(container.to_string()))?;
        Ok(bucket
            .objects
            .iter()
            // -- 📁 non-recursive listings stop at the first `/`, like a delimiter listing minus prefixes
            .filter(|(name, _)| recursive || !name.contains('/'))
            .map(|(name, object)| self.to_record(name, object))
            .collect())
    }

    async fn put_object(&self, container: &str, name: &str, body: Bytes) -> StoreResult<()> {
        self.ensure_writable("put_object")?;
        self.put_object_at(container, name, body, Utc::now(), None).await
    }

    async fn copy_object(
        &self,
        container: &str,
        name: &str,
        source_container: &str,
        source_name: &str,
    ) -> StoreResult<()> {
        self.ensure_writable("copy_object")?;
        let mut state = self.state.lock().await;
        if state.refused_copies.contains(source_name) {
            return Err(StoreError::connection(
                "copy_object",
                format!("copy of {source_container}/{source_name} refused"),
            ));
        }
        let source = state
            .containers
            .get(source_container)
            .and_then(|c| c.objects.get(source_name))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{source_container}/{source_name}")))?;
        // -- ⏰ a server-side copy is a fresh write: same bytes, same hash, new timestamp
        let copied = StoredObject {
            last_modified: Utc::now(),
            ..source
        };
        bucket_mut(&mut state, container)?
            .objects
            .insert(name.to_string(), copied);
        Ok(())
    }

    async fn remove_objects(&self, container: &str, names: &[String]) -> StoreResult<Vec<DeleteFailure>> {
        self.ensure_writable("remove_objects")?;
        let mut state = self.state.lock().await;
        let refused = state.refused_deletes.clone();
        let bucket = bucket_mut(&mut state, container)?;
        let mut failures = Vec::new();
        for name in names {
            if refused.contains(name) {
                failures.push(DeleteFailure {
                    name: name.clone(),
                    message: "AccessDenied".to_string(),
                });
            } else {
                bucket.objects.remove(name);
            }
        }
        Ok(failures)
    }

    async fn get_object(&self, container: &str, name: &str) -> StoreResult<Bytes> {
        let state = self.state.lock().await;
        state
            .containers
            .get(container)
            .and_then(|c| c.objects.get(name))
            .map(|o| o.body.clone())
            .ok_or_else(|| StoreError::NotFound(format!("{container}/{name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::readonly_policy;

    #[tokio::test]
    async fn the_one_where_the_public_view_can_look_but_not_touch() {
        let the_store = InMemoryStore::new();
        the_store.create_container("bm.0.1").await.expect("💀 create");
        the_store
            .put_object("bm.0.1", "file1.txt", Bytes::from_static(b"abcd"))
            .await
            .expect("💀 put");

        let the_tourist = the_store.public_view();
        assert_eq!(the_tourist.access_mode(), AccessMode::PublicReadonly);
        assert_eq!(the_tourist.list_objects("bm.0.1", true).await.expect("💀 list").len(), 1);
        assert!(matches!(
            the_tourist.put_object("bm.0.1", "nope", Bytes::new()).await,
            Err(StoreError::ReadOnly("put_object"))
        ));
        assert!(matches!(
            the_tourist.create_container("bm.0.2").await,
            Err(StoreError::ReadOnly(_))
        ));
    }

    #[tokio::test]
    async fn the_one_where_creating_twice_is_one_time_too_many() {
        let the_store = InMemoryStore::new();
        the_store.create_container("bm.overview").await.expect("💀 first create");
        let the_sequel = the_store.create_container("bm.overview").await;
        assert!(the_sequel.is_err_and(|e| e.is_already_exists()));
    }

    #[tokio::test]
    async fn the_one_where_copies_keep_the_hash_and_get_a_new_timestamp() {
        let the_store = InMemoryStore::new();
        the_store.create_container("a").await.expect("💀 create a");
        the_store.create_container("b").await.expect("💀 create b");
        let the_past = DateTime::from_timestamp(1_000, 0).expect("💀 epoch");
        the_store
            .put_object_at("a", "f", Bytes::from_static(b"abcd"), the_past, None)
            .await
            .expect("💀 put");

        the_store.copy_object("b", "f", "a", "f").await.expect("💀 copy");

        let the_original = &the_store.list_objects("a", true).await.expect("💀 list a")[0];
        let the_clone = &the_store.list_objects("b", true).await.expect("💀 list b")[0];
        assert_eq!(the_original.hash, the_clone.hash);
        assert_eq!(the_original.hash, "e2fc714c4727ee9395f324cd2e7f331f");
        assert!(the_clone.last_modified > the_original.last_modified);
    }

    #[tokio::test]
    async fn the_one_where_refused_deletes_are_reported_not_raised() {
        let the_store = InMemoryStore::new();
        the_store.create_container("c").await.expect("💀 create");
        for the_name in ["keep", "drop"] {
            the_store.put_object("c", the_name, Bytes::new()).await.expect("💀 put");
        }
        the_store.refuse_delete("keep").await;

        let the_failures = the_store
            .remove_objects("c", &["keep".to_string(), "drop".to_string()])
            .await
            .expect("💀 remove call itself should succeed");

        assert_eq!(the_failures.len(), 1);
        assert_eq!(the_failures[0].name, "keep");
        let the_survivors = the_store.list_object_names("c").await.expect("💀 names");
        assert_eq!(the_survivors, vec!["keep"]);
    }

    #[tokio::test]
    async fn the_one_where_policies_stick_to_their_container() {
        let the_store = InMemoryStore::new();
        the_store.create_container("bm.0.1").await.expect("💀 create");
        let the_policy = readonly_policy("bm.0.1").expect("💀 policy");
        the_store.apply_policy("bm.0.1", &the_policy).await.expect("💀 apply");

        assert_eq!(the_store.policy_of("bm.0.1").await, Some(the_policy.to_json()));
        assert!(matches!(
            the_store.apply_policy("ghost", &the_policy).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
