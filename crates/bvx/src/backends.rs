//! 🔌 Backends — where the real I/O happens.
//!
//! 🪣 Everything the engine knows about buckets, it learns through `ObjectStore`.
//! Three strategies sit behind it:
//! - `s3`: authenticated, native protocol via `aws-sdk-s3`. Reads and writes.
//! - `public_http`: anonymous, plain HTTP GETs and an XML listing. Reads only.
//! - `in_mem`: a store that lives in RAM, for tests and for poking at the engine locally.
//!
//! 🎭 `StoreBackend` is the casting agency. The catalog and the lifecycle engine hold one of
//! these and never ask which face it is wearing. The one exception is
//! `visible_version_names`, and even that is answered by the trait, not by the caller.
//!
//! 🦆 The duck is here because every file must have one. This is law. Do not question the duck.

use std::collections::BTreeSet;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{DeleteFailure, StoreResult};
use crate::policy::PolicyDocument;
use crate::record::FileRecord;
use crate::version::overview_container;

pub mod in_mem;
pub mod public_http;
pub mod s3;

pub use in_mem::InMemoryStore;
pub use public_http::PublicHttpStore;
pub use s3::S3Store;

/// 🎫 What kind of ticket we were let in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// 🔑 Credentials present. Reads and writes through the native client.
    Authenticated,
    /// 👀 No credentials. Plain HTTP reads. Every mutation is refused locally.
    PublicReadonly,
}

/// 🪣 An S3-compatible object store, as far as versioning is concerned.
///
/// # Contract
/// - Listings come back sorted by object name.
/// - `remove_objects` reports per-object failures instead of failing the call; callers
///   decide whether a non-empty list is an error (it always is, so far).
/// - A `PublicReadonly` store refuses every mutation with `StoreError::ReadOnly` without
///   sending anything over the wire.
#[async_trait]
pub trait ObjectStore: std::fmt::Debug + Send + Sync {
    fn access_mode(&self) -> AccessMode;

    async fn list_containers(&self) -> StoreResult<BTreeSet<String>>;

    async fn container_exists(&self, container: &str) -> StoreResult<bool>;

    /// 🏗️ Creates an empty container. `AlreadyExists` if someone got there first.
    async fn create_container(&self, container: &str) -> StoreResult<()>;

    async fn apply_policy(&self, container: &str, policy: &PolicyDocument) -> StoreResult<()>;

    /// 📋 Every object in `container`, as a `FileRecord`, sorted by name.
    async fn list_objects(&self, container: &str, recursive: bool) -> StoreResult<Vec<FileRecord>>;

    /// 📋 Names only. Stores that pay extra per record (the public path) override this.
    async fn list_object_names(&self, container: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .list_objects(container, false)
            .await?
            .into_iter()
            .map(|record| record.name)
            .collect())
    }

    /// 🔍 The version names this store can see for `benchmark`.
    ///
    /// Authenticated: suffixes of the containers named `{benchmark}.{suffix}`.
    /// Public: the markers in `{benchmark}.overview`, since anonymous callers can't list buckets.
    async fn visible_version_names(&self, benchmark: &str) -> StoreResult<Vec<String>> {
        match self.access_mode() {
            AccessMode::Authenticated => {
                Ok(container_suffixes(&self.list_containers().await?, benchmark))
            }
            AccessMode::PublicReadonly => {
                self.list_object_names(&overview_container(benchmark)).await
            }
        }
    }

    async fn put_object(&self, container: &str, name: &str, body: Bytes) -> StoreResult<()>;

    /// 📑 Server-side copy of `source_container/source_name` to `container/name`.
    async fn copy_object(
        &self,
        container: &str,
        name: &str,
        source_container: &str,
        source_name: &str,
    ) -> StoreResult<()>;

    async fn remove_objects(&self, container: &str, names: &[String]) -> StoreResult<Vec<DeleteFailure>>;

    async fn get_object(&self, container: &str, name: &str) -> StoreResult<Bytes>;
}

/// ✂️ `{benchmark}.{suffix}` → `suffix`, for every container that belongs to `benchmark`.
fn container_suffixes(containers: &BTreeSet<String>, benchmark: &str) -> Vec<String> {
    containers
        .iter()
        .filter_map(|name| name.strip_prefix(benchmark)?.strip_prefix('.'))
        .map(str::to_string)
        .collect()
}

/// 🎭 The many faces of an object store.
///
/// Cloning is cheap: every variant is a handle over a shared client or shared state.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    S3(S3Store),
    PublicHttp(PublicHttpStore),
    InMemory(InMemoryStore),
}

#[async_trait]
impl ObjectStore for StoreBackend {
    fn access_mode(&self) -> AccessMode {
        match self {
            StoreBackend::S3(s) => s.access_mode(),
            StoreBackend::PublicHttp(p) => p.access_mode(),
            StoreBackend::InMemory(m) => m.access_mode(),
        }
    }

    async fn list_containers(&self) -> StoreResult<BTreeSet<String>> {
        match self {
            StoreBackend::S3(s) => s.list_containers().await,
            StoreBackend::PublicHttp(p) => p.list_containers().await,
            StoreBackend::InMemory(m) => m.list_containers().await,
        }
    }

    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        match self {
            StoreBackend::S3(s) => s.container_exists(container).await,
            StoreBackend::PublicHttp(p) => p.container_exists(container).await,
            StoreBackend::InMemory(m) => m.container_exists(container).await,
        }
    }

    async fn create_container(&self, container: &str) -> StoreResult<()> {
        match self {
            StoreBackend::S3(s) => s.create_container(container).await,
            StoreBackend::PublicHttp(p) => p.create_container(container).await,
            StoreBackend::InMemory(m) => m.create_container(container).await,
        }
    }

    async fn apply_policy(&self, container: &str, policy: &PolicyDocument) -> StoreResult<()> {
        match self {
            StoreBackend::S3(s) => s.apply_policy(container, policy).await,
            StoreBackend::PublicHttp(p) => p.apply_policy(container, policy).await,
            StoreBackend::InMemory(m) => m.apply_policy(container, policy).await,
        }
    }

    async fn list_objects(&self, container: &str, recursive: bool) -> StoreResult<Vec<FileRecord>> {
        match self {
            StoreBackend::S3(s) => s.list_objects(container, recursive).await,
            StoreBackend::PublicHttp(p) => p.list_objects(container, recursive).await,
            StoreBackend::InMemory(m) => m.list_objects(container, recursive).await,
        }
    }

    async fn list_object_names(&self, container: &str) -> StoreResult<Vec<String>> {
        match self {
            StoreBackend::S3(s) => s.list_object_names(container).await,
            StoreBackend::PublicHttp(p) => p.list_object_names(container).await,
            StoreBackend::InMemory(m) => m.list_object_names(container).await,
        }
    }

    async fn visible_version_names(&self, benchmark: &str) -> StoreResult<Vec<String>> {
        match self {
            StoreBackend::S3(s) => s.visible_version_names(benchmark).await,
            StoreBackend::PublicHttp(p) => p.visible_version_names(benchmark).await,
            StoreBackend::InMemory(m) => m.visible_version_names(benchmark).await,
        }
    }

    async fn put_object(&self, container: &str, name: &str, body: Bytes) -> StoreResult<()> {
        match self {
            StoreBackend::S3(s) => s.put_object(container, name, body).await,
            StoreBackend::PublicHttp(p) => p.put_object(container, name, body).await,
            StoreBackend::InMemory(m) => m.put_object(container, name, body).await,
        }
    }

    async fn copy_object(
        &self,
        container: &str,
        name: &str,
        source_container: &str,
        source_name: &str,
    ) -> StoreResult<()> {
        match self {
            StoreBackend::S3(s) => s.copy_object(container, name, source_container, source_name).await,
            StoreBackend::PublicHttp(p) => {
                p.copy_object(container, name, source_container, source_name).await
            }
            StoreBackend::InMemory(m) => m.copy_object(container, name, source_container, source_name).await,
        }
    }

    async fn remove_objects(&self, container: &str, names: &[String]) -> StoreResult<Vec<DeleteFailure>> {
        match self {
            StoreBackend::S3(s) => s.remove_objects(container, names).await,
            StoreBackend::PublicHttp(p) => p.remove_objects(container, names).await,
            StoreBackend::InMemory(m) => m.remove_objects(container, names).await,
        }
    }

    async fn get_object(&self, container: &str, name: &str) -> StoreResult<Bytes> {
        match self {
            StoreBackend::S3(s) => s.get_object(container, name).await,
            StoreBackend::PublicHttp(p) => p.get_object(container, name).await,
            StoreBackend::InMemory(m) => m.get_object(container, name).await,
        }
    }
}

impl From<S3Store> for StoreBackend {
    fn from(store: S3Store) -> Self {
        StoreBackend::S3(store)
    }
}

impl From<PublicHttpStore> for StoreBackend {
    fn from(store: PublicHttpStore) -> Self {
        StoreBackend::PublicHttp(store)
    }
}

impl From<InMemoryStore> for StoreBackend {
    fn from(store: InMemoryStore) -> Self {
        StoreBackend::InMemory(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_only_our_own_containers_count() {
        let the_bucket_list: BTreeSet<String> = [
            "bm.0.1",
            "bm.overview",
            "bm.test.1",
            "bm2.0.1",
            "bm",
            "benchmarks",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        assert_eq!(
            container_suffixes(&the_bucket_list, "bm"),
            vec!["0.1", "overview", "test.1"]
        );
    }
}
