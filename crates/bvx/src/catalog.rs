// ai
//! 📇 Version Catalog — which versions exist, and an overview that admits it.
//!
//! 🎬 *[a bucket named `bm.0.3` exists. The overview has never heard of it.]*
//! *[somewhere, an anonymous reader asks for the latest version and gets 0.2. The plot thickens.]*
//!
//! Two sources of truth, kept in step:
//! - the version containers themselves (`{bm}.{major}.{minor}`, `{bm}.test.{n}`), visible only
//!   to authenticated callers who can list buckets;
//! - the overview manifest `{bm}.overview`, one zero-byte marker per version, readable by anyone.
//!
//! `reconcile_overview` makes the second match the first. Everything that reads versions
//! goes through `ObjectStore::visible_version_names`, which picks the right source for the
//! access mode, so callers don't branch on it.
//!
//! 🧠 Knowledge graph:
//! - `VersionSet`: numeric versions sorted numerically, test versions sorted by number.
//! - `create_benchmark`: `test.1` + `overview` + `0.1`, each public-readonly, then reconcile,
//!   then a marker in the `benchmarks` registry (created on first use).
//! - Every read re-lists the store. Nothing is cached here.

use std::collections::BTreeSet;

use bytes::Bytes;
use tracing::{debug, info};

use crate::backends::{AccessMode, ObjectStore, StoreBackend};
use crate::error::{StoreError, StoreResult};
use crate::policy::readonly_policy;
use crate::version::{
    REGISTRY_CONTAINER, Version, VersionId, overview_container, validate_benchmark_name,
    version_container,
};

/// 🔢 The versions a benchmark has, split by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSet {
    /// Sorted ascending, numerically.
    pub numeric: Vec<Version>,
    /// `test.{n}` names, sorted by `n`.
    pub other: Vec<String>,
}

impl VersionSet {
    pub fn latest(&self) -> Option<Version> {
        self.numeric.last().copied()
    }

    pub fn contains(&self, version: Version) -> bool {
        self.numeric.binary_search(&version).is_ok()
    }

    fn ids(&self) -> BTreeSet<VersionId> {
        self.numeric
            .iter()
            .map(|v| VersionId::Numeric(*v))
            .chain(self.other.iter().filter_map(|name| VersionId::parse(name)))
            .collect()
    }
}

/// 🧹 What a reconcile pass changed in the overview.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// 📇 One benchmark's catalog, over whatever store it was handed.
#[derive(Debug, Clone)]
pub struct Catalog {
    store: StoreBackend,
    benchmark: String,
}

impl Catalog {
    pub fn new(store: StoreBackend, benchmark: impl Into<String>) -> StoreResult<Self> {
        let benchmark = benchmark.into();
        validate_benchmark_name(&benchmark)?;
        Ok(Self { store, benchmark })
    }

    pub fn benchmark(&self) -> &str {
        &self.benchmark
    }

    pub fn store(&self) -> &StoreBackend {
        &self.store
    }

    /// 🔍 Versions as this store's access mode can see them. Unrecognised names are skipped.
    pub async fn list_versions(&self) -> StoreResult<VersionSet> {
        let ids: BTreeSet<VersionId> = self
            .store
            .visible_version_names(&self.benchmark)
            .await?
            .iter()
            .filter_map(|name| VersionId::parse(name))
            .collect();

        // -- BTreeSet order: every Numeric before every Test, each sorted numerically
        let mut set = VersionSet::default();
        for id in ids {
            match id {
                VersionId::Numeric(v) => set.numeric.push(v),
                VersionId::Test(_) => set.other.push(id.to_string()),
            }
        }
        debug!(
            "📇 {}: {} numeric, {} test version(s)",
            self.benchmark,
            set.numeric.len(),
            set.other.len()
        );
        Ok(set)
    }

    /// 🏷️ Raw marker names in the overview, recognised or not.
    pub async fn overview_markers(&self) -> StoreResult<Vec<String>> {
        self.store.list_object_names(&overview_container(&self.benchmark)).await
    }

    /// 🧹 Adds a marker for every available version the overview is missing. With `cleanup`,
    /// also removes every marker that doesn't name an available version, junk included.
    ///
    /// Running it twice changes nothing the second time.
    pub async fn reconcile_overview(&self, cleanup: bool) -> StoreResult<ReconcileReport> {
        if self.store.access_mode() == AccessMode::PublicReadonly {
            return Err(StoreError::ReadOnly("reconcile_overview"));
        }
        let overview = overview_container(&self.benchmark);
        let mut report = ReconcileReport::default();

        let marked: BTreeSet<VersionId> = self
            .overview_markers()
            .await?
            .iter()
            .filter_map(|name| VersionId::parse(name))
            .collect();
        let available = self.list_versions().await?.ids();

        for missing in available.difference(&marked) {
            let marker = missing.to_string();
            self.store.put_object(&overview, &marker, Bytes::new()).await?;
            report.added.push(marker);
        }

        if cleanup {
            let stale: Vec<String> = self
                .overview_markers()
                .await?
                .into_iter()
                .filter(|name| VersionId::parse(name).is_none_or(|id| !available.contains(&id)))
                .collect();
            if !stale.is_empty() {
                let failures = self.store.remove_objects(&overview, &stale).await?;
                if !failures.is_empty() {
                    return Err(StoreError::DeletionFailure(failures));
                }
            }
            report.removed = stale;
        }

        info!(
            "🧹 overview of {} reconciled: +{:?} -{:?}",
            self.benchmark, report.added, report.removed
        );
        Ok(report)
    }

    /// ✅ A benchmark exists when its overview container does.
    pub async fn benchmark_exists(&self) -> StoreResult<bool> {
        self.store.container_exists(&overview_container(&self.benchmark)).await
    }

    /// 🏗️ Lays down a brand new benchmark: `test.1`, `overview` and `0.1`, all public-readonly,
    /// a reconciled overview, and an entry in the registry.
    pub async fn create_benchmark(&self) -> StoreResult<()> {
        let skeleton = [
            version_container(&self.benchmark, VersionId::Test(1)),
            overview_container(&self.benchmark),
            version_container(&self.benchmark, Version::new(0, 1)),
        ];
        for container in &skeleton {
            if self.store.container_exists(container).await? {
                return Err(StoreError::AlreadyExists(container.clone()));
            }
        }
        for container in &skeleton {
            create_public_container(&self.store, container).await?;
        }

        self.reconcile_overview(true).await?;

        if !self.store.container_exists(REGISTRY_CONTAINER).await? {
            // -- 📇 first benchmark ever on this store; losing the race to another first is fine
            match create_public_container(&self.store, REGISTRY_CONTAINER).await {
                Err(e) if e.is_already_exists() => {}
                other => other?,
            }
        }
        self.store
            .put_object(REGISTRY_CONTAINER, &self.benchmark, Bytes::new())
            .await?;

        info!("🏗️ benchmark {} created", self.benchmark);
        Ok(())
    }

    pub async fn list_benchmarks(&self) -> StoreResult<Vec<String>> {
        list_benchmarks(&self.store).await
    }
}

/// 📇 Every benchmark in the registry. No registry yet means no benchmarks yet.
pub async fn list_benchmarks(store: &impl ObjectStore) -> StoreResult<Vec<String>> {
    if !store.container_exists(REGISTRY_CONTAINER).await? {
        return Ok(Vec::new());
    }
    store.list_object_names(REGISTRY_CONTAINER).await
}

/// 🏗️ create → readonly policy → confirm it's really there.
pub(crate) async fn create_public_container(store: &impl ObjectStore, container: &str) -> StoreResult<()> {
    store.create_container(container).await?;
    store.apply_policy(container, &readonly_policy(container)?).await?;
    if !store.container_exists(container).await? {
        return Err(StoreError::CreationVerification(container.to_string()));
    }
    debug!("🏗️ {} created with a public-readonly policy", container);
    Ok(())
}
