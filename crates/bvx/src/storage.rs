//! 🚪 Storage — the front door. Config in, a ready-to-use benchmark handle out.
//!
//! 🧠 Knowledge graph:
//! - `connect`: the credentials in `StoreConfig` pick the backend. Both keys → `S3Store`,
//!   no keys → `PublicHttpStore`, anything in between → `InvalidAuthOptions`.
//! - `BenchmarkStorage::open`: connects, and when authenticated, checks the connection by
//!   listing buckets and bootstraps the benchmark if it doesn't exist yet. Anonymous callers
//!   get a read-only view as-is; they couldn't create anything anyway.

use tracing::{info, warn};

use crate::app_config::StoreConfig;
use crate::backends::{AccessMode, ObjectStore, PublicHttpStore, S3Store, StoreBackend};
use crate::catalog::Catalog;
use crate::error::StoreResult;
use crate::lifecycle::Versioner;

/// 🔌 Picks and builds the backend that matches the configured credentials.
pub async fn connect(config: &StoreConfig) -> StoreResult<StoreBackend> {
    match config.access_mode()? {
        AccessMode::Authenticated => Ok(S3Store::connect(config).await?.into()),
        AccessMode::PublicReadonly => Ok(PublicHttpStore::new(config)?.into()),
    }
}

/// 📦 One benchmark on one store, with the lifecycle engine attached.
#[derive(Debug, Clone)]
pub struct BenchmarkStorage {
    versioner: Versioner,
}

impl BenchmarkStorage {
    /// 🚀 Connects according to `config` and opens `benchmark`.
    pub async fn open(config: &StoreConfig, benchmark: &str) -> StoreResult<Self> {
        Self::open_with(connect(config).await?, benchmark).await
    }

    /// 🚀 Opens `benchmark` on an already-built store. Creates it when authenticated and missing.
    pub async fn open_with(store: StoreBackend, benchmark: &str) -> StoreResult<Self> {
        let catalog = Catalog::new(store, benchmark)?;
        if catalog.store().access_mode() == AccessMode::Authenticated {
            // -- 📡 fail here, loudly, rather than halfway through a version cut
            catalog.store().list_containers().await?;
            if !catalog.benchmark_exists().await? {
                warn!("🆕 benchmark {} does not exist, creating it", benchmark);
                catalog.create_benchmark().await?;
            }
        }
        info!(
            "🚪 opened benchmark {} ({:?})",
            benchmark,
            catalog.store().access_mode()
        );
        Ok(Self {
            versioner: Versioner::new(catalog),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        self.versioner.catalog()
    }

    pub fn versioner(&self) -> &Versioner {
        &self.versioner
    }

    pub fn versioner_mut(&mut self) -> &mut Versioner {
        &mut self.versioner
    }

    pub fn into_versioner(self) -> Versioner {
        self.versioner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::InMemoryStore;
    use crate::error::StoreError;
    use crate::version::Version;

    #[tokio::test]
    async fn the_one_where_a_missing_benchmark_gets_built_on_arrival() {
        let the_store = InMemoryStore::new();

        let the_storage = BenchmarkStorage::open_with(the_store.clone().into(), "fresh")
            .await
            .expect("💀 opening a new benchmark should create it");

        let the_versions = the_storage.catalog().list_versions().await.expect("💀 versions");
        assert_eq!(the_versions.numeric, vec![Version::new(0, 1)]);
        assert_eq!(
            the_storage.catalog().list_benchmarks().await.expect("💀 registry"),
            vec!["fresh"]
        );

        // -- 🔁 opening again finds it and leaves it alone
        BenchmarkStorage::open_with(the_store.into(), "fresh")
            .await
            .expect("💀 reopening an existing benchmark");
    }

    #[tokio::test]
    async fn the_one_where_tourists_never_build_anything() {
        let the_store = InMemoryStore::new();

        let the_storage = BenchmarkStorage::open_with(the_store.public_view().into(), "ghost")
            .await
            .expect("💀 a public open is just a handle");

        assert!(!the_storage.catalog().benchmark_exists().await.expect("💀 exists"));
        assert!(the_store.list_containers().await.expect("💀 containers").is_empty());
    }

    #[tokio::test]
    async fn the_one_where_half_a_key_never_reaches_the_network() {
        let mut the_config = StoreConfig::new("localhost:1");
        the_config.secret_key = Some("secret-but-lonely".to_string());
        assert!(matches!(connect(&the_config).await, Err(StoreError::InvalidAuthOptions(_))));

        let the_public = connect(&StoreConfig::new("localhost:1")).await.expect("💀 public connect");
        assert!(matches!(the_public, StoreBackend::PublicHttp(_)));
    }
}
