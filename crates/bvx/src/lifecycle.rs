// ai
//! 🚀 Version Lifecycle Engine — carving version N+1 out of version N.
//!
//! 🎬 *[camera pans across a bucket named `bm.0.1`. It has files. It has dreams.]*
//! *[a narrator whispers: "in a world where snapshots are immutable... one struct dared to copy."]*
//!
//! 🧠 Knowledge graph:
//! - `Versioner` walks a fixed path:
//!   `Uninitialized → CurrentSet → NewRequested → NewCreated → ObjectsListed →
//!   EligibilityComputed → CopyComplete`. Each step checks that the one before it happened
//!   and fails with `MissingVersion` when it didn't.
//! - `create_new_version` runs the whole path in order. The first failure stops it.
//!   Nothing is rolled back; re-running after fixing the cause is the recovery plan.
//! - There is no lock around version creation. Two callers racing for the same version
//!   both try to create the container, and the loser hears `AlreadyExists` from the store.
//! - `FileRecord`s live only as long as the current version stays the same.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::backends::ObjectStore;
use crate::catalog::{Catalog, create_public_container};
use crate::error::{StoreError, StoreResult};
use crate::progress::TransferProgress;
use crate::record::FileRecord;
use crate::version::{Version, version_container};

/// 🏷️ Which objects deserve a ride into the next version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaggingPolicy {
    /// Everything last touched before the reference time.
    #[default]
    All,
}

impl FromStr for TaggingPolicy {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        match s {
            "all" => Ok(Self::All),
            other => Err(StoreError::InvalidPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for TaggingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
        }
    }
}

/// 📑 How eligible objects get into the new version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyMode {
    /// Server-side copy, bytes and all.
    #[default]
    Copy,
    /// Reserved. Always `NotImplemented`.
    Symlink,
}

impl FromStr for CopyMode {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        match s {
            "copy" => Ok(Self::Copy),
            "symlink" => Ok(Self::Symlink),
            other => Err(StoreError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for CopyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => f.write_str("copy"),
            Self::Symlink => f.write_str("symlink"),
        }
    }
}

/// 🧾 What `create_new_version` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationReport {
    pub version: Version,
    pub eligible: usize,
    pub copied: usize,
}

/// 📥 What `download_objects` did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: usize,
    /// Objects whose downloaded bytes don't match their ETag.
    pub mismatched: Vec<String>,
}

/// 🚀 The state machine that turns version N into version N+1.
#[derive(Debug, Clone)]
pub struct Versioner {
    catalog: Catalog,
    current: Option<Version>,
    pending: Option<Version>,
    files: Option<BTreeMap<String, FileRecord>>,
}

impl Versioner {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            current: None,
            pending: None,
            files: None,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn current(&self) -> Option<Version> {
        self.current
    }

    pub fn pending(&self) -> Option<Version> {
        self.pending
    }

    /// 📋 Records of the current version, once `list_objects` has run.
    pub fn files(&self) -> Option<&BTreeMap<String, FileRecord>> {
        self.files.as_ref()
    }

    fn current_or_missing(&self) -> StoreResult<Version> {
        self.current.ok_or(StoreError::MissingVersion("current"))
    }

    fn pending_or_missing(&self) -> StoreResult<Version> {
        self.pending.ok_or(StoreError::MissingVersion("new"))
    }

    /// 🎯 `None` picks the latest numeric version; `Some(v)` must already exist.
    /// Switching versions forgets any records listed for the old one.
    pub async fn set_current_version(&mut self, version: Option<Version>) -> StoreResult<Version> {
        let available = self.catalog.list_versions().await?;
        let chosen = match version {
            None => available
                .latest()
                .ok_or_else(|| StoreError::NoVersion(self.catalog.benchmark().to_string()))?,
            Some(v) if available.contains(v) => v,
            Some(v) => {
                return Err(StoreError::NoVersion(format!(
                    "{} (requested {v})",
                    self.catalog.benchmark()
                )));
            }
        };
        if self.current != Some(chosen) {
            self.files = None;
        }
        self.current = Some(chosen);
        debug!("🎯 current version of {} is {}", self.catalog.benchmark(), chosen);
        Ok(chosen)
    }

    /// ⏭️ `None` means "next minor after current".
    pub fn set_new_version(&mut self, version: Option<Version>) -> StoreResult<Version> {
        let chosen = match version {
            Some(v) => v,
            None => self.current_or_missing()?.next_minor()?,
        };
        self.pending = Some(chosen);
        Ok(chosen)
    }

    /// 🏗️ Creates the pending version's container, public-readonly, and puts it in the overview.
    pub async fn create_pending_version(&mut self) -> StoreResult<()> {
        let pending = self.pending_or_missing()?;
        let benchmark = self.catalog.benchmark().to_string();
        let container = version_container(&benchmark, pending);

        if self.catalog.list_versions().await?.contains(pending) {
            return Err(StoreError::AlreadyExists(container));
        }
        create_public_container(self.catalog.store(), &container).await?;
        self.catalog.reconcile_overview(false).await?;

        if !self.catalog.list_versions().await?.contains(pending) {
            return Err(StoreError::CreationVerification(container));
        }
        info!("🏗️ version {} of {} created", pending, benchmark);
        Ok(())
    }

    /// 📋 Lists every object of the current version. Returns how many there are.
    pub async fn list_objects(&mut self) -> StoreResult<usize> {
        let current = self.current_or_missing()?;
        let container = version_container(self.catalog.benchmark(), current);
        let records = self.catalog.store().list_objects(&container, true).await?;
        let files: BTreeMap<String, FileRecord> =
            records.into_iter().map(|r| (r.name.clone(), r)).collect();
        let count = files.len();
        self.files = Some(files);
        debug!("📋 {} holds {} object(s)", container, count);
        Ok(count)
    }

    /// 🏷️ Flags every record last modified before `reference_time` (default: now).
    /// Lists the current version first if nobody has yet. Returns the eligible count.
    pub async fn select_eligible(
        &mut self,
        reference_time: Option<DateTime<Utc>>,
        policy: TaggingPolicy,
    ) -> StoreResult<usize> {
        let reference = reference_time.unwrap_or_else(Utc::now);
        if self.files.is_none() {
            self.list_objects().await?;
        }
        let mut eligible = 0;
        if let Some(files) = self.files.as_mut() {
            match policy {
                TaggingPolicy::All => {
                    for record in files.values_mut() {
                        record.copy = record.effective_mtime() < reference;
                        eligible += usize::from(record.copy);
                    }
                }
            }
        }
        debug!("🏷️ {} object(s) eligible before {}", eligible, reference);
        Ok(eligible)
    }

    /// 📑 Copies every flagged record from the current version into the pending one.
    /// Without a prior `select_eligible`, the records are listed and selected with
    /// `TaggingPolicy::All` and the current time first.
    ///
    /// `Symlink` is refused before anything else is looked at. The first failed copy stops
    /// the run; objects copied before it stay copied.
    pub async fn copy_eligible(&mut self, mode: CopyMode) -> StoreResult<usize> {
        if mode == CopyMode::Symlink {
            return Err(StoreError::NotImplemented("symlink copy"));
        }
        let current = self.current_or_missing()?;
        let pending = self.pending_or_missing()?;
        let benchmark = self.catalog.benchmark().to_string();
        let source = version_container(&benchmark, current);
        let target = version_container(&benchmark, pending);
        let store = self.catalog.store().clone();

        // -- 🏷️ nobody picked anything yet: list and select with the default policy first
        if self.files.is_none() {
            self.select_eligible(None, TaggingPolicy::default()).await?;
        }
        let files = self.files.as_mut().ok_or(StoreError::MissingVersion("current"))?;
        let total = files.values().filter(|r| r.copy).count();
        let mut progress = TransferProgress::new(format!("{source} → {target}"), total as u64);
        for record in files.values_mut().filter(|r| r.copy) {
            store
                .copy_object(&target, &record.name, &source, &record.name)
                .await?;
            record.copied = true;
            progress.advance(record.size);
        }
        progress.finish();
        info!("📑 {} object(s) copied from {} to {}", total, source, target);
        Ok(total)
    }

    /// 🚀 latest → next (or `version`) → create → list → select → copy. In that order, always.
    pub async fn create_new_version(
        &mut self,
        version: Option<Version>,
        policy: TaggingPolicy,
        mode: CopyMode,
    ) -> StoreResult<CreationReport> {
        // -- 🚧 refused up front so an unsupported mode never leaves an empty version behind
        if mode == CopyMode::Symlink {
            return Err(StoreError::NotImplemented("symlink copy"));
        }
        self.set_current_version(None).await?;
        let new_version = self.set_new_version(version)?;
        self.create_pending_version().await?;
        self.list_objects().await?;
        let eligible = self.select_eligible(None, policy).await?;
        let copied = self.copy_eligible(mode).await?;
        Ok(CreationReport {
            version: new_version,
            eligible,
            copied,
        })
    }

    /// 📥 Writes every object of the current version below `dest_dir`, directories included.
    /// Names that would land outside `dest_dir` are refused with `InvalidName`.
    ///
    /// Each body is checked against its record's MD5 ETag on the way down. A mismatch is
    /// logged and reported, not raised; the file stays on disk.
    pub async fn download_objects(&mut self, dest_dir: &Path) -> StoreResult<DownloadReport> {
        let current = self.current_or_missing()?;
        if self.files.is_none() {
            self.list_objects().await?;
        }
        let container = version_container(self.catalog.benchmark(), current);
        let records: Vec<FileRecord> = self.listed_records();
        for record in &records {
            relative_target(&record.name)?;
        }

        let mut report = DownloadReport::default();
        let mut progress =
            TransferProgress::new(format!("{container} → {}", dest_dir.display()), records.len() as u64);
        for record in &records {
            let target = dest_dir.join(relative_target(&record.name)?);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let body = self.catalog.store().get_object(&container, &record.name).await?;
            tokio::fs::write(&target, &body).await?;
            if record.matches_content(&body) == Some(false) {
                warn!("#️⃣ MD5 checksum failed for {}", target.display());
                report.mismatched.push(record.name.clone());
            }
            report.downloaded += 1;
            progress.advance(record.size);
        }
        progress.finish();
        info!(
            "📥 {} object(s) of {} written to {}, {} checksum mismatch(es)",
            report.downloaded,
            container,
            dest_dir.display(),
            report.mismatched.len()
        );
        Ok(report)
    }

    /// #️⃣ Compares the files below `dest_dir` with the current version's MD5 ETags.
    /// Returns the names whose local copy is missing or differs. Multipart ETags can't be
    /// recomputed locally and are skipped.
    pub async fn checksum_objects(&mut self, dest_dir: &Path) -> StoreResult<Vec<String>> {
        self.current_or_missing()?;
        if self.files.is_none() {
            self.list_objects().await?;
        }
        let mut failed = Vec::new();
        for record in self.listed_records() {
            let target = dest_dir.join(relative_target(&record.name)?);
            let verdict = match tokio::fs::read(&target).await {
                Ok(body) => record.matches_content(&body),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Some(false),
                Err(e) => return Err(e.into()),
            };
            match verdict {
                Some(true) => {}
                Some(false) => failed.push(record.name),
                None => debug!("#️⃣ {} has a multipart ETag, skipped", record.name),
            }
        }
        info!("#️⃣ {} local file(s) failed the checksum", failed.len());
        Ok(failed)
    }

    fn listed_records(&self) -> Vec<FileRecord> {
        self.files
            .iter()
            .flat_map(|files| files.values())
            .cloned()
            .collect()
    }

    pub async fn archive_version(&mut self, _version: Version) -> StoreResult<()> {
        Err(StoreError::NotImplemented("archive_version"))
    }

    pub async fn delete_version(&mut self, _version: Version) -> StoreResult<()> {
        Err(StoreError::NotImplemented("delete_version"))
    }
}

// -- 🚪 only plain path components; no `..`, no roots, no drive letters
fn relative_target(name: &str) -> StoreResult<&Path> {
    let path = Path::new(name);
    let plain = !name.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(path)
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}
