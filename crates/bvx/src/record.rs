// ai
//! 📦 FileRecord — one object inside a version container, as the engine sees it.
//!
//! 🧠 Knowledge graph:
//! - Built by the backends, right after the store answers. Never persisted anywhere.
//! - `last_modified` is always present and always the listing's value. `meta_mtime` /
//!   `meta_last_modified` / `header_last_modified` / `access_time` only show up when the
//!   public path made its extra per-object request.
//! - `hash` is the ETag. For single-part uploads that is the MD5 of the body, which is what
//!   `matches_content` checks.
//! - `copy` and `copied` are scratch flags for the duration of a version cut.
//! - The `parse_*` helpers are the ONLY place timestamps arrive as text. Everything after
//!   them speaks `DateTime<Utc>`, so nobody downstream has to ask "is this a string?"

use chrono::{DateTime, SecondsFormat, Utc};
use md5::{Digest, Md5};

use crate::error::{StoreError, StoreResult};

/// 📦 One object, one destiny.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// 🗝️ Object key, unique within its container.
    pub name: String,
    /// #️⃣ ETag with the quotes peeled off.
    pub hash: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub symlink_target: Option<String>,
    /// ⏰ From `X-Object-Meta-Mtime` (public mode only).
    pub meta_mtime: Option<DateTime<Utc>>,
    /// ⏰ From `X-Object-Meta-Last-Modified` (public mode only).
    pub meta_last_modified: Option<DateTime<Utc>>,
    /// ⏰ The HTTP `Last-Modified` of the metadata request (public mode only).
    pub header_last_modified: Option<DateTime<Utc>>,
    /// 👀 The response `Date` of the metadata request, standing in for an access time.
    pub access_time: Option<DateTime<Utc>>,
    /// ✅ Eligible to be carried into the next version.
    pub copy: bool,
    /// ✅ Actually carried into the next version.
    pub copied: bool,
}

impl FileRecord {
    pub fn new(name: impl Into<String>, hash: &str, size: u64, last_modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            hash: strip_etag(hash),
            size,
            last_modified,
            symlink_target: None,
            meta_mtime: None,
            meta_last_modified: None,
            header_last_modified: None,
            access_time: None,
            copy: false,
            copied: false,
        }
    }

    /// ⏰ custom mtime > custom last-modified > HTTP `Last-Modified` > whatever the listing said.
    pub fn effective_mtime(&self) -> DateTime<Utc> {
        self.meta_mtime
            .or(self.meta_last_modified)
            .or(self.header_last_modified)
            .unwrap_or(self.last_modified)
    }

    /// #️⃣ `Some(true)` when `body` hashes to this record's ETag, `None` for multipart ETags
    /// (`<md5>-<parts>`), which are not the MD5 of the body.
    pub fn matches_content(&self, body: &[u8]) -> Option<bool> {
        if self.hash.contains('-') {
            return None;
        }
        Some(self.hash.eq_ignore_ascii_case(&md5_hex(body)))
    }

    /// 🧾 `name:timestamp:hash`, the comparator's unit of truth.
    pub fn diff_line(&self) -> String {
        format!(
            "{}:{}:{}",
            self.name,
            self.last_modified.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.hash
        )
    }
}

/// #️⃣ `"d41d8cd9..."` → `d41d8cd9...`. S3 quotes its ETags. We do not.
pub fn strip_etag(etag: &str) -> String {
    etag.trim().trim_matches('"').to_string()
}

/// #️⃣ Lowercase hex MD5, the single-part ETag of `body`.
pub fn md5_hex(body: &[u8]) -> String {
    hex::encode(Md5::digest(body))
}

/// ⏰ Listing timestamps: RFC 3339, e.g. `2024-06-13T22:53:53.123Z`.
pub fn parse_listing_time(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidTimestamp(raw.to_string()))
}

/// ⏰ HTTP-date headers (`Wed, 12 Jun 2024 10:00:00 GMT`), with RFC 3339 accepted as well
/// because custom metadata headers are written by whoever felt like it that day.
pub fn parse_header_time(raw: &str) -> StoreResult<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidTimestamp(raw.to_string()))
}

/// ⏰ `X-Object-Meta-Mtime`: fractional seconds since the epoch, e.g. `1718319233.25`.
pub fn parse_epoch_seconds(raw: &str) -> StoreResult<DateTime<Utc>> {
    let invalid = || StoreError::InvalidTimestamp(raw.to_string());
    let seconds: f64 = raw.trim().parse().map_err(|_| invalid())?;
    if !seconds.is_finite() {
        return Err(invalid());
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos).ok_or_else(invalid)
}
