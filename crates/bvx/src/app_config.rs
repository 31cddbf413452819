//! 🔧 App Configuration — the sacred TOML-to-struct pipeline, now with buckets.
//!
//! 📡 "Endpoint not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! 🧠 Knowledge graph:
//! - `AppConfig { store }`: the whole file. One section today. Room to grow.
//! - `StoreConfig`: endpoint + optional credentials + timeouts + fan-out width.
//! - `StoreConfig::access_mode()`: credentials decide the mode. Both → Authenticated.
//!   Neither → PublicReadonly. One of two → InvalidAuthOptions, because half a key is no key.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::backends::AccessMode;
use crate::error::{StoreError, StoreResult};

/// 📦 The AppConfig: one struct to rule them all, one struct to find them.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
}

/// 🪣 Where the object store lives and how we talk to it.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// 📡 `host:port`, with or without a scheme. The scheme is decided by `secure` anyway.
    pub endpoint: String,
    /// 🔒 Both keys present = authenticated. Neither = public read-only. One = a config bug.
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// 🔐 https when true, http when false.
    #[serde(default)]
    pub secure: bool,
    /// 🌎 MinIO doesn't care. AWS cares a lot.
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// 🔀 How many per-object metadata requests the public path keeps in flight.
    #[serde(default = "default_metadata_concurrency")]
    pub metadata_concurrency: usize,
}

// -- 🏖️ If you don't choose a region, the region chooses you. And it chose Florida.
fn default_region() -> String {
    "us-east-1".to_string()
}

// -- ⏱️ 30s to answer, 10s to pick up the phone
fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_metadata_concurrency() -> usize {
    8
}

impl StoreConfig {
    /// 🧪 A config pointing at `endpoint` with every default filled in. Handy in tests and
    /// for callers that build configs by hand instead of from TOML.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key: None,
            secret_key: None,
            secure: false,
            region: default_region(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            metadata_concurrency: default_metadata_concurrency(),
        }
    }

    pub fn with_credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// 🔓 The same endpoint, minus the keys. What the comparator and the public path use.
    pub fn without_credentials(&self) -> Self {
        Self {
            access_key: None,
            secret_key: None,
            ..self.clone()
        }
    }

    /// 🎭 Credentials in, access mode out.
    pub fn access_mode(&self) -> StoreResult<AccessMode> {
        if self.endpoint.trim().is_empty() {
            return Err(StoreError::InvalidAuthOptions("endpoint is empty".to_string()));
        }
        match (&self.access_key, &self.secret_key) {
            (Some(_), Some(_)) => Ok(AccessMode::Authenticated),
            (None, None) => Ok(AccessMode::PublicReadonly),
            (Some(_), None) => Err(StoreError::InvalidAuthOptions(
                "access_key given without secret_key".to_string(),
            )),
            (None, Some(_)) => Err(StoreError::InvalidAuthOptions(
                "secret_key given without access_key".to_string(),
            )),
        }
    }

    /// 🔗 `secure` picks the scheme; whatever scheme the endpoint came with is discarded.
    pub fn base_url(&self) -> StoreResult<Url> {
        let trimmed = self.endpoint.trim().trim_end_matches('/');
        let host = trimmed
            .split_once("://")
            .map_or(trimmed, |(_, rest)| rest);
        let scheme = if self.secure { "https" } else { "http" };
        Url::parse(&format!("{scheme}://{host}/"))
            .map_err(|e| StoreError::InvalidAuthOptions(format!("endpoint '{}': {e}", self.endpoint)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// 🚀 Load the config — from a file, from env vars, or from the sheer power of hoping.
///
/// 🔧 Merges environment variables (`BVX_*`, nested with `__`, e.g. `BVX_STORE__ENDPOINT`)
/// with an optional TOML file. TOML wins on conflicts.
///   - `None`  → env vars only. No file. No assumptions.
///   - `Some`  → env vars + TOML file, merged.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("BVX_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (BVX_*). \
             The file exists in our hearts, but apparently not on disk.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (BVX_*). \
                 No file was provided — this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_test_config(contents: &str) -> tempfile::NamedTempFile {
        // 🧪 We write a real file here because Figment wants TOML from disk, like it's method acting.
        let mut the_file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("💀 Failed to create a temp config. The filesystem said 'new phone who dis'.");
        the_file
            .write_all(contents.as_bytes())
            .expect("💀 Failed to write test config.");
        the_file
    }

    #[test]
    fn the_one_where_credentials_unlock_the_authenticated_door() {
        let the_file = write_test_config(
            r#"
            [store]
            endpoint = "localhost:9000"
            access_key = "minioadmin"
            secret_key = "minioadmin"
            request_timeout_secs = 5
            "#,
        );

        let the_config = load_config(Some(the_file.path()))
            .expect("💀 A perfectly good config was rejected. Serde left us on read.");

        assert_eq!(the_config.store.access_mode().expect("💀 mode"), AccessMode::Authenticated);
        assert_eq!(the_config.store.request_timeout(), Duration::from_secs(5));
        assert_eq!(the_config.store.connect_timeout(), Duration::from_secs(10));
        assert_eq!(the_config.store.region, "us-east-1");
        assert_eq!(the_config.store.metadata_concurrency, 8);
    }

    #[test]
    fn the_one_where_no_keys_means_window_shopping_only() {
        let the_file = write_test_config(
            r#"
            [store]
            endpoint = "https://bench.example.org:9000"
            "#,
        );

        let the_config = load_config(Some(the_file.path())).expect("💀 public config should parse");
        assert_eq!(the_config.store.access_mode().expect("💀 mode"), AccessMode::PublicReadonly);
        // -- 🔐 secure defaults to false, so the https in the endpoint gets overruled
        assert_eq!(
            the_config.store.base_url().expect("💀 url").as_str(),
            "http://bench.example.org:9000/"
        );
    }

    #[test]
    fn the_one_where_half_a_credential_is_no_credential() {
        let mut the_config = StoreConfig::new("localhost:9000");
        the_config.access_key = Some("lonely".to_string());
        assert!(matches!(the_config.access_mode(), Err(StoreError::InvalidAuthOptions(_))));

        let the_void = StoreConfig::new("  ");
        assert!(matches!(the_void.access_mode(), Err(StoreError::InvalidAuthOptions(_))));
    }

    #[test]
    fn the_one_where_secure_picks_the_scheme() {
        let mut the_config = StoreConfig::new("http://localhost:9000/");
        the_config.secure = true;
        assert_eq!(the_config.base_url().expect("💀 url").as_str(), "https://localhost:9000/");
        assert_eq!(
            the_config.with_credentials("a", "b").without_credentials().access_key,
            None
        );
    }
}
