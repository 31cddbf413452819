// ai
//! 🪣🔑 Authenticated S3 store — the native protocol, with keys, via `aws-sdk-s3`.
//!
//! 🧠 Knowledge graph:
//! - Built from `StoreConfig`: static credentials, explicit region, the endpoint as a custom
//!   `endpoint_url`, path-style addressing (MinIO and friends don't do virtual hosts), and the
//!   configured connect/attempt timeouts.
//! - Listing: `ListObjectsV2` through the SDK paginator. Non-recursive listings send `/` as the
//!   delimiter, so "directories" stay out of the result.
//! - Bulk delete: `DeleteObjects` in chunks of 1000 (the S3 ceiling), quiet mode, per-key
//!   errors collected and handed back instead of raised.
//! - SDK errors become `StoreError::Connection` carrying `DisplayErrorContext`, which is the
//!   only rendering that includes the underlying cause. The two "bucket exists" service errors
//!   become `AlreadyExists`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, trace};
use url::Url;

use crate::app_config::StoreConfig;
use crate::backends::{AccessMode, ObjectStore};
use crate::error::{DeleteFailure, StoreError, StoreResult};
use crate::policy::PolicyDocument;
use crate::record::FileRecord;

// -- 🪣 DeleteObjects takes at most this many keys per request
const DELETE_BATCH: usize = 1000;
const DEFAULT_REGION: &str = "us-east-1";

/// 🔑 The store as seen by someone holding keys.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
    region: String,
}

impl S3Store {
    /// 🚀 Builds the SDK client. Nothing is sent until the first operation.
    ///
    /// 💀 `InvalidAuthOptions` if either key is missing. The public path is for keyless callers.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) else {
            return Err(StoreError::InvalidAuthOptions(
                "the authenticated store needs both access_key and secret_key".to_string(),
            ));
        };
        let endpoint = config.base_url()?;

        let timeouts = TimeoutConfig::builder()
            .connect_timeout(config.connect_timeout())
            .operation_attempt_timeout(config.request_timeout())
            .build();
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(
                access_key.as_str(),
                secret_key.as_str(),
                None,
                None,
                "bvx-config",
            ))
            .endpoint_url(endpoint.as_str().trim_end_matches('/'))
            .timeout_config(timeouts)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        debug!("🔑 S3 client ready for {} (region {})", endpoint, config.region);
        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            region: config.region.clone(),
        })
    }
}

fn sdk_error<E, R>(operation: &'static str, error: SdkError<E, R>) -> StoreError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    StoreError::connection(operation, DisplayErrorContext(&error).to_string())
}

fn to_chrono(time: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}

/// 🔗 `container/key` for `x-amz-copy-source`, each segment percent-encoded, slashes kept.
fn copy_source(container: &str, key: &str) -> StoreResult<String> {
    let mut url = Url::parse("s3://copy/")
        .map_err(|e| StoreError::InvalidName(format!("{container}/{key}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| StoreError::InvalidName(format!("{container}/{key}")))?
        .pop_if_empty()
        .push(container)
        .extend(key.split('/'));
    Ok(url.path().trim_start_matches('/').to_string())
}

#[async_trait]
impl ObjectStore for S3Store {
    fn access_mode(&self) -> AccessMode {
        AccessMode::Authenticated
    }

    async fn list_containers(&self) -> StoreResult<BTreeSet<String>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| sdk_error("list_buckets", e))?;
        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name())
            .map(str::to_string)
            .collect())
    }

    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        match self.client.head_bucket().bucket(container).send().await {
            Ok(_) => Ok(true),
            Err(error) => {
                let not_found = error.as_service_error().is_some_and(|e| e.is_not_found())
                    || error.raw_response().is_some_and(|r| r.status().as_u16() == 404);
                if not_found {
                    Ok(false)
                } else {
                    Err(sdk_error("head_bucket", error))
                }
            }
        }
    }

    async fn create_container(&self, container: &str) -> StoreResult<()> {
        let mut request = self.client.create_bucket().bucket(container);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        match request.send().await {
            Ok(_) => {
                trace!("🏗️ bucket {} created", container);
                Ok(())
            }
            Err(error) => {
                let taken = error
                    .as_service_error()
                    .is_some_and(|e| e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists());
                if taken {
                    Err(StoreError::AlreadyExists(container.to_string()))
                } else {
                    Err(sdk_error("create_bucket", error))
                }
            }
        }
    }

    async fn apply_policy(&self, container: &str, policy: &PolicyDocument) -> StoreResult<()> {
        self.client
            .put_bucket_policy()
            .bucket(container)
            .policy(policy.to_json())
            .send()
            .await
            .map_err(|e| sdk_error("put_bucket_policy", e))?;
        Ok(())
    }

    async fn list_objects(&self, container: &str, recursive: bool) -> StoreResult<Vec<FileRecord>> {
        let mut request = self.client.list_objects_v2().bucket(container);
        if !recursive {
            request = request.delimiter("/");
        }
        let mut pages = request.into_paginator().send();
        let mut records = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("list_objects_v2", e))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let last_modified = object
                    .last_modified()
                    .and_then(to_chrono)
                    .ok_or_else(|| StoreError::InvalidTimestamp(format!("{container}/{key}")))?;
                records.push(FileRecord::new(
                    key,
                    object.e_tag().unwrap_or_default(),
                    object.size().unwrap_or(0).max(0) as u64,
                    last_modified,
                ));
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn put_object(&self, container: &str, name: &str, body: Bytes) -> StoreResult<()> {
        self.client
            .put_object()
            .bucket(container)
            .key(name)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| sdk_error("put_object", e))?;
        Ok(())
    }

    async fn copy_object(
        &self,
        container: &str,
        name: &str,
        source_container: &str,
        source_name: &str,
    ) -> StoreResult<()> {
        self.client
            .copy_object()
            .bucket(container)
            .key(name)
            .copy_source(copy_source(source_container, source_name)?)
            .send()
            .await
            .map_err(|e| sdk_error("copy_object", e))?;
        Ok(())
    }

    async fn remove_objects(&self, container: &str, names: &[String]) -> StoreResult<Vec<DeleteFailure>> {
        let mut failures = Vec::new();
        for chunk in names.chunks(DELETE_BATCH) {
            let identifiers = chunk
                .iter()
                .map(|name| ObjectIdentifier::builder().key(name).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::connection("delete_objects", e.to_string()))?;
            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .quiet(true)
                .build()
                .map_err(|e| StoreError::connection("delete_objects", e.to_string()))?;
            let output = self
                .client
                .delete_objects()
                .bucket(container)
                .delete(delete)
                .send()
                .await
                .map_err(|e| sdk_error("delete_objects", e))?;
            failures.extend(output.errors().iter().map(|e| DeleteFailure {
                name: e.key().unwrap_or_default().to_string(),
                message: e.message().or(e.code()).unwrap_or("unknown").to_string(),
            }));
        }
        Ok(failures)
    }

    async fn get_object(&self, container: &str, name: &str) -> StoreResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(container)
            .key(name)
            .send()
            .await
            .map_err(|e| sdk_error("get_object", e))?;
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::connection("get_object", e.to_string()))?;
        Ok(body.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store_for(server: &MockServer) -> S3Store {
        let the_config = StoreConfig::new(server.uri()).with_credentials("minioadmin", "minioadmin");
        S3Store::connect(&the_config).await.expect("💀 the SDK client refused to be built")
    }

    #[tokio::test]
    async fn the_one_where_keys_are_not_optional() {
        let the_keyless = StoreConfig::new("localhost:9000");
        assert!(matches!(
            S3Store::connect(&the_keyless).await,
            Err(StoreError::InvalidAuthOptions(_))
        ));
    }

    // -- 🪣 path-style bucket requests go out as `/{bucket}/`, so the matchers take either spelling
    #[tokio::test]
    async fn the_one_where_head_bucket_separates_the_living_from_the_dead() {
        let the_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path_regex(r"^/bm\.0\.1/?$"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&the_server)
            .await;
        Mock::given(method("HEAD"))
            .and(path_regex(r"^/bm\.9\.9/?$"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&the_server)
            .await;

        let the_store = store_for(&the_server).await;
        assert!(the_store.container_exists("bm.0.1").await.expect("💀 HEAD on a live bucket"));
        assert!(!the_store.container_exists("bm.9.9").await.expect("💀 HEAD on a dead bucket"));
    }

    #[tokio::test]
    async fn the_one_where_a_taken_bucket_name_means_already_exists() {
        let the_server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/bm\.0\.2/?$"))
            .respond_with(ResponseTemplate::new(409).set_body_string(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>BucketAlreadyOwnedByYou</Code><Message>Your previous request to create the named bucket succeeded and you already own it.</Message><BucketName>bm.0.2</BucketName><RequestId>1</RequestId></Error>"#,
            ))
            .mount(&the_server)
            .await;

        let the_result = store_for(&the_server).await.create_container("bm.0.2").await;
        assert!(the_result.is_err_and(|e| e.is_already_exists()));
    }

    #[test]
    fn the_one_where_copy_sources_keep_their_slashes() {
        assert_eq!(copy_source("bm.0.1", "file1.txt").expect("💀"), "bm.0.1/file1.txt");
        assert_eq!(
            copy_source("bm.0.1", "dir/a b.txt").expect("💀"),
            "bm.0.1/dir/a%20b.txt"
        );
    }
}
