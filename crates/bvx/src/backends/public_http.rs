// ai
//! 📡 Public HTTP store — the read-only way in, for everyone without keys.
//!
//! 🎬 COLD OPEN — a benchmark consumer, no credentials, one endpoint, and a dream.
//! "Can I see the versions?" they asked. The bucket policy said yes. The SDK said
//! "not without a signature." So we went around it: plain GETs, and an XML listing.
//!
//! 🧠 Knowledge graph:
//! - Listing: `GET {base}/{container}?format=xml` → `ListBucketResult`. Paginated through
//!   `IsTruncated` + `NextMarker` (or the last key when the server leaves `NextMarker` out).
//! - Metadata: one extra `GET {base}/{container}/{key}` per object; only the headers matter.
//!   `X-Object-Meta-Mtime` (epoch seconds), `X-Object-Meta-Last-Modified` and `Last-Modified`
//!   land on the record as mtime fallbacks, and `Date` becomes the access time. The listing's
//!   own `LastModified` stays in `last_modified`, milliseconds and all.
//! - The per-object requests are independent, so they run `metadata_concurrency` at a time.
//!   The output is sorted by name afterwards, whatever order the responses arrived in.
//! - Every mutation is refused with `ReadOnly`. Nothing is sent.

use std::collections::BTreeSet;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream};
use reqwest::header::{DATE, HeaderMap, LAST_MODIFIED};
use serde::Deserialize;
use tracing::{debug, trace, warn};
use url::Url;

use crate::app_config::StoreConfig;
use crate::backends::{AccessMode, ObjectStore};
use crate::error::{DeleteFailure, StoreError, StoreResult};
use crate::policy::PolicyDocument;
use crate::record::{FileRecord, parse_epoch_seconds, parse_header_time, parse_listing_time};

const META_MTIME: &str = "x-object-meta-mtime";
const META_LAST_MODIFIED: &str = "x-object-meta-last-modified";

// ============================================================
//  🧾 XML shapes. Only the fields we read; the rest is ignored.
// ============================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_marker: Option<String>,
    #[serde(default)]
    contents: Vec<ListedObject>,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "ETag", default)]
    etag: String,
    #[serde(rename = "Size", default)]
    size: u64,
    #[serde(rename = "LastModified")]
    last_modified: String,
    #[serde(rename = "symlink_path", default)]
    symlink_path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListAllMyBucketsResult {
    #[serde(default)]
    buckets: BucketList,
}

#[derive(Debug, Default, Deserialize)]
struct BucketList {
    #[serde(rename = "Bucket", default)]
    bucket: Vec<BucketEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BucketEntry {
    name: String,
}

/// 📡 Anonymous, read-only access over plain HTTP.
#[derive(Debug, Clone)]
pub struct PublicHttpStore {
    client: reqwest::Client,
    base_url: Url,
    metadata_concurrency: usize,
}

impl PublicHttpStore {
    /// 🚀 Builds the HTTP client with the configured timeouts. No request is sent yet.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url()?,
            metadata_concurrency: config.metadata_concurrency.max(1),
        })
    }

    /// 🔗 `{base}/{container}/{key...}`, each piece percent-encoded on its own.
    fn url_for(&self, container: &str, key: Option<&str>) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                StoreError::InvalidAuthOptions(format!("endpoint '{}' cannot carry a path", self.base_url))
            })?;
            segments.pop_if_empty().push(container);
            if let Some(key) = key {
                segments.extend(key.split('/'));
            }
        }
        Ok(url)
    }

    async fn get_checked(&self, url: Url) -> StoreResult<reqwest::Response> {
        debug!("📡 GET {}", url);
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// 📋 Walks every page of the XML listing. No per-object requests.
    async fn list_raw(&self, container: &str, recursive: bool) -> StoreResult<Vec<ListedObject>> {
        let mut listed = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut url = self.url_for(container, None)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("format", "xml");
                if !recursive {
                    query.append_pair("delimiter", "/");
                }
                if let Some(marker) = &marker {
                    query.append_pair("marker", marker);
                }
            }
            let body = self.get_checked(url).await?.text().await?;
            let page: ListBucketResult =
                quick_xml::de::from_str(&body).map_err(|e| StoreError::MalformedListing {
                    container: container.to_string(),
                    message: e.to_string(),
                })?;

            let fallback_marker = page.contents.last().map(|o| o.key.clone());
            trace!("🧾 {} listed {} object(s) on this page", container, page.contents.len());
            listed.extend(page.contents);

            if !page.is_truncated {
                break;
            }
            marker = match page.next_marker.or(fallback_marker) {
                Some(next) => Some(next),
                None => {
                    return Err(StoreError::MalformedListing {
                        container: container.to_string(),
                        message: "truncated listing without a marker to continue from".to_string(),
                    });
                }
            };
        }
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listed)
    }

    /// 🕵️ One GET per object, for headers only. The body is never read.
    async fn enrich(&self, container: &str, mut record: FileRecord) -> StoreResult<FileRecord> {
        let response = self.get_checked(self.url_for(container, Some(&record.name))?).await?;
        let headers = response.headers();

        record.meta_mtime = header_time(headers, META_MTIME, parse_epoch_seconds);
        record.meta_last_modified = header_time(headers, META_LAST_MODIFIED, parse_header_time);
        record.header_last_modified = header_time(headers, LAST_MODIFIED.as_str(), parse_header_time);
        record.access_time = header_time(headers, DATE.as_str(), parse_header_time);
        Ok(record)
    }
}

// -- ⏰ a header that doesn't parse is logged and treated as absent
fn header_time(
    headers: &HeaderMap,
    name: &str,
    parse: fn(&str) -> StoreResult<chrono::DateTime<chrono::Utc>>,
) -> Option<chrono::DateTime<chrono::Utc>> {
    let raw = headers.get(name)?.to_str().ok()?;
    match parse(raw) {
        Ok(time) => Some(time),
        Err(e) => {
            warn!("⏰ ignoring header {}: {}", name, e);
            None
        }
    }
}

fn to_record(object: ListedObject) -> StoreResult<FileRecord> {
    let mut record = FileRecord::new(
        object.key,
        &object.etag,
        object.size,
        parse_listing_time(&object.last_modified)?,
    );
    record.symlink_target = object.symlink_path.filter(|p| !p.is_empty());
    Ok(record)
}

#[async_trait]
impl ObjectStore for PublicHttpStore {
    fn access_mode(&self) -> AccessMode {
        AccessMode::PublicReadonly
    }

    /// 🪣 Asks the service root for its bucket list. Most servers say 403 to strangers.
    async fn list_containers(&self) -> StoreResult<BTreeSet<String>> {
        let body = self.get_checked(self.base_url.clone()).await?.text().await?;
        let listing: ListAllMyBucketsResult =
            quick_xml::de::from_str(&body).map_err(|e| StoreError::MalformedListing {
                container: self.base_url.to_string(),
                message: e.to_string(),
            })?;
        Ok(listing.buckets.bucket.into_iter().map(|b| b.name).collect())
    }

    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        let url = self.url_for(container, None)?;
        debug!("📡 HEAD {}", url);
        let response = self.client.head(url.clone()).send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => Err(StoreError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }

    async fn create_container(&self, _container: &str) -> StoreResult<()> {
        Err(StoreError::ReadOnly("create_container"))
    }

    async fn apply_policy(&self, _container: &str, _policy: &PolicyDocument) -> StoreResult<()> {
        Err(StoreError::ReadOnly("apply_policy"))
    }

    async fn list_objects(&self, container: &str, recursive: bool) -> StoreResult<Vec<FileRecord>> {
        let records = self
            .list_raw(container, recursive)
            .await?
            .into_iter()
            .map(to_record)
            .collect::<StoreResult<Vec<_>>>()?;

        let mut records: Vec<FileRecord> = stream::iter(records)
            .map(|record| self.enrich(container, record))
            .buffer_unordered(self.metadata_concurrency)
            .try_collect()
            .await?;
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn list_object_names(&self, container: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .list_raw(container, false)
            .await?
            .into_iter()
            .map(|o| o.key)
            .collect())
    }

    async fn put_object(&self, _container: &str, _name: &str, _body: Bytes) -> StoreResult<()> {
        Err(StoreError::ReadOnly("put_object"))
    }

    async fn copy_object(&self, _: &str, _: &str, _: &str, _: &str) -> StoreResult<()> {
        Err(StoreError::ReadOnly("copy_object"))
    }

    async fn remove_objects(&self, _container: &str, _names: &[String]) -> StoreResult<Vec<DeleteFailure>> {
        Err(StoreError::ReadOnly("remove_objects"))
    }

    async fn get_object(&self, container: &str, name: &str) -> StoreResult<Bytes> {
        let url = self.url_for(container, Some(name))?;
        Ok(self.get_checked(url).await?.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn listing(truncated: bool, next_marker: Option<&str>, keys: &[(&str, &str, u64)]) -> String {
        let contents: String = keys
            .iter()
            .map(|(key, etag, size)| {
                format!(
                    "<Contents><Key>{key}</Key><LastModified>2024-06-12T10:00:00.000Z</LastModified>\
                     <ETag>&quot;{etag}&quot;</ETag><Size>{size}</Size></Contents>"
                )
            })
            .collect();
        let marker = next_marker
            .map(|m| format!("<NextMarker>{m}</NextMarker>"))
            .unwrap_or_default();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>bm.0.1</Name><IsTruncated>{truncated}</IsTruncated>{marker}{contents}</ListBucketResult>"#
        )
    }

    fn store_for(server: &MockServer) -> PublicHttpStore {
        PublicHttpStore::new(&StoreConfig::new(server.uri())).expect("💀 the HTTP client refused to be born")
    }

    #[tokio::test]
    async fn the_one_where_headers_fill_in_what_the_listing_left_out() {
        let the_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bm.0.1"))
            .and(query_param("format", "xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(
                false,
                None,
                &[("b.txt", "bbb", 6), ("a.txt", "aaa", 4)],
            )))
            .mount(&the_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bm.0.1/a.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Object-Meta-Mtime", "100.5")
                    .insert_header("Last-Modified", "Thu, 13 Jun 2024 08:00:00 GMT")
                    .insert_header("Date", "Fri, 14 Jun 2024 09:00:00 GMT"),
            )
            .mount(&the_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bm.0.1/b.txt"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("X-Object-Meta-Last-Modified", "2024-01-01T00:00:00Z"),
            )
            .mount(&the_server)
            .await;

        let the_records = store_for(&the_server)
            .list_objects("bm.0.1", false)
            .await
            .expect("💀 listing against a perfectly friendly mock failed");

        assert_eq!(the_records.len(), 2);
        let (the_a, the_b) = (&the_records[0], &the_records[1]);
        assert_eq!(the_a.name, "a.txt");
        assert_eq!(the_a.hash, "aaa");
        assert_eq!(the_a.size, 4);
        assert_eq!(the_a.meta_mtime.map(|t| t.timestamp_millis()), Some(100_500));
        assert_eq!(
            the_a.header_last_modified.map(|t| t.to_rfc3339()),
            Some("2024-06-13T08:00:00+00:00".to_string())
        );
        // -- the listing keeps its say over last_modified, which is what diffs print
        assert_eq!(the_a.last_modified.to_rfc3339(), "2024-06-12T10:00:00+00:00");
        assert_eq!(the_a.diff_line(), "a.txt:2024-06-12T10:00:00.000Z:aaa");
        assert!(the_a.access_time.is_some());

        assert_eq!(the_b.meta_mtime, None);
        assert_eq!(
            the_b.meta_last_modified.map(|t| t.to_rfc3339()),
            Some("2024-01-01T00:00:00+00:00".to_string())
        );
        assert_eq!(the_b.header_last_modified, None);
        assert_eq!(the_b.last_modified.to_rfc3339(), "2024-06-12T10:00:00+00:00");
    }

    #[tokio::test]
    async fn the_one_where_truncated_listings_keep_turning_pages() {
        let the_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bm.overview"))
            .and(query_param_is_missing("marker"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(
                true,
                Some("0.1"),
                &[("0.1", "d41d", 0)],
            )))
            .mount(&the_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bm.overview"))
            .and(query_param("marker", "0.1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(
                false,
                None,
                &[("0.2", "d41d", 0), ("test.1", "d41d", 0)],
            )))
            .mount(&the_server)
            .await;

        let the_markers = store_for(&the_server)
            .visible_version_names("bm")
            .await
            .expect("💀 paginated marker listing failed");

        assert_eq!(the_markers, vec!["0.1", "0.2", "test.1"]);
    }

    #[tokio::test]
    async fn the_one_where_a_missing_container_is_a_404_not_a_shrug() {
        let the_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bm.9.9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&the_server)
            .await;

        let the_result = store_for(&the_server).list_objects("bm.9.9", true).await;

        assert_eq!(the_result.err().and_then(|e| e.status_code()), Some(404));
    }

    #[tokio::test]
    async fn the_one_where_garbage_xml_is_called_out_by_name() {
        let the_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bm.0.1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<ListBucketResult><Contents><Key>x"))
            .mount(&the_server)
            .await;

        let the_result = store_for(&the_server).list_object_names("bm.0.1").await;

        assert!(matches!(the_result, Err(StoreError::MalformedListing { container, .. }) if container == "bm.0.1"));
    }

    #[tokio::test]
    async fn the_one_where_strangers_cannot_write_and_nothing_is_sent() {
        let the_server = MockServer::start().await;
        let the_store = store_for(&the_server);

        assert!(matches!(the_store.create_container("bm.0.2").await, Err(StoreError::ReadOnly(_))));
        assert!(matches!(
            the_store.put_object("bm.overview", "0.2", Bytes::new()).await,
            Err(StoreError::ReadOnly(_))
        ));
        assert!(matches!(
            the_store.remove_objects("bm.overview", &["0.1".to_string()]).await,
            Err(StoreError::ReadOnly(_))
        ));
        let the_requests = the_server.received_requests().await.unwrap_or_default();
        assert!(the_requests.is_empty());
    }

    #[tokio::test]
    async fn the_one_where_existence_is_a_head_request() {
        let the_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/bm.overview"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&the_server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/ghost.overview"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&the_server)
            .await;

        let the_store = store_for(&the_server);
        assert!(the_store.container_exists("bm.overview").await.expect("💀 HEAD"));
        assert!(!the_store.container_exists("ghost.overview").await.expect("💀 HEAD"));
    }

    #[test]
    fn the_one_where_keys_with_slashes_become_path_segments() {
        let the_store = PublicHttpStore::new(&StoreConfig::new("localhost:9000")).expect("💀 client");
        let the_url = the_store
            .url_for("bm.0.1", Some("dir/file 1.txt"))
            .expect("💀 url");
        assert_eq!(the_url.as_str(), "http://localhost:9000/bm.0.1/dir/file%201.txt");
    }
}
