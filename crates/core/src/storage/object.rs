//! S3-compatible object store backend (anonymous access).

use async_trait::async_trait;
use regex_lite::Regex;
use reqwest::{Client, StatusCode};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::error::StorageError;
use super::local::collect_files;
use super::traits::{StorageService, UploadSummary};

/// One page of a ListObjectsV2 response.
#[derive(Debug, Default, PartialEq, Eq)]
struct ListPage {
    keys: Vec<String>,
    next_token: Option<String>,
}

/// Object store backend speaking the S3 REST dialect.
///
/// Remote paths are `bucket/prefix`, optionally written as `s3://bucket/prefix`.
pub struct ObjectStorage {
    client: Client,
    endpoint: String,
    temp_root: PathBuf,
}

impl ObjectStorage {
    /// Create a new ObjectStorage against `endpoint`.
    pub fn new(endpoint: String, timeout_secs: u64) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(StorageError::ClientBuild)?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            temp_root: std::env::temp_dir(),
        })
    }

    /// Stages downloads under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = root.into();
        self
    }

    /// Build the ListObjectsV2 URL for one page.
    fn build_list_url(&self, bucket: &str, prefix: &str, token: Option<&str>) -> String {
        let mut url = format!(
            "{}/{}?list-type=2&prefix={}",
            self.endpoint,
            urlencoding::encode(bucket),
            urlencoding::encode(prefix)
        );
        if let Some(token) = token {
            url.push_str(&format!("&continuation-token={}", urlencoding::encode(token)));
        }
        url
    }

    /// Build the URL of a single object, encoding each key segment.
    fn build_object_url(&self, bucket: &str, key: &str) -> String {
        let encoded_key = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/{}/{}",
            self.endpoint,
            urlencoding::encode(bucket),
            encoded_key
        )
    }

    /// Lists every object key under `prefix`, following continuation tokens.
    async fn list_keys(
        &self,
        remote: &str,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let url = self.build_list_url(bucket, prefix, token.as_deref());
            debug!(url = %url, "Listing objects");

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| StorageError::unreachable(remote, e.to_string()))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(StorageError::NotFound {
                    remote: remote.to_string(),
                });
            }
            if !status.is_success() {
                return Err(StorageError::HttpStatus {
                    url,
                    status: status.as_u16(),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| StorageError::unreachable(remote, e.to_string()))?;
            let page = parse_list_response(&body)?;
            keys.extend(page.keys);

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        // Folder placeholders created by web consoles
        keys.retain(|key| !key.ends_with('/'));
        Ok(keys)
    }

    async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        target: &Path,
    ) -> Result<u64, StorageError> {
        let url = self.build_object_url(bucket, key);
        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StorageError::unreachable(key, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = File::create(target).await?;
        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| StorageError::unreachable(key, e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

/// Splits `s3://bucket/prefix` or `bucket/prefix` into bucket and a prefix
/// that is either empty or ends with `/`.
fn split_remote(remote: &str) -> Result<(String, String), StorageError> {
    let trimmed = remote
        .strip_prefix("s3://")
        .unwrap_or(remote)
        .trim_matches('/');
    let (bucket, prefix) = trimmed.split_once('/').unwrap_or((trimmed, ""));

    if bucket.is_empty() {
        return Err(StorageError::InvalidPath(format!(
            "missing bucket in {:?}",
            remote
        )));
    }

    let prefix = if prefix.is_empty() {
        String::new()
    } else {
        format!("{}/", prefix.trim_end_matches('/'))
    };
    Ok((bucket.to_string(), prefix))
}

/// Maps an object key below `prefix` to a safe relative path.
fn relative_key_path(key: &str, prefix: &str) -> Result<PathBuf, StorageError> {
    let relative = key.strip_prefix(prefix).unwrap_or(key);
    let path = PathBuf::from(relative);
    let safe = !relative.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if !safe {
        return Err(StorageError::InvalidPath(format!(
            "object key {:?} escapes its folder",
            key
        )));
    }
    Ok(path)
}

/// Parses a ListObjectsV2 XML body into keys and the continuation token.
fn parse_list_response(xml: &str) -> Result<ListPage, StorageError> {
    let key_re = Regex::new(r"<Key>([^<]*)</Key>")
        .map_err(|e| StorageError::InvalidListing(e.to_string()))?;
    let truncated_re = Regex::new(r"<IsTruncated>\s*true\s*</IsTruncated>")
        .map_err(|e| StorageError::InvalidListing(e.to_string()))?;
    let token_re = Regex::new(r"<NextContinuationToken>([^<]*)</NextContinuationToken>")
        .map_err(|e| StorageError::InvalidListing(e.to_string()))?;

    if !xml.contains("<ListBucketResult") {
        return Err(StorageError::InvalidListing(
            "missing ListBucketResult element".to_string(),
        ));
    }

    let keys = key_re
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| unescape_xml(m.as_str()))
        .collect();

    let next_token = if truncated_re.is_match(xml) {
        let token = token_re
            .captures(xml)
            .and_then(|caps| caps.get(1))
            .map(|m| unescape_xml(m.as_str()))
            .ok_or_else(|| {
                StorageError::InvalidListing(
                    "truncated listing without continuation token".to_string(),
                )
            })?;
        Some(token)
    } else {
        None
    };

    Ok(ListPage { keys, next_token })
}

/// Decodes the predefined XML entities and numeric character references
/// (`&#13;`, `&#x1F;`) in one pass. Unknown entities are kept as written.
fn unescape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail
            .find(';')
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let number = entity.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[async_trait]
impl StorageService for ObjectStorage {
    fn name(&self) -> &str {
        "object-store"
    }

    async fn download_folder(&self, remote: &str) -> Result<TempDir, StorageError> {
        let (bucket, prefix) = split_remote(remote)?;
        let keys = self.list_keys(remote, &bucket, &prefix).await?;
        if keys.is_empty() {
            return Err(StorageError::EmptyFolder {
                remote: remote.to_string(),
            });
        }

        let targets = keys
            .iter()
            .map(|key| relative_key_path(key, &prefix).map(|rel| (key.as_str(), rel)))
            .collect::<Result<Vec<_>, _>>()?;

        let staged = tempfile::Builder::new()
            .prefix("openmvgo-input")
            .tempdir_in(&self.temp_root)?;

        let mut bytes = 0u64;
        for (key, relative) in &targets {
            bytes += self
                .download_object(&bucket, key, &staged.path().join(relative))
                .await?;
        }

        info!(
            remote = remote,
            objects = targets.len(),
            bytes,
            local = %staged.path().display(),
            "Downloaded folder"
        );
        Ok(staged)
    }

    async fn upload_folder(
        &self,
        local: &Path,
        remote: &str,
    ) -> Result<UploadSummary, StorageError> {
        if !local.is_dir() {
            return Err(StorageError::LocalNotFound {
                path: local.to_path_buf(),
            });
        }

        let (bucket, prefix) = split_remote(remote)?;
        let files = collect_files(local)?;
        let mut bytes_uploaded = 0u64;

        for (relative, absolute) in &files {
            let relative_key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let url = self.build_object_url(&bucket, &format!("{}{}", prefix, relative_key));
            let body = fs::read(absolute).await?;
            let size = body.len() as u64;

            let response = self
                .client
                .put(&url)
                .body(body)
                .send()
                .await
                .map_err(|e| StorageError::unreachable(remote, e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(StorageError::HttpStatus {
                    url,
                    status: status.as_u16(),
                });
            }
            bytes_uploaded += size;
            debug!(url = %url, bytes = size, "Uploaded object");
        }

        info!(remote = remote, files = files.len(), bytes_uploaded, "Uploaded folder");
        Ok(UploadSummary {
            remote: remote.to_string(),
            files_uploaded: files.len(),
            bytes_uploaded,
        })
    }
}
