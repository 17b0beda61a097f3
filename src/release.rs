//! # Release artifacts: references, fetching, staging.
//!
//! A [`Release`] identifies the self-contained worker artifact the overseer
//! ships to every freshly connected worker, plus an optional entry point
//! invoked on the worker after the archive is in place.
//!
//! Sources are URL-shaped:
//! - `file:///path/to/release.tar.gz` (also accepted as a bare path)
//! - `https://host/path/release.tar.gz`
//! - `s3://bucket/key` (requires the `s3` feature)
//!
//! Fetching always happens on a background load task, never inline in the
//! controller: archives run from a couple of megabytes to a couple of
//! hundred. Remote sources are staged into a temp file that is deleted once
//! the push completes; local files are pushed in place.
//!
//! Integrity checking of the archive is the adapter's concern, not the
//! fetcher's.

use std::fmt;
use std::path::{Path, PathBuf};

use rand::distr::Alphanumeric;
use rand::Rng;
use tokio::io::AsyncWriteExt;

use crate::error::LoadError;

/// Worker-side entry point invoked after the release is loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryPoint {
    /// Module to invoke on the worker.
    pub module: String,
    /// Function within that module.
    pub function: String,
}

impl EntryPoint {
    /// Creates an entry point reference.
    pub fn new(module: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
        }
    }
}

/// Where a release artifact lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReleaseSource {
    /// Local filesystem path.
    File(PathBuf),
    /// HTTPS URL fetched with a streaming GET.
    Https(String),
    /// Object-store location.
    S3 { bucket: String, key: String },
}

impl ReleaseSource {
    /// Parses a release URL.
    ///
    /// Recognises `file://`, `https://`, and `s3://` schemes; anything
    /// without a scheme is treated as a local path.
    pub fn parse(url: &str) -> Result<Self, LoadError> {
        if let Some(path) = url.strip_prefix("file://") {
            if path.is_empty() {
                return Err(LoadError::InvalidUrl {
                    url: url.to_string(),
                    reason: "empty path".to_string(),
                });
            }
            return Ok(ReleaseSource::File(PathBuf::from(path)));
        }
        if url.starts_with("https://") {
            return Ok(ReleaseSource::Https(url.to_string()));
        }
        if let Some(rest) = url.strip_prefix("s3://") {
            return match rest.split_once('/') {
                Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                    Ok(ReleaseSource::S3 {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    })
                }
                _ => Err(LoadError::InvalidUrl {
                    url: url.to_string(),
                    reason: "expected s3://bucket/key".to_string(),
                }),
            };
        }
        match url.split_once("://") {
            Some((scheme, _)) => Err(LoadError::UnsupportedScheme {
                scheme: scheme.to_string(),
            }),
            None => Ok(ReleaseSource::File(PathBuf::from(url))),
        }
    }

    /// Returns a short stable label for the source kind.
    pub fn as_label(&self) -> &'static str {
        match self {
            ReleaseSource::File(_) => "file",
            ReleaseSource::Https(_) => "https",
            ReleaseSource::S3 { .. } => "s3",
        }
    }
}

impl fmt::Display for ReleaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseSource::File(p) => write!(f, "file://{}", p.display()),
            ReleaseSource::Https(u) => f.write_str(u),
            ReleaseSource::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
        }
    }
}

/// Reference to the release every worker of this overseer runs.
#[derive(Clone, Debug)]
pub struct Release {
    /// Where the artifact lives.
    pub source: ReleaseSource,
    /// Optional entry point invoked on the worker after load.
    pub entry_point: Option<EntryPoint>,
}

impl Release {
    /// Creates a release reference without an entry point.
    pub fn new(source: ReleaseSource) -> Self {
        Self {
            source,
            entry_point: None,
        }
    }

    /// Sets the `{module, function}` invoked on the worker after load.
    pub fn with_entry_point(mut self, module: impl Into<String>, function: impl Into<String>) -> Self {
        self.entry_point = Some(EntryPoint::new(module, function));
        self
    }
}

/// A locally available copy of the artifact, ready to push.
///
/// Remote fetches stage into a temp file that [`Staged::cleanup`] removes;
/// local sources are referenced in place and cleanup is a no-op.
pub(crate) struct Staged {
    path: PathBuf,
    temp: bool,
}

impl Staged {
    /// Path of the local copy.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the staging file if this copy was downloaded.
    pub(crate) async fn cleanup(self) {
        if self.temp {
            let _ = tokio::fs::remove_file(&self.path).await;
        }
    }
}

/// Fetches the artifact to local storage.
pub(crate) async fn fetch(source: &ReleaseSource) -> Result<Staged, LoadError> {
    match source {
        ReleaseSource::File(path) => {
            tokio::fs::metadata(path).await.map_err(|e| LoadError::Fetch {
                reason: format!("{}: {e}", path.display()),
            })?;
            Ok(Staged {
                path: path.clone(),
                temp: false,
            })
        }
        ReleaseSource::Https(url) => {
            let path = staging_path();
            fetch_https(url, &path).await?;
            Ok(Staged { path, temp: true })
        }
        ReleaseSource::S3 { bucket, key } => {
            let path = staging_path();
            fetch_s3(bucket, key, &path).await?;
            Ok(Staged { path, temp: true })
        }
    }
}

/// Picks a unique staging path under the system temp directory.
fn staging_path() -> PathBuf {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    std::env::temp_dir().join(format!("overseer-release-{suffix}"))
}

/// Streams an HTTPS GET into `dest`.
async fn fetch_https(url: &str, dest: &Path) -> Result<(), LoadError> {
    let response = reqwest::get(url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| LoadError::Fetch {
            reason: format!("{url}: {e}"),
        })?;

    let mut response = response;
    let mut file = tokio::fs::File::create(dest).await?;
    while let Some(chunk) = response.chunk().await.map_err(|e| LoadError::Fetch {
        reason: format!("{url}: {e}"),
    })? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

/// Streams an object-store GET into `dest`.
#[cfg(feature = "s3")]
async fn fetch_s3(bucket: &str, key: &str, dest: &Path) -> Result<(), LoadError> {
    let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let client = aws_sdk_s3::Client::new(&shared);

    let object = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| LoadError::Fetch {
            reason: format!("s3://{bucket}/{key}: {e}"),
        })?;

    let mut body = object.body;
    let mut file = tokio::fs::File::create(dest).await?;
    while let Some(chunk) = body.try_next().await.map_err(|e| LoadError::Fetch {
        reason: format!("s3://{bucket}/{key}: {e}"),
    })? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

#[cfg(not(feature = "s3"))]
async fn fetch_s3(bucket: &str, key: &str, _dest: &Path) -> Result<(), LoadError> {
    let _ = (bucket, key);
    Err(LoadError::UnsupportedScheme {
        scheme: "s3".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_urls_and_bare_paths() {
        assert_eq!(
            ReleaseSource::parse("file:///opt/rel.tar.gz").unwrap(),
            ReleaseSource::File(PathBuf::from("/opt/rel.tar.gz"))
        );
        assert_eq!(
            ReleaseSource::parse("/opt/rel.tar.gz").unwrap(),
            ReleaseSource::File(PathBuf::from("/opt/rel.tar.gz"))
        );
    }

    #[test]
    fn parses_https_and_s3() {
        assert!(matches!(
            ReleaseSource::parse("https://releases.example.com/w.tar.gz").unwrap(),
            ReleaseSource::Https(_)
        ));
        assert_eq!(
            ReleaseSource::parse("s3://fleet-releases/v12/w.tar.gz").unwrap(),
            ReleaseSource::S3 {
                bucket: "fleet-releases".to_string(),
                key: "v12/w.tar.gz".to_string(),
            }
        );
    }

    #[test]
    fn rejects_malformed_and_unknown_schemes() {
        assert!(matches!(
            ReleaseSource::parse("s3://bucket-only"),
            Err(LoadError::InvalidUrl { .. })
        ));
        assert!(matches!(
            ReleaseSource::parse("ftp://host/rel.tar.gz"),
            Err(LoadError::UnsupportedScheme { .. })
        ));
    }
}
