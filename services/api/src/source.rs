//! Source resolution for a (dataset, year) pair.
//!
//! A local copy under the datasets directory wins; otherwise the versioned
//! release asset is opened as a streaming read. Extracts can run to hundreds
//! of megabytes, so remote bytes are never buffered whole.

use std::io;
use std::path::PathBuf;

use futures::TryStreamExt;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::dataset::DatasetKind;
use crate::error::AnalyticsError;

/// Where the bytes ended up coming from, for operator logs.
#[derive(Debug)]
pub enum SourceOrigin {
    Local(PathBuf),
    Remote(String),
}

impl std::fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceOrigin::Local(path) => write!(f, "local file {}", path.display()),
            SourceOrigin::Remote(url) => write!(f, "remote stream {url}"),
        }
    }
}

/// An open byte source ready to be fed to the reducer.
pub struct DataSource {
    pub origin: SourceOrigin,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

pub struct SourceResolver {
    datasets_dir: PathBuf,
    release_base: String,
    http: reqwest::Client,
}

/// File name for a (dataset, year) pair: the full extract for "all",
/// otherwise the per-year split.
pub fn source_file_name(kind: DatasetKind, year: &str) -> String {
    if year == "all" {
        format!("{kind}_full.csv")
    } else {
        format!("{kind}_{year}.csv")
    }
}

impl SourceResolver {
    pub fn new(datasets_dir: PathBuf, repo: &str, release_tag: &str, http: reqwest::Client) -> Self {
        Self {
            datasets_dir,
            release_base: format!("https://github.com/{repo}/releases/download/{release_tag}"),
            http,
        }
    }

    /// Canonical remote location of a release asset.
    pub fn remote_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.release_base, file_name)
    }

    fn local_path(&self, kind: DatasetKind, year: &str) -> PathBuf {
        let file_name = source_file_name(kind, year);
        if year == "all" {
            self.datasets_dir.join(file_name)
        } else {
            self.datasets_dir.join("split_data").join(file_name)
        }
    }

    /// Open the byte stream for a (dataset, year) pair. Local file if
    /// present, else the release asset; a failed remote fetch is fatal for
    /// this resolution and is not retried here.
    pub async fn resolve(&self, kind: DatasetKind, year: &str) -> Result<DataSource, AnalyticsError> {
        let file_name = source_file_name(kind, year);
        let path = self.local_path(kind, year);

        if let Ok(file) = tokio::fs::File::open(&path).await {
            return Ok(DataSource {
                origin: SourceOrigin::Local(path),
                reader: Box::new(file),
            });
        }

        let url = self.remote_url(&file_name);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AnalyticsError::SourceUnavailable {
                file: file_name.clone(),
                detail: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| AnalyticsError::SourceUnavailable {
                file: file_name.clone(),
                detail: e.to_string(),
            })?;

        let stream = response.bytes_stream().map_err(io::Error::other);
        Ok(DataSource {
            origin: SourceOrigin::Remote(url),
            reader: Box::new(StreamReader::new(stream)),
        })
    }
}
