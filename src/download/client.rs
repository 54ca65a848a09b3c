//! Streaming file sink backed by reqwest.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::cookie::Jar;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::{MediaSink, SinkError, SinkOutcome};
use crate::extract::MediaReference;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default read timeout (5 minutes for large videos).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Suffix of in-flight downloads; renamed away once the body is complete.
const PARTIAL_SUFFIX: &str = ".part";

/// Writes each media item to `<output_dir>/<file name from URL>`.
///
/// Items whose file already exists are reported as
/// [`SinkOutcome::AlreadyPresent`] without a request.
#[derive(Debug, Clone)]
pub struct HttpFileSink {
    client: Client,
    output_dir: PathBuf,
}

impl HttpFileSink {
    /// Creates a sink writing into `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Client`] if the HTTP client cannot be constructed.
    pub fn new(output_dir: impl Into<PathBuf>, cookie_jar: Option<Arc<Jar>>) -> Result<Self, SinkError> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .gzip(true);
        if let Some(jar) = cookie_jar {
            builder = builder.cookie_provider(jar);
        }
        let client = builder.build().map_err(SinkError::Client)?;
        Ok(Self {
            client,
            output_dir: output_dir.into(),
        })
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn stream_to_file(
        &self,
        url: &str,
        response: reqwest::Response,
        path: &Path,
    ) -> Result<u64, SinkError> {
        let file = File::create(path)
            .await
            .map_err(|e| SinkError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| SinkError::from_reqwest(url, e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| SinkError::io(path, e))?;
            bytes_written += chunk.len() as u64;
        }

        writer.flush().await.map_err(|e| SinkError::io(path, e))?;
        Ok(bytes_written)
    }
}

#[async_trait]
impl MediaSink for HttpFileSink {
    #[instrument(skip(self, item), fields(url = %item.url, kind = %item.kind))]
    async fn persist(&self, item: &MediaReference) -> Result<SinkOutcome, SinkError> {
        let parsed = Url::parse(&item.url).map_err(|_| SinkError::InvalidUrl {
            url: item.url.clone(),
        })?;
        let file_name = file_name_from_url(&parsed).ok_or_else(|| SinkError::InvalidUrl {
            url: item.url.clone(),
        })?;
        let final_path = self.output_dir.join(&file_name);

        if tokio::fs::try_exists(&final_path).await.unwrap_or(false) {
            debug!(path = %final_path.display(), "already downloaded");
            return Ok(SinkOutcome::AlreadyPresent(final_path));
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| SinkError::io(&self.output_dir, e))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| SinkError::from_reqwest(&item.url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::HttpStatus {
                url: item.url.clone(),
                status: status.as_u16(),
            });
        }

        let partial_path = self.output_dir.join(format!("{file_name}{PARTIAL_SUFFIX}"));
        match self.stream_to_file(&item.url, response, &partial_path).await {
            Ok(bytes) => {
                tokio::fs::rename(&partial_path, &final_path)
                    .await
                    .map_err(|e| SinkError::io(&final_path, e))?;
                info!(path = %final_path.display(), bytes, "download complete");
                Ok(SinkOutcome::Stored(final_path))
            }
            Err(e) => {
                debug!(path = %partial_path.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&partial_path).await;
                Err(e)
            }
        }
    }
}

/// Last non-empty path segment, stripped of characters unsafe in file names.
#[must_use]
pub fn file_name_from_url(url: &Url) -> Option<String> {
    let segment = url
        .path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())?;
    let decoded = urlencoding::decode(segment).map_or_else(|_| segment.to_string(), |s| s.into_owned());
    let sanitized: String = decoded
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let sanitized = sanitized.trim_matches('.').to_string();
    (!sanitized.is_empty()).then_some(sanitized)
}
