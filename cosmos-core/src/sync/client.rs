//! HTTP client that pushes the output directory to the remote store and pulls
//! saved revisions back.

use super::{archive, notebook};
use crate::config::CosmosConfig;
use crate::error::CosmosError;
use crate::persistence::atomic_write;
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

/// File name the archive is uploaded under.
pub const SAVE_ARCHIVE_NAME: &str = "cosmos_save.tar";
/// Written into the output directory when a description is configured.
pub const DESCRIPTION_FILE: &str = "description.txt";

/// Status and body of a transfer. Non-2xx responses are outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub status: u16,
    pub body: String,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    async fn read(response: reqwest::Response) -> Result<Self, CosmosError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(Self { status, body })
    }
}

/// Result of a load. `extracted` is only set for a 200 response whose archive
/// was unpacked into the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub transfer: TransferOutcome,
    pub extracted: bool,
}

/// Client for the `save` and `load` endpoints.
///
/// Each call issues exactly one request, without retries.
#[derive(Debug, Clone)]
pub struct SyncClient {
    http: reqwest::Client,
    staging_dir: PathBuf,
}

impl Default for SyncClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncClient {
    pub fn new() -> Self {
        Self::with_http(reqwest::Client::new())
    }

    pub fn with_http(http: reqwest::Client) -> Self {
        Self {
            http,
            staging_dir: std::env::temp_dir(),
        }
    }

    /// Build a client honouring `sync.timeout_secs`.
    pub fn from_config(config: &CosmosConfig) -> Result<Self, CosmosError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.sync.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self::with_http(builder.build()?))
    }

    /// Directory where temporary archives are staged.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    fn staging_file(&self, prefix: &str) -> Result<NamedTempFile, CosmosError> {
        std::fs::create_dir_all(&self.staging_dir)?;
        Ok(tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".tar")
            .tempfile_in(&self.staging_dir)?)
    }

    /// Archive `output_dir` and POST it to `{endpoint}/save/{dataset}/{codename}`.
    ///
    /// Writes `description.txt` and the notebook snapshot first when configured.
    pub async fn save(&self, config: &CosmosConfig) -> Result<TransferOutcome, CosmosError> {
        let target = config.sync_target()?;

        if let Some(description) = &config.sync.description {
            atomic_write(
                &target.output_dir.join(DESCRIPTION_FILE),
                description.as_bytes(),
            )?;
        }
        if let Some(dir) = &config.sync.notebook_dir {
            notebook::snapshot_latest(dir, &config.sync.notebook_extension, target.output_dir)?;
        }

        let staged = self.staging_file("cosmos_save-")?;
        archive::create(target.output_dir, staged.path()).await?;
        let bytes = tokio::fs::read(staged.path()).await?;
        let size = bytes.len();

        let part = Part::bytes(bytes)
            .file_name(SAVE_ARCHIVE_NAME)
            .mime_str("application/x-tar")?;
        let form = Form::new()
            .part("tar", part)
            .text("token", target.token.to_string());

        let url = target.url("save");
        let response = self.http.post(&url).multipart(form).send().await?;
        let outcome = TransferOutcome::read(response).await?;

        if outcome.is_success() {
            tracing::info!(url = %url, status = outcome.status, bytes = size, "Saved results");
        } else {
            tracing::warn!(
                url = %url,
                status = outcome.status,
                body = %outcome.body,
                "Remote store rejected save"
            );
        }
        Ok(outcome)
    }

    /// GET `{endpoint}/load/{dataset}/{codename}` and unpack it into `output_dir`.
    ///
    /// `rev` falls back to `sync.rev`; neither means latest. Any status other
    /// than 200 leaves `output_dir` untouched.
    pub async fn load(
        &self,
        config: &CosmosConfig,
        rev: Option<&str>,
    ) -> Result<LoadOutcome, CosmosError> {
        let target = config.sync_target()?;
        let rev = rev.or(config.sync.rev.as_deref());

        let mut query = vec![("token", target.token)];
        if let Some(rev) = rev {
            query.push(("rev", rev));
        }

        let url = target.url("load");
        let response = self.http.get(&url).query(&query).send().await?;
        let status = response.status();

        if status != StatusCode::OK {
            let transfer = TransferOutcome::read(response).await?;
            tracing::warn!(
                url = %url,
                status = transfer.status,
                body = %transfer.body,
                "Nothing loaded from remote store"
            );
            return Ok(LoadOutcome {
                transfer,
                extracted: false,
            });
        }

        let staged = self.staging_file("cosmos_load-")?;
        let mut file = tokio::fs::File::create(staged.path()).await?;
        let mut stream = response.bytes_stream();
        let mut received = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            received += chunk.len();
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        archive::extract(staged.path(), target.output_dir).await?;
        tracing::info!(
            url = %url,
            rev = rev.unwrap_or("latest"),
            bytes = received,
            output_dir = %target.output_dir.display(),
            "Loaded results"
        );

        Ok(LoadOutcome {
            transfer: TransferOutcome {
                status: status.as_u16(),
                body: String::new(),
            },
            extracted: true,
        })
    }
}
