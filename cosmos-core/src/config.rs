//! Configuration shared by the metric logger and the sync client.
//!
//! Uses `figment` for layered configuration: defaults -> user config -> workspace
//! `cosmos.toml` -> environment -> explicit overrides. Both components receive the
//! same [`CosmosConfig`] value, so the output directory is never ambient state.

use crate::error::CosmosError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Name of the workspace-level configuration file.
pub const WORKSPACE_CONFIG_FILE: &str = "cosmos.toml";

/// Top-level configuration value passed to both the logger and the sync client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CosmosConfig {
    /// Directory holding `result.csv` and everything that gets archived.
    #[serde(default)]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub sync: SyncSettings,
}

impl CosmosConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_sync(mut self, sync: SyncSettings) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics.keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the settings required for a transfer.
    pub fn sync_target(&self) -> Result<SyncTarget<'_>, CosmosError> {
        self.sync.require(&self.output_dir)
    }
}

/// Metric logger configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Candidate keys for positional updates when no log exists yet.
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Settings for saving to and loading from the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub token: Option<String>,
    /// Base URL of the remote store, e.g. `https://cosmos.example.com/api`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub dataset: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub codename: Option<String>,
    /// Written to `description.txt` before archiving.
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    /// Revision to load when none is passed explicitly. Unset means latest.
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub rev: Option<String>,
    /// Directory searched for the most recently edited notebook on save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook_dir: Option<PathBuf>,
    #[serde(default = "default_notebook_extension")]
    pub notebook_extension: String,
    /// Request timeout. Unset means requests may block indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            token: None,
            endpoint: None,
            dataset: None,
            codename: None,
            description: None,
            rev: None,
            notebook_dir: None,
            notebook_extension: default_notebook_extension(),
            timeout_secs: None,
        }
    }
}

fn default_notebook_extension() -> String {
    "ipynb".to_string()
}

/// Accept `rev = 3` or an all-digit token from the environment as text.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|value| match value {
        Scalar::Text(s) => s,
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Signed(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

impl SyncSettings {
    /// Check the required settings in order and borrow them as a [`SyncTarget`].
    ///
    /// Blank values count as missing. Present values are passed through untrimmed.
    pub fn require<'a>(&'a self, output_dir: &'a Path) -> Result<SyncTarget<'a>, CosmosError> {
        if output_dir.as_os_str().is_empty() {
            return Err(CosmosError::MissingSetting("output_dir"));
        }
        Ok(SyncTarget {
            output_dir,
            token: required(&self.token, "token")?,
            endpoint: required(&self.endpoint, "endpoint")?,
            dataset: required(&self.dataset, "dataset")?,
            codename: required(&self.codename, "codename")?,
        })
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, CosmosError> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(CosmosError::MissingSetting(name)),
    }
}

/// Validated view over the settings a transfer needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTarget<'a> {
    pub output_dir: &'a Path,
    pub token: &'a str,
    pub endpoint: &'a str,
    pub dataset: &'a str,
    pub codename: &'a str,
}

impl SyncTarget<'_> {
    /// `{endpoint}/{action}/{dataset}/{codename}`
    pub fn url(&self, action: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            action,
            self.dataset,
            self.codename
        )
    }
}

/// Values that take precedence over every other configuration source.
///
/// Only fields that are set are merged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    pub sync: SyncOverrides,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `COSMOS_`, `__` separates nested keys)
/// 3. Workspace-local config (`cosmos.toml`)
/// 4. User config (`~/.config/cosmos/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ConfigOverrides>,
) -> Result<CosmosConfig, CosmosError> {
    let mut figment = Figment::from(Serialized::defaults(CosmosConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(WORKSPACE_CONFIG_FILE);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // COSMOS_OUTPUT_DIR, COSMOS_SYNC__TOKEN, COSMOS_SYNC__ENDPOINT, ...
    figment = figment.merge(Env::prefixed("COSMOS_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment
        .extract()
        .map_err(|e| CosmosError::config(e.to_string()))
}

/// Location of the user-level config file, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "cosmos", "cosmos")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
