//! Configuration system for kubexp.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace config -> explicit file -> environment. CLI flags are applied
//! on top by the binary.

use crate::command::FailurePolicy;
use crate::error::{ExperimentError, Result};
use crate::kubeml::DEFAULT_BINARY;
use crate::poll::MissingRunPolicy;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".kubexp";
const CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "KUBEXP_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KubexpConfig {
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

/// How the platform CLI is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Path or name of the `kubeml` executable.
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

fn default_binary() -> String {
    DEFAULT_BINARY.to_string()
}

/// Completion polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Pause between two task listings, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Give up after this many listings. Unbounded when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Give up after this many seconds. Unbounded when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub missing_run: MissingRunPolicy,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: None,
            timeout_secs: None,
            missing_run: MissingRunPolicy::default(),
        }
    }
}

fn default_interval_ms() -> u64 {
    2000
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "kubexp", "kubexp")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Path of the workspace-local config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (`KUBEXP_POLLING__INTERVAL_MS`, ...)
/// 2. Explicit config file, if given (must exist)
/// 3. Workspace-local config (`.kubexp/config.toml`)
/// 4. User config (`~/.config/kubexp/config.toml`)
/// 5. Built-in defaults
pub fn load_config(workspace: Option<&Path>, file: Option<&Path>) -> Result<KubexpConfig> {
    let mut figment = Figment::from(Serialized::defaults(KubexpConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(file) = file {
        if !file.exists() {
            return Err(ExperimentError::config(format!(
                "config file {} does not exist",
                file.display()
            )));
        }
        figment = figment.merge(Toml::file(file));
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    Ok(figment.extract()?)
}

/// Write a default config file into the workspace.
///
/// Refuses to overwrite an existing file.
pub fn init_workspace_config(workspace: &Path) -> Result<PathBuf> {
    let path = workspace_config_path(workspace);
    if path.exists() {
        return Err(ExperimentError::config(format!(
            "{} already exists",
            path.display()
        )));
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&path, to_toml(&KubexpConfig::default())?)?;
    Ok(path)
}

/// Render a configuration as TOML.
pub fn to_toml(config: &KubexpConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| ExperimentError::config(e.to_string()))
}
