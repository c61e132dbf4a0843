//! Scheduler configuration, stored as TOML.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Tunables for the scheduler and the defaults new tasks inherit (TOML).
///
/// Intended to be edited by humans; missing fields take their defaults, so
/// a partial or absent file is fine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Ticks without progress before a task fails with a timeout.
    pub default_timeout_ticks: u32,

    /// In-place retry attempts for a failed task before it is dropped.
    pub default_max_retries: u32,

    /// Capacity of the pending queue; submissions beyond it are rejected.
    pub max_queue_len: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_timeout_ticks: 100,
            default_max_retries: 0,
            max_queue_len: 1000,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_ticks == 0 {
            return Err(anyhow!("default_timeout_ticks must be > 0"));
        }
        if self.max_queue_len == 0 {
            return Err(anyhow!("max_queue_len must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SchedulerConfig::default()`.
pub fn load_config(path: &Path) -> Result<SchedulerConfig> {
    if !path.exists() {
        let cfg = SchedulerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SchedulerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &SchedulerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
