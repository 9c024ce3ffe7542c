//! Parses a `config.toml` into a partial, all-optional override layer.
//! Field presence is all that matters here — defaulting happens in
//! [`crate::config::merge`].

use std::collections::BTreeMap;
use std::path::Path;

use ralph_kernel::config::{AgentProfile, OrderingStrategy};
use serde::Deserialize;

use crate::error::{EngineError, Result};

/// Mirrors [`ralph_kernel::config::WorkflowConfig`] field-for-field, with
/// every field optional so a `config.toml` only needs to name what it
/// wants to override.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialWorkflowConfig {
    pub project_name: Option<String>,
    pub repo_root: Option<String>,
    pub specs_path: Option<String>,
    #[serde(default)]
    pub reference_files: Option<Vec<String>>,
    #[serde(default)]
    pub build_cmds: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub test_cmds: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub pre_land_checks: Option<Vec<String>>,
    #[serde(default)]
    pub post_land_checks: Option<Vec<String>>,
    #[serde(default)]
    pub code_style: Option<Vec<String>>,
    #[serde(default)]
    pub review_checklist: Option<Vec<String>>,
    pub max_concurrency: Option<u32>,
    pub main_branch: Option<String>,
    pub max_speculative_depth: Option<u32>,
    pub ordering_strategy: Option<OrderingStrategy>,
    #[serde(default)]
    pub agents: Option<Vec<AgentProfile>>,
}

/// Reads and parses `path` as TOML into a [`PartialWorkflowConfig`].
pub fn load_partial(path: &Path) -> Result<PartialWorkflowConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| EngineError::Config {
        detail: format!("reading {}: {e}", path.display()),
    })?;
    toml::from_str(&raw).map_err(|e| EngineError::Config {
        detail: format!("parsing {}: {e}", path.display()),
    })
}
