//! Loads a [`ralph_kernel::config::WorkflowConfig`] from a `config.toml`
//! on disk, mirroring the reference architecture's
//! `config/{load,defaults,merge,validate}.rs` split:
//! `defaults` supplies built-in values for every optional section,
//! `load` parses TOML into a partial override struct, `merge` layers the
//! file over the defaults field-by-field, and `validate` rejects
//! structurally invalid configuration before the engine starts.

pub mod defaults;
pub mod load;
pub mod merge;
pub mod validate;

use std::path::Path;

use ralph_kernel::config::WorkflowConfig;

use crate::error::{EngineError, Result};
pub use load::PartialWorkflowConfig;
pub use validate::ConfigError;

/// The environment variable that overrides the configured concurrency cap.
pub const MAX_CONCURRENCY_ENV: &str = "WORKFLOW_MAX_CONCURRENCY";

/// Loads and validates a [`WorkflowConfig`] from `path`. Applies
/// `WORKFLOW_MAX_CONCURRENCY` on top of the merged file value, then
/// validates the result, returning every structural error found rather
/// than stopping at the first one.
pub fn load_config(path: impl AsRef<Path>) -> Result<WorkflowConfig> {
    let partial = load::load_partial(path.as_ref())?;
    let mut config = merge::merge_with_defaults(partial);
    if let Some(env_value) = std::env::var(MAX_CONCURRENCY_ENV)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
    {
        config.max_concurrency = env_value;
    }

    let errors = validate::validate(&config);
    if !errors.is_empty() {
        return Err(EngineError::Config {
            detail: errors
                .iter()
                .map(ConfigError::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        });
    }
    Ok(config)
}
