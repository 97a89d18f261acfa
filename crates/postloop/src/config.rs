//! Project configuration file support for postloop.
//!
//! Loads configuration from `postloop.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// The config file name
pub const CONFIG_FILE_NAME: &str = "postloop.toml";

/// Project-level configuration loaded from `postloop.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Model id used by every model-backed capability
    pub model: Option<String>,
    /// Override for the model API base URL
    pub base_url: Option<String>,
    /// Max tokens per model reply
    pub max_tokens: Option<u32>,
    /// Research stage settings
    #[serde(default)]
    pub research: StageConfig,
    /// Content stage settings
    #[serde(default)]
    pub content: StageConfig,
    /// Image stage settings
    #[serde(default)]
    pub images: ImageStageConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    /// Iteration budget for this stage's loop
    pub max_iterations: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ImageStageConfig {
    pub max_iterations: Option<usize>,
    /// How many images to generate (1-3)
    pub count: Option<usize>,
    /// Image tool binary; the stage is skipped when unset
    pub tool: Option<String>,
    /// Argv template for the tool, with {prompt} and {output} placeholders
    #[serde(default)]
    pub tool_args: Vec<String>,
}

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }
}
