//! Application configuration.
//!
//! Priority (highest to lowest):
//! 1. Command-line overrides
//! 2. Environment variables prefixed with `TEASTALL_` (`__` separates
//!    sections, e.g. `TEASTALL_LLM__MODEL`)
//! 3. The config file (`--config`, or `teastall.toml` in the working
//!    directory when present)
//! 4. Built-in defaults
//!
//! `OPENAI_API_KEY` and `PARALLEL_API_KEY` are honoured when the matching key
//! is not set through the layers above.

use std::path::Path;

use anyhow::{bail, Context};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use llm::LlmConfig;
use pipeline::PipelineSettings;
use search::SearchConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "teastall.toml";
pub const ENV_PREFIX: &str = "TEASTALL_";

const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub pipeline: PipelineSettings,
}

impl AppConfig {
    /// Fills API keys left unset from the conventional provider variables.
    pub fn fill_api_keys(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.llm.api_key.is_none() {
            self.llm.api_key = lookup("OPENAI_API_KEY");
        }
        if self.search.parallel_api_key.is_none() {
            self.search.parallel_api_key = lookup("PARALLEL_API_KEY");
        }
    }

    /// Checks the pipeline settings, and that the generation timeout leaves
    /// room for every LLM attempt and its back-off.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.pipeline
            .validate()
            .context("invalid [pipeline] settings")?;
        let budget = self.llm.retry_budget();
        if budget > self.pipeline.generation_timeout() {
            bail!(
                "pipeline.generation_timeout_secs ({}) is shorter than llm.max_attempts ({}) \
                 requests of llm.request_timeout_secs ({}) plus back-off ({}s in total)",
                self.pipeline.generation_timeout_secs,
                self.llm.max_attempts,
                self.llm.request_timeout_secs,
                budget.as_secs()
            );
        }
        Ok(())
    }

    /// A copy safe to print: every secret is replaced.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.llm.api_key.is_some() {
            config.llm.api_key = Some(REDACTED.into());
        }
        if config.search.parallel_api_key.is_some() {
            config.search.parallel_api_key = Some(REDACTED.into());
        }
        config
    }
}

fn figment(path: Option<&Path>) -> anyhow::Result<Figment> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
    match path {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
        }
        None => {}
    }
    Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

/// Loads and validates the configuration.
pub fn load(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let mut config: AppConfig = figment(path)?
        .extract()
        .context("invalid configuration")?;
    config.fill_api_keys(|name| std::env::var(name).ok());
    config.validate()?;
    Ok(config)
}
