// Environment variable overrides

use crate::{ConfigError, DaliConfig, Result, parse_size};
use dali_core::logging::{LogFormat, LogLevel};
use dali_core::{PatternRounding, Strategy};
use std::env;
use std::path::Path;

/// Prefix of every dali environment variable.
pub const ENV_PREFIX: &str = "DALI";

/// Environment variable loader
#[derive(Debug, Clone)]
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Full variable name for `key`, e.g. `size` -> `DALI_SIZE`.
    pub fn var_name(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }

    /// Read a `.env` file into the process environment.
    ///
    /// With no path, a missing `.env` in the working directory is not an error.
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        Ok(())
    }

    /// Override `config` from the process environment.
    pub fn apply(&self, config: &mut DaliConfig) -> Result<()> {
        self.apply_with(config, |name| env::var(name).ok())
    }

    /// Override `config` from `lookup`, which maps a full variable name to
    /// its value.
    ///
    /// Recognised keys: `LISTEN`, `SIZE`, `STRATEGY`, `PATTERN_ROUNDING`,
    /// `LOG_LEVEL`, `LOG_FORMAT`.
    pub fn apply_with<F>(&self, config: &mut DaliConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(listen) = lookup(&self.var_name("listen")) {
            tracing::debug!(%listen, "Listen address from environment");
            config.listen = listen;
        }
        if let Some(size) = lookup(&self.var_name("size")) {
            config.size = Some(parse_size(&size)?.into());
        }
        if let Some(strategy) = lookup(&self.var_name("strategy")) {
            let parsed = strategy
                .parse::<Strategy>()
                .map_err(|_| ConfigError::InvalidStrategy(strategy.clone()))?;
            config.strategy = Some(parsed);
        }
        if let Some(rounding) = lookup(&self.var_name("pattern_rounding")) {
            config.pattern_rounding = match rounding.to_lowercase().as_str() {
                "quantum" => PatternRounding::Quantum,
                "exact" => PatternRounding::Exact,
                _ => {
                    return Err(ConfigError::ValidationError(format!(
                        "pattern_rounding must be quantum or exact, got {rounding:?}"
                    )));
                }
            };
        }
        if let Some(level) = lookup(&self.var_name("log_level")) {
            config.log.level = level
                .parse::<LogLevel>()
                .map_err(|e| ConfigError::ValidationError(format!("{e}")))?;
        }
        if let Some(format) = lookup(&self.var_name("log_format")) {
            config.log.format = format
                .parse::<LogFormat>()
                .map_err(|e| ConfigError::ValidationError(format!("{e}")))?;
        }
        Ok(())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(Some(ENV_PREFIX.to_string()))
    }
}
