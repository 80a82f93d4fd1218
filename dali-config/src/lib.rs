// Configuration for dali
// Loads scoped payload sizes from TOML/JSON files and DALI_* environment variables

pub mod env;
pub mod error;
pub mod loader;
pub mod size;
pub mod validation;

pub use env::{ENV_PREFIX, EnvLoader};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use size::{ByteSize, parse_size};
pub use validation::{ConfigValidator, Validate};

use dali_core::logging::{LogConfig, LogFormat, LogLevel, LogOutput, Rotation};
use dali_core::{
    PatternRounding, PayloadHandler, PayloadPlanner, RouteTable, ScopeId, ScopeSettings,
    ScopeTree, SizeConfig, Strategy,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Complete server configuration.
///
/// ```toml
/// listen = "0.0.0.0:8080"
/// size = "64k"
///
/// [[locations]]
/// path = "/zero"
/// strategy = "zero"
/// size = "1g"
///
/// [[locations.locations]]
/// path = "/zero/small"
/// size = 500
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaliConfig {
    pub listen: String,
    pub pattern_rounding: PatternRounding,
    /// Size of the root scope
    pub size: Option<ByteSize>,
    /// Strategy of the root scope
    pub strategy: Option<Strategy>,
    pub log: LogSettings,
    pub locations: Vec<LocationConfig>,
}

impl Default for DaliConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            pattern_rounding: PatternRounding::default(),
            size: None,
            strategy: None,
            log: LogSettings::default(),
            locations: Vec::new(),
        }
    }
}

/// One nested routing scope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationConfig {
    /// Absolute path prefix
    pub path: String,
    #[serde(default)]
    pub size: Option<ByteSize>,
    #[serde(default)]
    pub strategy: Option<Strategy>,
    #[serde(default)]
    pub locations: Vec<LocationConfig>,
}

/// `[log]` section.
///
/// ```toml
/// [log]
/// level = "info"
/// format = "json"
/// output = "file"
/// file = "/var/log/dali/dali.log"
/// rotation = "daily"
/// filter = "dali_core=debug,hyper=info"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogTarget,
    /// Log file, required when `output = "file"`
    pub file: Option<PathBuf>,
    /// Rotate `file` within its directory
    pub rotation: Option<Rotation>,
    /// Filter directives; override `level` and `RUST_LOG`
    pub filter: Option<String>,
    pub targets: bool,
    pub thread_ids: bool,
    pub file_line: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogTarget::default(),
            file: None,
            rotation: None,
            filter: None,
            targets: true,
            thread_ids: false,
            file_line: false,
        }
    }
}

/// Where `[log]` output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Stdout,
    Stderr,
    File,
}

impl LogSettings {
    fn output(&self) -> Result<LogOutput> {
        let file = match self.output {
            LogTarget::Stdout => return Ok(LogOutput::Stdout),
            LogTarget::Stderr => return Ok(LogOutput::Stderr),
            LogTarget::File => self.file.as_ref().ok_or_else(|| {
                ConfigError::ValidationError(
                    "log.file is required when log.output is \"file\"".to_string(),
                )
            })?,
        };

        match self.rotation {
            None | Some(Rotation::Never) => Ok(LogOutput::File(file.clone())),
            Some(rotation) => {
                let prefix = file.file_name().and_then(|name| name.to_str()).ok_or_else(|| {
                    ConfigError::ValidationError(format!(
                        "log.file {} has no file name",
                        file.display()
                    ))
                })?;
                let directory = file
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .unwrap_or(Path::new("."));
                Ok(LogOutput::RollingFile {
                    directory: directory.to_path_buf(),
                    prefix: prefix.to_string(),
                    rotation,
                })
            }
        }
    }
}

impl DaliConfig {
    /// Load `path`, apply `DALI_*` overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = ConfigLoader::auto(path)?.load_file(path)?;
        EnvLoader::default().apply(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus `DALI_*` overrides, validated.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        EnvLoader::default().apply(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        ConfigValidator::is_socket_addr(&self.listen, "listen")
    }

    pub fn planner(&self) -> PayloadPlanner {
        PayloadPlanner::new().with_rounding(self.pattern_rounding)
    }

    /// Declared scopes, root first.
    pub fn scope_tree(&self) -> ScopeTree {
        let mut tree = ScopeTree::new(settings(self.size, self.strategy));
        add_locations(&mut tree, ScopeId::ROOT, &self.locations);
        tree
    }

    /// Scopes merged and ordered for lookup.
    pub fn route_table(&self) -> RouteTable {
        self.scope_tree().finalize()
    }

    /// A handler serving this configuration.
    pub fn handler(&self) -> PayloadHandler {
        PayloadHandler::new(self.route_table()).with_planner(self.planner())
    }

    /// Subscriber settings from the `[log]` section.
    pub fn log_config(&self) -> Result<LogConfig> {
        let mut config = LogConfig::new()
            .level(self.log.level)
            .format(self.log.format)
            .output(self.log.output()?)
            .with_targets(self.log.targets)
            .with_thread_ids(self.log.thread_ids)
            .with_file_line(self.log.file_line);
        if let Some(filter) = &self.log.filter {
            config = config.with_env_filter(filter.clone());
        }
        Ok(config)
    }
}

fn settings(size: Option<ByteSize>, strategy: Option<Strategy>) -> ScopeSettings {
    ScopeSettings::new(SizeConfig::from(size.map(|s| s.bytes())), strategy)
}

fn add_locations(tree: &mut ScopeTree, parent: ScopeId, locations: &[LocationConfig]) {
    for location in locations {
        let id = tree.add_child(
            parent,
            location.path.clone(),
            settings(location.size, location.strategy),
        );
        add_locations(tree, id, &location.locations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> DaliConfig {
        ConfigLoader::new(FileFormat::Toml).parse(toml).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = DaliConfig::default();
        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert_eq!(config.pattern_rounding, PatternRounding::Quantum);
        assert_eq!(config.listen_addr().unwrap().port(), 8080);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_route_table_applies_merge() {
        let config = parse(
            r#"
            size = 1000
            strategy = "zero"

            [[locations]]
            path = "/big"
            size = 5000

            [[locations]]
            path = "/small"
            size = 10

            [[locations.locations]]
            path = "/small/inner"
            strategy = "pattern"
            "#,
        );

        let routes = config.route_table();
        assert_eq!(routes.len(), 4);
        assert_eq!(routes.lookup("/big/x").unwrap().length(), Some(1000));
        assert_eq!(routes.lookup("/small").unwrap().length(), Some(10));

        let inner = routes.lookup("/small/inner/y").unwrap();
        assert_eq!(inner.length(), Some(10));
        assert_eq!(inner.strategy, Strategy::Pattern);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result = ConfigLoader::new(FileFormat::Toml).parse("sise = 10");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_planner_uses_rounding() {
        let config = parse("pattern_rounding = \"exact\"");
        assert_eq!(config.planner().rounding(), PatternRounding::Exact);
    }

    #[test]
    fn test_log_section() {
        let config = parse(
            r#"
            [log]
            level = "debug"
            format = "pretty"
            "#,
        );
        let log = config.log_config().unwrap();
        assert_eq!(log.level, LogLevel::Debug);
        assert_eq!(log.format, LogFormat::Pretty);
        assert_eq!(log.output, LogOutput::Stdout);
        assert!(log.targets);
    }

    #[test]
    fn test_log_file_output() {
        let config = parse(
            r#"
            [log]
            output = "file"
            file = "/var/log/dali/dali.log"
            filter = "dali_core=trace"
            thread_ids = true
            file_line = true
            "#,
        );
        let log = config.log_config().unwrap();
        assert_eq!(log.output, LogOutput::File(PathBuf::from("/var/log/dali/dali.log")));
        assert_eq!(log.env_filter.as_deref(), Some("dali_core=trace"));
        assert!(log.thread_ids);
        assert!(log.file_line);
    }

    #[test]
    fn test_log_rolling_output() {
        let config = parse(
            r#"
            [log]
            output = "file"
            file = "logs/dali.log"
            rotation = "hourly"
            "#,
        );
        assert_eq!(
            config.log_config().unwrap().output,
            LogOutput::RollingFile {
                directory: PathBuf::from("logs"),
                prefix: "dali.log".to_string(),
                rotation: Rotation::Hourly,
            }
        );

        let bare = parse("[log]\noutput = \"file\"\nfile = \"dali.log\"\nrotation = \"daily\"");
        match bare.log_config().unwrap().output {
            LogOutput::RollingFile { directory, .. } => assert_eq!(directory, PathBuf::from(".")),
            other => panic!("expected rolling output, got {other:?}"),
        }
    }

    #[test]
    fn test_log_file_output_needs_path() {
        let config = parse("[log]\noutput = \"file\"");
        assert!(matches!(
            config.log_config(),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(config.validate().is_err());
    }
}
