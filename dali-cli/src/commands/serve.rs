//! Serve command
//!
//! Resolves configuration from a file (or the environment), applies command
//! line overrides, installs logging and runs the server until ctrl-c.

use crate::error::{CliError, CliResult};
use colored::Colorize;
use dali_config::{ByteSize, DaliConfig, EnvLoader, Validate, parse_size};
use dali_core::logging::{LogFormat, LogLevel, info};
use dali_core::{DaliServer, Strategy};
use std::path::PathBuf;

/// Overrides gathered from the command line.
#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    pub config: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    pub listen: Option<String>,
    pub size: Option<String>,
    pub strategy: Option<Strategy>,
    pub log_format: Option<LogFormat>,
    pub log_level: Option<LogLevel>,
    /// ANSI colors for plain and pretty logs
    pub colors: bool,
}

pub async fn execute(options: ServeOptions) -> CliResult<()> {
    EnvLoader::default().load_dotenv(options.env_file.as_deref())?;

    let config = resolve(&options)?;
    let addr = config.listen_addr()?;

    let mut log = config.log_config()?.with_colors(options.colors);
    if let Some(level) = options.log_level {
        log = log.level(level);
    }
    let _guard = log.init()?;

    println!(
        "{} {} on {}",
        "Dali".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION"),
        addr.to_string().bold()
    );
    info!(
        listen = %addr,
        rounding = ?config.pattern_rounding,
        "Dali starting"
    );

    DaliServer::new(config.handler()).listen(addr).await?;

    info!("Dali stopped");
    Ok(())
}

/// Load configuration and apply overrides, then validate the result.
pub fn resolve(options: &ServeOptions) -> CliResult<DaliConfig> {
    let mut config = match &options.config {
        Some(path) => DaliConfig::load(path)?,
        None => DaliConfig::from_env()?,
    };

    if let Some(listen) = &options.listen {
        config.listen = listen.clone();
    }
    if let Some(size) = &options.size {
        config.size = Some(ByteSize(parse_size(size)?));
    }
    if let Some(strategy) = options.strategy {
        config.strategy = Some(strategy);
    }
    if let Some(format) = options.log_format {
        config.log.format = format;
    }

    config.validate()?;
    if config.route_table().iter().all(|route| route.length().is_none()) {
        return Err(CliError::InvalidArgument(
            "no size configured; pass --size or set one in the config file".to_string(),
        ));
    }
    Ok(config)
}
