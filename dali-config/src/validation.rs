// Configuration validation

use crate::{ConfigError, DaliConfig, LocationConfig, Result};
use std::collections::HashSet;
use std::net::SocketAddr;

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Configuration validator with rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a location path is absolute
    pub fn is_location_path(value: &str, field: &str) -> Result<()> {
        if !value.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "{} must start with '/', got {:?}",
                field, value
            )));
        }
        Ok(())
    }

    /// Validate that a nested location lies under its parent
    pub fn is_nested_path(path: &str, parent: &str) -> Result<()> {
        if !path.starts_with(parent) {
            return Err(ConfigError::ValidationError(format!(
                "location {} is outside its parent location {}",
                path, parent
            )));
        }
        Ok(())
    }

    /// Validate that a value parses as a socket address
    pub fn is_socket_addr(value: &str, field: &str) -> Result<SocketAddr> {
        value.parse().map_err(|_| {
            ConfigError::ValidationError(format!(
                "{} must be a socket address such as 127.0.0.1:8080, got {:?}",
                field, value
            ))
        })
    }
}

impl Validate for DaliConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::not_empty(&self.listen, "listen")?;
        ConfigValidator::is_socket_addr(&self.listen, "listen")?;

        let mut seen = HashSet::new();
        let mut pending: Vec<(Option<&str>, &LocationConfig)> =
            self.locations.iter().map(|l| (None, l)).collect();
        while let Some((parent, location)) = pending.pop() {
            ConfigValidator::is_location_path(&location.path, "location path")?;
            if let Some(parent) = parent {
                ConfigValidator::is_nested_path(&location.path, parent)?;
            }
            if !seen.insert(location.path.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate location {}",
                    location.path
                )));
            }
            pending.extend(
                location
                    .locations
                    .iter()
                    .map(|child| (Some(location.path.as_str()), child)),
            );
        }

        self.log_config()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(path: &str) -> LocationConfig {
        LocationConfig {
            path: path.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(DaliConfig::default().validate().is_ok());
    }

    #[test]
    fn test_relative_location_rejected() {
        let config = DaliConfig {
            locations: vec![location("files")],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_duplicate_nested_location_rejected() {
        let mut outer = location("/a");
        outer.locations.push(location("/a/b"));
        let config = DaliConfig {
            locations: vec![outer, location("/a/b")],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate location /a/b"));
    }

    #[test]
    fn test_nested_location_outside_parent_rejected() {
        let mut outer = location("/a");
        outer.locations.push(location("/b"));
        let config = DaliConfig {
            locations: vec![outer],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("outside its parent location /a"));

        let mut outer = location("/a");
        let mut inner = location("/a/b");
        inner.locations.push(location("/a/b/c"));
        outer.locations.push(inner);
        let config = DaliConfig {
            locations: vec![outer],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_listen_rejected() {
        let config = DaliConfig {
            listen: "localhost".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(ConfigValidator::is_socket_addr("[::1]:80", "listen").is_ok());
    }
}
