//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check delimiter pairs, template lists and route patterns
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function over the parsed document

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{ServerConfig, TemplateConfig};

/// A single semantic problem in a configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_template_config(config: &TemplateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.delims.len() {
        0 => {}
        2 => {
            if config.delims.iter().any(|d| d.is_empty()) {
                errors.push(ValidationError::new("delims", "delimiters must not be empty"));
            }
        }
        n => errors.push(ValidationError::new(
            "delims",
            format!("expected a left and right delimiter, got {} entries", n),
        )),
    }

    for (name, files) in &config.list {
        if name.is_empty() {
            errors.push(ValidationError::new("list", "template name must not be empty"));
        }
        if files.is_empty() {
            errors.push(ValidationError::new(
                format!("list.{}", name),
                "at least one file is required",
            ));
        }
    }

    for (name, file) in &config.components {
        if name.is_empty() {
            errors.push(ValidationError::new("components", "component name must not be empty"));
        }
        if file.is_empty() {
            errors.push(ValidationError::new(
                format!("components.{}", name),
                "file must not be empty",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_server_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address {:?}", config.listener.bind_address),
        ));
    }

    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    if !matches!(
        config.observability.log_level.as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", config.observability.log_level),
        ));
    }

    for (name, pattern) in &config.routes {
        if name.is_empty() {
            errors.push(ValidationError::new("routes", "route name must not be empty"));
        }
        if !pattern.starts_with('/') {
            errors.push(ValidationError::new(
                format!("routes.{}", name),
                "pattern must start with '/'",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delims_must_be_a_pair() {
        let config = TemplateConfig {
            delims: vec!["[[".into()],
            ..Default::default()
        };
        let errors = validate_template_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "delims");
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "nope".into();
        config.observability.log_level = "loud".into();
        config.routes.insert("home".into(), "home".into());

        let errors = validate_server_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_default_server_config_is_valid() {
        assert!(validate_server_config(&ServerConfig::default()).is_ok());
    }
}
