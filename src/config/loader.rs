//! Configuration loading from disk and memory.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::{ServerConfig, TemplateConfig};
use crate::config::validation::{validate_server_config, validate_template_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate the server configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = read(path)?;
    let config: ServerConfig = toml::from_str(&content)?;

    validate_server_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse and validate a YAML template document.
pub fn parse_template_config(data: &[u8]) -> Result<TemplateConfig, ConfigError> {
    let config: TemplateConfig = serde_yaml::from_slice(data)?;

    validate_template_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Read, parse and validate a YAML template document.
pub fn load_template_config(path: &Path) -> Result<TemplateConfig, ConfigError> {
    let content = read(path)?;
    parse_template_config(content.as_bytes())
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_template_config() {
        let config = parse_template_config(
            br#"
dir: testdata/template
root: l
minify: true
delims:
- "[["
- "]]"
preload:
- a.tmpl
- b.tmpl
list:
  p:
  - p1.tmpl
  - p2.tmpl
  k:
  - k1.tmpl"#,
        )
        .unwrap();

        assert_eq!(config.dir, "testdata/template");
        assert_eq!(config.root, "l");
        assert!(config.minify);
        assert_eq!(config.delims(), Some(("[[", "]]")));
        assert_eq!(config.preload, vec!["a.tmpl", "b.tmpl"]);
        assert!(config.list.contains_key("p"));
        assert!(config.list.contains_key("k"));
        assert!(!config.list.contains_key("p1.tmpl"));
    }

    #[test]
    fn test_parse_template_config_invalid() {
        let err = parse_template_config(b"invalidyamlbytes").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_load_config_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[listener]
bind_address = "127.0.0.1:3000"

[routes]
home = "/"
post = "/post"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:3000");
        assert_eq!(config.routes.get("post").map(String::as_str), Some("/post"));
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
