//! Engine configuration
//!
//! Loaded from TOML. Keys may sit at the top level or inside an
//! `[interpose]` table:
//!
//! ```toml
//! [interpose]
//! shadow_prefix = "Interpose"
//! dispose_shadow_types = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Name of the optional table holding engine settings
const SECTION: &str = "interpose";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A setting has an unusable value
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Interception engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterposeConfig {
    /// Prefix of shadow type names (`<prefix>_<Class>_<object>`)
    pub shadow_prefix: String,

    /// Dispose a shadow type once its last hook is reverted. When off, the
    /// detached shadow type is kept and reused by the next hook on the object.
    pub dispose_shadow_types: bool,
}

impl Default for InterposeConfig {
    fn default() -> Self {
        Self {
            shadow_prefix: "Interpose".to_string(),
            dispose_shadow_types: true,
        }
    }
}

impl InterposeConfig {
    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut table: toml::Table = toml::from_str(content)?;
        let section = match table.remove(SECTION) {
            Some(section) => section,
            None => toml::Value::Table(table),
        };
        let config: InterposeConfig = section.try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shadow_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "shadow_prefix cannot be empty".to_string(),
            ));
        }
        if !self
            .shadow_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "shadow_prefix '{}' must contain only alphanumeric characters and underscores",
                self.shadow_prefix
            )));
        }
        Ok(())
    }

    /// Render as a TOML document with an `[interpose]` table
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(&Document { interpose: self })
    }
}

#[derive(Serialize)]
struct Document<'a> {
    interpose: &'a InterposeConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InterposeConfig::default();
        assert_eq!(config.shadow_prefix, "Interpose");
        assert!(config.dispose_shadow_types);
    }

    #[test]
    fn test_parse_section() {
        let config = InterposeConfig::from_toml_str(
            r#"
            [interpose]
            shadow_prefix = "Hooked"
            "#,
        )
        .unwrap();
        assert_eq!(config.shadow_prefix, "Hooked");
        assert!(config.dispose_shadow_types);
    }

    #[test]
    fn test_parse_top_level() {
        let config = InterposeConfig::from_toml_str("dispose_shadow_types = false").unwrap();
        assert_eq!(config.shadow_prefix, "Interpose");
        assert!(!config.dispose_shadow_types);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        assert_eq!(
            InterposeConfig::from_toml_str("").unwrap(),
            InterposeConfig::default()
        );
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let result = InterposeConfig::from_toml_str("shadow_prefix = \"\"");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_prefix_with_separator_rejected() {
        let result = InterposeConfig::from_toml_str("shadow_prefix = \"a.b\"");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let result = InterposeConfig::from_toml_str("dispose_shadow_types = \"yes\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_toml_output_reloads() {
        let config = InterposeConfig {
            shadow_prefix: "Spy".to_string(),
            dispose_shadow_types: false,
        };
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("[interpose]"));
        assert_eq!(InterposeConfig::from_toml_str(&text).unwrap(), config);
    }
}
