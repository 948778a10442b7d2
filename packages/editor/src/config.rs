use crate::errors::EditorResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "folio.config.json";

/// Editor configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Name used in logs to tell editors apart
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Transform passes allowed before an update is aborted
    #[serde(default = "default_max_transform_passes")]
    pub max_transform_passes: usize,

    /// Check every node on commit instead of only the dirty ones
    #[serde(default)]
    pub validate_full_tree: bool,

    /// Merge adjacent compatible text nodes and drop empty ones
    #[serde(default = "default_true")]
    pub normalize_text: bool,
}

fn default_namespace() -> String {
    "folio".to_string()
}

fn default_max_transform_passes() -> usize {
    100
}

fn default_true() -> bool {
    true
}

impl EditorConfig {
    pub fn from_json_str(json: &str) -> EditorResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load `folio.config.json` from a directory, or defaults when absent
    pub fn load(dir: impl AsRef<Path>) -> EditorResult<Self> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_json_str(&content)
        } else {
            Ok(EditorConfig::default())
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            max_transform_passes: default_max_transform_passes(),
            validate_full_tree: false,
            normalize_text: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "namespace": "notes",
            "maxTransformPasses": 8,
            "validateFullTree": true
        }"#;

        let config = EditorConfig::from_json_str(json).unwrap();
        assert_eq!(config.namespace, "notes");
        assert_eq!(config.max_transform_passes, 8);
        assert!(config.validate_full_tree);
        assert!(config.normalize_text);
    }

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert_eq!(config.max_transform_passes, 100);
        assert!(!config.validate_full_tree);
        assert_eq!(config, EditorConfig::from_json_str("{}").unwrap());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join("folio-config-missing");
        assert_eq!(EditorConfig::load(&dir).unwrap(), EditorConfig::default());
    }
}
