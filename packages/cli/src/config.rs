use anyhow::{Context, Result};
use folio_editor::EditorConfig;
use std::path::Path;

/// Resolve the editor config: an explicit `--config` file must exist,
/// otherwise `folio.config.json` in `cwd` is used when present
pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<EditorConfig> {
    match explicit {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read config {}", path.display()))?;
            EditorConfig::from_json_str(&content)
                .with_context(|| format!("Invalid config {}", path.display()))
        }
        None => Ok(EditorConfig::load(cwd)?),
    }
}
