pub mod check;
pub mod diff;
pub mod stats;

pub use check::{check, CheckArgs};
pub use diff::{diff, DiffArgs};
pub use stats::{stats, StatsArgs};

use anyhow::{Context, Result};
use clap::ValueEnum;
use folio_editor::{lists, Editor, EditorConfig};
use folio_model::EditorState;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Editor with every node type a stored state may use
pub fn editor_for(config: &EditorConfig) -> Result<Editor> {
    let mut editor = Editor::new(config.clone());
    lists::register_lists(&mut editor)?;
    Ok(editor)
}

pub fn read_state(editor: &Editor, path: &Path) -> Result<EditorState> {
    let json = std::fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    editor
        .parse_state(&json)
        .with_context(|| format!("Cannot load {}", path.display()))
}
