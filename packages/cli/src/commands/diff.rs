use super::{editor_for, read_state};
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use folio_editor::EditorConfig;
use folio_model::{DirtySet, EditorState, NodeRegistry};
use folio_reconciler::{reconcile, PatchStats, ViewPatch, ViewTree};
use std::path::PathBuf;
use tracing::debug;

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// State the view currently shows
    pub from: PathBuf,

    /// State to reconcile to
    pub to: PathBuf,

    /// Only print the per-operation totals
    #[arg(long)]
    pub summary: bool,
}

pub fn diff(args: DiffArgs, config: &EditorConfig) -> Result<()> {
    let editor = editor_for(config)?;
    let from = read_state(&editor, &args.from)?;
    let to = read_state(&editor, &args.to)?;

    let dirty = DirtySet::between(from.nodes(), to.nodes());
    debug!(dirty = dirty.len(), "Compared states");
    let patches = reconcile(from.nodes(), to.nodes(), &dirty, editor.registry())?;
    verify(&patches, &from, &to, editor.registry())?;

    let stats = PatchStats::of(&patches);
    if !args.summary {
        println!("{}", serde_json::to_string_pretty(&patches)?);
    }
    eprintln!(
        "{} {} creates, {} updates, {} moves, {} removes",
        "Patches:".bright_blue().bold(),
        stats.creates.to_string().green(),
        stats.updates.to_string().yellow(),
        stats.moves.to_string().cyan(),
        stats.removes.to_string().red(),
    );
    Ok(())
}

/// Replay the patches on a view of `from` and make sure it ends up as `to`
fn verify(
    patches: &[ViewPatch],
    from: &EditorState,
    to: &EditorState,
    registry: &NodeRegistry,
) -> Result<()> {
    let mut view = ViewTree::from_map(from.nodes(), registry)?;
    view.apply_all(patches)?;
    let expected = ViewTree::from_map(to.nodes(), registry)?;
    if !view.same_structure(&expected) {
        return Err(anyhow!(
            "Patches do not reproduce the target state:\n{}\nexpected:\n{}",
            view.render(),
            expected.render()
        ));
    }
    Ok(())
}
