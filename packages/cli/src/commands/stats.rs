use super::{editor_for, read_state, OutputFormat};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use folio_editor::EditorConfig;
use folio_model::EditorState;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// State file to summarize
    pub input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct StateStats {
    nodes: usize,
    by_type: BTreeMap<String, usize>,
    /// Longest root-to-node path; the root alone has depth 0
    max_depth: usize,
    characters: usize,
    formatted_text: usize,
    has_selection: bool,
}

impl StateStats {
    fn of(state: &EditorState) -> Self {
        let map = state.nodes();
        let mut stats = StateStats {
            has_selection: state.selection().is_some(),
            ..Default::default()
        };
        for key in map.document_order() {
            let Some(node) = map.get(&key) else {
                continue;
            };
            stats.nodes += 1;
            *stats.by_type.entry(node.node_type().to_string()).or_default() += 1;
            stats.max_depth = stats.max_depth.max(map.depth(&key));
            if let Some(text) = node.as_text() {
                stats.characters += text.len();
                if !text.format.is_empty() {
                    stats.formatted_text += 1;
                }
            }
        }
        stats
    }
}

pub fn stats(args: StatsArgs, config: &EditorConfig) -> Result<()> {
    let editor = editor_for(config)?;
    let state = read_state(&editor, &args.input)?;
    let stats = StateStats::of(&state);

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            println!("{}", args.input.display().to_string().bright_white().bold());
            println!("   Nodes:      {}", stats.nodes);
            println!("   Max depth:  {}", stats.max_depth);
            println!("   Characters: {}", stats.characters);
            println!("   Formatted:  {}", stats.formatted_text);
            println!("   Selection:  {}", if stats.has_selection { "yes" } else { "no" });
            println!();
            for (node_type, count) in &stats.by_type {
                println!("   {:<12} {}", node_type.cyan(), count);
            }
        }
    }
    Ok(())
}
