use super::{editor_for, read_state, OutputFormat};
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use folio_editor::{EditorConfig, DEFAULT_CONFIG_NAME};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// State file, or a directory searched for .json state files
    pub input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReport {
    path: PathBuf,
    ok: bool,
    nodes: usize,
    error: Option<String>,
}

pub fn check(args: CheckArgs, config: &EditorConfig) -> Result<()> {
    let files = if args.input.is_file() {
        vec![args.input.clone()]
    } else if args.input.is_dir() {
        find_state_files(&args.input)
    } else {
        return Err(anyhow!("Input path does not exist: {}", args.input.display()));
    };

    let reports: Vec<CheckReport> = files.iter().map(|file| check_file(file, config)).collect();
    let failures = reports.iter().filter(|report| !report.ok).count();

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => {
            for report in &reports {
                match &report.error {
                    None => println!("{} {} ({} nodes)", "✓".green(), report.path.display(), report.nodes),
                    Some(error) => println!("{} {}\n    {}", "✗".red(), report.path.display(), error),
                }
            }
            println!();
            println!("   Files checked: {}", reports.len());
            if failures > 0 {
                println!("   {} {}", "Invalid:".red(), failures);
            } else {
                println!("   {} No issues found!", "✓".green());
            }
        }
    }

    if failures > 0 {
        return Err(anyhow!("{failures} of {} state files are invalid", reports.len()));
    }
    Ok(())
}

/// Load a state and commit it into a fresh editor, which re-checks the
/// whole tree and reconciles it against an empty view
fn check_file(path: &Path, config: &EditorConfig) -> CheckReport {
    let result = editor_for(config).and_then(|mut editor| {
        let state = read_state(&editor, path)?;
        let nodes = state.nodes().len();
        editor.set_state(state)?;
        Ok(nodes)
    });

    match result {
        Ok(nodes) => CheckReport {
            path: path.to_path_buf(),
            ok: true,
            nodes,
            error: None,
        },
        Err(err) => CheckReport {
            path: path.to_path_buf(),
            ok: false,
            nodes: 0,
            error: Some(format!("{err:#}")),
        },
    }
}

fn find_state_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.is_file()
                && path.extension().is_some_and(|ext| ext == "json")
                && path.file_name().is_some_and(|name| name != DEFAULT_CONFIG_NAME)
        })
        .collect();
    files.sort();
    files
}
