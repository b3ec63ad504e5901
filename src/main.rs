// Trellis - component lifecycle runner
//
// Builds a component tree from a TOML layout, runs its scripted steps and
// prints the resulting tree as JSON.
//
// Architecture:
// - CLI (clap): run / demo / config subcommands
// - Config: ~/.config/trellis/config.toml with env overrides
// - Logging (tracing): console or in-memory capture, optional JSON files
// - Layout: component tree + steps, driven on a LocalSet (components are !Send)

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::PathBuf;
use tokio::task::LocalSet;
use trellis::config::{Config, VERSION};
use trellis::layout::{Layout, LayoutFile};
use trellis::logging::{self, LogBuffer, LogLevel};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (layout_path, capture): (Option<PathBuf>, bool) = match cli.command {
        Commands::Config { show, reset, path } => {
            cli::handle_config(show, reset, path);
            return Ok(());
        }
        Commands::Run { layout, capture } => (Some(layout), capture),
        Commands::Demo { capture } => (None, capture),
    };

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();
    let config = Config::from_env();

    // With --capture, logs go to a buffer summarized at exit instead of stderr.
    // The file guard must live until exit so file logs flush.
    let log_buffer = capture.then(LogBuffer::new);
    let _file_guard = logging::init(&config.logging, log_buffer.clone())?;

    tracing::info!(version = VERSION, "trellis starting");

    let local = LocalSet::new();
    let result = local
        .run_until(async {
            match &layout_path {
                Some(path) => run_layout(path, &config).await,
                None => trellis::demo::run_demo(&config).await,
            }
        })
        .await;

    if let Some(buffer) = &log_buffer {
        print_log_summary(buffer);
    }

    let layout = result?;
    println!("{}", serde_json::to_string_pretty(&layout.root().snapshot())?);
    Ok(())
}

async fn run_layout(path: &std::path::Path, config: &Config) -> Result<Layout> {
    let file = LayoutFile::load(path)?;
    let mut layout = Layout::build(&file, config)?;

    tracing::info!(layout = %path.display(), steps = file.steps.len(), "running layout");
    layout.run(&file.steps).await?;
    layout.settle().await;

    Ok(layout)
}

/// Print captured warnings and errors to stderr
fn print_log_summary(buffer: &LogBuffer) {
    let entries = buffer.get_all();
    let notable: Vec<_> = entries
        .iter()
        .filter(|e| matches!(e.level, LogLevel::Warn | LogLevel::Error))
        .collect();

    eprintln!(
        "# {} log entries captured, {} warnings/errors",
        entries.len(),
        notable.len()
    );
    for entry in notable {
        let fields: Vec<String> = entry
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        eprintln!(
            "{} {:5} {} {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            entry.level.as_str(),
            entry.message,
            fields.join(" ")
        );
    }
}
