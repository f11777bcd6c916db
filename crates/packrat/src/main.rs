use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser};
use indexmap::IndexMap;
use log::{LevelFilter, debug, info};
use packrat::{
    Compiler,
    compiler::DEFAULT_ENTRY_NAME,
    config::{CONFIG_FILE, Config, EntryConfig},
    hooks::ProgressPlugin,
};

/// Bundle CommonJS modules into one self-contained script per entry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./packrat.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Project root; overrides `context` from the configuration
    #[arg(long)]
    context: Option<PathBuf>,

    /// Entry as NAME=PATH, or a bare PATH for the `main` entry; repeatable.
    /// Replaces the configured entries.
    #[arg(short, long, value_parser = parse_entry)]
    entry: Vec<(String, PathBuf)>,

    /// Output directory
    #[arg(short, long)]
    output_path: Option<PathBuf>,

    /// Output filename template, e.g. "[name].[contenthash].js"
    #[arg(long)]
    filename: Option<String>,

    /// Log build progress
    #[arg(long)]
    progress: bool,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn parse_entry(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((name, _)) if name.is_empty() => Err(format!("missing entry name in '{value}'")),
        Some((_, path)) if path.is_empty() => Err(format!("missing entry path in '{value}'")),
        Some((name, path)) => Ok((name.to_owned(), PathBuf::from(path))),
        None => Ok((DEFAULT_ENTRY_NAME.to_owned(), PathBuf::from(value))),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .init();

    let cwd = env::current_dir().context("Failed to determine the working directory")?;

    // Paths in a configuration file are relative to the file itself
    let (mut config, base_dir) = match &cli.config {
        Some(path) => (Config::load(path)?, config_dir(&cwd.join(path))?),
        None if cwd.join(CONFIG_FILE).is_file() => {
            (Config::load(&cwd.join(CONFIG_FILE))?, cwd.clone())
        }
        None => {
            debug!("No {CONFIG_FILE} found, using command line options only");
            (Config::default(), cwd.clone())
        }
    };

    let base_dir = match cli.context {
        Some(context) => {
            config.context = None;
            cwd.join(context)
        }
        None => base_dir,
    };
    if !cli.entry.is_empty() {
        let entries: IndexMap<_, _> = cli
            .entry
            .into_iter()
            .map(|(name, path)| (name, cwd.join(path)))
            .collect();
        config.entry = Some(EntryConfig::Named(entries));
    }
    if cli.output_path.is_some() {
        config.output.path = cli.output_path.map(|path| cwd.join(path));
    }
    if cli.filename.is_some() {
        config.output.filename = cli.filename;
    }

    let mut options = config.into_options(&base_dir)?;
    if cli.progress && !options.plugins.iter().any(|plugin| plugin.name() == "progress") {
        options.plugins.push(Box::new(ProgressPlugin));
    }

    let stats = Compiler::new(options).run()?;
    info!("{}", stats.summary());
    Ok(())
}

fn config_dir(config_path: &Path) -> Result<PathBuf> {
    config_path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("Config file {} has no parent directory", config_path.display()))
}
