//! Build orchestration
//!
//! A [`Compiler`] owns the options and hooks of a project and drives one
//! complete build per [`Compiler::run`] call: graph construction for every
//! entry, chunk assembly, rendering and writing.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use cow_utils::CowUtils;
use indexmap::IndexMap;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};

use crate::{
    chunk::build_chunk,
    code_generator::render_chunk,
    graph_builder::GraphBuilder,
    hooks::{CompilerHooks, Plugin},
    loader::{LoaderPipeline, Rule},
    resolver::ModuleResolver,
    stats::Stats,
    util::normalize_path,
};

pub const DEFAULT_OUTPUT_DIR: &str = "dist";
pub const DEFAULT_FILENAME: &str = "[name].js";
pub const DEFAULT_ENTRY_NAME: &str = "main";

pub fn default_extensions() -> Vec<String> {
    vec![".js".to_owned(), ".json".to_owned()]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOptions {
    /// Directory assets are written to; relative paths are taken from the
    /// context
    pub path: PathBuf,
    /// Filename template; `[name]` and `[contenthash]` are substituted
    pub filename: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_OUTPUT_DIR),
            filename: DEFAULT_FILENAME.to_owned(),
        }
    }
}

#[derive(Debug)]
pub struct BundleOptions {
    /// Project root; module ids are relative to it
    pub context: PathBuf,
    /// Entry name to entry file, in build order
    pub entries: IndexMap<String, PathBuf>,
    pub output: OutputOptions,
    /// Extensions probed when a request does not name an existing file
    pub extensions: Vec<String>,
    pub rules: Vec<Rule>,
    pub plugins: Vec<Box<dyn Plugin>>,
}

impl BundleOptions {
    pub fn new(context: impl Into<PathBuf>) -> Self {
        Self {
            context: context.into(),
            entries: IndexMap::new(),
            output: OutputOptions::default(),
            extensions: default_extensions(),
            rules: Vec::new(),
            plugins: Vec::new(),
        }
    }

    #[must_use]
    pub fn entry(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.entries.insert(name.into(), path.into());
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }
}

#[derive(Debug)]
pub struct Compiler {
    context: PathBuf,
    entries: IndexMap<String, PathBuf>,
    output: OutputOptions,
    resolver: ModuleResolver,
    pipeline: LoaderPipeline,
    hooks: CompilerHooks,
}

impl Compiler {
    /// Create a compiler and let every plugin register its listeners
    pub fn new(options: BundleOptions) -> Self {
        let BundleOptions {
            context,
            entries,
            output,
            extensions,
            rules,
            plugins,
        } = options;

        let context = normalize_path(&std::path::absolute(&context).unwrap_or(context));
        let mut hooks = CompilerHooks::default();
        for plugin in &plugins {
            debug!("Applying plugin '{}'", plugin.name());
            plugin.apply(&mut hooks);
        }

        Self {
            resolver: ModuleResolver::new(&context, extensions),
            pipeline: LoaderPipeline::new(rules),
            context,
            entries,
            output,
            hooks,
        }
    }

    pub fn context(&self) -> &Path {
        &self.context
    }

    pub fn hooks_mut(&mut self) -> &mut CompilerHooks {
        &mut self.hooks
    }

    /// Absolute directory assets are written to
    pub fn output_dir(&self) -> PathBuf {
        normalize_path(&self.context.join(&self.output.path))
    }

    /// Build every entry and write one bundle per entry.
    ///
    /// Nothing is written and `done` does not fire when any step fails.
    pub fn run(&mut self) -> Result<Stats> {
        if self.entries.is_empty() {
            bail!("No entry configured");
        }
        for name in self.entries.keys() {
            validate_entry_name(name)?;
        }
        self.hooks.run.call();

        let mut builder = GraphBuilder::new(&self.resolver, &self.pipeline);
        let mut entries = Vec::with_capacity(self.entries.len());
        for (name, path) in &self.entries {
            debug!("Building entry '{name}' from {}", path.display());
            entries.push(builder.build_entry(name, &self.context.join(path))?);
        }
        let graph = builder.into_graph();

        let chunks: Vec<_> = entries
            .iter()
            .map(|entry| build_chunk(entry, &graph))
            .collect();

        let output_dir = self.output_dir();
        let mut assets = IndexMap::new();
        for chunk in &chunks {
            let code = render_chunk(chunk, &graph)?;
            let filename = asset_filename(&self.output.filename, &chunk.name, &code);
            if !normalize_path(&output_dir.join(&filename)).starts_with(&output_dir) {
                bail!(
                    "Asset {filename} of chunk '{}' would be written outside {}",
                    chunk.name,
                    output_dir.display()
                );
            }
            if assets.contains_key(&filename) {
                bail!("Multiple chunks emit assets to the same filename {filename}");
            }
            debug!(
                "Rendered chunk '{}' ({} modules) as {filename}",
                chunk.name,
                chunk.modules.len()
            );
            assets.insert(filename, code);
        }

        self.hooks.emit.call();

        let files = write_assets(&output_dir, &assets)?;

        self.hooks.done.call();

        Ok(Stats {
            entries,
            modules: graph.modules().cloned().collect(),
            chunks,
            assets,
            files,
            circular_groups: graph.circular_groups(),
        })
    }
}

/// Expand `[name]` and `[contenthash]` in a filename template
pub fn asset_filename(template: &str, name: &str, code: &str) -> String {
    let filename = template.cow_replace("[name]", name);
    if filename.contains("[contenthash]") {
        filename
            .cow_replace("[contenthash]", &content_hash(code))
            .into_owned()
    } else {
        filename.into_owned()
    }
}

/// First 8 hex digits of the SHA-256 of `code`
fn content_hash(code: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(code.as_bytes()));
    digest[..8].to_owned()
}

/// Entry names become file names, so they must be a single path component
fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        bail!("Invalid entry name '{name}': names must not be empty or contain path separators");
    }
    Ok(())
}

/// Write every asset, or none of them.
///
/// Directories are created and checked first, each asset is then written to
/// a staging file next to its target, and only once all of them are staged
/// are they renamed into place.
fn write_assets(output_dir: &Path, assets: &IndexMap<String, String>) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir).with_context(|| {
        format!("Failed to create output directory {}", output_dir.display())
    })?;

    let targets: Vec<PathBuf> = assets
        .keys()
        .map(|filename| output_dir.join(filename))
        .collect();
    for path in &targets {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        if path.is_dir() {
            bail!("Failed to write asset {}: a directory is in the way", path.display());
        }
    }

    let mut staged = Vec::with_capacity(targets.len());
    for (path, code) in targets.iter().zip(assets.values()) {
        let staging = staging_path(path);
        if let Err(err) = fs::write(&staging, code) {
            discard(&staged);
            let _ = fs::remove_file(&staging);
            return Err(err).with_context(|| format!("Failed to write asset {}", path.display()));
        }
        staged.push(staging);
    }

    for (index, ((staging, path), code)) in staged
        .iter()
        .zip(&targets)
        .zip(assets.values())
        .enumerate()
    {
        if let Err(err) = fs::rename(staging, path) {
            discard(&staged[index..]);
            return Err(err).with_context(|| format!("Failed to write asset {}", path.display()));
        }
        info!("Wrote {} ({} bytes)", path.display(), code.len());
    }
    Ok(targets)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".packrat-tmp");
    PathBuf::from(staging)
}

fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(err) = fs::remove_file(path) {
            warn!("Failed to remove staged asset {}: {err}", path.display());
        }
    }
}
