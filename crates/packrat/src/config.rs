//! `packrat.toml` configuration
//!
//! The file mirrors [`BundleOptions`] with plain data: loaders and plugins are
//! referenced by name and turned into values by [`Config::into_options`].

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use log::debug;
use regex::Regex;
use serde::Deserialize;

use crate::{
    compiler::{BundleOptions, DEFAULT_ENTRY_NAME, OutputOptions, default_extensions},
    hooks::{Plugin, ProgressPlugin},
    loader::{Loader, Rule},
    util::normalize_path,
};

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE: &str = "packrat.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Project root, relative to the directory holding the configuration
    pub context: Option<PathBuf>,
    pub entry: Option<EntryConfig>,
    pub output: OutputConfig,
    pub resolve: ResolveConfig,
    pub module: ModuleConfig,
    /// Built-in plugins to enable
    pub plugins: Vec<String>,
}

/// `entry = "src/index.js"` or `[entry]` with one path per name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EntryConfig {
    Single(PathBuf),
    Named(IndexMap<String, PathBuf>),
}

impl EntryConfig {
    /// Named entries; a single entry is called `main`
    pub fn into_named(self) -> IndexMap<String, PathBuf> {
        match self {
            Self::Single(path) => IndexMap::from([(DEFAULT_ENTRY_NAME.to_owned(), path)]),
            Self::Named(entries) => entries,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub path: Option<PathBuf>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveConfig {
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleConfig {
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Regular expression matched against the slash-normalized module path
    pub test: String,
    #[serde(default, rename = "use")]
    pub loaders: Vec<String>,
    /// Shorthand for a single-element `use`
    #[serde(default)]
    pub loader: Option<String>,
}

impl RuleConfig {
    fn into_rule(self) -> Result<Rule> {
        let test = Regex::new(&self.test)
            .with_context(|| format!("Invalid rule test {:?}", self.test))?;

        let names: Vec<_> = self.loaders.into_iter().chain(self.loader).collect();
        if names.is_empty() {
            bail!("Rule {:?} names no loader", self.test);
        }
        let loaders = names
            .iter()
            .map(|name| Loader::builtin(name))
            .collect::<Result<Vec<_>>>()?;

        Ok(Rule::new(test, loaders))
    }
}

impl Config {
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Turn the configuration into compiler options.
    ///
    /// Relative paths are resolved against `base_dir` (the context) and
    /// normalized.
    pub fn into_options(self, base_dir: &Path) -> Result<BundleOptions> {
        let context = normalize_path(&base_dir.join(self.context.unwrap_or_default()));

        let Some(entry) = self.entry else {
            bail!("No entry configured");
        };
        let entries = entry
            .into_named()
            .into_iter()
            .map(|(name, path)| (name, normalize_path(&context.join(path))))
            .collect();

        let defaults = OutputOptions::default();
        let output = OutputOptions {
            path: normalize_path(&context.join(self.output.path.unwrap_or(defaults.path))),
            filename: self.output.filename.unwrap_or(defaults.filename),
        };

        let rules = self
            .module
            .rules
            .into_iter()
            .map(RuleConfig::into_rule)
            .collect::<Result<Vec<_>>>()?;

        let plugins = self
            .plugins
            .iter()
            .map(|name| builtin_plugin(name))
            .collect::<Result<Vec<_>>>()?;

        Ok(BundleOptions {
            context,
            entries,
            output,
            extensions: self.resolve.extensions.unwrap_or_else(default_extensions),
            rules,
            plugins,
        })
    }
}

fn builtin_plugin(name: &str) -> Result<Box<dyn Plugin>> {
    match name {
        "progress" => Ok(Box::new(ProgressPlugin)),
        _ => bail!("Unknown plugin '{name}' (available plugins: progress)"),
    }
}
