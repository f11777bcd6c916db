//! Loader pipeline
//!
//! Loaders are pure `text -> text` transforms applied to a module's raw
//! source before dependency analysis. Rules select loaders by module path.
//! All loaders of all matching rules are collected in declared order and
//! then run last-to-first, each consuming the previous output.

use std::{fmt, path::Path, sync::Arc};

use anyhow::{Result, bail};
use log::trace;
use regex::Regex;

use crate::util::{js_string_literal, to_unix_path};

type TransformFn = dyn Fn(&str) -> Result<String> + Send + Sync;
type PathPredicate = dyn Fn(&Path) -> bool + Send + Sync;

/// A named source transform
#[derive(Clone)]
pub struct Loader {
    name: String,
    transform: Arc<TransformFn>,
}

impl Loader {
    pub fn new<F>(name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            transform: Arc::new(transform),
        }
    }

    /// Look up one of the loaders that ship with packrat
    pub fn builtin(name: &str) -> Result<Self> {
        match name {
            "json" => Ok(Self::new("json", json_loader)),
            "raw" => Ok(Self::new("raw", raw_loader)),
            _ => bail!("Unknown loader '{name}' (available loaders: json, raw)"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run(&self, source: &str) -> Result<String> {
        (self.transform)(source)
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Exposes a JSON document as the module's exports
fn json_loader(source: &str) -> Result<String> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        bail!("json loader received an empty document");
    }
    Ok(format!("module.exports = {trimmed};\n"))
}

/// Exposes the raw file contents as a string export
fn raw_loader(source: &str) -> Result<String> {
    Ok(format!("module.exports = {};\n", js_string_literal(source)))
}

/// Decides whether a rule applies to a module path
#[derive(Clone)]
pub enum RuleTest {
    /// Matched against the slash-normalized absolute module path
    Regex(Regex),
    Predicate(Arc<PathPredicate>),
}

impl RuleTest {
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    pub fn matches(&self, path: &Path) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(&to_unix_path(&path.to_string_lossy())),
            Self::Predicate(predicate) => predicate(path),
        }
    }
}

impl fmt::Debug for RuleTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<Regex> for RuleTest {
    fn from(regex: Regex) -> Self {
        Self::Regex(regex)
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub test: RuleTest,
    pub loaders: Vec<Loader>,
}

impl Rule {
    pub fn new(test: impl Into<RuleTest>, loaders: Vec<Loader>) -> Self {
        Self {
            test: test.into(),
            loaders,
        }
    }
}

/// Ordered set of rules applied to every module before analysis
#[derive(Debug, Clone, Default)]
pub struct LoaderPipeline {
    rules: Vec<Rule>,
}

impl LoaderPipeline {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Loaders that apply to `path`, in declared order
    pub fn matching_loaders(&self, path: &Path) -> Vec<&Loader> {
        self.rules
            .iter()
            .filter(|rule| rule.test.matches(path))
            .flat_map(|rule| &rule.loaders)
            .collect()
    }

    /// Run every matching loader over `source`, last-declared first.
    ///
    /// Loader errors are returned as-is.
    pub fn apply(&self, path: &Path, source: String) -> Result<String> {
        self.matching_loaders(path)
            .into_iter()
            .rev()
            .try_fold(source, |code, loader| {
                trace!("Running loader '{}' on {}", loader.name(), path.display());
                loader.run(&code)
            })
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;

    use super::*;

    fn append(name: &'static str) -> Loader {
        Loader::new(name, move |source| Ok(format!("{source}{name};")))
    }

    fn js_rule(loaders: Vec<Loader>) -> Rule {
        Rule::new(Regex::new(r"\.js$").unwrap(), loaders)
    }

    #[test]
    fn test_loaders_run_last_declared_first() {
        let pipeline = LoaderPipeline::new(vec![
            js_rule(vec![append("a"), append("b")]),
            js_rule(vec![append("c")]),
        ]);

        let output = pipeline
            .apply(Path::new("/p/index.js"), String::new())
            .unwrap();
        assert_eq!(output, "c;b;a;");
    }

    #[test]
    fn test_non_matching_rules_are_skipped() {
        let pipeline = LoaderPipeline::new(vec![
            Rule::new(Regex::new(r"\.css$").unwrap(), vec![append("css")]),
            js_rule(vec![append("js")]),
        ]);

        let output = pipeline
            .apply(Path::new("/p/index.js"), "x;".to_owned())
            .unwrap();
        assert_eq!(output, "x;js;");

        let untouched = pipeline
            .apply(Path::new("/p/data.txt"), "x;".to_owned())
            .unwrap();
        assert_eq!(untouched, "x;");
    }

    #[test]
    fn test_predicate_rules() {
        let pipeline = LoaderPipeline::new(vec![Rule::new(
            RuleTest::predicate(|path| path.starts_with("/p/vendor")),
            vec![append("vendor")],
        )]);

        assert_eq!(pipeline.matching_loaders(Path::new("/p/vendor/x.js")).len(), 1);
        assert!(pipeline.matching_loaders(Path::new("/p/src/x.js")).is_empty());
    }

    #[test]
    fn test_loader_errors_propagate_unchanged() {
        let failing = Loader::new("boom", |_| Err(anyhow!("loader exploded")));
        let pipeline = LoaderPipeline::new(vec![js_rule(vec![append("never"), failing])]);

        let err = pipeline
            .apply(Path::new("/p/index.js"), String::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "loader exploded");
    }

    #[test]
    fn test_builtin_loaders() {
        let json = Loader::builtin("json").unwrap();
        assert_eq!(json.run("{\"x\": 1}\n").unwrap(), "module.exports = {\"x\": 1};\n");
        assert!(json.run("  ").is_err());

        let raw = Loader::builtin("raw").unwrap();
        assert_eq!(raw.run("hi\n").unwrap(), "module.exports = \"hi\\n\";\n");

        let err = Loader::builtin("babel").unwrap_err();
        assert!(err.to_string().contains("Unknown loader 'babel'"));
    }
}
