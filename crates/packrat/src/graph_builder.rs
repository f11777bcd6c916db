//! Recursive, depth-first construction of the module graph
//!
//! Every module goes through read → loaders → dependency analysis, is
//! registered in the graph, and only then are its dependencies built. A module
//! that is already in the graph is never compiled again; reaching it from
//! another entry only extends its owning entries.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::{
    analyzers::DependencyAnalyzer,
    loader::LoaderPipeline,
    module_graph::{EntryRecord, ModuleGraph, ModuleId, ModuleRecord},
    resolver::{ModuleResolver, UnresolvedImport},
    util::normalize_path,
};

#[derive(Debug)]
pub struct GraphBuilder<'a> {
    resolver: &'a ModuleResolver,
    pipeline: &'a LoaderPipeline,
    graph: ModuleGraph,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(resolver: &'a ModuleResolver, pipeline: &'a LoaderPipeline) -> Self {
        Self {
            resolver,
            pipeline,
            graph: ModuleGraph::new(),
        }
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    pub fn into_graph(self) -> ModuleGraph {
        self.graph
    }

    /// Compile the entry `name` at `path` and everything it reaches.
    ///
    /// An entry that an earlier entry already required is claimed rather than
    /// compiled again.
    pub fn build_entry(&mut self, name: &str, path: &Path) -> Result<EntryRecord> {
        let path = normalize_path(path);
        let id = self.resolver.module_id(&path);

        if self.graph.contains(&id) {
            debug!("Entry '{name}' reuses already compiled module {id}");
            self.graph.claim(name, &id);
        } else {
            self.build_module(name, &path)?;
        }

        Ok(EntryRecord {
            name: name.to_owned(),
            path,
            module: id,
        })
    }

    /// Compile the module at `module_path` on behalf of `entry_name`, then
    /// its not-yet-compiled dependencies.
    pub fn build_module(&mut self, entry_name: &str, module_path: &Path) -> Result<ModuleId> {
        let id = self.resolver.module_id(module_path);
        debug!("Building module {id} for entry '{entry_name}'");

        let raw = fs::read_to_string(module_path)
            .with_context(|| format!("Failed to read module {}", module_path.display()))?;
        let loaders = self.pipeline.matching_loaders(module_path).len();
        let source = self.pipeline.apply(module_path, raw)?;
        let analyzed = match DependencyAnalyzer::new(self.resolver).analyze(module_path, &source) {
            Ok(analyzed) => analyzed,
            Err(err) if loaders == 0 && !is_javascript(module_path) && !is_unresolved(&err) => {
                return Err(err.context(format!(
                    "No loader matches {}; add a module rule for it (e.g. the `json` loader for .json files)",
                    module_path.display()
                )));
            }
            Err(err) => return Err(err),
        };

        let mut pending = Vec::new();
        for (dependency, dependency_path) in &analyzed.dependencies {
            if self.graph.contains(dependency) {
                if self.graph.is_in_progress(dependency) {
                    warn!("Circular import: {id} requires {dependency}, which is still loading");
                }
                self.graph.claim(entry_name, dependency);
            } else {
                pending.push((dependency.clone(), dependency_path.clone()));
            }
        }

        let dependencies = analyzed.dependencies.keys().cloned().collect();
        self.graph.register(ModuleRecord::new(
            id.clone(),
            module_path,
            analyzed.code,
            dependencies,
            entry_name,
        ));

        for (dependency, dependency_path) in pending {
            if self.graph.contains(&dependency) {
                // Built by a sibling's subtree since this module was analyzed
                if self.graph.is_in_progress(&dependency) {
                    warn!("Circular import: {id} requires {dependency}, which is still loading");
                }
                self.graph.claim(entry_name, &dependency);
                continue;
            }
            self.build_module(entry_name, &dependency_path)?;
        }

        self.graph.finish(&id);
        Ok(id)
    }
}

const JAVASCRIPT_EXTENSIONS: &[&str] = &["js", "cjs", "mjs", "jsx"];

fn is_javascript(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| JAVASCRIPT_EXTENSIONS.contains(&extension))
}

fn is_unresolved(err: &anyhow::Error) -> bool {
    err.downcast_ref::<UnresolvedImport>().is_some()
}
