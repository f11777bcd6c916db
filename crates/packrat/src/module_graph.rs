//! Module graph for a single build
//!
//! The graph is the single source of truth for module identity during a build:
//! exactly one [`ModuleRecord`] exists per canonical id. Records are inserted
//! once, on first discovery, and afterwards only their `owning_entries` list
//! grows as other entries reach them.

use std::{fmt, path::PathBuf};

use indexmap::{IndexMap, IndexSet};
use log::trace;
use petgraph::{algo::tarjan_scc, graph::DiGraph};
use rustc_hash::{FxBuildHasher, FxHashSet};

type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Canonical module id: project-root-relative, slash-normalized path with a
/// leading `./`, e.g. `./src/util.js`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A compiled module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    pub id: ModuleId,
    /// Absolute path the module was read from
    pub path: PathBuf,
    /// Source after loaders ran and `require` calls were rewritten
    pub source: String,
    /// Every module this one requires, in discovery order
    pub dependencies: IndexSet<ModuleId>,
    /// Entries that transitively reach this module, in discovery order
    pub owning_entries: Vec<String>,
}

impl ModuleRecord {
    pub fn new(
        id: ModuleId,
        path: impl Into<PathBuf>,
        source: String,
        dependencies: IndexSet<ModuleId>,
        entry_name: &str,
    ) -> Self {
        Self {
            id,
            path: path.into(),
            source,
            dependencies,
            owning_entries: vec![entry_name.to_owned()],
        }
    }

    pub fn is_owned_by(&self, entry_name: &str) -> bool {
        self.owning_entries.iter().any(|name| name == entry_name)
    }
}

/// A configured entry point and the module it compiled to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    pub name: String,
    pub path: PathBuf,
    pub module: ModuleId,
}

/// All modules compiled during one build, in global discovery order.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: FxIndexMap<ModuleId, ModuleRecord>,
    /// Modules registered but whose dependencies are still being built
    in_progress: FxHashSet<ModuleId>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    pub fn get(&self, id: &ModuleId) -> Option<&ModuleRecord> {
        self.modules.get(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Iterate records in global discovery order
    pub fn modules(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.modules.values()
    }

    pub fn is_in_progress(&self, id: &ModuleId) -> bool {
        self.in_progress.contains(id)
    }

    /// Register a freshly compiled module and mark it in progress.
    ///
    /// Registration happens before the module's own dependencies are built,
    /// so later references to the same id (including cyclic ones) find it.
    pub fn register(&mut self, record: ModuleRecord) {
        debug_assert!(
            !self.modules.contains_key(&record.id),
            "module {} registered twice",
            record.id
        );
        self.in_progress.insert(record.id.clone());
        self.modules.insert(record.id.clone(), record);
    }

    /// Mark a module's dependency subtree as fully built
    pub fn finish(&mut self, id: &ModuleId) {
        self.in_progress.remove(id);
    }

    /// Record that `entry_name` reaches the module `id`.
    ///
    /// The claim is propagated through the module's dependencies, which were
    /// compiled for an earlier entry and would otherwise never learn about
    /// this one. Appends are idempotent.
    pub fn claim(&mut self, entry_name: &str, id: &ModuleId) {
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            let Some(record) = self.modules.get_mut(&current) else {
                continue;
            };
            if record.is_owned_by(entry_name) {
                continue;
            }
            trace!("Module {current} is now also owned by entry '{entry_name}'");
            record.owning_entries.push(entry_name.to_owned());
            stack.extend(record.dependencies.iter().rev().cloned());
        }
    }

    /// Groups of modules that require each other, directly or transitively.
    ///
    /// Each group is sorted by discovery order; groups are ordered by their
    /// first member.
    pub fn circular_groups(&self) -> Vec<Vec<ModuleId>> {
        let mut graph = DiGraph::<usize, ()>::new();
        let nodes: Vec<_> = (0..self.modules.len()).map(|i| graph.add_node(i)).collect();

        for (index, record) in self.modules.values().enumerate() {
            for dependency in &record.dependencies {
                if let Some(target) = self.modules.get_index_of(dependency) {
                    graph.add_edge(nodes[index], nodes[target], ());
                }
            }
        }

        let mut groups: Vec<Vec<usize>> = tarjan_scc(&graph)
            .into_iter()
            .map(|scc| {
                let mut members: Vec<usize> = scc.into_iter().map(|node| graph[node]).collect();
                members.sort_unstable();
                members
            })
            .filter(|members| {
                members.len() > 1 || graph.contains_edge(nodes[members[0]], nodes[members[0]])
            })
            .collect();
        groups.sort_unstable_by_key(|members| members[0]);

        groups
            .into_iter()
            .map(|members| {
                members
                    .into_iter()
                    .filter_map(|index| self.modules.get_index(index).map(|(id, _)| id.clone()))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn record(id: &str, deps: &[&str], entry: &str) -> ModuleRecord {
        ModuleRecord::new(
            ModuleId::new(id),
            format!("/p/{}", id.trim_start_matches("./")),
            String::new(),
            deps.iter().map(|dep| ModuleId::new(*dep)).collect(),
            entry,
        )
    }

    #[test]
    fn test_register_preserves_discovery_order() {
        let mut graph = ModuleGraph::new();
        graph.register(record("./b.js", &[], "main"));
        graph.register(record("./a.js", &[], "main"));

        let ids: Vec<_> = graph.modules().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["./b.js", "./a.js"]);
        assert!(graph.is_in_progress(&ModuleId::new("./b.js")));

        graph.finish(&ModuleId::new("./b.js"));
        assert!(!graph.is_in_progress(&ModuleId::new("./b.js")));
    }

    #[test]
    fn test_claim_is_idempotent_and_transitive() {
        let mut graph = ModuleGraph::new();
        graph.register(record("./x.js", &["./y.js"], "a"));
        graph.register(record("./y.js", &["./z.js"], "a"));
        graph.register(record("./z.js", &[], "a"));

        graph.claim("b", &ModuleId::new("./x.js"));
        graph.claim("b", &ModuleId::new("./x.js"));

        for id in ["./x.js", "./y.js", "./z.js"] {
            let owners = &graph.get(&ModuleId::new(id)).unwrap().owning_entries;
            assert_eq!(owners, &vec!["a".to_owned(), "b".to_owned()], "{id}");
        }
    }

    #[test]
    fn test_claim_terminates_on_cycles() {
        let mut graph = ModuleGraph::new();
        graph.register(record("./a.js", &["./b.js"], "main"));
        graph.register(record("./b.js", &["./a.js"], "main"));

        graph.claim("other", &ModuleId::new("./b.js"));

        assert!(graph.get(&ModuleId::new("./a.js")).unwrap().is_owned_by("other"));
        assert!(graph.get(&ModuleId::new("./b.js")).unwrap().is_owned_by("other"));
    }

    #[test]
    fn test_circular_groups() {
        let mut graph = ModuleGraph::new();
        graph.register(record("./entry.js", &["./a.js", "./self.js"], "main"));
        graph.register(record("./a.js", &["./b.js"], "main"));
        graph.register(record("./b.js", &["./a.js"], "main"));
        graph.register(record("./self.js", &["./self.js"], "main"));

        assert_eq!(
            graph.circular_groups(),
            vec![
                vec![ModuleId::new("./a.js"), ModuleId::new("./b.js")],
                vec![ModuleId::new("./self.js")],
            ]
        );
    }

    #[test]
    fn test_acyclic_graph_has_no_circular_groups() {
        let mut graph = ModuleGraph::new();
        graph.register(record("./entry.js", &["./a.js"], "main"));
        graph.register(record("./a.js", &[], "main"));
        assert!(graph.circular_groups().is_empty());
    }
}
