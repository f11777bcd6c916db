//! Chunk assembly
//!
//! A chunk is one entry module plus every module that entry reaches. Chunks
//! are assembled after the whole graph is built; module order follows the
//! global discovery order of the build, not a per-entry traversal.

use crate::module_graph::{EntryRecord, ModuleGraph, ModuleId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Name of the entry this chunk is built for
    pub name: String,
    pub entry_module: ModuleId,
    /// Modules owned by the entry, in global discovery order
    pub modules: Vec<ModuleId>,
}

pub fn build_chunk(entry: &EntryRecord, graph: &ModuleGraph) -> Chunk {
    let modules = graph
        .modules()
        .filter(|record| record.is_owned_by(&entry.name))
        .map(|record| record.id.clone())
        .collect();

    Chunk {
        name: entry.name.clone(),
        entry_module: entry.module.clone(),
        modules,
    }
}
