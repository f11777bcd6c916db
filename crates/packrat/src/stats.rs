//! Build results handed back by [`Compiler::run`](crate::compiler::Compiler::run)

use std::{fmt::Write, path::PathBuf};

use indexmap::IndexMap;

use crate::{
    chunk::Chunk,
    module_graph::{EntryRecord, ModuleId, ModuleRecord},
};

#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// Entries in declared order
    pub entries: Vec<EntryRecord>,
    /// Every module of the build, in discovery order
    pub modules: Vec<ModuleRecord>,
    pub chunks: Vec<Chunk>,
    /// Output filename to bundle text
    pub assets: IndexMap<String, String>,
    /// Files written to disk
    pub files: Vec<PathBuf>,
    /// Groups of modules that import each other
    pub circular_groups: Vec<Vec<ModuleId>>,
}

impl Stats {
    pub fn module(&self, id: &str) -> Option<&ModuleRecord> {
        self.modules.iter().find(|module| module.id.as_str() == id)
    }

    pub fn chunk(&self, name: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|chunk| chunk.name == name)
    }

    /// Human readable overview, one asset per line
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} modules, {} chunks, {} assets",
            self.modules.len(),
            self.chunks.len(),
            self.assets.len()
        );
        for (filename, code) in &self.assets {
            let _ = write!(out, "\n  {filename} ({} bytes)", code.len());
        }
        for group in &self.circular_groups {
            let ids: Vec<_> = group.iter().map(ModuleId::as_str).collect();
            let _ = write!(out, "\n  circular: {}", ids.join(" -> "));
        }
        out
    }
}
