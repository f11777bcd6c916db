//! Source analyzers

pub mod dependency_analyzer;

pub use dependency_analyzer::{AnalyzedModule, DependencyAnalyzer};
