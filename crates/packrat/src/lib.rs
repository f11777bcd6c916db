pub mod analyzers;
pub mod chunk;
pub mod code_generator;
pub mod compiler;
pub mod config;
pub mod graph_builder;
pub mod hooks;
pub mod loader;
pub mod module_graph;
pub mod resolver;
pub mod stats;
pub mod util;
pub mod visitors;

pub use compiler::{BundleOptions, Compiler, OutputOptions};
pub use stats::Stats;
