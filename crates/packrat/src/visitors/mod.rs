//! AST visitors used during dependency analysis

pub mod require_rewriter;

pub use require_rewriter::{RUNTIME_REQUIRE, RequireRewriter};
