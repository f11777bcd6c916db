//! Dependency analysis for a single module
//!
//! Parses loader output, rewrites every static `require` call through
//! [`RequireRewriter`] and prints the mutated module back to source.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use log::debug;
use swc_core::{
    common::{FileName, SourceMap, comments::SingleThreadedComments, sync::Lrc},
    ecma::{
        ast::{EsVersion, Module},
        codegen::{Config as CodegenConfig, Emitter, text_writer::JsWriter},
        parser::{EsSyntax, Parser, StringInput, Syntax, lexer::Lexer},
        visit::VisitMutWith,
    },
};

use crate::{module_graph::ModuleId, resolver::ModuleResolver, visitors::RequireRewriter};

/// Result of analyzing one module
#[derive(Debug, Clone)]
pub struct AnalyzedModule {
    /// Source with every resolved `require` rewritten
    pub code: String,
    /// Every resolved dependency and the file it resolved to, in discovery
    /// order
    pub dependencies: IndexMap<ModuleId, PathBuf>,
}

#[derive(Debug)]
pub struct DependencyAnalyzer<'a> {
    resolver: &'a ModuleResolver,
}

impl<'a> DependencyAnalyzer<'a> {
    pub fn new(resolver: &'a ModuleResolver) -> Self {
        Self { resolver }
    }

    /// Analyze the loader output `source` of the module at `module_path`
    pub fn analyze(&self, module_path: &Path, source: &str) -> Result<AnalyzedModule> {
        let cm: Lrc<SourceMap> = Lrc::default();
        let comments = SingleThreadedComments::default();
        let mut module = parse_module(&cm, &comments, module_path, source)?;

        let context = module_path
            .parent()
            .ok_or_else(|| anyhow!("Module path {} has no parent directory", module_path.display()))?;
        let mut rewriter = RequireRewriter::new(self.resolver, context);
        module.visit_mut_with(&mut rewriter);
        if let Some(err) = rewriter.error {
            return Err(err.into());
        }

        debug!(
            "Found {} dependencies in {}",
            rewriter.dependencies.len(),
            module_path.display()
        );

        let code = print_module(&cm, &comments, &module)
            .with_context(|| format!("Failed to generate code for {}", module_path.display()))?;

        Ok(AnalyzedModule {
            code,
            dependencies: rewriter.dependencies,
        })
    }
}

pub(crate) fn parse_module(
    cm: &Lrc<SourceMap>,
    comments: &SingleThreadedComments,
    path: &Path,
    source: &str,
) -> Result<Module> {
    let fm = cm.new_source_file(FileName::Real(path.to_path_buf()).into(), source.to_owned());
    let lexer = Lexer::new(
        Syntax::Es(EsSyntax::default()),
        EsVersion::latest(),
        StringInput::from(&*fm),
        Some(comments),
    );
    let mut parser = Parser::new_from(lexer);

    let parsed = parser.parse_module();
    let recovered = parser.take_errors().into_iter().next();
    let err = match (parsed, recovered) {
        (Ok(module), None) => return Ok(module),
        (Ok(_), Some(err)) | (Err(err), _) => err,
    };

    let loc = cm.lookup_char_pos(err.span().lo);
    Err(anyhow!(
        "Failed to parse {}:{}:{}: {}",
        path.display(),
        loc.line,
        loc.col_display + 1,
        err.kind().msg()
    ))
}

fn print_module(
    cm: &Lrc<SourceMap>,
    comments: &SingleThreadedComments,
    module: &Module,
) -> Result<String> {
    let mut buf = Vec::new();
    {
        let mut emitter = Emitter {
            cfg: CodegenConfig::default().with_target(EsVersion::latest()),
            cm: cm.clone(),
            comments: Some(comments),
            wr: JsWriter::new(cm.clone(), "\n", &mut buf, None),
        };
        emitter.emit_module(module)?;
    }
    Ok(String::from_utf8(buf)?)
}
