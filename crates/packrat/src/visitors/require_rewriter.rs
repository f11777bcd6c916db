//! Visitor that finds synchronous `require(...)` call sites and points them at
//! the bundle runtime.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{trace, warn};
use swc_core::{
    common::{DUMMY_SP, SyntaxContext},
    ecma::{
        ast::{CallExpr, Callee, Expr, ExprOrSpread, Ident, Lit, Str},
        visit::{VisitMut, VisitMutWith},
    },
};

use crate::{
    module_graph::ModuleId,
    resolver::{ModuleResolver, UnresolvedImport},
    util::js_string_literal,
};

/// Name of the loader function every bundle defines
pub const RUNTIME_REQUIRE: &str = "__webpack_require__";

const REQUIRE: &str = "require";

/// Rewrites `require('./x')` into `__webpack_require__('./x.js')`, collecting
/// each resolved dependency on the way.
///
/// Call sites are visited in pre-order, so an outer `require` is resolved
/// before any `require` nested in its arguments. Resolution stops at the first
/// failure, which is kept in `error`.
#[derive(Debug)]
pub struct RequireRewriter<'a> {
    resolver: &'a ModuleResolver,
    /// Directory of the module being rewritten
    context: &'a Path,
    /// Resolved dependencies in discovery order
    pub dependencies: IndexMap<ModuleId, PathBuf>,
    pub error: Option<UnresolvedImport>,
}

impl<'a> RequireRewriter<'a> {
    pub fn new(resolver: &'a ModuleResolver, context: &'a Path) -> Self {
        Self {
            resolver,
            context,
            dependencies: IndexMap::new(),
            error: None,
        }
    }

    fn rewrite(&mut self, call: &mut CallExpr) {
        if !is_require_call(call) {
            return;
        }

        let Some(request) = call.args.first().and_then(static_request) else {
            warn!(
                "Skipping require() with a non-literal argument in {}",
                self.context.display()
            );
            return;
        };

        let resolved = match self.resolver.resolve(&request, self.context) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.error = Some(err);
                return;
            }
        };
        let id = self.resolver.module_id(&resolved);
        trace!("Rewriting require('{request}') to {RUNTIME_REQUIRE}('{id}')");

        call.callee = Callee::Expr(Box::new(Expr::Ident(Ident::new(
            RUNTIME_REQUIRE.into(),
            DUMMY_SP,
            SyntaxContext::empty(),
        ))));
        call.args = vec![ExprOrSpread {
            spread: None,
            expr: Box::new(Expr::Lit(Lit::Str(Str {
                span: DUMMY_SP,
                value: id.as_str().into(),
                raw: Some(js_string_literal(id.as_str()).into()),
            }))),
        }];

        self.dependencies.entry(id).or_insert(resolved);
    }
}

impl VisitMut for RequireRewriter<'_> {
    fn visit_mut_call_expr(&mut self, call: &mut CallExpr) {
        if self.error.is_some() {
            return;
        }
        self.rewrite(call);
        call.visit_mut_children_with(self);
    }
}

fn is_require_call(call: &CallExpr) -> bool {
    match &call.callee {
        Callee::Expr(callee) => {
            matches!(&**callee, Expr::Ident(ident) if ident.sym.as_ref() == REQUIRE)
        }
        _ => false,
    }
}

/// The request string of a `require` argument, if it is known statically
fn static_request(arg: &ExprOrSpread) -> Option<String> {
    if arg.spread.is_some() {
        return None;
    }
    match &*arg.expr {
        Expr::Lit(Lit::Str(literal)) => Some(literal.value.to_string()),
        Expr::Tpl(template) if template.exprs.is_empty() => template
            .quasis
            .first()
            .and_then(|quasi| quasi.cooked.as_ref())
            .map(ToString::to_string),
        _ => None,
    }
}
