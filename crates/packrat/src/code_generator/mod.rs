//! Bundle code generation
//!
//! Renders a chunk into a single self-contained script:
//!
//! ```text
//! (() => {
//! var __webpack_modules__ = { "<id>": (module, exports, __webpack_require__) => { ... }, ... };
//! <module cache + __webpack_require__>
//! (() => { <entry module> })();
//! })();
//! ```
//!
//! An entry that another module of its chunk requires (a cycle back into the
//! entry) is registered like any other module and started through
//! `__webpack_require__`, so the cache hands out its partial exports.
//!
//! Module sources are emitted verbatim, without re-indentation, so template
//! literals spanning several lines keep their contents.

mod runtime;

use std::fmt::Write;

use anyhow::{Result, anyhow};

use crate::{
    chunk::Chunk,
    module_graph::{ModuleGraph, ModuleId, ModuleRecord},
    util::js_string_literal,
    visitors::RUNTIME_REQUIRE,
};

/// Render `chunk` into bundle text.
///
/// Every chunk module except the entry goes into the registry; the entry runs
/// last, in its own function scope. An entry required from inside its own
/// chunk is registered too and started through the loader instead.
pub fn render_chunk(chunk: &Chunk, graph: &ModuleGraph) -> Result<String> {
    let entry = lookup(graph, chunk, &chunk.entry_module)?;
    let entry_is_required = chunk_requires_entry(chunk, graph)?;

    let mut code = String::new();
    code.push_str("(() => {\n");

    let _ = writeln!(code, "var {} = {{", runtime::MODULE_REGISTRY);
    for id in &chunk.modules {
        if *id == chunk.entry_module && !entry_is_required {
            continue;
        }
        render_registry_entry(&mut code, lookup(graph, chunk, id)?);
    }
    code.push_str("};\n");

    code.push_str(runtime::LOADER);

    code.push_str("// The entry module is isolated from the runtime above\n");
    code.push_str("(() => {\n");
    if entry_is_required {
        let _ = writeln!(
            code,
            "{RUNTIME_REQUIRE}({});",
            js_string_literal(entry.id.as_str())
        );
    } else {
        push_source(&mut code, &entry.source);
    }
    code.push_str("})();\n");

    code.push_str("})();\n");
    Ok(code)
}

/// Whether any module of the chunk, the entry included, requires the entry
fn chunk_requires_entry(chunk: &Chunk, graph: &ModuleGraph) -> Result<bool> {
    for id in &chunk.modules {
        if lookup(graph, chunk, id)?
            .dependencies
            .contains(&chunk.entry_module)
        {
            return Ok(true);
        }
    }
    Ok(false)
}

fn lookup<'g>(graph: &'g ModuleGraph, chunk: &Chunk, id: &ModuleId) -> Result<&'g ModuleRecord> {
    graph
        .get(id)
        .ok_or_else(|| anyhow!("Module {id} of chunk '{}' not found in graph", chunk.name))
}

fn render_registry_entry(code: &mut String, module: &ModuleRecord) {
    let _ = writeln!(
        code,
        "{}: (module, exports, {RUNTIME_REQUIRE}) => {{",
        js_string_literal(module.id.as_str())
    );
    push_source(code, &module.source);
    code.push_str("},\n");
}

fn push_source(code: &mut String, source: &str) {
    code.push_str(source);
    if !source.is_empty() && !source.ends_with('\n') {
        code.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use indexmap::IndexSet;
    use swc_core::common::{SourceMap, comments::SingleThreadedComments, sync::Lrc};

    use super::*;
    use crate::analyzers::dependency_analyzer::parse_module;

    fn module(graph: &mut ModuleGraph, id: &str, source: &str, deps: &[&str]) {
        graph.register(ModuleRecord::new(
            ModuleId::new(id),
            PathBuf::from("/p").join(id),
            source.to_owned(),
            deps.iter().map(|dep| ModuleId::new(*dep)).collect::<IndexSet<_>>(),
            "main",
        ));
    }

    fn chunk(entry: &str, modules: &[&str]) -> Chunk {
        Chunk {
            name: "main".to_owned(),
            entry_module: ModuleId::new(entry),
            modules: modules.iter().map(|id| ModuleId::new(*id)).collect(),
        }
    }

    fn assert_parses(code: &str) {
        let cm: Lrc<SourceMap> = Lrc::default();
        let comments = SingleThreadedComments::default();
        if let Err(err) = parse_module(&cm, &comments, &PathBuf::from("/p/bundle.js"), code) {
            panic!("bundle does not parse: {err}\n{code}");
        }
    }

    #[test]
    fn test_render_chunk() {
        let mut graph = ModuleGraph::new();
        module(
            &mut graph,
            "./a.js",
            "const b = __webpack_require__(\"./b.js\");\nconsole.log(b.x);\n",
            &["./b.js"],
        );
        module(&mut graph, "./b.js", "module.exports = {\n    x: 1\n};", &[]);

        let code = render_chunk(&chunk("./a.js", &["./a.js", "./b.js"]), &graph).unwrap();

        insta::assert_snapshot!(code, @r#"
(() => {
var __webpack_modules__ = {
"./b.js": (module, exports, __webpack_require__) => {
module.exports = {
    x: 1
};
},
};
// The module cache
var __webpack_module_cache__ = {};
// The require function
function __webpack_require__(moduleId) {
  // Check if module is in cache
  var cachedModule = __webpack_module_cache__[moduleId];
  if (cachedModule !== undefined) {
    return cachedModule.exports;
  }
  // Create a new module (and put it into the cache)
  var module = (__webpack_module_cache__[moduleId] = {
    exports: {},
  });
  // Execute the module function
  __webpack_modules__[moduleId](module, module.exports, __webpack_require__);
  return module.exports;
}
// The entry module is isolated from the runtime above
(() => {
const b = __webpack_require__("./b.js");
console.log(b.x);
})();
})();
"#);
        assert_parses(&code);
    }

    #[test]
    fn test_lone_entry_has_empty_registry() {
        let mut graph = ModuleGraph::new();
        module(&mut graph, "./index.js", "console.log('hi');", &[]);

        let code = render_chunk(&chunk("./index.js", &["./index.js"]), &graph).unwrap();

        assert!(code.contains("var __webpack_modules__ = {\n};\n"), "{code}");
        assert_eq!(code.matches("console.log('hi');").count(), 1);
        assert_parses(&code);
    }

    #[test]
    fn test_module_ids_are_escaped() {
        let mut graph = ModuleGraph::new();
        module(&mut graph, "./index.js", "", &[]);
        module(&mut graph, "./we\"ird.js", "", &[]);

        let code = render_chunk(&chunk("./index.js", &["./index.js", "./we\"ird.js"]), &graph)
            .unwrap();

        assert!(code.contains(r#""./we\"ird.js": (module"#), "{code}");
        assert_parses(&code);
    }

    #[test]
    fn test_trailing_line_comment_does_not_swallow_wrapper() {
        let mut graph = ModuleGraph::new();
        module(&mut graph, "./index.js", "run(); // done", &[]);
        module(&mut graph, "./dep.js", "exports.x = 1; // tail", &[]);

        let code = render_chunk(&chunk("./index.js", &["./index.js", "./dep.js"]), &graph).unwrap();
        assert_parses(&code);
    }

    #[test]
    fn test_entry_required_by_its_chunk_is_registered() {
        let mut graph = ModuleGraph::new();
        module(
            &mut graph,
            "./index.js",
            "exports.name = 'entry';\nconsole.log(__webpack_require__(\"./a.js\").seen);",
            &["./a.js"],
        );
        module(
            &mut graph,
            "./a.js",
            "exports.seen = __webpack_require__(\"./index.js\").name;",
            &["./index.js"],
        );

        let code = render_chunk(&chunk("./index.js", &["./index.js", "./a.js"]), &graph).unwrap();

        assert!(code.contains(r#""./index.js": (module, exports, __webpack_require__) => {"#), "{code}");
        assert!(code.contains(r#""./a.js": (module, exports, __webpack_require__) => {"#), "{code}");
        assert!(
            code.ends_with("(() => {\n__webpack_require__(\"./index.js\");\n})();\n})();\n"),
            "{code}"
        );
        assert_eq!(code.matches("exports.name = 'entry';").count(), 1);
        assert_parses(&code);
    }

    #[test]
    fn test_self_requiring_entry_is_registered() {
        let mut graph = ModuleGraph::new();
        module(
            &mut graph,
            "./index.js",
            "module.exports = __webpack_require__(\"./index.js\");",
            &["./index.js"],
        );

        let code = render_chunk(&chunk("./index.js", &["./index.js"]), &graph).unwrap();
        assert!(code.contains(r#""./index.js": (module"#), "{code}");
        assert_parses(&code);
    }

    #[test]
    fn test_missing_module_is_an_error() {
        let graph = ModuleGraph::new();
        let err = render_chunk(&chunk("./index.js", &["./index.js"]), &graph).unwrap_err();
        assert!(err.to_string().contains("./index.js"));
    }
}
