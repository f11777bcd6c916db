//! Module cache and loader function embedded in every bundle.
//!
//! The module object is cached before its body runs, so a cyclic require
//! receives the partially initialized exports instead of recursing.

pub(crate) const MODULE_REGISTRY: &str = "__webpack_modules__";

pub(crate) const LOADER: &str = r#"// The module cache
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
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visitors::RUNTIME_REQUIRE;

    #[test]
    fn test_loader_defines_the_rewritten_callee() {
        assert!(LOADER.contains(&format!("function {RUNTIME_REQUIRE}(moduleId)")));
        assert!(LOADER.contains("var __webpack_module_cache__ = {};"));
        assert!(LOADER.contains(&format!("{MODULE_REGISTRY}[moduleId](")));
    }
}
