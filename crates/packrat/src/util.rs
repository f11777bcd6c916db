//! Path and string helpers shared by the resolver, loaders and code generator.

use std::{
    borrow::Cow,
    fmt::Write,
    path::{Component, Path, PathBuf},
};

use cow_utils::CowUtils;

/// Normalize path separators to forward slashes.
///
/// Module ids are compared as strings, so every path that ends up in an id or
/// is matched by a loader rule goes through here first.
pub fn to_unix_path(path: &str) -> Cow<'_, str> {
    path.cow_replace('\\', "/")
}

/// Lexically normalize a path, resolving `.` and `..` without touching the
/// filesystem.
///
/// `..` at the root of an absolute path is dropped, mirroring how
/// `path.join` behaves in Node. Leading `..` of relative paths is kept.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                Some(Component::ParentDir | Component::CurDir) | None => normalized.push(".."),
            },
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Compute `target` relative to `base`. Both paths are expected to be
/// absolute and normalized.
pub fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let base_components: Vec<_> = base.components().collect();
    let target_components: Vec<_> = target.components().collect();

    let common = base_components
        .iter()
        .zip(&target_components)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_components.len() {
        relative.push("..");
    }
    for component in &target_components[common..] {
        relative.push(component.as_os_str());
    }
    relative
}

/// Render `value` as a double-quoted JavaScript string literal.
pub fn js_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_to_unix_path() {
        assert_eq!(to_unix_path("src\\lib\\a.js"), "src/lib/a.js");
        assert!(matches!(to_unix_path("src/a.js"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/p/src/./lib/../b.js")),
            PathBuf::from("/p/src/b.js")
        );
        assert_eq!(normalize_path(Path::new("/../a.js")), PathBuf::from("/a.js"));
        assert_eq!(
            normalize_path(Path::new("../../a/./b")),
            PathBuf::from("../../a/b")
        );
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/p"), Path::new("/p/src/b.js")),
            PathBuf::from("src/b.js")
        );
        assert_eq!(
            relative_path(Path::new("/p/app"), Path::new("/p/shared/x.js")),
            PathBuf::from("../shared/x.js")
        );
        assert_eq!(relative_path(Path::new("/p"), Path::new("/p")), PathBuf::new());
    }

    #[test]
    fn test_js_string_literal() {
        assert_eq!(js_string_literal("./src/a.js"), r#""./src/a.js""#);
        assert_eq!(js_string_literal("a\"b\\c\nd"), r#""a\"b\\c\nd""#);
        assert_eq!(js_string_literal("\u{1}"), r#""\u0001""#);
    }
}
