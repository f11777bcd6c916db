use std::{
    error::Error,
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
};

use log::trace;

use crate::{
    module_graph::ModuleId,
    util::{normalize_path, relative_path, to_unix_path},
};

/// A `require` request that matched no file under any probed extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedImport {
    /// The literal as written in the importing module
    pub request: String,
    /// Directory of the importing module
    pub context: PathBuf,
}

impl fmt::Display for UnresolvedImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Module not found: Can't resolve '{}' in '{}'",
            self.request,
            to_unix_path(&self.context.to_string_lossy())
        )
    }
}

impl Error for UnresolvedImport {}

/// Resolves `require` literals to files and files to canonical module ids
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    /// Project root every module id is relative to
    root: PathBuf,
    /// Extensions probed, in order, after the bare request
    extensions: Vec<String>,
}

impl ModuleResolver {
    pub fn new(root: impl AsRef<Path>, extensions: Vec<String>) -> Self {
        Self {
            root: normalize_path(root.as_ref()),
            extensions,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Resolve `request` relative to `importer_dir`.
    ///
    /// The joined path is tried unmodified first, then with each configured
    /// extension appended in declared order. The first regular file wins.
    pub fn resolve(&self, request: &str, importer_dir: &Path) -> Result<PathBuf, UnresolvedImport> {
        let base = normalize_path(&importer_dir.join(request));

        let bare = std::iter::once(base.clone());
        let with_extensions = self.extensions.iter().map(|extension| {
            let mut candidate = OsString::from(base.as_os_str());
            candidate.push(extension);
            PathBuf::from(candidate)
        });

        for candidate in bare.chain(with_extensions) {
            trace!("Probing {}", candidate.display());
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        Err(UnresolvedImport {
            request: request.to_owned(),
            context: importer_dir.to_path_buf(),
        })
    }

    /// Canonical id for the module at `path`
    pub fn module_id(&self, path: &Path) -> ModuleId {
        let relative = relative_path(&self.root, &normalize_path(path));
        ModuleId::new(format!("./{}", to_unix_path(&relative.to_string_lossy())))
    }
}
