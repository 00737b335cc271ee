//! Decides which macros and declarations belong to the header being synthesized, as opposed to
//! the system headers and compiler built-ins it drags in.

use c_ast::Clang;
use clang_ast::Node;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

/// Pseudo-files the preprocessor reports for predefined and `-D` macros.
const PSEUDO_FILES: [&str; 4] = ["<built-in>", "<command line>", "<scratch space>", "<stdin>"];

/// Canonical path when `path` exists, otherwise an absolute path with `.` and `..` folded away.
pub fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

pub struct OriginFilter {
    header: PathBuf,
    include_dirs: Vec<PathBuf>,
    requested: HashSet<String>,
    cache: HashMap<String, bool>,
}

impl OriginFilter {
    pub fn new<'n>(
        header: &Path,
        include_dirs: &[PathBuf],
        requested: impl IntoIterator<Item = &'n str>,
    ) -> OriginFilter {
        OriginFilter {
            header: normalize(header),
            include_dirs: include_dirs.iter().map(|dir| normalize(dir)).collect(),
            requested: requested.into_iter().map(str::to_string).collect(),
            cache: HashMap::new(),
        }
    }

    /// True for the target header and anything under an include directory.
    pub fn allows_file(&mut self, file: &str) -> bool {
        if let Some(&allowed) = self.cache.get(file) {
            return allowed;
        }
        let allowed = !PSEUDO_FILES.contains(&file) && {
            let path = normalize(Path::new(file));
            path == self.header || self.include_dirs.iter().any(|dir| path.starts_with(dir))
        };
        self.cache.insert(file.to_string(), allowed);
        allowed
    }

    /// Macros the caller defined explicitly pass regardless of where they came from.
    pub fn allows_macro(&mut self, name: &str, file: &str) -> bool {
        self.requested.contains(name) || self.allows_file(file)
    }

    /// Declarations without a location are compiler-made and never pass.
    pub fn allows_node(&mut self, node: &Node<Clang>) -> bool {
        node.kind
            .origin()
            .is_some_and(|origin| self.allows_file(&origin.file))
    }
}
