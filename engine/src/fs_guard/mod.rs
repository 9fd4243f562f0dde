use sdk::errors::EngineError;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// PathGuard confines every filesystem tool to the project root.
///
/// Resolution is lexical: the user-supplied path is joined onto the root and
/// `.` components are folded without touching the disk, so paths that do
/// not exist yet (e.g. for `Write`) can be validated too.
///
/// # Platform-Specific Path Handling
///
/// This module uses Rust's `std::path::Path` and `PathBuf` types, which
/// handle platform-specific path separators. The root itself is canonicalized
/// once at construction so symlinked roots (`/var -> /private/var` on macOS)
/// compare correctly.
///
/// # Validation
///
/// 1. Reject absolute inputs
/// 2. Reject inputs with a `..` segment anywhere
/// 3. Join onto the root and normalize lexically
/// 4. Verify the result still starts with the root
///
/// No decision is cached: every call re-validates.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Creates a new PathGuard rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::PathCanonicalization` if the root does not exist
    /// or is inaccessible.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, EngineError> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|e| EngineError::PathCanonicalization(root.to_path_buf(), e.to_string()))?;
        Ok(Self { root })
    }

    /// Resolves a project-relative path to an absolute path inside the root.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::PathTraversal` if the input is absolute, has a
    /// `..` segment anywhere, or normalizes to a location outside the root.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use delve_engine::fs_guard::PathGuard;
    ///
    /// let guard = PathGuard::new("/home/user/project").unwrap();
    ///
    /// assert!(guard.resolve("src/main.rs").is_ok());
    /// assert!(guard.resolve("../.ssh/id_rsa").is_err());
    /// assert!(guard.resolve("/etc/passwd").is_err());
    /// ```
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, EngineError> {
        let input = Path::new(relative);

        if input.has_root() || input.is_absolute() {
            return Err(self.traversal(relative, input.to_path_buf()));
        }

        if input.components().any(|c| c == Component::ParentDir) {
            return Err(self.traversal(relative, normalize(&self.root.join(input))));
        }

        let resolved = normalize(&self.root.join(input));
        if !resolved.starts_with(&self.root) {
            return Err(self.traversal(relative, resolved));
        }

        Ok(resolved)
    }

    /// Returns a reference to the project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Renders an absolute path inside the root as a `/`-separated relative path.
    pub fn relative_display(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            ".".to_string()
        } else {
            parts.join("/")
        }
    }

    fn traversal(&self, input: &str, resolved: PathBuf) -> EngineError {
        warn!("Rejected path outside project root: {}", input);
        EngineError::PathTraversal {
            input: input.to_string(),
            resolved,
            root: self.root.clone(),
        }
    }
}

/// Folds `.` and `..` components without consulting the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_valid_path_within_root() {
        let temp = TempDir::new().unwrap();
        let guard = PathGuard::new(temp.path()).unwrap();

        fs::write(temp.path().join("file.txt"), "test").unwrap();

        let result = guard.resolve("file.txt").unwrap();
        assert_eq!(result, temp.path().canonicalize().unwrap().join("file.txt"));
    }

    #[test]
    fn test_nonexistent_path_is_resolved() {
        let temp = TempDir::new().unwrap();
        let guard = PathGuard::new(temp.path()).unwrap();

        let result = guard.resolve("new/dir/file.txt").unwrap();
        assert!(result.starts_with(guard.root()));
        assert!(result.ends_with("new/dir/file.txt"));
    }

    #[test]
    fn test_absolute_path_rejected() {
        let temp = TempDir::new().unwrap();
        let guard = PathGuard::new(temp.path()).unwrap();

        let result = guard.resolve("/etc/passwd");
        assert!(matches!(
            result.unwrap_err(),
            EngineError::PathTraversal { .. }
        ));
    }

    #[test]
    fn test_leading_parent_rejected() {
        let temp = TempDir::new().unwrap();
        let guard = PathGuard::new(temp.path()).unwrap();

        let err = guard.resolve("../secret.txt").unwrap_err();
        assert!(err.to_string().starts_with("Path traversal detected: ../secret.txt"));
    }

    #[test]
    fn test_embedded_escape_rejected() {
        let temp = TempDir::new().unwrap();
        let guard = PathGuard::new(temp.path()).unwrap();

        let result = guard.resolve("src/../../outside.txt");
        assert!(matches!(
            result.unwrap_err(),
            EngineError::PathTraversal { .. }
        ));
    }

    #[test]
    fn test_inner_parent_rejected_even_when_inside() {
        let temp = TempDir::new().unwrap();
        let guard = PathGuard::new(temp.path()).unwrap();

        for path in ["src/../README.md", "./src/..", "a/b/../../c"] {
            assert!(matches!(
                guard.resolve(path).unwrap_err(),
                EngineError::PathTraversal { .. }
            ));
        }
        assert_eq!(
            guard.resolve("./src/./main.rs").unwrap(),
            guard.root().join("src").join("main.rs")
        );
    }

    #[test]
    fn test_dot_resolves_to_root() {
        let temp = TempDir::new().unwrap();
        let guard = PathGuard::new(temp.path()).unwrap();

        assert_eq!(guard.resolve(".").unwrap(), guard.root());
        assert_eq!(guard.relative_display(guard.root()), ".");
    }

    #[test]
    fn test_missing_root_fails() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        assert!(matches!(
            PathGuard::new(&missing).unwrap_err(),
            EngineError::PathCanonicalization(_, _)
        ));
    }
}
