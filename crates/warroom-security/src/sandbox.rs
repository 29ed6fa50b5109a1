use std::path::{Component, Path, PathBuf};
use warroom_core::{WarroomError, WarroomResult};

/// Confines file names to a fixed root directory.
///
/// Names are relative to the root. Anything containing a `..` sequence,
/// starting with `/`, or carrying a drive/root prefix is rejected before it
/// ever reaches the filesystem.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    root: PathBuf,
}

impl WorkspaceGuard {
    /// Create a guard for `root`. The directory is not created here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `name` inside the root, or fail with [`WarroomError::Security`].
    pub fn resolve(&self, name: &str) -> WarroomResult<PathBuf> {
        if name.trim().is_empty() {
            return Err(WarroomError::Security("Empty file name".to_string()));
        }
        if name.contains("..") || name.starts_with('/') || name.starts_with('\\') {
            return Err(WarroomError::Security(format!(
                "Access to {name} is forbidden"
            )));
        }

        let relative = Path::new(name);
        let only_normal = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !only_normal {
            return Err(WarroomError::Security(format!(
                "Access to {name} is forbidden"
            )));
        }

        Ok(self.root.join(relative))
    }
}
