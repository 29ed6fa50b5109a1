use crate::{str_arg, tool_error};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::info;
use warroom_core::{ToolCall, ToolResult, WarroomResult};
use warroom_security::{Capability, WorkspaceGuard};
use warroom_skills::{Skill, SkillDescriptor};

/// Sandboxed file store rooted at a fixed directory.
///
/// Every name goes through a [`WorkspaceGuard`], so traversal sequences and
/// absolute paths never reach the filesystem.
#[derive(Debug, Clone)]
pub struct FileStore {
    guard: WorkspaceGuard,
}

impl FileStore {
    /// Open (and create if needed) the store at `root`.
    pub fn new(root: impl Into<PathBuf>) -> WarroomResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            guard: WorkspaceGuard::new(root),
        })
    }

    /// The sandbox root.
    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    /// Names of the entries directly under the root, sorted.
    pub async fn list_files(&self) -> WarroomResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(self.guard.root()).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Whether `name` exists inside the root.
    pub async fn exists(&self, name: &str) -> WarroomResult<bool> {
        let path = self.guard.resolve(name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    /// Read `name` as UTF-8.
    pub async fn read_file(&self, name: &str) -> WarroomResult<String> {
        let path = self.guard.resolve(name)?;
        Ok(tokio::fs::read_to_string(&path).await?)
    }

    /// Create or overwrite `name`.
    pub async fn write_file(&self, name: &str, content: &str) -> WarroomResult<PathBuf> {
        let path = self.guard.resolve(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        info!(file = %name, bytes = content.len(), "File written");
        Ok(path)
    }

    /// Append `content` plus a newline to `name`, creating it if missing.
    pub async fn append_to_log(&self, name: &str, content: &str) -> WarroomResult<()> {
        let path = self.guard.resolve(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(format!("{content}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn descriptor(
    name: &str,
    description: &str,
    parameters_schema: serde_json::Value,
    capability: Capability,
) -> SkillDescriptor {
    SkillDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        parameters_schema,
        required_capabilities: vec![capability],
    }
}

/// `list_files`: names in the workspace.
pub struct ListFilesSkill {
    descriptor: SkillDescriptor,
    store: Arc<FileStore>,
}

impl ListFilesSkill {
    /// Skill over `store`.
    pub fn new(store: Arc<FileStore>) -> Self {
        Self {
            descriptor: descriptor(
                "list_files",
                "List all files in the current workspace.",
                serde_json::json!({"type": "object", "properties": {}}),
                Capability::WorkspaceRead,
            ),
            store,
        }
    }
}

#[async_trait]
impl Skill for ListFilesSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> WarroomResult<ToolResult> {
        match self.store.list_files().await {
            Ok(names) => Ok(ToolResult::success(
                &call.id,
                serde_json::to_string(&names)?,
            )),
            Err(e) => Ok(tool_error(&call, format!("Error listing files: {e}"))),
        }
    }
}

/// `read_file`: full content of one workspace file.
pub struct ReadFileSkill {
    descriptor: SkillDescriptor,
    store: Arc<FileStore>,
}

impl ReadFileSkill {
    /// Skill over `store`.
    pub fn new(store: Arc<FileStore>) -> Self {
        Self {
            descriptor: descriptor(
                "read_file",
                "Read the content of a specific file in the workspace.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "filename": {"type": "string", "description": "File name relative to the workspace"}
                    },
                    "required": ["filename"]
                }),
                Capability::WorkspaceRead,
            ),
            store,
        }
    }
}

#[async_trait]
impl Skill for ReadFileSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> WarroomResult<ToolResult> {
        let Some(filename) = str_arg(&call, "filename") else {
            return Ok(tool_error(&call, "Missing 'filename'"));
        };

        match self.store.exists(filename).await {
            Ok(true) => {}
            Ok(false) => {
                return Ok(tool_error(&call, format!("File {filename} does not exist")));
            }
            Err(e) => return Ok(tool_error(&call, e.to_string())),
        }

        match self.store.read_file(filename).await {
            Ok(content) => Ok(ToolResult::success(&call.id, content)),
            Err(e) => Ok(tool_error(&call, format!("Error reading file: {e}"))),
        }
    }
}

/// `write_file`: create or overwrite a workspace file.
pub struct WriteFileSkill {
    descriptor: SkillDescriptor,
    store: Arc<FileStore>,
}

impl WriteFileSkill {
    /// Skill over `store`.
    pub fn new(store: Arc<FileStore>) -> Self {
        Self {
            descriptor: descriptor(
                "write_file",
                "Overwrite a file with new content. Use carefully.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "filename": {"type": "string"},
                        "content": {"type": "string"}
                    },
                    "required": ["filename", "content"]
                }),
                Capability::WorkspaceWrite,
            ),
            store,
        }
    }
}

#[async_trait]
impl Skill for WriteFileSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> WarroomResult<ToolResult> {
        let (Some(filename), Some(content)) = (str_arg(&call, "filename"), str_arg(&call, "content"))
        else {
            return Ok(tool_error(&call, "Missing 'filename' or 'content'"));
        };

        match self.store.write_file(filename, content).await {
            Ok(_) => Ok(ToolResult::success(
                &call.id,
                format!("Success: File {filename} created/overwritten."),
            )),
            Err(e) => Ok(tool_error(&call, format!("Error writing file: {e}"))),
        }
    }
}

/// `append_to_log`: append a line to a running log or tracker.
pub struct AppendToLogSkill {
    descriptor: SkillDescriptor,
    store: Arc<FileStore>,
}

impl AppendToLogSkill {
    /// Skill over `store`.
    pub fn new(store: Arc<FileStore>) -> Self {
        Self {
            descriptor: descriptor(
                "append_to_log",
                "Append text to a file. Useful for maintaining a running log or tracker.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "filename": {"type": "string"},
                        "content": {"type": "string"}
                    },
                    "required": ["filename", "content"]
                }),
                Capability::WorkspaceWrite,
            ),
            store,
        }
    }
}

#[async_trait]
impl Skill for AppendToLogSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> WarroomResult<ToolResult> {
        let (Some(filename), Some(content)) = (str_arg(&call, "filename"), str_arg(&call, "content"))
        else {
            return Ok(tool_error(&call, "Missing 'filename' or 'content'"));
        };

        match self.store.append_to_log(filename, content).await {
            Ok(()) => Ok(ToolResult::success(
                &call.id,
                format!("Success: Appended to {filename}."),
            )),
            Err(e) => Ok(tool_error(&call, format!("Error appending to file: {e}"))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, Arc<FileStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path().join("workspace")).unwrap());
        (dir, store)
    }

    #[tokio::test]
    async fn test_root_created_on_construction() {
        let (_dir, store) = store();
        assert!(store.root().is_dir());
        assert!(store.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_adds_newline() {
        let (_dir, store) = store();
        store.append_to_log("tracker.csv", "a, b").await.unwrap();
        store.append_to_log("tracker.csv", "c, d").await.unwrap();
        assert_eq!(store.read_file("tracker.csv").await.unwrap(), "a, b\nc, d\n");
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let (_dir, store) = store();
        store.write_file("po.md", "draft").await.unwrap();
        store.write_file("po.md", "final").await.unwrap();
        assert_eq!(store.read_file("po.md").await.unwrap(), "final");
        assert_eq!(store.list_files().await.unwrap(), vec!["po.md"]);
    }

    #[tokio::test]
    async fn test_traversal_rejected_by_skill() {
        let (_dir, store) = store();
        let skill = WriteFileSkill::new(store);
        let call = ToolCall::new(
            "write_file",
            serde_json::json!({"filename": "../escape.txt", "content": "x"}),
        );
        let result = skill.execute(call).await.unwrap();
        assert!(result.is_error);
        assert!(result.content.contains("forbidden"));
    }

    #[tokio::test]
    async fn test_missing_file_message() {
        let (_dir, store) = store();
        let skill = ReadFileSkill::new(store);
        let call = ToolCall::new("read_file", serde_json::json!({"filename": "nope.md"}));
        let result = skill.execute(call).await.unwrap();
        assert!(result.is_error);
        assert_eq!(result.content, "File nope.md does not exist");
    }
}
