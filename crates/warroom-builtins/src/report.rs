use crate::{str_arg, tool_error};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use warroom_core::{ToolCall, ToolResult, WarroomError, WarroomResult};
use warroom_security::{Capability, WorkspaceGuard};
use warroom_skills::{Skill, SkillDescriptor};

/// Where a remote sink stored a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteReceipt {
    /// Sink-assigned identifier.
    pub id: String,
    /// Link to the stored report.
    pub link: String,
}

/// A remote destination for published reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Durably store `content` under `name`.
    async fn upload(
        &self,
        name: &str,
        content: &str,
        metadata: Option<&serde_json::Value>,
    ) -> WarroomResult<RemoteReceipt>;
}

/// [`ReportSink`] that POSTs to `{endpoint}/v1/reports`.
pub struct HttpReportSink {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpReportSink {
    /// Sink against `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> WarroomResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| WarroomError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl ReportSink for HttpReportSink {
    async fn upload(
        &self,
        name: &str,
        content: &str,
        metadata: Option<&serde_json::Value>,
    ) -> WarroomResult<RemoteReceipt> {
        let response = self
            .client
            .post(format!("{}/v1/reports", self.endpoint))
            .json(&serde_json::json!({
                "name": name,
                "content": content,
                "metadata": metadata,
            }))
            .send()
            .await
            .map_err(|e| WarroomError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| WarroomError::Http(e.to_string()))?;

        response
            .json::<RemoteReceipt>()
            .await
            .map_err(|e| WarroomError::Report(format!("Malformed sink response: {e}")))
    }
}

/// Result of [`ReportPublisher::publish`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// Stored remotely; the local backup exists too.
    Remote {
        /// Sink identifier.
        id: String,
        /// Sink link.
        link: String,
        /// Local backup.
        local_path: PathBuf,
    },
    /// Only the local backup exists.
    LocalOnly {
        /// Why the remote sink wasn't used.
        reason: String,
        /// Local backup.
        local_path: PathBuf,
    },
}

impl PublishOutcome {
    /// The best locator: the remote link if there is one, the local path otherwise.
    pub fn locator(&self) -> String {
        match self {
            Self::Remote { link, .. } => link.clone(),
            Self::LocalOnly { local_path, .. } => local_path.display().to_string(),
        }
    }

    /// The local backup path.
    pub fn local_path(&self) -> &Path {
        match self {
            Self::Remote { local_path, .. } | Self::LocalOnly { local_path, .. } => local_path,
        }
    }
}

/// Publishes reports: local backup first, then the remote sink if any.
pub struct ReportPublisher {
    sync_dir: WorkspaceGuard,
    sink: Option<Arc<dyn ReportSink>>,
}

impl ReportPublisher {
    /// Publisher keeping backups in `sync_dir` (created if missing).
    pub fn new(sync_dir: impl Into<PathBuf>) -> WarroomResult<Self> {
        let sync_dir = sync_dir.into();
        std::fs::create_dir_all(&sync_dir)?;
        Ok(Self {
            sync_dir: WorkspaceGuard::new(sync_dir),
            sink: None,
        })
    }

    /// Also push reports to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Render the backup file body.
    pub fn render(content: &str, metadata: Option<&serde_json::Value>) -> WarroomResult<String> {
        match metadata {
            Some(meta) => Ok(format!(
                "--- METADATA ---\n{}\n----------------\n\n{content}",
                serde_json::to_string_pretty(meta)?
            )),
            None => Ok(content.to_string()),
        }
    }

    /// Persist `content` as `name`. Fails only if the local backup can't be written.
    pub async fn publish(
        &self,
        name: &str,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> WarroomResult<PublishOutcome> {
        let local_path = self.sync_dir.resolve(name)?;
        let body = Self::render(content, metadata.as_ref())?;
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                WarroomError::Report(format!("Could not create backup directory: {e}"))
            })?;
        }
        tokio::fs::write(&local_path, body)
            .await
            .map_err(|e| WarroomError::Report(format!("Could not write local backup: {e}")))?;
        info!(report = %name, path = %local_path.display(), "Report backed up locally");

        let Some(sink) = &self.sink else {
            return Ok(PublishOutcome::LocalOnly {
                reason: "no remote sink configured".to_string(),
                local_path,
            });
        };

        match sink.upload(name, content, metadata.as_ref()).await {
            Ok(receipt) => {
                info!(report = %name, id = %receipt.id, "Report uploaded");
                Ok(PublishOutcome::Remote {
                    id: receipt.id,
                    link: receipt.link,
                    local_path,
                })
            }
            Err(e) => {
                warn!(report = %name, error = %e, "Remote sink unreachable, keeping local copy");
                Ok(PublishOutcome::LocalOnly {
                    reason: e.to_string(),
                    local_path,
                })
            }
        }
    }
}

/// `upload_report`: publish a finished report.
pub struct UploadReportSkill {
    descriptor: SkillDescriptor,
    publisher: Arc<ReportPublisher>,
}

impl UploadReportSkill {
    /// Skill over `publisher`.
    pub fn new(publisher: Arc<ReportPublisher>) -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: "upload_report".to_string(),
                description: "Upload a finished report to the shared drive.".to_string(),
                parameters_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "filename": {"type": "string"},
                        "content": {"type": "string"},
                        "metadata": {"type": "object"}
                    },
                    "required": ["filename", "content"]
                }),
                required_capabilities: vec![Capability::ReportPublish],
            },
            publisher,
        }
    }
}

#[async_trait]
impl Skill for UploadReportSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> WarroomResult<ToolResult> {
        let (Some(filename), Some(content)) = (str_arg(&call, "filename"), str_arg(&call, "content"))
        else {
            return Ok(tool_error(&call, "Missing 'filename' or 'content'"));
        };
        let metadata = call
            .arguments
            .get("metadata")
            .filter(|m| m.is_object())
            .cloned();

        match self.publisher.publish(filename, content, metadata).await {
            Ok(PublishOutcome::Remote { link, .. }) => Ok(ToolResult::success(
                &call.id,
                format!("SUCCESS: Report uploaded ({link})"),
            )),
            Ok(outcome @ PublishOutcome::LocalOnly { .. }) => Ok(ToolResult::success(
                &call.id,
                format!(
                    "SUCCESS: Report saved locally at {} (remote upload skipped)",
                    outcome.locator()
                ),
            )),
            Err(e) => Ok(tool_error(
                &call,
                format!("FAILURE: Could not upload report: {e}"),
            )),
        }
    }
}
