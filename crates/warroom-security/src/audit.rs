use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// One audited agent action.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// When the action happened.
    pub timestamp: DateTime<Utc>,
    /// The pipeline run the action belongs to.
    pub run_id: Uuid,
    /// The agent that performed the action.
    pub agent: String,
    /// Action kind (`tool_call`, `tool_result`, `tool_error`, `agent_response`).
    pub action: String,
    /// Skill involved, if any.
    pub skill_name: Option<String>,
    /// Free-form details.
    pub details: serde_json::Value,
    /// How the action ended.
    pub outcome: AuditOutcome,
}

/// Outcome of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    /// The action succeeded.
    Success,
    /// The action was refused for lack of a capability.
    Denied,
    /// The action failed.
    Error,
}

/// Append-only audit log that records all agent actions.
///
/// Entries are handed to a background writer over a channel and appended to
/// `audit.jsonl` in the log directory.
pub struct AuditLog {
    tx: mpsc::UnboundedSender<AuditEntry>,
    writer: JoinHandle<()>,
}

impl AuditLog {
    /// Create a new AuditLog. Spawns a background task that writes entries to disk.
    pub fn new(log_dir: PathBuf) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AuditEntry>();

        let writer = tokio::spawn(async move {
            if let Err(e) = tokio::fs::create_dir_all(&log_dir).await {
                warn!(dir = %log_dir.display(), error = %e, "Cannot create audit directory");
                return;
            }
            let log_file = log_dir.join("audit.jsonl");
            let mut file = match tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
                .await
            {
                Ok(f) => f,
                Err(e) => {
                    warn!(file = %log_file.display(), error = %e, "Cannot open audit log");
                    return;
                }
            };

            while let Some(entry) = rx.recv().await {
                let Ok(line) = serde_json::to_string(&entry) else {
                    continue;
                };
                if let Err(e) = file.write_all(format!("{line}\n").as_bytes()).await {
                    warn!(error = %e, "Audit write failed");
                }
            }
            let _ = file.flush().await;
        });

        Self { tx, writer }
    }

    /// Record an entry.
    pub fn log(&self, entry: AuditEntry) {
        info!(
            run_id = %entry.run_id,
            agent = %entry.agent,
            action = %entry.action,
            outcome = ?entry.outcome,
            "audit"
        );
        let _ = self.tx.send(entry);
    }

    /// Record an action with the current timestamp.
    pub fn log_action(
        &self,
        run_id: Uuid,
        agent: &str,
        action: impl Into<String>,
        skill_name: Option<String>,
        details: serde_json::Value,
        outcome: AuditOutcome,
    ) {
        self.log(AuditEntry {
            timestamp: Utc::now(),
            run_id,
            agent: agent.to_string(),
            action: action.into(),
            skill_name,
            details,
            outcome,
        });
    }

    /// Stop accepting entries and wait until everything queued is on disk.
    pub async fn close(self) {
        drop(self.tx);
        let _ = self.writer.await;
    }
}
