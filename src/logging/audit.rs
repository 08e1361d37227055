//! Audit trail of privileged actions
//!
//! Events are appended to a JSONL file, one object per line. Without a
//! file configured the logger only forwards a summary to `tracing`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Audited actions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    AdminRegistered,
    AdminRenamed,
    AdminDeleted,
    TokenRotated,
    PointCreated,
    PointDeleted,
    StaffHired,
    StaffFired,
    InstanceFlashed,
    InstanceCopied,
    InstanceRestored,
    InstanceDeleted,
    CardIssued,
    PointsAccrued,
    PointsRetracted,
}

/// Whether the action went through
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub node_id: String,
    pub action: AuditAction,
    /// Id of the acting admin, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// What was acted on (admin id, point id, card hash prefix...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub outcome: Outcome,
}

impl AuditEvent {
    pub fn new(action: AuditAction, node_id: String) -> Self {
        Self {
            timestamp: Utc::now(),
            node_id,
            action,
            actor: None,
            target: None,
            outcome: Outcome::Success,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Appends audit events to a JSONL file
#[derive(Clone)]
pub struct AuditLogger {
    inner: Arc<Mutex<Option<BufWriter<File>>>>,
    node_id: String,
}

impl AuditLogger {
    pub fn new(node_id: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
            node_id,
        }
    }

    /// Start appending to `path`
    pub async fn init_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        *self.inner.lock().await = Some(BufWriter::new(file));

        info!("Audit logging initialized to {}", path.display());
        Ok(())
    }

    /// Event stamped with this node's id
    pub fn event(&self, action: AuditAction) -> AuditEvent {
        AuditEvent::new(action, self.node_id.clone())
    }

    pub async fn log(&self, event: AuditEvent) {
        info!(
            action = ?event.action,
            actor = event.actor.as_deref().unwrap_or("-"),
            target = event.target.as_deref().unwrap_or("-"),
            outcome = ?event.outcome,
            "audit"
        );

        let line = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize audit event: {}", e);
                return;
            }
        };

        let mut inner = self.inner.lock().await;
        if let Some(writer) = inner.as_mut() {
            if let Err(e) = writeln!(writer, "{}", line) {
                error!("Failed to write audit event: {}", e);
            }
            if let Err(e) = writer.flush() {
                error!("Failed to flush audit log: {}", e);
            }
        }
    }

    /// Record a successful action
    pub async fn success(&self, action: AuditAction, actor: &str, target: impl Into<String>) {
        self.log(self.event(action).with_actor(actor).with_target(target))
            .await;
    }

    /// Record a refused action
    pub async fn denied(&self, action: AuditAction, actor: &str, target: impl Into<String>) {
        self.log(
            self.event(action)
                .with_actor(actor)
                .with_target(target)
                .with_outcome(Outcome::Denied),
        )
        .await;
    }
}
