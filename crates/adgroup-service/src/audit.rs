//! Audit trail for directory group mutations.
//!
//! Records are handed to an [`AuditSink`] once the change has been committed.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use adgroup_db::model::ad_group::AdGroup;

pub const AD_GROUP_RESOURCE: &str = "ad_group";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Add,
    Update,
    Delete,
}

/// State of a group as seen by the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    pub id: uuid::Uuid,
    pub name: String,
    pub user_type: String,
    pub members: Vec<uuid::Uuid>,
}

impl GroupSnapshot {
    #[must_use]
    pub fn new(group: &AdGroup, members: impl IntoIterator<Item = uuid::Uuid>) -> Self {
        let mut members: Vec<_> = members.into_iter().collect();
        members.sort_unstable();
        Self {
            id: group.id,
            name: group.name.clone(),
            user_type: group.user_type.as_str().to_string(),
            members,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub resource: &'static str,
    pub resource_id: uuid::Uuid,
    pub request_id: uuid::Uuid,
    pub principal_id: uuid::Uuid,
    pub before: Option<GroupSnapshot>,
    pub after: Option<GroupSnapshot>,
}

/// Append-only destination for audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

impl<T: AuditSink + ?Sized> AuditSink for Arc<T> {
    fn record(&self, record: AuditRecord) {
        (**self).record(record);
    }
}

/// Writes audit records as JSON to the `audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        match serde_json::to_string(&record) {
            Ok(json) => tracing::info!(
                target: "audit",
                action = ?record.action,
                resource = record.resource,
                resource_id = %record.resource_id,
                request_id = %record.request_id,
                principal_id = %record.principal_id,
                record = %json,
                "Audit record"
            ),
            Err(e) => tracing::error!(
                target: "audit",
                resource_id = %record.resource_id,
                error = %e,
                "Failed to serialize audit record"
            ),
        }
    }
}

/// Keeps audit records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the records collected so far.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditRecord>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                self.records.clear_poison();
                poisoned.into_inner()
            }
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        self.lock().push(record);
    }
}
