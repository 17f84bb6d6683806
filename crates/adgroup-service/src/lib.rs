//! Directory group administration: membership reconciliation, the permission
//! gate and the group CRUD service, over a pluggable transactional store.
//!
//! ## Module Organization
//!
//! - `audit`: audit records and sinks
//! - `error`: service error taxonomy
//! - `group`: the group CRUD service and its request types
//! - `permission`: read/write permission checks for principals
//! - `reconcile`: membership delta computation and orphan detection
//! - `store`: storage traits with `PostgreSQL` and in-memory implementations

pub mod audit;
pub mod error;
pub mod group;
pub mod permission;
pub mod reconcile;
pub mod store;

pub use audit::{AuditAction, AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use group::{CreateGroup, GroupPolicy, GroupQuery, GroupService, GroupView, UpdateGroup};
pub use store::{GroupRepo, GroupStore, memory::MemoryStore};
