//! Logging infrastructure for OpenCafe
//!
//! Diagnostic logging goes through `tracing`; privileged actions are also
//! written to a JSONL audit trail.

pub mod audit;

pub use audit::{AuditAction, AuditEvent, AuditLogger, Outcome};
