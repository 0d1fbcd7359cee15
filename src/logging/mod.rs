//! Structured logging and NDJSON audit records.

mod format;

pub use format::{AuditRecord, StructuredLogger};
