//! # Intersect Audit — the append-only, hash-chained event log
//!
//! A single process-wide log with a tail hash pointer, matching
//! `spec.md` §4.B. Every decision boundary in the pipeline, authority
//! engine, and approval subsystem emits here. Writes serialize behind one
//! lock; reads are lock-free snapshots of the stored `Vec`.

#![forbid(unsafe_code)]

mod entry;
mod filter;
mod log;

pub use entry::{event_type, AuditEntry, NewAuditEntry};
pub use filter::AuditFilter;
pub use log::{AuditError, AuditLog, AuditResult, GENESIS_HASH};
