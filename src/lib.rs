//! SchemaFlow Audit - schema drift between a live catalog and its declarations
//!
//! Extracts the schema twice, once from the PostgreSQL catalog (reference) and
//! once from Drizzle `pgTable`/`pgEnum` declaration files read as plain text
//! (candidate), reconciles the two models and writes a report, snapshots and
//! reviewable corrective code. Nothing is ever applied to the database or to
//! the declaration files.

pub mod artifacts;
pub mod audit;
pub mod catalog;
pub mod codegen;
pub mod config;
pub mod declaration;
pub mod defaults;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod report;
pub mod types;

pub use audit::{run_audit, AuditOutcome};
pub use error::{AuditError, AuditResult};
