//! Artifact writer
//!
//! Every run leaves its outputs under fixed names in one directory, so two
//! runs can be diffed file by file.

use crate::error::{io_error, AuditResult};
use crate::model::{Origin, SchemaSnapshot};
use crate::report::AuditReport;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DB_SNAPSHOT: &str = "db_architecture.json";
pub const DB_SNAPSHOT_COMPACT: &str = "db_architecture_compact.json";
pub const DECLARATION_SNAPSHOT: &str = "declaration_architecture.json";
pub const DECLARATION_SNAPSHOT_COMPACT: &str = "declaration_architecture_compact.json";
pub const REPORT_JSON: &str = "audit_report.json";
pub const REPORT_MARKDOWN: &str = "audit_report.md";
pub const CODEGEN_FRAGMENT: &str = "missing_columns_code.txt";
pub const CORRECTIVE_SQL: &str = "corrective.sql";

/// Writes run outputs into the output directory
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    /// Creates the output directory if needed
    pub fn create(output_dir: impl Into<PathBuf>) -> AuditResult<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|e| io_error(&output_dir, e))?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Indented and compact snapshot, named after the snapshot's source
    pub fn write_snapshot(&self, snapshot: &SchemaSnapshot) -> AuditResult<[PathBuf; 2]> {
        let (pretty, compact) = match snapshot.source {
            Origin::Database => (DB_SNAPSHOT, DB_SNAPSHOT_COMPACT),
            Origin::Declaration => (DECLARATION_SNAPSHOT, DECLARATION_SNAPSHOT_COMPACT),
        };
        Ok([
            self.write(pretty, &snapshot.to_pretty_json()?)?,
            self.write(compact, &snapshot.to_compact_json()?)?,
        ])
    }

    pub fn write_report(&self, report: &AuditReport) -> AuditResult<[PathBuf; 2]> {
        Ok([
            self.write(REPORT_JSON, &report.to_json()?)?,
            self.write(REPORT_MARKDOWN, &report.to_markdown())?,
        ])
    }

    pub fn write_codegen(&self, fragment: &str, sql: &str) -> AuditResult<[PathBuf; 2]> {
        Ok([
            self.write(CODEGEN_FRAGMENT, fragment)?,
            self.write(CORRECTIVE_SQL, sql)?,
        ])
    }

    fn write(&self, name: &str, contents: &str) -> AuditResult<PathBuf> {
        let path = self.output_dir.join(name);
        fs::write(&path, contents).map_err(|e| io_error(&path, e))?;
        debug!("💾 Wrote {} ({} bytes)", path.display(), contents.len());
        Ok(path)
    }
}
