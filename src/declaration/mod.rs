//! Declaration-side model extraction
//!
//! Recovers the schema declared in ORM source files without executing them.
//! Each file is read into its own [`ModelBuilder`]; the builders are merged
//! afterwards and [`ModelBuilder::finish`] resolves identifiers across files.

pub mod lexer;
pub mod reader;

pub use reader::{read_source, ReadScope};

use crate::error::{io_error, AuditResult};
use crate::model::{FileFailure, ModelBuilder, Origin, SchemaModel};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Scans a schema directory for declaration files
pub struct DeclarationExtractor {
    schema_dir: PathBuf,
    enum_file: Option<PathBuf>,
}

impl DeclarationExtractor {
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            enum_file: None,
        }
    }

    /// Restrict enum collection to a single file
    pub fn with_enum_file(mut self, enum_file: Option<PathBuf>) -> Self {
        self.enum_file = enum_file;
        self
    }

    /// `*.ts` files of the schema directory, `index.ts` excluded, sorted
    pub fn source_files(&self) -> AuditResult<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.schema_dir).map_err(|e| io_error(&self.schema_dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error(&self.schema_dir, e))?.path();
            let is_source = path.is_file()
                && path.extension().is_some_and(|ext| ext == "ts")
                && path.file_name().is_some_and(|name| name != "index.ts");
            if is_source {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn extract(&self) -> AuditResult<SchemaModel> {
        info!(
            "🔍 Reading declarations from {}...",
            self.schema_dir.display()
        );

        let files = self.source_files()?;
        let enum_file = self.enum_file.as_ref().map(|f| self.resolve(f));

        let mut merged = ModelBuilder::new(Origin::Declaration);
        for path in &files {
            let scope = match &enum_file {
                Some(enum_file) if enum_file != path => ReadScope::WITHOUT_ENUMS,
                _ => ReadScope::ALL,
            };
            merged = merged.merge(self.read_file(path, scope));
        }

        if let Some(enum_file) = enum_file.filter(|f| !files.contains(f)) {
            merged = merged.merge(self.read_file(&enum_file, ReadScope::ENUMS_ONLY));
        }

        let model = merged.finish();
        let stats = model.statistics();
        info!(
            "✅ Declarations extracted from {} files: {} tables, {} columns, {} enums, {} relations",
            files.len(),
            stats.total_tables,
            stats.total_columns,
            stats.total_enums,
            stats.total_relations
        );
        if !model.diagnostics.unparsed.is_empty() || !model.diagnostics.file_failures.is_empty() {
            warn!(
                "⚠️  {} unparsed declarations, {} unreadable files",
                model.diagnostics.unparsed.len(),
                model.diagnostics.file_failures.len()
            );
        }

        Ok(model)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        let joined = self.schema_dir.join(path);
        if joined.exists() {
            joined
        } else {
            path.to_path_buf()
        }
    }

    /// Read one file. A read failure is recorded and yields an empty builder.
    fn read_file(&self, path: &Path, scope: ReadScope) -> ModelBuilder {
        let shown = path
            .strip_prefix(&self.schema_dir)
            .unwrap_or(path)
            .to_path_buf();

        match fs::read_to_string(path) {
            Ok(source) => {
                let builder = read_source(&source, &shown, scope);
                debug!("📄 {}: {} tables", shown.display(), builder.table_count());
                builder
            }
            Err(e) => {
                warn!("⚠️  Cannot read {}: {}", path.display(), e);
                let mut builder = ModelBuilder::new(Origin::Declaration);
                builder.diagnostics_mut().file_failures.push(FileFailure {
                    file: shown,
                    error: e.to_string(),
                });
                builder
            }
        }
    }
}
