//! Audit run
//!
//! One pass: extract the catalog (reference) and the declarations
//! (candidate), reconcile them, render, write. A catalog failure aborts the
//! run before anything is written.

use crate::artifacts::ArtifactWriter;
use crate::catalog::{CatalogChannel, CatalogExtractor};
use crate::codegen::{DeclarationRenderer, SqlRenderer};
use crate::config::AuditConfig;
use crate::declaration::DeclarationExtractor;
use crate::error::AuditResult;
use crate::model::{SchemaModel, SchemaSnapshot};
use crate::reconcile::{DiffEngine, Reconciliation};
use crate::report::AuditReport;
use std::path::PathBuf;
use tracing::info;

/// Everything a run produced
#[derive(Debug)]
pub struct AuditOutcome {
    pub reference: SchemaModel,
    pub candidate: SchemaModel,
    pub reconciliation: Reconciliation,
    pub report: AuditReport,
    pub artifacts: Vec<PathBuf>,
}

pub fn run_audit(channel: &dyn CatalogChannel, config: &AuditConfig) -> AuditResult<AuditOutcome> {
    let reference = CatalogExtractor::new(channel, &config.namespace)?.extract()?;
    let candidate = DeclarationExtractor::new(&config.schema_dir)
        .with_enum_file(config.enum_file.clone())
        .extract()?;

    info!("⚖️  Reconciling {} against {}...", candidate.origin.label(), reference.origin.label());
    let reconciliation = DiffEngine::diff(&reference, &candidate);
    let report = AuditReport::build(&reference, &candidate, &reconciliation, config.display_limit);
    let fragment = DeclarationRenderer::new(&reference).render(&reconciliation);
    let sql = SqlRenderer::new(&config.namespace, &reference).render(&reconciliation);

    let writer = ArtifactWriter::create(&config.output_dir)?;
    let mut artifacts = Vec::new();
    artifacts.extend(writer.write_snapshot(&SchemaSnapshot::capture(&reference))?);
    artifacts.extend(writer.write_snapshot(&SchemaSnapshot::capture(&candidate))?);
    artifacts.extend(writer.write_report(&report)?);
    artifacts.extend(writer.write_codegen(&fragment, &sql)?);
    info!("📁 {} artifacts written to {}", artifacts.len(), writer.output_dir().display());

    Ok(AuditOutcome {
        reference,
        candidate,
        reconciliation,
        report,
        artifacts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{CODEGEN_FRAGMENT, REPORT_MARKDOWN};
    use crate::catalog::fake::FakeChannel;
    use crate::catalog::Category;
    use crate::reconcile::DiffCategory;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn channel() -> FakeChannel {
        FakeChannel::default()
            .with(Category::Tables, "orders\n")
            .with(
                Category::Columns,
                "orders|id|1|uuid||||NO|gen_random_uuid()|uuid\n\
                 orders|total|2|numeric||10|2|NO|0|numeric\n\
                 orders|created_at|3|timestamp with time zone||||NO|now()|timestamptz\n",
            )
            .with(Category::PrimaryKeys, "orders|id|orders_pkey\n")
            .with(
                Category::Indexes,
                "orders|orders_pkey|CREATE UNIQUE INDEX orders_pkey ON public.orders USING btree (id)\n",
            )
            .with(Category::Enums, "order_status|{draft,sent,paid}\n")
    }

    fn config(root: &TempDir) -> AuditConfig {
        let schema_dir = root.path().join("schema");
        fs::create_dir(&schema_dir).unwrap();
        fs::write(
            schema_dir.join("orders.ts"),
            "export const orders = pgTable('orders', {\n  id: uuid('id').primaryKey().defaultRandom(),\n  createdAt: timestamp('created_at', { withTimezone: true }).notNull().defaultNow(),\n});\n",
        )
        .unwrap();
        AuditConfig {
            schema_dir,
            output_dir: root.path().join("out"),
            ..AuditConfig::default()
        }
    }

    #[test]
    fn test_full_run_writes_every_artifact() {
        let root = tempfile::tempdir().unwrap();
        let config = config(&root);
        let outcome = run_audit(&channel(), &config).unwrap();

        let categories: Vec<_> = outcome.reconciliation.entries.iter().map(|e| e.category()).collect();
        assert_eq!(categories, vec![DiffCategory::MissingColumn, DiffCategory::MissingEnum]);
        assert_eq!(outcome.artifacts.len(), 8);
        assert!(outcome.artifacts.iter().all(|p| p.is_file()));

        let fragment = fs::read_to_string(config.output_dir.join(CODEGEN_FRAGMENT)).unwrap();
        assert!(fragment.contains("  total: numeric('total', { precision: 10, scale: 2 }).notNull().default('0'),"));
        assert!(fragment.contains("export const orderStatus = pgEnum('order_status', ['draft', 'sent', 'paid']);"));

        let markdown = fs::read_to_string(config.output_dir.join(REPORT_MARKDOWN)).unwrap();
        assert!(markdown.contains("- Complete tables: 0 / 1 (0.0%)"));
    }

    #[test]
    fn test_channel_failure_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let config = config(&root);
        let failing = FakeChannel {
            fail_on: Some(Category::Columns.label()),
            ..channel()
        };

        assert!(run_audit(&failing, &config).is_err());
        assert!(!config.output_dir.exists());
    }
}
