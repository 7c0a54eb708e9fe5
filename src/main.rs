//! SchemaFlow Audit - command-line runner
//!
//! Configuration comes from the environment (and `.env`). See `config.rs`
//! for the variables.

use schemaflow_audit::catalog::PgCatalogChannel;
use schemaflow_audit::config::Settings;
use schemaflow_audit::run_audit;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting SchemaFlow schema audit...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");
    info!(
        "   Catalog: {}:{}/{} (namespace '{}')",
        settings.database.host,
        settings.database.port,
        settings.database.database,
        settings.audit.namespace
    );
    info!("   Declarations: {}", settings.audit.schema_dir.display());

    let channel = match PgCatalogChannel::connect(&settings.database.connection_url()?) {
        Ok(channel) => channel,
        Err(e) => {
            error!("❌ FATAL: Cannot reach the catalog: {}", e);
            error!("No artifacts were written");
            return Err(e.into());
        }
    };

    let outcome = run_audit(&channel, &settings.audit)?;
    let summary = &outcome.reconciliation.summary;

    info!("");
    info!("📊 Audit summary");
    info!(
        "   Complete tables:  {} / {} ({:.1}%)",
        summary.complete_tables,
        summary.reference_tables,
        summary.completeness()
    );
    info!("   Missing tables:   {}", summary.missing_tables);
    info!("   Missing columns:  {}", summary.missing_columns);
    info!("   Type mismatches:  {}", summary.type_mismatches);
    info!("   Name mismatches:  {}", summary.name_mismatches);
    info!("   Missing enums:    {}", summary.missing_enums);

    let issues = outcome.reference.diagnostics.issue_count() + outcome.candidate.diagnostics.issue_count();
    if issues > 0 {
        warn!("⚠️  {} extraction issues, see the report's diagnostics section", issues);
    }

    if outcome.reconciliation.is_clean() {
        info!("✅ Declarations match the catalog");
    }
    info!("👋 Audit complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,schemaflow_audit=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}
