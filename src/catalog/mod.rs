//! Database-side model extraction
//!
//! The live schema is read through a [`CatalogChannel`]: one read-only query
//! per catalog category, each answered as a `|`-delimited text table. Rows are
//! grouped by table into descriptors. A channel failure aborts the whole
//! extraction; a malformed row is skipped and counted.

pub mod postgres;

pub use postgres::PgCatalogChannel;

use crate::error::{AuditError, AuditResult};
use crate::model::{
    ColumnDescriptor, EnumDescriptor, ForeignKeyDescriptor, ForeignKeyRef, IndexDescriptor,
    ModelBuilder, Origin, SchemaModel, TableDescriptor, TableSource, UniqueConstraint,
};
use crate::types::map_type;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_$]*$").expect("identifier pattern"));

/// Text-table query channel.
///
/// Rows are separated by newlines and fields by `|`; nulls are empty fields.
/// No escaping is applied.
pub trait CatalogChannel {
    fn query(&self, sql: &str) -> AuditResult<String>;
}

/// Validate a namespace (schema) name before it is embedded into SQL
pub fn validate_namespace(name: &str) -> AuditResult<()> {
    if name.is_empty() || name.len() > 63 || !IDENTIFIER.is_match(name) {
        return Err(AuditError::InvalidIdentifier(format!(
            "'{}' is not a valid namespace name",
            name
        )));
    }
    Ok(())
}

/// Catalog category, used for field-count checks and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Tables,
    Columns,
    PrimaryKeys,
    ForeignKeys,
    UniqueConstraints,
    Indexes,
    Enums,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Tables => "tables",
            Category::Columns => "columns",
            Category::PrimaryKeys => "primary_keys",
            Category::ForeignKeys => "foreign_keys",
            Category::UniqueConstraints => "unique_constraints",
            Category::Indexes => "indexes",
            Category::Enums => "enums",
        }
    }

    /// Minimum number of fields a row of this category must carry
    pub fn min_fields(&self) -> usize {
        match self {
            Category::Tables => 1,
            Category::Columns => 10,
            Category::PrimaryKeys => 3,
            Category::ForeignKeys => 7,
            Category::UniqueConstraints => 3,
            Category::Indexes => 3,
            Category::Enums => 2,
        }
    }

    pub fn sql(&self, namespace: &str) -> String {
        match self {
            Category::Tables => format!(
                r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = '{ns}' AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#,
                ns = namespace
            ),
            Category::Columns => format!(
                r#"
            SELECT
                table_name,
                column_name,
                ordinal_position,
                data_type,
                character_maximum_length,
                numeric_precision,
                numeric_scale,
                is_nullable,
                column_default,
                udt_name
            FROM information_schema.columns
            WHERE table_schema = '{ns}'
            ORDER BY table_name, ordinal_position
        "#,
                ns = namespace
            ),
            Category::PrimaryKeys => format!(
                r#"
            SELECT
                tc.table_name,
                kcu.column_name,
                tc.constraint_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = '{ns}'
            ORDER BY tc.table_name, kcu.ordinal_position
        "#,
                ns = namespace
            ),
            Category::ForeignKeys => format!(
                r#"
            SELECT
                tc.table_name,
                kcu.column_name,
                ccu.table_name AS foreign_table,
                ccu.column_name AS foreign_column,
                tc.constraint_name,
                rc.update_rule,
                rc.delete_rule
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.constraint_schema = tc.table_schema
            LEFT JOIN information_schema.referential_constraints rc
                ON tc.constraint_name = rc.constraint_name
                AND tc.table_schema = rc.constraint_schema
            WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = '{ns}'
            ORDER BY tc.table_name, tc.constraint_name
        "#,
                ns = namespace
            ),
            Category::UniqueConstraints => format!(
                r#"
            SELECT
                tc.table_name,
                kcu.column_name,
                tc.constraint_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.constraint_type = 'UNIQUE' AND tc.table_schema = '{ns}'
            ORDER BY tc.table_name, tc.constraint_name, kcu.ordinal_position
        "#,
                ns = namespace
            ),
            Category::Indexes => format!(
                r#"
            SELECT
                tablename,
                indexname,
                indexdef
            FROM pg_indexes
            WHERE schemaname = '{ns}'
            ORDER BY tablename, indexname
        "#,
                ns = namespace
            ),
            Category::Enums => format!(
                r#"
            SELECT
                t.typname AS enum_name,
                array_agg(e.enumlabel ORDER BY e.enumsortorder) AS enum_values
            FROM pg_type t
            JOIN pg_enum e ON t.oid = e.enumtypid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
            WHERE n.nspname = '{ns}'
            GROUP BY t.typname
            ORDER BY t.typname
        "#,
                ns = namespace
            ),
        }
    }
}

/// Schema extractor for a PostgreSQL catalog
pub struct CatalogExtractor<'a> {
    channel: &'a dyn CatalogChannel,
    namespace: String,
}

impl<'a> CatalogExtractor<'a> {
    pub fn new(channel: &'a dyn CatalogChannel, namespace: &str) -> AuditResult<Self> {
        validate_namespace(namespace)?;
        Ok(Self {
            channel,
            namespace: namespace.to_string(),
        })
    }

    /// Introspect the complete namespace. No model is returned unless every
    /// category query succeeded.
    pub fn extract(&self) -> AuditResult<SchemaModel> {
        info!("🔍 Introspecting catalog namespace '{}'...", self.namespace);

        let tables = self.fetch(Category::Tables)?;
        let columns = self.fetch(Category::Columns)?;
        let primary_keys = self.fetch(Category::PrimaryKeys)?;
        let foreign_keys = self.fetch(Category::ForeignKeys)?;
        let uniques = self.fetch(Category::UniqueConstraints)?;
        let indexes = self.fetch(Category::Indexes)?;
        let enums = self.fetch(Category::Enums)?;

        let mut builder = ModelBuilder::new(Origin::Database);
        let mut assembly = Assembly::default();

        for row in rows(&tables) {
            match checked(&row, Category::Tables, builder.diagnostics_mut()) {
                Some(fields) if !fields[0].is_empty() => {
                    assembly.tables.insert(
                        fields[0].to_string(),
                        TableDescriptor::new(fields[0], TableSource::Database),
                    );
                }
                _ => {}
            }
        }
        debug!("Catalog lists {} base tables", assembly.tables.len());

        for row in rows(&columns) {
            if let Some(fields) = checked(&row, Category::Columns, builder.diagnostics_mut()) {
                if let Err(reason) = assembly.add_column(&fields) {
                    warn!("⚠️  Skipping column row: {}", reason);
                    builder.diagnostics_mut().record_skipped_row(Category::Columns.label());
                }
            }
        }
        for row in rows(&primary_keys) {
            if let Some(fields) = checked(&row, Category::PrimaryKeys, builder.diagnostics_mut()) {
                assembly.add_primary_key(&fields);
            }
        }
        for row in rows(&foreign_keys) {
            if let Some(fields) = checked(&row, Category::ForeignKeys, builder.diagnostics_mut()) {
                assembly.add_foreign_key(&fields);
            }
        }
        for row in rows(&uniques) {
            if let Some(fields) = checked(&row, Category::UniqueConstraints, builder.diagnostics_mut()) {
                assembly.add_unique(&fields);
            }
        }
        for row in rows(&indexes) {
            if let Some(fields) = checked(&row, Category::Indexes, builder.diagnostics_mut()) {
                assembly.add_index(&fields);
            }
        }
        for row in rows(&enums) {
            if let Some(fields) = checked(&row, Category::Enums, builder.diagnostics_mut()) {
                builder.add_enum(EnumDescriptor {
                    name: fields[0].to_string(),
                    labels: parse_array_literal(fields[1]),
                    identifier: None,
                    source_file: None,
                });
            }
        }

        for table in assembly.into_tables() {
            builder.add_table(table);
        }
        let model = builder.finish();

        let stats = model.statistics();
        info!(
            "✅ Catalog extracted: {} tables, {} columns, {} PKs, {} FKs, {} unique, {} indexes, {} enums",
            stats.total_tables,
            stats.total_columns,
            stats.total_primary_keys,
            stats.total_foreign_keys,
            stats.total_unique_constraints,
            stats.total_indexes,
            stats.total_enums
        );
        if model.diagnostics.skipped_row_count() > 0 {
            warn!(
                "⚠️  {} malformed catalog rows skipped",
                model.diagnostics.skipped_row_count()
            );
        }

        Ok(model)
    }

    fn fetch(&self, category: Category) -> AuditResult<String> {
        debug!("Querying catalog category {}", category.label());
        self.channel.query(&category.sql(&self.namespace))
    }
}

/// Split a text table into rows, skipping empty lines
fn rows(output: &str) -> impl Iterator<Item = Vec<&str>> {
    output
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split('|').collect())
}

fn checked<'r, 's>(
    row: &'r [&'s str],
    category: Category,
    diagnostics: &mut crate::model::Diagnostics,
) -> Option<&'r [&'s str]> {
    if row.len() < category.min_fields() {
        warn!(
            "⚠️  Skipping {} row with {} fields (need {})",
            category.label(),
            row.len(),
            category.min_fields()
        );
        diagnostics.record_skipped_row(category.label());
        return None;
    }
    Some(row)
}

fn optional(field: &str) -> Option<&str> {
    let field = field.trim();
    (!field.is_empty()).then_some(field)
}

fn optional_u32(field: &str) -> Option<u32> {
    optional(field).and_then(|v| v.parse().ok())
}

/// Parse a PostgreSQL array literal (`{a,b,"c d"}`) into its elements
pub fn parse_array_literal(text: &str) -> Vec<String> {
    let text = text.trim();
    let Some(inner) = text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) else {
        return Vec::new();
    };

    let mut labels = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut was_quoted = false;
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                quoted = !quoted;
                was_quoted = true;
            }
            '\\' if quoted => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' if !quoted => {
                labels.push(finish_element(&mut current, was_quoted));
                was_quoted = false;
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() || was_quoted {
        labels.push(finish_element(&mut current, was_quoted));
    }
    labels
}

fn finish_element(current: &mut String, quoted: bool) -> String {
    let element = std::mem::take(current);
    if quoted {
        element
    } else {
        element.trim().to_string()
    }
}

/// Tables under assembly, keyed by name
#[derive(Default)]
struct Assembly {
    tables: BTreeMap<String, TableDescriptor>,
}

impl Assembly {
    fn add_column(&mut self, fields: &[&str]) -> Result<(), String> {
        let Some(table) = self.tables.get_mut(fields[0]) else {
            return Ok(());
        };
        let ordinal: u32 = fields[2]
            .trim()
            .parse()
            .map_err(|_| format!("unparsable ordinal '{}' for {}.{}", fields[2], fields[0], fields[1]))?;

        let length = optional_u32(fields[4]);
        let precision = optional_u32(fields[5]);
        let scale = optional_u32(fields[6]);
        let udt_name = fields[9].trim();

        let mut column = ColumnDescriptor::new(
            fields[1],
            ordinal,
            udt_name,
            map_type(fields[3], udt_name, precision, scale, length),
        );
        column.character_length = length;
        column.numeric_precision = precision;
        column.numeric_scale = scale;
        column.nullable = fields[7].trim().eq_ignore_ascii_case("YES");
        column.default_value = optional(fields[8]).map(str::to_string);

        table.columns.push(column);
        Ok(())
    }

    fn add_primary_key(&mut self, fields: &[&str]) {
        let Some(table) = self.tables.get_mut(fields[0]) else {
            return;
        };
        table.primary_key.push(fields[1].to_string());
        if table.primary_key_constraint.is_none() {
            table.primary_key_constraint = optional(fields[2]).map(str::to_string);
        }
    }

    fn add_foreign_key(&mut self, fields: &[&str]) {
        let Some(table) = self.tables.get_mut(fields[0]) else {
            return;
        };
        let on_update = optional(fields[5]).map(str::to_string);
        let on_delete = optional(fields[6]).map(str::to_string);

        table.foreign_keys.push(ForeignKeyDescriptor {
            constraint_name: fields[4].to_string(),
            column: fields[1].to_string(),
            references_table: fields[2].to_string(),
            references_column: fields[3].to_string(),
            on_update: on_update.clone(),
            on_delete: on_delete.clone(),
        });

        if let Some(column) = table.columns.iter_mut().find(|c| c.name == fields[1]) {
            column.foreign_key.get_or_insert(ForeignKeyRef {
                table: fields[2].to_string(),
                column: fields[3].to_string(),
                on_update,
                on_delete,
            });
        }
    }

    fn add_unique(&mut self, fields: &[&str]) {
        let Some(table) = self.tables.get_mut(fields[0]) else {
            return;
        };
        match table.unique_constraints.iter_mut().find(|u| u.name == fields[2]) {
            Some(constraint) => constraint.columns.push(fields[1].to_string()),
            None => table.unique_constraints.push(UniqueConstraint {
                name: fields[2].to_string(),
                columns: vec![fields[1].to_string()],
            }),
        }
    }

    fn add_index(&mut self, fields: &[&str]) {
        let Some(table) = self.tables.get_mut(fields[0]) else {
            return;
        };
        // The definition is the last field and may itself contain '|'
        let definition = fields[2..].join("|");
        table.indexes.push(IndexDescriptor {
            name: fields[1].to_string(),
            unique: definition.to_ascii_uppercase().starts_with("CREATE UNIQUE"),
            definition,
        });
    }

    fn into_tables(self) -> Vec<TableDescriptor> {
        self.tables
            .into_values()
            .map(|mut table| {
                let single: HashSet<String> = table
                    .unique_constraints
                    .iter()
                    .filter(|u| u.columns.len() == 1)
                    .map(|u| u.columns[0].clone())
                    .collect();
                for column in table.columns.iter_mut() {
                    if single.contains(&column.name) {
                        column.unique = true;
                    }
                }
                table.columns.sort_by_key(|c| c.ordinal_position);
                table
            })
            .collect()
    }
}
