//! Normalized schema model
//!
//! Both extractors produce the same shape: a [`SchemaModel`] keyed by table and
//! enum name. Models are assembled through a [`ModelBuilder`] and are read-only
//! once [`ModelBuilder::finish`] has run.

use crate::defaults::DefaultExpr;
use crate::error::AuditResult;
use crate::types::CanonicalType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Where a model (or a table) was recovered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Database,
    Declaration,
}

impl Origin {
    pub fn label(&self) -> &'static str {
        match self {
            Origin::Database => "database",
            Origin::Declaration => "declaration",
        }
    }
}

/// Column-level foreign key reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
}

/// Column representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub name: String,
    pub ordinal_position: u32,
    /// Native type as written by the source: catalog `udt_name`, or the
    /// declaration constructor (enum columns carry the enum's name)
    pub native_type: String,
    pub canonical_type: CanonicalType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_precision: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_scale: Option<u32>,
    pub nullable: bool,
    /// Raw default expression, never evaluated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyRef>,
    /// Property name bound in declaration source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(
        name: impl Into<String>,
        ordinal_position: u32,
        native_type: impl Into<String>,
        canonical_type: CanonicalType,
    ) -> Self {
        Self {
            name: name.into(),
            ordinal_position,
            native_type: native_type.into(),
            canonical_type,
            character_length: None,
            numeric_precision: None,
            numeric_scale: None,
            nullable: true,
            default_value: None,
            unique: false,
            primary_key: false,
            foreign_key: None,
            property: None,
        }
    }

    pub fn default_expr(&self) -> Option<DefaultExpr> {
        self.default_value.as_deref().map(DefaultExpr::classify)
    }
}

/// Named unique constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

/// Index as reported by the engine (or declared in source)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub definition: String,
    #[serde(default)]
    pub unique: bool,
}

/// Foreign key constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyDescriptor {
    pub constraint_name: String,
    pub column: String,
    pub references_table: String,
    pub references_column: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
}

/// Where a table was recovered from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum TableSource {
    Database,
    Declaration { identifier: String, file: PathBuf },
}

/// Table representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key_constraint: Option<String>,
    #[serde(default)]
    pub unique_constraints: Vec<UniqueConstraint>,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    pub source: TableSource,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, source: TableSource) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            primary_key_constraint: None,
            unique_constraints: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            source,
        }
    }

    pub fn origin(&self) -> Origin {
        match self.source {
            TableSource::Database => Origin::Database,
            TableSource::Declaration { .. } => Origin::Declaration,
        }
    }

    /// Identifier the table is bound to in declaration source
    pub fn identifier(&self) -> Option<&str> {
        match &self.source {
            TableSource::Declaration { identifier, .. } => Some(identifier),
            TableSource::Database => None,
        }
    }

    pub fn source_file(&self) -> Option<&Path> {
        match &self.source {
            TableSource::Declaration { file, .. } => Some(file),
            TableSource::Database => None,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> HashSet<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of indexes comparable across origins.
    ///
    /// The engine materializes every unique constraint as an index but the
    /// index backing the primary key has no declaration counterpart.
    pub fn comparable_index_count(&self) -> usize {
        match self.source {
            TableSource::Database => self
                .indexes
                .iter()
                .filter(|idx| Some(&idx.name) != self.primary_key_constraint.as_ref())
                .count(),
            TableSource::Declaration { .. } => {
                self.indexes.len()
                    + self.unique_constraints.len()
                    + self.columns.iter().filter(|c| c.unique).count()
            }
        }
    }
}

/// Enumeration type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDescriptor {
    pub name: String,
    /// Order matches catalog sort order or array literal order
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Declaring file, relative to the schema directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    One,
    Many,
}

/// Named association between declared tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDescriptor {
    pub name: String,
    pub kind: RelationKind,
    pub owner_identifier: String,
    pub target_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_table: Option<String>,
    pub source_file: PathBuf,
}

/// A declaration the reader could not recover
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnparsedDeclaration {
    pub file: PathBuf,
    pub line: usize,
    pub reason: String,
}

/// A source file that could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub file: PathBuf,
    pub error: String,
}

/// Non-fatal problems met during extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    /// Catalog category -> rows skipped for having too few fields
    #[serde(default)]
    pub skipped_rows: BTreeMap<String, usize>,
    #[serde(default)]
    pub unparsed: Vec<UnparsedDeclaration>,
    #[serde(default)]
    pub file_failures: Vec<FileFailure>,
    /// `table.column` entries dropped as duplicates
    #[serde(default)]
    pub duplicate_columns: Vec<String>,
    /// Duplicate table declarations (first one wins)
    #[serde(default)]
    pub duplicate_tables: Vec<String>,
    /// Duplicate enum declarations (first one wins)
    #[serde(default)]
    pub duplicate_enums: Vec<String>,
    /// `table.column` primary-key members with no matching column
    #[serde(default)]
    pub invalid_primary_keys: Vec<String>,
    #[serde(default)]
    pub unresolved_references: Vec<String>,
}

impl Diagnostics {
    pub fn record_skipped_row(&mut self, category: &str) {
        *self.skipped_rows.entry(category.to_string()).or_insert(0) += 1;
    }

    pub fn skipped_row_count(&self) -> usize {
        self.skipped_rows.values().sum()
    }

    pub fn issue_count(&self) -> usize {
        self.skipped_row_count()
            + self.unparsed.len()
            + self.file_failures.len()
            + self.duplicate_columns.len()
            + self.duplicate_tables.len()
            + self.duplicate_enums.len()
            + self.invalid_primary_keys.len()
            + self.unresolved_references.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }

    fn absorb(&mut self, other: Diagnostics) {
        for (category, count) in other.skipped_rows {
            *self.skipped_rows.entry(category).or_insert(0) += count;
        }
        self.unparsed.extend(other.unparsed);
        self.file_failures.extend(other.file_failures);
        self.duplicate_columns.extend(other.duplicate_columns);
        self.duplicate_tables.extend(other.duplicate_tables);
        self.duplicate_enums.extend(other.duplicate_enums);
        self.invalid_primary_keys.extend(other.invalid_primary_keys);
        self.unresolved_references.extend(other.unresolved_references);
    }
}

/// Aggregate counts, always derived from the model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_tables: usize,
    pub total_columns: usize,
    pub total_enums: usize,
    pub total_enum_values: usize,
    pub total_primary_keys: usize,
    pub total_foreign_keys: usize,
    pub total_unique_constraints: usize,
    pub total_indexes: usize,
    pub total_relations: usize,
}

/// Complete normalized schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaModel {
    pub origin: Origin,
    pub tables: BTreeMap<String, TableDescriptor>,
    pub enums: BTreeMap<String, EnumDescriptor>,
    pub relations: Vec<RelationDescriptor>,
    pub diagnostics: Diagnostics,
}

impl SchemaModel {
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.get(name)
    }

    pub fn statistics(&self) -> Statistics {
        let tables = self.tables.values();
        Statistics {
            total_tables: self.tables.len(),
            total_columns: tables.clone().map(|t| t.columns.len()).sum(),
            total_enums: self.enums.len(),
            total_enum_values: self.enums.values().map(|e| e.labels.len()).sum(),
            total_primary_keys: tables.clone().map(|t| t.primary_key.len()).sum(),
            total_foreign_keys: tables.clone().map(|t| t.foreign_keys.len()).sum(),
            total_unique_constraints: tables.clone().map(|t| t.unique_constraints.len()).sum(),
            total_indexes: tables.map(|t| t.indexes.len()).sum(),
            total_relations: self.relations.len(),
        }
    }

    /// Compute checksum from schema content
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();

        // BTreeMap iteration is already sorted by name
        for table in self.tables.values() {
            hasher.update(format!("T:{}\n", table.name).as_bytes());
            for col in &table.columns {
                hasher.update(
                    format!(
                        "C:{}.{}:{}:{}\n",
                        table.name, col.name, col.canonical_type, col.nullable
                    )
                    .as_bytes(),
                );
            }
        }

        for e in self.enums.values() {
            hasher.update(format!("E:{}:{}\n", e.name, e.labels.join(",")).as_bytes());
        }

        format!("{:x}", hasher.finalize())
    }
}

/// Incremental model assembly.
///
/// Each extractor (or each scanned file) owns its builder; callers combine
/// them with [`ModelBuilder::merge`], which is independent of call order.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    origin: Origin,
    tables: BTreeMap<String, TableDescriptor>,
    enums: BTreeMap<String, EnumDescriptor>,
    relations: Vec<RelationDescriptor>,
    diagnostics: Diagnostics,
}

impl ModelBuilder {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            tables: BTreeMap::new(),
            enums: BTreeMap::new(),
            relations: Vec::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn add_table(&mut self, table: TableDescriptor) {
        if self.tables.contains_key(&table.name) {
            self.diagnostics.duplicate_tables.push(table.name);
            return;
        }
        self.tables.insert(table.name.clone(), table);
    }

    pub fn add_enum(&mut self, descriptor: EnumDescriptor) {
        if self.enums.contains_key(&descriptor.name) {
            self.diagnostics.duplicate_enums.push(descriptor.name);
            return;
        }
        self.enums.insert(descriptor.name.clone(), descriptor);
    }

    pub fn add_relation(&mut self, relation: RelationDescriptor) {
        self.relations.push(relation);
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Combine two builders. Table/enum collisions keep the entry from the
    /// file that sorts first, so the result does not depend on merge order.
    pub fn merge(mut self, other: ModelBuilder) -> ModelBuilder {
        for (name, table) in other.tables {
            match self.tables.get(&name) {
                None => {
                    self.tables.insert(name, table);
                }
                Some(existing) => {
                    if table.source_file() < existing.source_file() {
                        self.tables.insert(name.clone(), table);
                    }
                    self.diagnostics.duplicate_tables.push(name);
                }
            }
        }
        for (name, descriptor) in other.enums {
            match self.enums.get(&name) {
                None => {
                    self.enums.insert(name, descriptor);
                }
                Some(existing) => {
                    if (&descriptor.source_file, &descriptor.labels)
                        < (&existing.source_file, &existing.labels)
                    {
                        self.enums.insert(name.clone(), descriptor);
                    }
                    self.diagnostics.duplicate_enums.push(name);
                }
            }
        }
        self.relations.extend(other.relations);
        self.diagnostics.absorb(other.diagnostics);
        self
    }

    /// Enforce table invariants, resolve declaration identifiers and freeze.
    pub fn finish(mut self) -> SchemaModel {
        for table in self.tables.values_mut() {
            enforce_invariants(table, &mut self.diagnostics);
        }

        if self.origin == Origin::Declaration {
            self.resolve_declarations();
        }

        self.relations.sort_by(|a, b| {
            (&a.owner_identifier, &a.name, &a.source_file).cmp(&(
                &b.owner_identifier,
                &b.name,
                &b.source_file,
            ))
        });
        self.diagnostics.duplicate_tables.sort();
        self.diagnostics.duplicate_enums.sort();
        self.diagnostics.unresolved_references.sort();
        self.diagnostics.unparsed.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
        self.diagnostics.file_failures.sort_by(|a, b| a.file.cmp(&b.file));

        debug!(
            "Finished {} model: {} tables, {} enums, {} relations",
            self.origin.label(),
            self.tables.len(),
            self.enums.len(),
            self.relations.len()
        );

        SchemaModel {
            origin: self.origin,
            tables: self.tables,
            enums: self.enums,
            relations: self.relations,
            diagnostics: self.diagnostics,
        }
    }

    /// Rewrite identifiers bound in source into table/enum/column names.
    fn resolve_declarations(&mut self) {
        let table_ids: HashMap<String, String> = self
            .tables
            .values()
            .filter_map(|t| t.identifier().map(|id| (id.to_string(), t.name.clone())))
            .collect();
        let enum_ids: HashMap<String, String> = self
            .enums
            .values()
            .filter_map(|e| e.identifier.clone().map(|id| (id, e.name.clone())))
            .collect();

        // property -> column name, per table
        let properties: HashMap<String, HashMap<String, String>> = self
            .tables
            .values()
            .map(|t| {
                let props = t
                    .columns
                    .iter()
                    .map(|c| (c.property.clone().unwrap_or_else(|| c.name.clone()), c.name.clone()))
                    .collect();
                (t.name.clone(), props)
            })
            .collect();

        for table in self.tables.values_mut() {
            let table_name = table.name.clone();
            let mut foreign_keys = Vec::new();

            for col in table.columns.iter_mut() {
                if let Some(enum_name) = enum_ids.get(&col.native_type) {
                    col.native_type = enum_name.clone();
                }

                let Some(reference) = col.foreign_key.as_mut() else {
                    continue;
                };
                let Some(target_table) = table_ids.get(&reference.table) else {
                    self.diagnostics.unresolved_references.push(format!(
                        "{}.{} -> {}.{}",
                        table_name, col.name, reference.table, reference.column
                    ));
                    continue;
                };
                let target_column = properties
                    .get(target_table)
                    .and_then(|props| props.get(&reference.column))
                    .cloned()
                    .unwrap_or_else(|| reference.column.clone());

                reference.table = target_table.clone();
                reference.column = target_column.clone();

                foreign_keys.push(ForeignKeyDescriptor {
                    constraint_name: format!(
                        "{}_{}_{}_{}_fk",
                        table_name, col.name, target_table, target_column
                    ),
                    column: col.name.clone(),
                    references_table: target_table.clone(),
                    references_column: target_column,
                    on_update: reference.on_update.clone(),
                    on_delete: reference.on_delete.clone(),
                });
            }

            table.foreign_keys.extend(foreign_keys);
        }

        for relation in self.relations.iter_mut() {
            relation.owner_table = table_ids.get(&relation.owner_identifier).cloned();
            relation.target_table = table_ids.get(&relation.target_identifier).cloned();
        }
    }
}

fn enforce_invariants(table: &mut TableDescriptor, diagnostics: &mut Diagnostics) {
    let mut seen = HashSet::new();
    let table_name = table.name.clone();
    table.columns.retain(|c| {
        if seen.insert(c.name.clone()) {
            true
        } else {
            diagnostics
                .duplicate_columns
                .push(format!("{}.{}", table_name, c.name));
            false
        }
    });

    let mut pk_seen = HashSet::new();
    table.primary_key.retain(|name| {
        if !pk_seen.insert(name.clone()) {
            return false;
        }
        if seen.contains(name) {
            true
        } else {
            diagnostics
                .invalid_primary_keys
                .push(format!("{}.{}", table_name, name));
            false
        }
    });

    for col in table.columns.iter_mut() {
        if table.primary_key.contains(&col.name) {
            col.primary_key = true;
        }
    }
}

/// Serialized model, produced once per extraction run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchemaSnapshot {
    pub id: Uuid,
    pub source: Origin,
    pub extracted_at: DateTime<Utc>,
    pub checksum: String,
    pub statistics: Statistics,
    pub tables: BTreeMap<String, TableDescriptor>,
    pub enums: BTreeMap<String, EnumDescriptor>,
    #[serde(default)]
    pub relations: Vec<RelationDescriptor>,
    #[serde(default)]
    pub diagnostics: Diagnostics,
}

impl SchemaSnapshot {
    pub fn capture(model: &SchemaModel) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: model.origin,
            extracted_at: Utc::now(),
            checksum: model.checksum(),
            statistics: model.statistics(),
            tables: model.tables.clone(),
            enums: model.enums.clone(),
            relations: model.relations.clone(),
            diagnostics: model.diagnostics.clone(),
        }
    }

    /// Indented variant, for human diffing
    pub fn to_pretty_json(&self) -> AuditResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Compact variant, for programmatic reuse
    pub fn to_compact_json(&self) -> AuditResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> AuditResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Rebuild the in-memory model. Statistics are recomputed, not trusted.
    pub fn into_model(self) -> SchemaModel {
        SchemaModel {
            origin: self.source,
            tables: self.tables,
            enums: self.enums,
            relations: self.relations,
            diagnostics: self.diagnostics,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn column(name: &str, ordinal: u32, canonical: CanonicalType) -> ColumnDescriptor {
        ColumnDescriptor::new(name, ordinal, canonical.sql_type(), canonical)
    }

    pub fn db_table(name: &str, columns: Vec<ColumnDescriptor>) -> TableDescriptor {
        let mut table = TableDescriptor::new(name, TableSource::Database);
        table.columns = columns;
        table
    }

    pub fn decl_table(
        name: &str,
        identifier: &str,
        file: &str,
        columns: Vec<ColumnDescriptor>,
    ) -> TableDescriptor {
        let mut table = TableDescriptor::new(
            name,
            TableSource::Declaration {
                identifier: identifier.to_string(),
                file: PathBuf::from(file),
            },
        );
        table.columns = columns;
        table
    }

    pub fn model(origin: Origin, tables: Vec<TableDescriptor>, enums: Vec<EnumDescriptor>) -> SchemaModel {
        let mut builder = ModelBuilder::new(origin);
        for table in tables {
            builder.add_table(table);
        }
        for e in enums {
            builder.add_enum(e);
        }
        builder.finish()
    }

    pub fn enum_of(name: &str, labels: &[&str]) -> EnumDescriptor {
        EnumDescriptor {
            name: name.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            identifier: None,
            source_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use pretty_assertions::assert_eq;

    fn orders() -> TableDescriptor {
        let mut id = column("id", 1, CanonicalType::Uuid);
        id.nullable = false;
        id.default_value = Some("gen_random_uuid()".into());
        let mut total = column(
            "total",
            2,
            CanonicalType::Numeric {
                precision: Some(10),
                scale: Some(2),
            },
        );
        total.numeric_precision = Some(10);
        total.numeric_scale = Some(2);
        let mut table = db_table("orders", vec![id, total]);
        table.primary_key = vec!["id".into()];
        table.primary_key_constraint = Some("orders_pkey".into());
        table.indexes = vec![
            IndexDescriptor {
                name: "orders_pkey".into(),
                definition: "CREATE UNIQUE INDEX orders_pkey ON public.orders USING btree (id)".into(),
                unique: true,
            },
            IndexDescriptor {
                name: "idx_orders_total".into(),
                definition: "CREATE INDEX idx_orders_total ON public.orders USING btree (total)".into(),
                unique: false,
            },
        ];
        table
    }

    #[test]
    fn test_builder_enforces_column_and_pk_invariants() {
        let mut table = orders();
        table.columns.push(column("total", 3, CanonicalType::Text));
        table.primary_key.push("ghost".into());

        let model = model(Origin::Database, vec![table], vec![]);
        let orders = model.table("orders").unwrap();

        assert_eq!(orders.columns.len(), 2);
        assert_eq!(orders.primary_key, vec!["id".to_string()]);
        assert!(orders.column("id").unwrap().primary_key);
        assert_eq!(model.diagnostics.duplicate_columns, vec!["orders.total".to_string()]);
        assert_eq!(model.diagnostics.invalid_primary_keys, vec!["orders.ghost".to_string()]);
    }

    #[test]
    fn test_comparable_index_count_skips_primary_key_index() {
        assert_eq!(orders().comparable_index_count(), 1);

        let mut email = column("email", 1, CanonicalType::Text);
        email.unique = true;
        let mut declared = decl_table("users", "users", "core.ts", vec![email]);
        declared.indexes.push(IndexDescriptor {
            name: "idx_users_email".into(),
            definition: "index('idx_users_email').on(email)".into(),
            unique: false,
        });
        assert_eq!(declared.comparable_index_count(), 2);
    }

    #[test]
    fn test_statistics_are_derived() {
        let model = model(
            Origin::Database,
            vec![orders(), db_table("empty", vec![])],
            vec![enum_of("status", &["draft", "sent", "paid"])],
        );
        let stats = model.statistics();
        assert_eq!(stats.total_tables, 2);
        assert_eq!(stats.total_columns, 2);
        assert_eq!(stats.total_enum_values, 3);
        assert_eq!(stats.total_primary_keys, 1);
        assert_eq!(stats.total_indexes, 2);
    }

    #[test]
    fn test_checksum_consistency() {
        let a = model(Origin::Database, vec![orders()], vec![]);
        let b = model(Origin::Database, vec![orders()], vec![]);
        assert_eq!(a.checksum(), b.checksum());

        let mut changed = orders();
        changed.columns[1].nullable = false;
        let c = model(Origin::Database, vec![changed], vec![]);
        assert_ne!(a.checksum(), c.checksum());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let original = model(
            Origin::Database,
            vec![orders()],
            vec![enum_of("status", &["draft", "sent", "paid"])],
        );
        let snapshot = SchemaSnapshot::capture(&original);

        for text in [
            snapshot.to_pretty_json().unwrap(),
            snapshot.to_compact_json().unwrap(),
        ] {
            let reloaded = SchemaSnapshot::from_json(&text).unwrap().into_model();
            assert_eq!(reloaded.tables.keys().collect::<Vec<_>>(), vec!["orders"]);
            assert_eq!(reloaded.enums["status"].labels, vec!["draft", "sent", "paid"]);
            for (before, after) in original.tables["orders"]
                .columns
                .iter()
                .zip(&reloaded.tables["orders"].columns)
            {
                assert_eq!(before.name, after.name);
                assert_eq!(before.nullable, after.nullable);
                assert_eq!(before.canonical_type, after.canonical_type);
            }
            assert_eq!(reloaded, original);
        }
    }

    #[test]
    fn test_snapshot_document_shape() {
        let snapshot = SchemaSnapshot::capture(&model(Origin::Database, vec![orders()], vec![]));
        let value: serde_json::Value = serde_json::from_str(&snapshot.to_compact_json().unwrap()).unwrap();
        for key in ["tables", "enums", "statistics", "extracted_at"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(
            value["tables"]["orders"]["columns"][1]["canonicalType"],
            serde_json::json!("numeric(10,2)")
        );
    }

    #[test]
    fn test_merge_is_order_independent() {
        let mut a = ModelBuilder::new(Origin::Declaration);
        a.add_table(decl_table("orders", "orders", "a.ts", vec![column("id", 1, CanonicalType::Uuid)]));
        let mut b = ModelBuilder::new(Origin::Declaration);
        b.add_table(decl_table("orders", "ordersTable", "b.ts", vec![]));
        b.add_table(decl_table("users", "users", "b.ts", vec![]));

        a.add_enum(EnumDescriptor {
            source_file: Some(PathBuf::from("a.ts")),
            ..enum_of("status", &["a", "b"])
        });
        b.add_enum(EnumDescriptor {
            source_file: Some(PathBuf::from("b.ts")),
            ..enum_of("status", &["b", "a"])
        });

        let ab = a.clone().merge(b.clone()).finish();
        let ba = b.merge(a).finish();
        assert_eq!(ab, ba);
        assert_eq!(ab.tables["orders"].identifier(), Some("orders"));
        assert_eq!(ab.enums["status"].labels, vec!["a", "b"]);
        assert_eq!(ab.diagnostics.duplicate_tables, vec!["orders".to_string()]);
        assert_eq!(ab.diagnostics.duplicate_enums, vec!["status".to_string()]);
    }

    #[test]
    fn test_declaration_references_are_resolved() {
        let mut user_id = column("user_id", 1, CanonicalType::Uuid);
        user_id.property = Some("userId".into());
        user_id.foreign_key = Some(ForeignKeyRef {
            table: "usersTable".into(),
            column: "id".into(),
            on_update: None,
            on_delete: Some("cascade".into()),
        });
        let mut dangling = column("team_id", 2, CanonicalType::Uuid);
        dangling.foreign_key = Some(ForeignKeyRef {
            table: "teams".into(),
            column: "id".into(),
            on_update: None,
            on_delete: None,
        });
        let orders = decl_table("orders", "orders", "orders.ts", vec![user_id, dangling]);
        let users = decl_table("users", "usersTable", "users.ts", vec![column("id", 1, CanonicalType::Uuid)]);

        let model = model(Origin::Declaration, vec![orders, users], vec![]);
        let table = &model.tables["orders"];
        let reference = table.column("user_id").unwrap().foreign_key.clone().unwrap();
        assert_eq!(reference.table, "users");
        assert_eq!(table.foreign_keys.len(), 1);
        assert_eq!(table.foreign_keys[0].constraint_name, "orders_user_id_users_id_fk");
        assert_eq!(
            model.diagnostics.unresolved_references,
            vec!["orders.team_id -> teams.id".to_string()]
        );
    }
}
