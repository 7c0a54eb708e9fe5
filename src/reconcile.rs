//! Schema reconciliation engine
//!
//! Structural comparison of a reference model against a candidate model.
//! Everything is set algebra over names; nothing is inferred about intent.

use crate::model::{
    ColumnDescriptor, EnumDescriptor, Origin, SchemaModel, TableDescriptor,
};
use crate::types::CanonicalType;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Categories of discrepancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffCategory {
    MissingTable,
    MissingColumn,
    TypeMismatch,
    NameMismatch,
    MissingIndex,
    ExtraColumn,
    ExtraTable,
    MissingEnum,
    EnumMismatch,
}

impl DiffCategory {
    pub const ALL: [DiffCategory; 9] = [
        DiffCategory::MissingTable,
        DiffCategory::MissingColumn,
        DiffCategory::TypeMismatch,
        DiffCategory::NameMismatch,
        DiffCategory::MissingIndex,
        DiffCategory::ExtraColumn,
        DiffCategory::ExtraTable,
        DiffCategory::MissingEnum,
        DiffCategory::EnumMismatch,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DiffCategory::MissingTable => "missing_table",
            DiffCategory::MissingColumn => "missing_column",
            DiffCategory::TypeMismatch => "type_mismatch",
            DiffCategory::NameMismatch => "name_mismatch",
            DiffCategory::MissingIndex => "missing_index",
            DiffCategory::ExtraColumn => "extra_column",
            DiffCategory::ExtraTable => "extra_table",
            DiffCategory::MissingEnum => "missing_enum",
            DiffCategory::EnumMismatch => "enum_mismatch",
        }
    }
}

impl fmt::Display for DiffCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single column whose canonical types disagree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnTypeMismatch {
    pub column: String,
    pub reference: CanonicalType,
    pub candidate: CanonicalType,
}

/// Category-specific detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum DiffPayload {
    /// The full reference table, so renderers can recreate it
    MissingTable { table: TableDescriptor },
    /// Reference columns absent from the candidate, in ordinal order
    MissingColumn {
        columns: Vec<ColumnDescriptor>,
        #[serde(skip_serializing_if = "Option::is_none")]
        source_file: Option<PathBuf>,
    },
    TypeMismatch { mismatches: Vec<ColumnTypeMismatch> },
    NameMismatch {
        identifier: String,
        table_name: String,
        source_file: PathBuf,
    },
    MissingIndex {
        reference_count: usize,
        candidate_count: usize,
        reference_indexes: Vec<String>,
    },
    /// Advisory: candidate columns unknown to the reference
    ExtraColumn { columns: Vec<String> },
    /// Advisory: candidate table unknown to the reference
    ExtraTable { origin: Origin, column_count: usize },
    MissingEnum { descriptor: EnumDescriptor },
    EnumMismatch {
        reference: Vec<String>,
        candidate: Vec<String>,
    },
}

/// One discrepancy, keyed by the object it concerns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    /// Table name, or enum name for enum categories
    pub object: String,
    #[serde(flatten)]
    pub payload: DiffPayload,
}

impl DiffEntry {
    pub fn category(&self) -> DiffCategory {
        match self.payload {
            DiffPayload::MissingTable { .. } => DiffCategory::MissingTable,
            DiffPayload::MissingColumn { .. } => DiffCategory::MissingColumn,
            DiffPayload::TypeMismatch { .. } => DiffCategory::TypeMismatch,
            DiffPayload::NameMismatch { .. } => DiffCategory::NameMismatch,
            DiffPayload::MissingIndex { .. } => DiffCategory::MissingIndex,
            DiffPayload::ExtraColumn { .. } => DiffCategory::ExtraColumn,
            DiffPayload::ExtraTable { .. } => DiffCategory::ExtraTable,
            DiffPayload::MissingEnum { .. } => DiffCategory::MissingEnum,
            DiffPayload::EnumMismatch { .. } => DiffCategory::EnumMismatch,
        }
    }

    /// Number of individual items the entry stands for
    pub fn item_count(&self) -> usize {
        match &self.payload {
            DiffPayload::MissingColumn { columns, .. } => columns.len(),
            DiffPayload::TypeMismatch { mismatches } => mismatches.len(),
            DiffPayload::ExtraColumn { columns } => columns.len(),
            _ => 1,
        }
    }

    /// One-line human description
    pub fn describe(&self) -> String {
        match &self.payload {
            DiffPayload::MissingTable { table } => {
                format!("Table {} missing ({} columns)", self.object, table.columns.len())
            }
            DiffPayload::MissingColumn { columns, .. } => format!(
                "{}: missing {}",
                self.object,
                columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
            ),
            DiffPayload::TypeMismatch { mismatches } => format!(
                "{}: {}",
                self.object,
                mismatches
                    .iter()
                    .map(|m| format!("{} {} → {}", m.column, m.reference, m.candidate))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            DiffPayload::NameMismatch {
                identifier,
                table_name,
                source_file,
            } => format!("{} → {} ({})", identifier, table_name, source_file.display()),
            DiffPayload::MissingIndex {
                reference_count,
                candidate_count,
                ..
            } => format!(
                "{}: {} indexes in reference, {} in candidate",
                self.object, reference_count, candidate_count
            ),
            DiffPayload::ExtraColumn { columns } => {
                format!("{}: extra {}", self.object, columns.join(", "))
            }
            DiffPayload::ExtraTable {
                origin,
                column_count,
            } => format!(
                "Table {} only in {} ({} columns)",
                self.object,
                origin.label(),
                column_count
            ),
            DiffPayload::MissingEnum { descriptor } => format!(
                "Enum {} missing ({})",
                self.object,
                descriptor.labels.join(", ")
            ),
            DiffPayload::EnumMismatch {
                reference,
                candidate,
            } => format!(
                "Enum {}: [{}] vs [{}]",
                self.object,
                reference.join(", "),
                candidate.join(", ")
            ),
        }
    }
}

/// Summary statistics for the diff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub reference_tables: usize,
    pub candidate_tables: usize,
    pub tables_compared: usize,
    /// Common tables without missing columns or type mismatches
    pub complete_tables: usize,
    pub missing_tables: usize,
    pub missing_columns: usize,
    pub type_mismatches: usize,
    pub name_mismatches: usize,
    pub tables_missing_indexes: usize,
    pub extra_columns: usize,
    pub extra_tables: usize,
    pub missing_enums: usize,
    pub enum_mismatches: usize,
    pub reference_indexes: usize,
    pub candidate_indexes: usize,
}

impl DiffSummary {
    /// Percentage of reference tables that are complete in the candidate
    pub fn completeness(&self) -> f64 {
        if self.reference_tables == 0 {
            return 100.0;
        }
        self.complete_tables as f64 * 100.0 / self.reference_tables as f64
    }
}

/// Complete reconciliation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub entries: Vec<DiffEntry>,
    pub summary: DiffSummary,
}

impl Reconciliation {
    pub fn of(&self, category: DiffCategory) -> impl Iterator<Item = &DiffEntry> {
        self.entries.iter().filter(move |e| e.category() == category)
    }

    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The diff engine that compares two schema models
pub struct DiffEngine;

impl DiffEngine {
    /// Compare `candidate` against `reference`. Neither model is modified;
    /// identical inputs always produce identical output.
    pub fn diff(reference: &SchemaModel, candidate: &SchemaModel) -> Reconciliation {
        let mut entries = Vec::new();

        // BTreeMap iteration gives alphabetical order
        for (name, ref_table) in &reference.tables {
            match candidate.tables.get(name) {
                None => entries.push(DiffEntry {
                    object: name.clone(),
                    payload: DiffPayload::MissingTable {
                        table: ref_table.clone(),
                    },
                }),
                Some(cand_table) => Self::diff_table(ref_table, cand_table, &mut entries),
            }
        }

        for (name, cand_table) in &candidate.tables {
            if reference.tables.contains_key(name) {
                continue;
            }
            entries.push(DiffEntry {
                object: name.clone(),
                payload: DiffPayload::ExtraTable {
                    origin: cand_table.origin(),
                    column_count: cand_table.columns.len(),
                },
            });
            entries.extend(Self::name_mismatch(cand_table));
        }

        Self::diff_enums(&reference.enums, &candidate.enums, &mut entries);

        let summary = Self::calculate_summary(reference, candidate, &entries);
        debug!(
            "Reconciled {} reference tables against {}: {} entries",
            summary.reference_tables,
            summary.candidate_tables,
            entries.len()
        );

        Reconciliation { entries, summary }
    }

    fn diff_table(reference: &TableDescriptor, candidate: &TableDescriptor, entries: &mut Vec<DiffEntry>) {
        let object = reference.name.clone();

        entries.extend(Self::name_mismatch(reference));
        entries.extend(Self::name_mismatch(candidate));

        let cand_cols: HashMap<&str, &ColumnDescriptor> = candidate
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c))
            .collect();
        let ref_names: HashSet<&str> = reference.column_names();

        let missing: Vec<ColumnDescriptor> = reference
            .columns
            .iter()
            .filter(|c| !cand_cols.contains_key(c.name.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            entries.push(DiffEntry {
                object: object.clone(),
                payload: DiffPayload::MissingColumn {
                    columns: missing,
                    source_file: candidate.source_file().map(|p| p.to_path_buf()),
                },
            });
        }

        let mismatches: Vec<ColumnTypeMismatch> = reference
            .columns
            .iter()
            .filter_map(|ref_col| {
                let cand_col = cand_cols.get(ref_col.name.as_str())?;
                (ref_col.canonical_type != cand_col.canonical_type).then(|| ColumnTypeMismatch {
                    column: ref_col.name.clone(),
                    reference: ref_col.canonical_type,
                    candidate: cand_col.canonical_type,
                })
            })
            .collect();
        if !mismatches.is_empty() {
            entries.push(DiffEntry {
                object: object.clone(),
                payload: DiffPayload::TypeMismatch { mismatches },
            });
        }

        let extra: Vec<String> = candidate
            .columns
            .iter()
            .filter(|c| !ref_names.contains(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect();
        if !extra.is_empty() {
            entries.push(DiffEntry {
                object: object.clone(),
                payload: DiffPayload::ExtraColumn { columns: extra },
            });
        }

        let reference_count = reference.comparable_index_count();
        let candidate_count = candidate.comparable_index_count();
        if reference_count > candidate_count {
            entries.push(DiffEntry {
                object,
                payload: DiffPayload::MissingIndex {
                    reference_count,
                    candidate_count,
                    reference_indexes: reference.indexes.iter().map(|i| i.name.clone()).collect(),
                },
            });
        }
    }

    fn name_mismatch(table: &TableDescriptor) -> Option<DiffEntry> {
        let identifier = table.identifier()?;
        let source_file = table.source_file()?;
        (identifier != table.name).then(|| DiffEntry {
            object: table.name.clone(),
            payload: DiffPayload::NameMismatch {
                identifier: identifier.to_string(),
                table_name: table.name.clone(),
                source_file: source_file.to_path_buf(),
            },
        })
    }

    fn diff_enums(
        reference: &BTreeMap<String, EnumDescriptor>,
        candidate: &BTreeMap<String, EnumDescriptor>,
        entries: &mut Vec<DiffEntry>,
    ) {
        for (name, ref_enum) in reference {
            match candidate.get(name) {
                None => entries.push(DiffEntry {
                    object: name.clone(),
                    payload: DiffPayload::MissingEnum {
                        descriptor: ref_enum.clone(),
                    },
                }),
                // Positional: label order is part of the type
                Some(cand_enum) if cand_enum.labels != ref_enum.labels => entries.push(DiffEntry {
                    object: name.clone(),
                    payload: DiffPayload::EnumMismatch {
                        reference: ref_enum.labels.clone(),
                        candidate: cand_enum.labels.clone(),
                    },
                }),
                Some(_) => {}
            }
        }
    }

    fn calculate_summary(
        reference: &SchemaModel,
        candidate: &SchemaModel,
        entries: &[DiffEntry],
    ) -> DiffSummary {
        let mut summary = DiffSummary {
            reference_tables: reference.tables.len(),
            candidate_tables: candidate.tables.len(),
            tables_compared: reference
                .tables
                .keys()
                .filter(|name| candidate.tables.contains_key(*name))
                .count(),
            reference_indexes: reference.tables.values().map(|t| t.comparable_index_count()).sum(),
            candidate_indexes: candidate.tables.values().map(|t| t.comparable_index_count()).sum(),
            ..Default::default()
        };

        let mut incomplete: HashSet<&str> = HashSet::new();
        for entry in entries {
            let count = entry.item_count();
            match entry.category() {
                DiffCategory::MissingTable => summary.missing_tables += 1,
                DiffCategory::MissingColumn => {
                    summary.missing_columns += count;
                    incomplete.insert(&entry.object);
                }
                DiffCategory::TypeMismatch => {
                    summary.type_mismatches += count;
                    incomplete.insert(&entry.object);
                }
                DiffCategory::NameMismatch => summary.name_mismatches += 1,
                DiffCategory::MissingIndex => summary.tables_missing_indexes += 1,
                DiffCategory::ExtraColumn => summary.extra_columns += count,
                DiffCategory::ExtraTable => summary.extra_tables += 1,
                DiffCategory::MissingEnum => summary.missing_enums += 1,
                DiffCategory::EnumMismatch => summary.enum_mismatches += 1,
            }
        }
        summary.complete_tables = summary.tables_compared - incomplete.len();

        summary
    }
}
