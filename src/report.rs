//! Audit report
//!
//! Structured document built from a [`Reconciliation`] and both models, with a
//! JSON and a Markdown rendering. Lists are capped at a configurable size and
//! always state how many items were left out. The report carries no
//! timestamps, so identical inputs render byte-identical output.

use crate::error::AuditResult;
use crate::model::{Diagnostics, Origin, RelationKind, SchemaModel, Statistics};
use crate::reconcile::{DiffCategory, DiffPayload, DiffSummary, Reconciliation};
use serde::Serialize;
use std::path::PathBuf;

/// Severity levels for findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn of(category: DiffCategory) -> Self {
        match category {
            DiffCategory::MissingTable
            | DiffCategory::MissingColumn
            | DiffCategory::TypeMismatch
            | DiffCategory::MissingEnum
            | DiffCategory::EnumMismatch => Severity::Error,
            DiffCategory::NameMismatch | DiffCategory::MissingIndex => Severity::Warning,
            DiffCategory::ExtraColumn | DiffCategory::ExtraTable => Severity::Info,
        }
    }

    fn heading(&self) -> &'static str {
        match self {
            Severity::Error => "🔴 Errors",
            Severity::Warning => "🟡 Warnings",
            Severity::Info => "🔵 Advisory",
        }
    }
}

/// A list truncated to the display limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capped<T> {
    pub total: usize,
    pub items: Vec<T>,
    pub hidden: usize,
}

impl<T> Capped<T> {
    pub fn new(items: impl IntoIterator<Item = T>, limit: usize) -> Self {
        let all: Vec<T> = items.into_iter().collect();
        let total = all.len();
        let items: Vec<T> = all.into_iter().take(limit).collect();
        Self {
            total,
            hidden: total - items.len(),
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Findings of one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSection {
    pub severity: Severity,
    pub category: DiffCategory,
    /// Individual items (columns, tables, enums) across all entries
    pub item_count: usize,
    pub entries: Capped<String>,
}

/// Per-model facts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOverview {
    pub origin: Origin,
    pub checksum: String,
    pub statistics: Statistics,
    pub diagnostics: Capped<String>,
}

impl ModelOverview {
    fn of(model: &SchemaModel, limit: usize) -> Self {
        Self {
            origin: model.origin,
            checksum: model.checksum(),
            statistics: model.statistics(),
            diagnostics: Capped::new(diagnostic_lines(&model.diagnostics), limit),
        }
    }
}

/// Identifier that should be renamed to match its table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameSuggestion {
    pub identifier: String,
    pub table_name: String,
    pub source_file: PathBuf,
}

/// A declared relation whose target has no reference table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationFinding {
    pub owner: String,
    pub name: String,
    pub kind: RelationKind,
    pub target: String,
    pub source_file: PathBuf,
    pub reason: String,
}

/// Complete audit document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub display_limit: usize,
    pub reference: ModelOverview,
    pub candidate: ModelOverview,
    pub summary: DiffSummary,
    pub completeness_percent: f64,
    pub sections: Vec<ReportSection>,
    pub renames: Capped<RenameSuggestion>,
    pub relations_total: usize,
    pub flagged_relations: Capped<RelationFinding>,
}

impl AuditReport {
    pub fn build(
        reference: &SchemaModel,
        candidate: &SchemaModel,
        reconciliation: &Reconciliation,
        display_limit: usize,
    ) -> Self {
        let mut categories: Vec<DiffCategory> = DiffCategory::ALL.to_vec();
        categories.sort_by_key(|c| (Severity::of(*c), *c));

        let sections = categories
            .into_iter()
            .filter_map(|category| {
                let entries: Vec<_> = reconciliation.of(category).collect();
                if entries.is_empty() {
                    return None;
                }
                Some(ReportSection {
                    severity: Severity::of(category),
                    category,
                    item_count: entries.iter().map(|e| e.item_count()).sum(),
                    entries: Capped::new(entries.iter().map(|e| e.describe()), display_limit),
                })
            })
            .collect();

        let renames = Capped::new(
            reconciliation
                .of(DiffCategory::NameMismatch)
                .filter_map(|entry| match &entry.payload {
                    DiffPayload::NameMismatch {
                        identifier,
                        table_name,
                        source_file,
                    } => Some(RenameSuggestion {
                        identifier: identifier.clone(),
                        table_name: table_name.clone(),
                        source_file: source_file.clone(),
                    }),
                    _ => None,
                }),
            display_limit,
        );

        // Relations live on whichever side came from declarations
        let declared = [candidate, reference]
            .into_iter()
            .find(|m| m.origin == Origin::Declaration);
        let other = if declared.is_some_and(|d| std::ptr::eq(d, candidate)) {
            reference
        } else {
            candidate
        };
        let relations = declared.map(|d| d.relations.as_slice()).unwrap_or_default();

        let flagged = relations.iter().filter_map(|relation| {
            let reason = match &relation.target_table {
                None => "target identifier is not declared".to_string(),
                Some(table) if !other.tables.contains_key(table) => {
                    format!("target table {} is absent from the {}", table, other.origin.label())
                }
                Some(_) => return None,
            };
            Some(RelationFinding {
                owner: relation
                    .owner_table
                    .clone()
                    .unwrap_or_else(|| relation.owner_identifier.clone()),
                name: relation.name.clone(),
                kind: relation.kind,
                target: relation.target_identifier.clone(),
                source_file: relation.source_file.clone(),
                reason,
            })
        });

        Self {
            display_limit,
            reference: ModelOverview::of(reference, display_limit),
            candidate: ModelOverview::of(candidate, display_limit),
            completeness_percent: (reconciliation.summary.completeness() * 10.0).round() / 10.0,
            summary: reconciliation.summary.clone(),
            sections,
            renames,
            relations_total: relations.len(),
            flagged_relations: Capped::new(flagged, display_limit),
        }
    }

    pub fn to_json(&self) -> AuditResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let s = &self.summary;
        let (r, c) = (&self.reference, &self.candidate);

        md.push_str("# Schema Audit Report\n\n");
        md.push_str(&format!(
            "| | Reference ({}) | Candidate ({}) |\n",
            r.origin.label(),
            c.origin.label()
        ));
        md.push_str("|---|---:|---:|\n");
        let rows = [
            ("Tables", r.statistics.total_tables, c.statistics.total_tables),
            ("Columns", r.statistics.total_columns, c.statistics.total_columns),
            ("Enums", r.statistics.total_enums, c.statistics.total_enums),
            ("Primary keys", r.statistics.total_primary_keys, c.statistics.total_primary_keys),
            ("Foreign keys", r.statistics.total_foreign_keys, c.statistics.total_foreign_keys),
            (
                "Unique constraints",
                r.statistics.total_unique_constraints,
                c.statistics.total_unique_constraints,
            ),
            ("Indexes (comparable)", s.reference_indexes, s.candidate_indexes),
            ("Relations", r.statistics.total_relations, c.statistics.total_relations),
        ];
        for (label, left, right) in rows {
            md.push_str(&format!("| {} | {} | {} |\n", label, left, right));
        }
        md.push_str(&format!("| Checksum | `{}` | `{}` |\n\n", short(&r.checksum), short(&c.checksum)));

        md.push_str("## Summary\n\n");
        md.push_str(&format!(
            "- Complete tables: {} / {} ({:.1}%)\n",
            s.complete_tables, s.reference_tables, self.completeness_percent
        ));
        md.push_str(&format!("- Tables compared: {}\n", s.tables_compared));
        md.push_str(&format!("- Missing tables: {}\n", s.missing_tables));
        md.push_str(&format!("- Missing columns: {}\n", s.missing_columns));
        md.push_str(&format!("- Type mismatches: {}\n", s.type_mismatches));
        md.push_str(&format!("- Tables with missing indexes: {}\n", s.tables_missing_indexes));
        md.push_str(&format!("- Name mismatches: {}\n", s.name_mismatches));
        md.push_str(&format!("- Missing enums: {}, enum mismatches: {}\n", s.missing_enums, s.enum_mismatches));
        md.push_str(&format!("- Extra tables: {}, extra columns: {}\n\n", s.extra_tables, s.extra_columns));

        if self.sections.is_empty() {
            md.push_str("✅ No discrepancies found.\n\n");
        }
        let mut current: Option<Severity> = None;
        for section in &self.sections {
            if current != Some(section.severity) {
                md.push_str(&format!("## {}\n\n", section.severity.heading()));
                current = Some(section.severity);
            }
            md.push_str(&format!(
                "### {} ({} items in {} entries)\n\n",
                section.category, section.item_count, section.entries.total
            ));
            write_list(&mut md, &section.entries, |line| line.clone());
        }

        if !self.renames.is_empty() {
            md.push_str("## Naming standardization\n\n");
            write_list(&mut md, &self.renames, |r| {
                format!("`{}` → `{}` ({})", r.identifier, r.table_name, r.source_file.display())
            });
        }

        md.push_str("## Relations\n\n");
        md.push_str(&format!(
            "{} declared relations, {} flagged.\n\n",
            self.relations_total, self.flagged_relations.total
        ));
        write_list(&mut md, &self.flagged_relations, |f| {
            format!(
                "{}.{} ({:?} → {}): {} [{}]",
                f.owner,
                f.name,
                f.kind,
                f.target,
                f.reason,
                f.source_file.display()
            )
        });

        md.push_str("## Extraction diagnostics\n\n");
        for overview in [r, c] {
            md.push_str(&format!("### {}\n\n", overview.origin.label()));
            if overview.diagnostics.is_empty() {
                md.push_str("No issues.\n\n");
            } else {
                write_list(&mut md, &overview.diagnostics, |line| line.clone());
            }
        }

        md
    }
}

fn write_list<T>(md: &mut String, list: &Capped<T>, render: impl Fn(&T) -> String) {
    for item in &list.items {
        md.push_str(&format!("- {}\n", render(item)));
    }
    if list.hidden > 0 {
        md.push_str(&format!("- ... +{} more\n", list.hidden));
    }
    md.push('\n');
}

fn short(checksum: &str) -> &str {
    checksum.get(..12).unwrap_or(checksum)
}

/// Flatten diagnostics into display lines
pub fn diagnostic_lines(diagnostics: &Diagnostics) -> Vec<String> {
    let mut lines = Vec::new();
    for (category, count) in &diagnostics.skipped_rows {
        lines.push(format!("{} malformed {} rows skipped", count, category));
    }
    for failure in &diagnostics.file_failures {
        lines.push(format!("unreadable file {}: {}", failure.file.display(), failure.error));
    }
    for unparsed in &diagnostics.unparsed {
        lines.push(format!(
            "unparsed declaration at {}:{}: {}",
            unparsed.file.display(),
            unparsed.line,
            unparsed.reason
        ));
    }
    for table in &diagnostics.duplicate_tables {
        lines.push(format!("duplicate table {} (first declaration kept)", table));
    }
    for name in &diagnostics.duplicate_enums {
        lines.push(format!("duplicate enum {} (first declaration kept)", name));
    }
    for column in &diagnostics.duplicate_columns {
        lines.push(format!("duplicate column {} dropped", column));
    }
    for member in &diagnostics.invalid_primary_keys {
        lines.push(format!("primary key member {} has no column", member));
    }
    for reference in &diagnostics.unresolved_references {
        lines.push(format!("unresolved reference {}", reference));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;
    use crate::model::{ModelBuilder, RelationDescriptor, UnparsedDeclaration};
    use crate::reconcile::DiffEngine;
    use crate::types::CanonicalType;
    use pretty_assertions::assert_eq;

    fn many_missing_tables(count: usize) -> (SchemaModel, SchemaModel) {
        let tables = (0..count)
            .map(|i| db_table(&format!("t{:02}", i), vec![column("id", 1, CanonicalType::Uuid)]))
            .collect();
        (
            model(Origin::Database, tables, vec![]),
            model(Origin::Declaration, vec![], vec![]),
        )
    }

    #[test]
    fn test_capped_lists_state_hidden_count() {
        let (reference, candidate) = many_missing_tables(25);
        let result = DiffEngine::diff(&reference, &candidate);
        let report = AuditReport::build(&reference, &candidate, &result, 20);

        let section = &report.sections[0];
        assert_eq!(section.category, DiffCategory::MissingTable);
        assert_eq!(section.entries.total, 25);
        assert_eq!(section.entries.items.len(), 20);
        assert_eq!(section.entries.hidden, 5);
        assert!(report.to_markdown().contains("- ... +5 more"));
    }

    #[test]
    fn test_sections_are_ordered_by_severity() {
        let reference = model(
            Origin::Database,
            vec![db_table("a", vec![column("id", 1, CanonicalType::Uuid)])],
            vec![],
        );
        let candidate = model(
            Origin::Declaration,
            vec![
                decl_table(
                    "a",
                    "a",
                    "a.ts",
                    vec![column("id", 1, CanonicalType::Uuid), column("x", 2, CanonicalType::Text)],
                ),
                decl_table("b", "bTable", "b.ts", vec![]),
            ],
            vec![],
        );
        let result = DiffEngine::diff(&reference, &candidate);
        let report = AuditReport::build(&reference, &candidate, &result, 20);

        let order: Vec<_> = report.sections.iter().map(|s| (s.severity, s.category)).collect();
        assert_eq!(
            order,
            vec![
                (Severity::Warning, DiffCategory::NameMismatch),
                (Severity::Info, DiffCategory::ExtraColumn),
                (Severity::Info, DiffCategory::ExtraTable),
            ]
        );
        assert_eq!(report.renames.items[0].identifier, "bTable");
        assert_eq!(report.completeness_percent, 100.0);
    }

    #[test]
    fn test_relations_with_absent_targets_are_flagged() {
        let reference = model(Origin::Database, vec![db_table("invoices", vec![])], vec![]);

        let mut builder = ModelBuilder::new(Origin::Declaration);
        builder.add_table(decl_table("invoices", "invoices", "billing.ts", vec![]));
        builder.add_table(decl_table("drafts", "drafts", "billing.ts", vec![]));
        for (name, target) in [("self", "invoices"), ("drafts", "drafts"), ("ghost", "ghosts")] {
            builder.add_relation(RelationDescriptor {
                name: name.into(),
                kind: RelationKind::Many,
                owner_identifier: "invoices".into(),
                target_identifier: target.into(),
                owner_table: None,
                target_table: None,
                source_file: "billing.ts".into(),
            });
        }
        let candidate = builder.finish();

        let result = DiffEngine::diff(&reference, &candidate);
        let report = AuditReport::build(&reference, &candidate, &result, 20);
        assert_eq!(report.relations_total, 3);
        let flagged: Vec<_> = report
            .flagged_relations
            .items
            .iter()
            .map(|f| (f.name.as_str(), f.reason.as_str()))
            .collect();
        assert_eq!(
            flagged,
            vec![
                ("drafts", "target table drafts is absent from the database"),
                ("ghost", "target identifier is not declared"),
            ]
        );
    }

    #[test]
    fn test_diagnostics_are_always_visible() {
        let reference = model(Origin::Database, vec![], vec![]);
        let mut builder = ModelBuilder::new(Origin::Declaration);
        builder.diagnostics_mut().unparsed.push(UnparsedDeclaration {
            file: "crm.ts".into(),
            line: 12,
            reason: "contacts: table name is not a string literal".into(),
        });
        let candidate = builder.finish();

        let result = DiffEngine::diff(&reference, &candidate);
        let report = AuditReport::build(&reference, &candidate, &result, 20);
        let md = report.to_markdown();
        assert!(md.contains("unparsed declaration at crm.ts:12"));
        assert!(md.contains("✅ No discrepancies found."));
    }

    #[test]
    fn test_markdown_layout() {
        let (reference, candidate) = many_missing_tables(3);
        let result = DiffEngine::diff(&reference, &candidate);
        let md = AuditReport::build(&reference, &candidate, &result, 2).to_markdown();

        assert!(md.starts_with(
            "# Schema Audit Report\n\n| | Reference (database) | Candidate (declaration) |\n|---|---:|---:|\n| Tables | 3 | 0 |\n"
        ));
        assert!(md.contains("- Complete tables: 0 / 3 (0.0%)\n- Tables compared: 0\n"));
        assert!(md.contains(
            "## 🔴 Errors\n\n### missing_table (3 items in 3 entries)\n\n- Table t00 missing (1 columns)\n- Table t01 missing (1 columns)\n- ... +1 more\n\n"
        ));
        assert!(md.ends_with("### declaration\n\nNo issues.\n\n"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let (reference, candidate) = many_missing_tables(3);
        let result = DiffEngine::diff(&reference, &candidate);
        let a = AuditReport::build(&reference, &candidate, &result, 20);
        let b = AuditReport::build(&reference, &candidate, &result, 20);
        assert_eq!(a.to_markdown(), b.to_markdown());
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }
}
