//! Corrective code generation
//!
//! Turns `missing_*` findings into text a developer can review: declaration
//! statements for the ORM source, and the equivalent PostgreSQL DDL. Nothing
//! here touches existing files or a database.

use crate::defaults::DefaultExpr;
use crate::model::{ColumnDescriptor, EnumDescriptor, SchemaModel, TableDescriptor};
use crate::reconcile::{DiffPayload, Reconciliation};
use crate::types::escape_single_quoted;
use std::path::PathBuf;

const REVIEW_FLAG: &str = "MANUAL REVIEW";

/// What the reference has and the candidate lacks, in render order
struct Missing<'a> {
    enums: Vec<&'a EnumDescriptor>,
    tables: Vec<&'a TableDescriptor>,
    columns: Vec<(&'a str, Option<&'a PathBuf>, &'a [ColumnDescriptor])>,
}

impl<'a> Missing<'a> {
    fn collect(reconciliation: &'a Reconciliation) -> Self {
        let mut missing = Self {
            enums: Vec::new(),
            tables: Vec::new(),
            columns: Vec::new(),
        };
        for entry in &reconciliation.entries {
            match &entry.payload {
                DiffPayload::MissingEnum { descriptor } => missing.enums.push(descriptor),
                DiffPayload::MissingTable { table } => missing.tables.push(table),
                DiffPayload::MissingColumn {
                    columns,
                    source_file,
                } => missing
                    .columns
                    .push((entry.object.as_str(), source_file.as_ref(), columns.as_slice())),
                _ => {}
            }
        }
        missing
    }

    fn is_empty(&self) -> bool {
        self.enums.is_empty() && self.tables.is_empty() && self.columns.is_empty()
    }
}

/// `ledger_entries` -> `ledgerEntries`
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' || c == '-' || c == ' ' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Renders ORM declaration statements
pub struct DeclarationRenderer<'a> {
    reference: &'a SchemaModel,
}

impl<'a> DeclarationRenderer<'a> {
    /// `reference` supplies enum names so enum columns use their enum
    /// constructor instead of a plain type.
    pub fn new(reference: &'a SchemaModel) -> Self {
        Self { reference }
    }

    pub fn render(&self, reconciliation: &Reconciliation) -> String {
        let missing = Missing::collect(reconciliation);
        let mut blocks = vec![format!(
            "// Generated from the {} schema. Review before copying into declaration files.",
            self.reference.origin.label()
        )];
        if missing.is_empty() {
            blocks.push("// Nothing is missing.".to_string());
        }

        for descriptor in &missing.enums {
            blocks.push(self.enum_declaration(descriptor));
        }
        for table in &missing.tables {
            blocks.push(self.table_declaration(table));
        }
        for (table, source_file, columns) in &missing.columns {
            let location = source_file
                .map(|f| f.display().to_string())
                .unwrap_or_else(|| "unknown file".to_string());
            let inline_pk = self.single_primary_key(table);
            let mut block = format!("// Table: {} ({})", table, location);
            for column in columns.iter() {
                block.push('\n');
                block.push_str(&self.column_line(column, inline_pk));
            }
            blocks.push(block);
        }

        blocks.join("\n\n") + "\n"
    }

    fn single_primary_key(&self, table: &str) -> bool {
        self.reference
            .table(table)
            .is_some_and(|t| t.primary_key.len() == 1)
    }

    fn enum_declaration(&self, descriptor: &EnumDescriptor) -> String {
        let labels: Vec<String> = descriptor
            .labels
            .iter()
            .map(|l| format!("'{}'", escape_single_quoted(l)))
            .collect();
        format!(
            "export const {} = pgEnum('{}', [{}]);",
            camel_case(&descriptor.name),
            escape_single_quoted(&descriptor.name),
            labels.join(", ")
        )
    }

    fn table_declaration(&self, table: &TableDescriptor) -> String {
        let inline_pk = table.primary_key.len() == 1;
        let mut block = format!(
            "// Table: {} (not declared)\nexport const {} = pgTable('{}', {{",
            table.name,
            camel_case(&table.name),
            escape_single_quoted(&table.name)
        );
        for column in &table.columns {
            block.push('\n');
            block.push_str(&self.column_line(column, inline_pk));
        }
        if table.primary_key.len() > 1 {
            let members: Vec<String> = table
                .primary_key
                .iter()
                .map(|c| format!("table.{}", camel_case(c)))
                .collect();
            block.push_str(&format!(
                "\n}}, (table) => ({{\n  pk: primaryKey({{ columns: [{}] }}),\n}}));",
                members.join(", ")
            ));
        } else {
            block.push_str("\n});");
        }
        block
    }

    /// One `property: constructor(...).modifiers,` line. A column whose
    /// default cannot be classified is commented out and flagged.
    fn column_line(&self, column: &ColumnDescriptor, inline_pk: bool) -> String {
        let property = camel_case(&column.name);
        let mut call = match self.reference.enums.get(&column.native_type) {
            Some(e) => format!("{}('{}')", camel_case(&e.name), escape_single_quoted(&column.name)),
            None => column.canonical_type.declaration_call(&column.name),
        };

        if column.primary_key && inline_pk {
            call.push_str(".primaryKey()");
        } else if !column.nullable {
            call.push_str(".notNull()");
        }
        if column.unique && !column.primary_key {
            call.push_str(".unique()");
        }

        let default = column.default_expr();
        if let Some(modifier) = default
            .as_ref()
            .and_then(|d| d.declaration_modifier(&column.canonical_type))
        {
            call.push_str(&modifier);
        }

        if let Some(fk) = &column.foreign_key {
            let target = format!("{}.{}", camel_case(&fk.table), camel_case(&fk.column));
            match fk.on_delete.as_deref().filter(|a| !a.eq_ignore_ascii_case("NO ACTION")) {
                Some(action) => call.push_str(&format!(
                    ".references(() => {}, {{ onDelete: '{}' }})",
                    target,
                    action.to_ascii_lowercase()
                )),
                None => call.push_str(&format!(".references(() => {})", target)),
            }
        }

        match default {
            Some(DefaultExpr::Unclassified(raw)) => format!(
                "  // {}: {}, // {}: default `{}` not reproduced",
                property, call, REVIEW_FLAG, raw
            ),
            _ => format!("  {}: {},", property, call),
        }
    }
}

/// Renders PostgreSQL DDL for the same findings
pub struct SqlRenderer<'a> {
    namespace: &'a str,
    reference: &'a SchemaModel,
}

impl<'a> SqlRenderer<'a> {
    pub fn new(namespace: &'a str, reference: &'a SchemaModel) -> Self {
        Self {
            namespace,
            reference,
        }
    }

    pub fn render(&self, reconciliation: &Reconciliation) -> String {
        let missing = Missing::collect(reconciliation);
        let mut statements = vec![
            "-- Corrective DDL. Review before running; this file is never applied automatically."
                .to_string(),
        ];
        if missing.is_empty() {
            statements.push("-- Nothing is missing.".to_string());
        }

        for descriptor in &missing.enums {
            statements.push(self.create_type_sql(descriptor));
        }
        for table in &missing.tables {
            statements.push(self.create_table_sql(table));
        }
        for (table, _, columns) in &missing.columns {
            for column in columns.iter() {
                statements.push(self.add_column_sql(table, column));
            }
        }

        statements.join("\n\n") + "\n"
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}.{}", quote_ident(self.namespace), quote_ident(name))
    }

    fn column_type(&self, column: &ColumnDescriptor) -> String {
        if self.reference.enums.contains_key(&column.native_type) {
            self.qualified(&column.native_type)
        } else {
            column.canonical_type.sql_type()
        }
    }

    /// `"name" type [NOT NULL] [DEFAULT ...]`, plus the review comment for an
    /// unclassified default
    fn column_definition(&self, table: &str, column: &ColumnDescriptor) -> (String, Option<String>) {
        let mut def = format!("{} {}", quote_ident(&column.name), self.column_type(column));
        if !column.nullable {
            def.push_str(" NOT NULL");
        }
        let mut review = None;
        match column.default_expr() {
            Some(DefaultExpr::Unclassified(raw)) => {
                review = Some(format!(
                    "-- {}: default `{}` on {}.{} not reproduced",
                    REVIEW_FLAG, raw, table, column.name
                ));
            }
            Some(expr) => {
                if let Some(default) = expr.sql_default() {
                    def.push_str(&format!(" DEFAULT {}", default));
                }
            }
            None => {}
        }
        (def, review)
    }

    fn create_type_sql(&self, descriptor: &EnumDescriptor) -> String {
        let labels: Vec<String> = descriptor
            .labels
            .iter()
            .map(|l| format!("'{}'", l.replace('\'', "''")))
            .collect();
        format!(
            "CREATE TYPE {} AS ENUM ({});",
            self.qualified(&descriptor.name),
            labels.join(", ")
        )
    }

    fn create_table_sql(&self, table: &TableDescriptor) -> String {
        let mut reviews = Vec::new();
        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                let (def, review) = self.column_definition(&table.name, column);
                reviews.extend(review);
                format!("    {}", def)
            })
            .collect();

        if !table.primary_key.is_empty() {
            let members: Vec<String> = table.primary_key.iter().map(|c| quote_ident(c)).collect();
            lines.push(format!("    PRIMARY KEY ({})", members.join(", ")));
        }
        for constraint in &table.unique_constraints {
            let members: Vec<String> = constraint.columns.iter().map(|c| quote_ident(c)).collect();
            lines.push(format!(
                "    CONSTRAINT {} UNIQUE ({})",
                quote_ident(&constraint.name),
                members.join(", ")
            ));
        }
        for fk in &table.foreign_keys {
            lines.push(format!(
                "    FOREIGN KEY ({}) REFERENCES {} ({}){}",
                quote_ident(&fk.column),
                self.qualified(&fk.references_table),
                quote_ident(&fk.references_column),
                referential_actions(fk.on_delete.as_deref(), fk.on_update.as_deref())
            ));
        }

        let mut sql = reviews.join("\n");
        if !sql.is_empty() {
            sql.push('\n');
        }
        sql.push_str(&format!(
            "CREATE TABLE {} (\n{}\n);",
            self.qualified(&table.name),
            lines.join(",\n")
        ));
        sql
    }

    fn add_column_sql(&self, table: &str, column: &ColumnDescriptor) -> String {
        let (def, review) = self.column_definition(table, column);
        let mut sql = review.map(|r| r + "\n").unwrap_or_default();
        sql.push_str(&format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.qualified(table),
            def
        ));
        if let Some(fk) = &column.foreign_key {
            sql.push_str(&format!(
                " REFERENCES {} ({}){}",
                self.qualified(&fk.table),
                quote_ident(&fk.column),
                referential_actions(fk.on_delete.as_deref(), fk.on_update.as_deref())
            ));
        }
        sql.push(';');
        sql
    }
}

fn referential_actions(on_delete: Option<&str>, on_update: Option<&str>) -> String {
    let mut out = String::new();
    for (clause, action) in [("ON DELETE", on_delete), ("ON UPDATE", on_update)] {
        if let Some(action) = action.filter(|a| !a.eq_ignore_ascii_case("NO ACTION")) {
            out.push_str(&format!(" {} {}", clause, action.to_ascii_uppercase()));
        }
    }
    out
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
