//! Recursive-descent block reader
//!
//! Walks the token stream of one source file looking for `pgTable`, `pgEnum`
//! and `relations` bindings. Blocks are delimited by bracket depth, so nested
//! option objects, arrow callbacks and multi-line chains never confuse the
//! column splitter. Anything the reader cannot recover is recorded as an
//! unparsed declaration and skipped; its siblings are unaffected.

use super::lexer::{tokenize, Token, TokenKind};
use crate::model::{
    ColumnDescriptor, EnumDescriptor, ForeignKeyRef, IndexDescriptor, ModelBuilder, Origin,
    RelationDescriptor, RelationKind, TableDescriptor, TableSource, UniqueConstraint,
    UnparsedDeclaration,
};
use crate::types::{CanonicalType, DeclaredTypeOptions};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Which kinds of declarations to collect from a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadScope {
    pub tables: bool,
    pub enums: bool,
    pub relations: bool,
}

impl ReadScope {
    pub const ALL: ReadScope = ReadScope {
        tables: true,
        enums: true,
        relations: true,
    };

    pub const ENUMS_ONLY: ReadScope = ReadScope {
        tables: false,
        enums: true,
        relations: false,
    };

    pub const WITHOUT_ENUMS: ReadScope = ReadScope {
        tables: true,
        enums: false,
        relations: true,
    };
}

/// Read one source file into its own builder
pub fn read_source(source: &str, file: &Path, scope: ReadScope) -> ModelBuilder {
    let mut reader = Reader {
        source,
        tokens: tokenize(source),
        file: file.to_path_buf(),
        scope,
        builder: ModelBuilder::new(Origin::Declaration),
    };
    reader.run();
    reader.builder
}

struct Reader<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    file: PathBuf,
    scope: ReadScope,
    builder: ModelBuilder,
}

type Step = Result<usize, (usize, String)>;

impl<'s> Reader<'s> {
    fn run(&mut self) {
        let mut i = 0;
        while i < self.tokens.len() {
            let is_binding = ["const", "let", "var"].iter().any(|kw| self.tokens[i].is_ident(kw));
            let binding = self.tokens.get(i + 1).and_then(|t| t.ident()).map(str::to_string);

            let (Some(binding), true) = (binding, is_binding) else {
                i += 1;
                continue;
            };
            let Some(eq) = self.find_assignment(i + 2) else {
                i += 1;
                continue;
            };

            let call = eq + 1;
            let callee = self.tokens.get(call).and_then(|t| t.ident()).map(str::to_string);
            let opens = self.tokens.get(call + 1).is_some_and(|t| t.is_punct('('));

            let step = match (callee.as_deref(), opens) {
                (Some("pgTable"), true) if self.scope.tables => self.read_table(&binding, call),
                (Some("pgEnum"), true) if self.scope.enums => self.read_enum(&binding, call),
                (Some("relations"), true) if self.scope.relations => {
                    self.read_relations(&binding, call)
                }
                _ => Ok(call),
            };

            i = match step {
                Ok(next) => next,
                Err((at, reason)) => {
                    self.unparsed(at, format!("{}: {}", binding, reason));
                    // Resume after the call if its brackets balance
                    self.matching(call + 1).map(|c| c + 1).unwrap_or(self.tokens.len())
                }
            };
        }
    }

    fn find_assignment(&self, start: usize) -> Option<usize> {
        for (j, token) in self.tokens.iter().enumerate().skip(start) {
            if token.is_punct('=') {
                return Some(j);
            }
            if token.is_punct(';')
                || ["const", "let", "var", "export", "function"].iter().any(|kw| token.is_ident(kw))
            {
                return None;
            }
        }
        None
    }

    fn unparsed(&mut self, at: usize, reason: String) {
        let line = self.tokens.get(at).or(self.tokens.last()).map(|t| t.line).unwrap_or(1);
        warn!(
            "⚠️  Unparsed declaration in {}:{}: {}",
            self.file.display(),
            line,
            reason
        );
        self.builder.diagnostics_mut().unparsed.push(UnparsedDeclaration {
            file: self.file.clone(),
            line,
            reason,
        });
    }

    // ----- token-range helpers -----

    fn is_opener(token: &Token) -> bool {
        matches!(token.kind, TokenKind::Punct('(' | '[' | '{'))
    }

    fn is_closer(token: &Token) -> bool {
        matches!(token.kind, TokenKind::Punct(')' | ']' | '}'))
    }

    /// Index of the bracket closing the opener at `open`
    fn matching(&self, open: usize) -> Option<usize> {
        if !self.tokens.get(open).is_some_and(Self::is_opener) {
            return None;
        }
        let mut depth = 0usize;
        for (j, token) in self.tokens.iter().enumerate().skip(open) {
            if Self::is_opener(token) {
                depth += 1;
            } else if Self::is_closer(token) {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            }
        }
        None
    }

    /// `<` opening type arguments of a chained call, as in `.$type<T>()`
    fn opens_type_arguments(&self, j: usize) -> bool {
        j >= 2
            && self.tokens[j].is_punct('<')
            && self.tokens[j - 1].ident().is_some()
            && self.tokens[j - 2].is_punct('.')
    }

    /// Split `range` at commas on its base depth. Commas inside type
    /// arguments do not split. Empty parts (trailing commas) are dropped.
    fn split_commas(&self, range: Range<usize>) -> Vec<Range<usize>> {
        let mut parts = Vec::new();
        let mut depth = 0usize;
        let mut angle = 0usize;
        let mut start = range.start;
        for j in range.clone() {
            let token = &self.tokens[j];
            if Self::is_opener(token) {
                depth += 1;
            } else if Self::is_closer(token) {
                depth = depth.saturating_sub(1);
            } else if token.is_punct('<') && (angle > 0 || self.opens_type_arguments(j)) {
                angle += 1;
            } else if token.is_punct('>') && angle > 0 {
                angle -= 1;
            } else if depth == 0 && angle == 0 && token.is_punct(',') {
                if j > start {
                    parts.push(start..j);
                }
                start = j + 1;
            }
        }
        if range.end > start {
            parts.push(start..range.end);
        }
        parts
    }

    /// Arguments of the call whose `(` is at `open`, plus the `)` index
    fn call_args(&self, open: usize) -> Result<(Vec<Range<usize>>, usize), (usize, String)> {
        let close = self
            .matching(open)
            .ok_or_else(|| (open, "unbalanced brackets".to_string()))?;
        Ok((self.split_commas(open + 1..close), close))
    }

    fn text(&self, range: &Range<usize>) -> &'s str {
        if range.is_empty() {
            return "";
        }
        let start = self.tokens[range.start].span.start;
        let end = self.tokens[range.end - 1].span.end;
        &self.source[start..end]
    }

    fn single(&self, range: &Range<usize>) -> Option<&Token> {
        (range.len() == 1).then(|| &self.tokens[range.start])
    }

    fn string_arg(&self, range: Option<&Range<usize>>) -> Option<String> {
        range
            .and_then(|r| self.single(r))
            .and_then(|t| t.string())
            .map(str::to_string)
    }

    /// `{ key: value, ... }` entries as key -> value range
    fn object_entries(&self, range: &Range<usize>) -> Vec<(String, Range<usize>)> {
        if !self.tokens.get(range.start).is_some_and(|t| t.is_punct('{')) {
            return Vec::new();
        }
        let Some(close) = self.matching(range.start) else {
            return Vec::new();
        };
        self.split_commas(range.start + 1..close)
            .into_iter()
            .filter_map(|part| {
                let key = match &self.tokens[part.start].kind {
                    TokenKind::Ident(k) | TokenKind::Str(k) => k.clone(),
                    _ => return None,
                };
                let colon = part.start + 1;
                if colon < part.end && self.tokens[colon].is_punct(':') {
                    Some((key, colon + 1..part.end))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Column referenced by `t.column`, `table.column.asc()` or `column`
    fn column_ref(&self, range: &Range<usize>) -> Option<String> {
        for j in range.clone() {
            if self.tokens[j].is_punct('.') {
                return self.tokens.get(j + 1).and_then(|t| t.ident()).map(str::to_string);
            }
        }
        self.tokens.get(range.start).and_then(|t| t.ident()).map(str::to_string)
    }

    /// Raw default expression as it would appear in the catalog
    fn literal_text(&self, range: &Range<usize>) -> String {
        match self.tokens[range.clone()].iter().map(|t| &t.kind).collect::<Vec<_>>().as_slice() {
            [TokenKind::Str(s)] => format!("'{}'", s.replace('\'', "''")),
            [TokenKind::Template(t)] => t.clone(),
            [TokenKind::Ident(tag), TokenKind::Template(t)] if tag == "sql" => t.clone(),
            _ => self.text(range).to_string(),
        }
    }

    // ----- declarations -----

    fn read_table(&mut self, binding: &str, call: usize) -> Step {
        let (args, close) = self.call_args(call + 1)?;

        let name = self
            .string_arg(args.first())
            .ok_or_else(|| (call, "table name is not a string literal".to_string()))?;
        let columns = args
            .get(1)
            .filter(|r| self.tokens[r.start].is_punct('{'))
            .cloned()
            .ok_or_else(|| (call, format!("table '{}' has no column object", name)))?;
        let columns_close = self
            .matching(columns.start)
            .ok_or_else(|| (columns.start, "unbalanced column object".to_string()))?;

        let mut table = TableDescriptor::new(
            name.clone(),
            TableSource::Declaration {
                identifier: binding.to_string(),
                file: self.file.clone(),
            },
        );

        let mut ordinal = 0;
        for entry in self.split_commas(columns.start + 1..columns_close) {
            match self.read_column(&entry, ordinal + 1) {
                Ok(column) => {
                    ordinal += 1;
                    if column.primary_key {
                        table.primary_key.push(column.name.clone());
                    }
                    table.columns.push(column);
                }
                Err(reason) => {
                    let snippet: String = self.text(&entry).chars().take(60).collect();
                    self.unparsed(entry.start, format!("{}: {} ({})", name, reason, snippet));
                }
            }
        }

        if let Some(region) = args.get(2) {
            self.read_constraints(region, &mut table);
        }

        debug!(
            "Read table {} ({}) with {} columns",
            table.name,
            binding,
            table.columns.len()
        );
        self.builder.add_table(table);
        Ok(close + 1)
    }

    fn read_column(&self, entry: &Range<usize>, ordinal: u32) -> Result<ColumnDescriptor, String> {
        let at = |offset: usize| self.tokens.get(entry.start + offset).filter(|_| entry.start + offset < entry.end);

        let key = match at(0).map(|t| &t.kind) {
            Some(TokenKind::Ident(k)) | Some(TokenKind::Str(k)) => k.clone(),
            _ => return Err("entry does not start with a property name".to_string()),
        };
        if !at(1).is_some_and(|t| t.is_punct(':')) {
            return Err("expected ':' after property name".to_string());
        }
        let constructor = at(2)
            .and_then(|t| t.ident())
            .ok_or_else(|| "expected a column constructor".to_string())?
            .to_string();
        if !at(3).is_some_and(|t| t.is_punct('(')) {
            return Err(format!("constructor '{}' is not called", constructor));
        }
        let (args, close) = self
            .call_args(entry.start + 3)
            .map_err(|(_, reason)| reason)?;

        let name = self.string_arg(args.first()).unwrap_or_else(|| key.clone());

        let mut options = DeclaredTypeOptions::default();
        if let Some(object) = args.iter().find(|r| self.tokens[r.start].is_punct('{')) {
            for (option, value) in self.object_entries(object) {
                let number = self
                    .single(&value)
                    .and_then(|t| match &t.kind {
                        TokenKind::Number(n) => n.parse::<u32>().ok(),
                        _ => None,
                    });
                match option.as_str() {
                    "length" => options.length = number,
                    "precision" => options.precision = number,
                    "scale" => options.scale = number,
                    "withTimezone" => {
                        options.with_timezone = self.single(&value).is_some_and(|t| t.is_ident("true"))
                    }
                    _ => {}
                }
            }
        }

        let canonical = CanonicalType::from_declaration(&constructor, &options);
        let mut column = ColumnDescriptor::new(name, ordinal, constructor, canonical);
        column.property = Some(key);
        column.character_length = options.length;
        column.numeric_precision = options.precision;
        column.numeric_scale = options.scale;

        let mut not_null = false;
        let mut j = close + 1;
        while j < entry.end {
            if !self.tokens[j].is_punct('.') {
                return Err(format!("unexpected '{}' in modifier chain", self.text(&(j..j + 1))));
            }
            let method = self
                .tokens
                .get(j + 1)
                .filter(|_| j + 1 < entry.end)
                .and_then(|t| t.ident())
                .ok_or_else(|| "dangling '.' in modifier chain".to_string())?
                .to_string();

            let mut k = j + 2;
            if k < entry.end && self.tokens[k].is_punct('<') {
                k = self.skip_generic(k, entry.end)?;
            }
            let margs = if k < entry.end && self.tokens[k].is_punct('(') {
                let (margs, mclose) = self.call_args(k).map_err(|(_, reason)| reason)?;
                k = mclose + 1;
                margs
            } else {
                Vec::new()
            };
            j = k;

            match method.as_str() {
                "notNull" => not_null = true,
                "primaryKey" => column.primary_key = true,
                "unique" => column.unique = true,
                "defaultNow" => column.default_value = Some("now()".to_string()),
                "defaultRandom" => column.default_value = Some("gen_random_uuid()".to_string()),
                "default" => {
                    let value = margs
                        .first()
                        .ok_or_else(|| ".default() without a value".to_string())?;
                    column.default_value = Some(self.literal_text(value));
                }
                "references" => column.foreign_key = Some(self.read_reference(&margs)?),
                _ => {}
            }
        }

        column.nullable = !not_null && !column.primary_key;
        Ok(column)
    }

    /// Skip a `<...>` type argument list starting at `open`
    fn skip_generic(&self, open: usize, end: usize) -> Result<usize, String> {
        let mut depth = 0usize;
        for j in open..end {
            if self.tokens[j].is_punct('<') {
                depth += 1;
            } else if self.tokens[j].is_punct('>') {
                depth -= 1;
                if depth == 0 {
                    return Ok(j + 1);
                }
            }
        }
        Err("unbalanced type arguments".to_string())
    }

    fn read_reference(&self, args: &[Range<usize>]) -> Result<ForeignKeyRef, String> {
        let target = args
            .first()
            .ok_or_else(|| ".references() without a target".to_string())?;

        // `() => users.id`: the last `ident . ident` pair is the target
        let mut found = None;
        for j in target.clone() {
            if j + 2 < target.end && self.tokens[j + 1].is_punct('.') {
                if let (Some(table), Some(column)) =
                    (self.tokens[j].ident(), self.tokens[j + 2].ident())
                {
                    found = Some((table.to_string(), column.to_string()));
                }
            }
        }
        let (table, column) = found.ok_or_else(|| {
            format!("cannot resolve reference target '{}'", self.text(target))
        })?;

        let mut reference = ForeignKeyRef {
            table,
            column,
            on_update: None,
            on_delete: None,
        };
        if let Some(options) = args.get(1) {
            for (option, value) in self.object_entries(options) {
                let rule = self.string_arg(Some(&value));
                match option.as_str() {
                    "onDelete" => reference.on_delete = rule,
                    "onUpdate" => reference.on_update = rule,
                    _ => {}
                }
            }
        }
        Ok(reference)
    }

    /// Constraint callback: only index/unique/primary-key calls are read here
    fn read_constraints(&mut self, region: &Range<usize>, table: &mut TableDescriptor) {
        let mut k = region.start;
        while k < region.end {
            let token = &self.tokens[k];
            let kind = ["index", "uniqueIndex", "unique", "primaryKey"]
                .into_iter()
                .find(|name| token.is_ident(name));
            let is_call = self.tokens.get(k + 1).is_some_and(|t| t.is_punct('('));
            let chained = k > region.start && self.tokens[k - 1].is_punct('.');

            let (Some(kind), true, false) = (kind, is_call, chained) else {
                k += 1;
                continue;
            };
            let Ok((args, close)) = self.call_args(k + 1) else {
                self.unparsed(k, format!("{}: unbalanced {} call", table.name, kind));
                return;
            };

            // Follow `.on(...)` / `.using(...)` chains
            let mut end = close + 1;
            let mut columns: Vec<String> = Vec::new();
            while end + 2 < region.end
                && self.tokens[end].is_punct('.')
                && self.tokens[end + 2].is_punct('(')
            {
                let Some(method_close) = self.matching(end + 2) else {
                    break;
                };
                if self.tokens[end + 1].is_ident("on") {
                    columns = self
                        .split_commas(end + 3..method_close)
                        .iter()
                        .filter_map(|part| self.column_ref(part))
                        .collect();
                }
                end = method_close + 1;
            }
            let definition = self.text(&(k..end)).to_string();
            let columns: Vec<String> = columns.iter().map(|p| property_to_column(table, p)).collect();
            let fallback = format!("{}_{}", table.name, columns.join("_"));

            match kind {
                "index" | "uniqueIndex" => table.indexes.push(IndexDescriptor {
                    name: self
                        .string_arg(args.first())
                        .unwrap_or_else(|| format!("{}_idx", fallback)),
                    definition,
                    unique: kind == "uniqueIndex",
                }),
                "unique" => table.unique_constraints.push(UniqueConstraint {
                    name: self
                        .string_arg(args.first())
                        .unwrap_or_else(|| format!("{}_unique", fallback)),
                    columns,
                }),
                _ => {
                    let members: Vec<String> = match args.first() {
                        Some(first) if self.tokens[first.start].is_punct('{') => self
                            .object_entries(first)
                            .into_iter()
                            .find(|(key, _)| key == "columns")
                            .and_then(|(_, value)| {
                                let open = value.start;
                                self.matching(open).map(|c| self.split_commas(open + 1..c))
                            })
                            .unwrap_or_default()
                            .iter()
                            .filter_map(|part| self.column_ref(part))
                            .collect(),
                        _ => args.iter().filter_map(|part| self.column_ref(part)).collect(),
                    };
                    for member in members {
                        let column = property_to_column(table, &member);
                        if !table.primary_key.contains(&column) {
                            table.primary_key.push(column);
                        }
                    }
                }
            }
            k = end;
        }
    }

    fn read_enum(&mut self, binding: &str, call: usize) -> Step {
        let (args, close) = self.call_args(call + 1)?;
        let name = self
            .string_arg(args.first())
            .ok_or_else(|| (call, "enum name is not a string literal".to_string()))?;
        let values = args
            .get(1)
            .filter(|r| self.tokens[r.start].is_punct('['))
            .cloned()
            .ok_or_else(|| (call, format!("enum '{}' has no label array", name)))?;
        let values_close = self
            .matching(values.start)
            .ok_or_else(|| (values.start, "unbalanced label array".to_string()))?;

        let mut labels = Vec::new();
        for part in self.split_commas(values.start + 1..values_close) {
            let label = self
                .string_arg(Some(&part))
                .ok_or_else(|| (part.start, format!("enum '{}' has a non-literal label", name)))?;
            labels.push(label);
        }

        debug!("Read enum {} ({}) with {} labels", name, binding, labels.len());
        self.builder.add_enum(EnumDescriptor {
            name,
            labels,
            identifier: Some(binding.to_string()),
            source_file: Some(self.file.clone()),
        });
        Ok(close + 1)
    }

    fn read_relations(&mut self, binding: &str, call: usize) -> Step {
        let (args, close) = self.call_args(call + 1)?;
        let owner = args
            .first()
            .and_then(|r| self.single(r))
            .and_then(|t| t.ident())
            .map(str::to_string)
            .ok_or_else(|| (call, "relations owner is not an identifier".to_string()))?;
        let callback = args
            .get(1)
            .cloned()
            .ok_or_else(|| (call, "relations without a callback".to_string()))?;

        // Body object: first `{` after the arrow, past any wrapping parens
        let arrow = callback
            .clone()
            .find(|&j| self.tokens[j].kind == TokenKind::Arrow)
            .ok_or_else(|| (callback.start, "relations callback is not an arrow function".to_string()))?;
        let mut body = arrow + 1;
        while body < callback.end && self.tokens[body].is_punct('(') {
            body += 1;
        }
        if !(body < callback.end && self.tokens[body].is_punct('{')) {
            return Err((body, "relations callback does not return an object".to_string()));
        }

        for (name, value) in self.object_entries(&(body..callback.end)) {
            let kind = match self.tokens[value.start].ident() {
                Some("one") => RelationKind::One,
                Some("many") => RelationKind::Many,
                _ => {
                    self.unparsed(value.start, format!("{}.{}: not a one/many relation", binding, name));
                    continue;
                }
            };
            let target = self
                .tokens
                .get(value.start + 2)
                .filter(|_| self.tokens.get(value.start + 1).is_some_and(|t| t.is_punct('(')))
                .and_then(|t| t.ident())
                .map(str::to_string);
            let Some(target) = target else {
                self.unparsed(value.start, format!("{}.{}: relation target is not an identifier", binding, name));
                continue;
            };
            self.builder.add_relation(RelationDescriptor {
                name,
                kind,
                owner_identifier: owner.clone(),
                target_identifier: target,
                owner_table: None,
                target_table: None,
                source_file: self.file.clone(),
            });
        }

        Ok(close + 1)
    }
}

fn property_to_column(table: &TableDescriptor, property: &str) -> String {
    table
        .columns
        .iter()
        .find(|c| c.property.as_deref() == Some(property))
        .map(|c| c.name.clone())
        .unwrap_or_else(|| property.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const INVOICES: &str = r#"
import { pgTable, pgEnum, uuid, varchar, numeric, timestamp, boolean, index, unique } from 'drizzle-orm/pg-core';
import { relations, sql } from 'drizzle-orm';
import { customers } from './customers';

export const invoiceStatusEnum = pgEnum('invoice_status', ['draft', 'sent', 'paid']);

export const invoices: any = pgTable('invoices', {
  id: uuid('id').primaryKey().defaultRandom(),
  customerId: uuid('customer_id')
    .notNull()
    .references(() => customers.id, { onDelete: 'cascade' }),
  total: numeric('total', { precision: 10, scale: 2 }).notNull().default('0'),
  status: invoiceStatusEnum('status').default('draft').notNull(),
  paid: boolean('paid').default(false),
  metadata: jsonb('metadata').$type<{ source: string }>().default(sql`'{}'::jsonb`),
  issuedAt: timestamp('issued_at', { withTimezone: true }).defaultNow(),
  number: varchar({ length: 32 }).unique(),
  ...auditColumns,
}, (table) => ({
  customerIdx: index('idx_invoices_customer').on(table.customerId),
  numberUnique: unique('invoices_number_total_unique').on(table.number, table.total),
}));

export const invoicesRelations = relations(invoices, ({ one, many }) => ({
  customer: one(customers, { fields: [invoices.customerId], references: [customers.id] }),
  lines: many(invoiceLines),
}));
"#;

    fn read(source: &str) -> crate::model::SchemaModel {
        read_source(source, Path::new("invoices.ts"), ReadScope::ALL).finish()
    }

    #[test]
    fn test_reads_table_columns_and_modifiers() {
        let model = read(INVOICES);
        let table = &model.tables["invoices"];
        assert_eq!(table.identifier(), Some("invoices"));
        assert_eq!(
            table.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["id", "customer_id", "total", "status", "paid", "metadata", "issued_at", "number"]
        );

        let id = table.column("id").unwrap();
        assert!(id.primary_key);
        assert!(!id.nullable);
        assert_eq!(id.default_value.as_deref(), Some("gen_random_uuid()"));

        let total = table.column("total").unwrap();
        assert_eq!(
            total.canonical_type,
            CanonicalType::Numeric {
                precision: Some(10),
                scale: Some(2)
            }
        );
        assert!(!total.nullable);
        assert_eq!(total.default_value.as_deref(), Some("'0'"));

        let status = table.column("status").unwrap();
        assert_eq!(status.canonical_type, CanonicalType::Text);
        assert_eq!(status.native_type, "invoice_status");

        assert_eq!(table.column("paid").unwrap().default_value.as_deref(), Some("false"));
        assert_eq!(table.column("metadata").unwrap().default_value.as_deref(), Some("'{}'::jsonb"));
        assert_eq!(table.column("issued_at").unwrap().canonical_type, CanonicalType::TimestampTz);

        let number = table.column("number").unwrap();
        assert_eq!(number.canonical_type, CanonicalType::Varchar { length: Some(32) });
        assert!(number.unique);
        assert_eq!(number.property.as_deref(), Some("number"));

        let customer = table.column("customer_id").unwrap().foreign_key.clone().unwrap();
        assert_eq!(customer.table, "customers");
        assert_eq!(customer.on_delete.as_deref(), Some("cascade"));
    }

    #[test]
    fn test_malformed_entry_does_not_affect_siblings() {
        let model = read(INVOICES);
        assert_eq!(model.diagnostics.unparsed.len(), 1);
        assert!(model.diagnostics.unparsed[0].reason.contains("auditColumns"));
        assert_eq!(model.diagnostics.unparsed[0].line, 19);
    }

    #[test]
    fn test_constraint_region_is_read_separately() {
        let model = read(INVOICES);
        let table = &model.tables["invoices"];
        assert_eq!(table.indexes.len(), 1);
        assert_eq!(table.indexes[0].name, "idx_invoices_customer");
        assert_eq!(
            table.indexes[0].definition,
            "index('idx_invoices_customer').on(table.customerId)"
        );
        assert_eq!(
            table.unique_constraints,
            vec![UniqueConstraint {
                name: "invoices_number_total_unique".into(),
                columns: vec!["number".into(), "total".into()],
            }]
        );
        // index + unique constraint + column-level unique()
        assert_eq!(table.comparable_index_count(), 3);
    }

    #[test]
    fn test_reads_enums_and_relations() {
        let model = read(INVOICES);
        let status = &model.enums["invoice_status"];
        assert_eq!(status.labels, vec!["draft", "sent", "paid"]);
        assert_eq!(status.identifier.as_deref(), Some("invoiceStatusEnum"));

        assert_eq!(model.relations.len(), 2);
        let customer = model.relations.iter().find(|r| r.name == "customer").unwrap();
        assert_eq!(customer.kind, RelationKind::One);
        assert_eq!(customer.target_identifier, "customers");
        assert_eq!(customer.owner_table.as_deref(), Some("invoices"));
        assert_eq!(customer.target_table, None);
    }

    #[test]
    fn test_composite_primary_key_and_array_callback() {
        let source = r#"
export const memberships = pgTable("memberships", {
  userId: uuid("user_id").notNull(),
  teamId: uuid("team_id").notNull(),
}, (t) => [
  primaryKey({ columns: [t.userId, t.teamId] }),
  uniqueIndex("memberships_team_idx").on(t.teamId),
]);
"#;
        let model = read(source);
        let table = &model.tables["memberships"];
        assert_eq!(table.primary_key, vec!["user_id".to_string(), "team_id".to_string()]);
        assert!(table.column("user_id").unwrap().primary_key);
        assert!(table.indexes[0].unique);
        assert!(model.diagnostics.is_clean());
    }

    #[test]
    fn test_unparsable_table_is_recorded() {
        let source = "export const dynamic = pgTable(tableName, { id: uuid('id') });\nexport const ok = pgTable('ok', {});";
        let model = read(source);
        assert!(model.table("ok").is_some());
        assert_eq!(model.tables.len(), 1);
        assert_eq!(model.diagnostics.unparsed.len(), 1);
        assert!(model.diagnostics.unparsed[0].reason.starts_with("dynamic:"));
    }

    #[test]
    fn test_type_arguments_with_commas_stay_in_one_column() {
        let source = "export const t = pgTable('t', {\n  id: uuid('id').primaryKey(),\n  meta: jsonb('meta').$type<Record<string, unknown>>().notNull(),\n  tags: jsonb('tags').$type<Map<string, string[]>>(),\n});\n";
        let model = read(source);
        let table = &model.tables["t"];
        assert_eq!(
            table.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            vec!["id", "meta", "tags"]
        );
        assert!(!table.column("meta").unwrap().nullable);
        assert_eq!(table.column("tags").unwrap().ordinal_position, 3);
        assert!(model.diagnostics.is_clean());
    }

    #[test]
    fn test_scope_limits_what_is_read() {
        let model = read_source(INVOICES, Path::new("invoices.ts"), ReadScope::ENUMS_ONLY).finish();
        assert!(model.tables.is_empty());
        assert!(model.relations.is_empty());
        assert_eq!(model.enums.len(), 1);
    }
}
