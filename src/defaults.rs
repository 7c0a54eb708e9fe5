//! Default-expression classification
//!
//! Only a small fixed set of shapes is recognized. Anything else stays
//! [`DefaultExpr::Unclassified`] and is left for manual review.

use crate::types::{escape_single_quoted, CanonicalType};
use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\(?'?(-?\d+(?:\.\d+)?)'?\)?(?:::[a-z ]+(?:\(\d+(?:,\s*\d+)?\))?)?$"#)
        .expect("number literal pattern")
});

static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^'((?:[^']|'')*)'(?:::[\w ."]+(?:\(\d+\))?(?:\[\])?)?$"#)
        .expect("string literal pattern")
});

static BOOLEAN_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^'?(true|false)'?(?:::boolean)?$"#).expect("boolean literal pattern")
});

/// Classified default expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultExpr {
    /// `gen_random_uuid()` / `uuid_generate_v4()`
    GeneratedUuid,
    /// `now()` / `CURRENT_TIMESTAMP`
    CurrentTimestamp,
    Boolean(bool),
    Number(String),
    Str(String),
    /// Explicit `NULL` default, equivalent to no default
    Null,
    Unclassified(String),
}

impl DefaultExpr {
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();

        if lower.contains("gen_random_uuid") || lower.contains("uuid_generate_v4") {
            return Self::GeneratedUuid;
        }
        if lower.contains("now()") || lower.contains("current_timestamp") {
            return Self::CurrentTimestamp;
        }
        if lower == "null" || lower.starts_with("null::") {
            return Self::Null;
        }
        if let Some(caps) = BOOLEAN_LITERAL.captures(&lower) {
            return Self::Boolean(&caps[1] == "true");
        }
        if let Some(caps) = NUMBER_LITERAL.captures(&lower) {
            return Self::Number(caps[1].to_string());
        }
        if let Some(caps) = STRING_LITERAL.captures(trimmed) {
            return Self::Str(caps[1].replace("''", "'"));
        }
        Self::Unclassified(trimmed.to_string())
    }

    pub fn is_classified(&self) -> bool {
        !matches!(self, Self::Unclassified(_))
    }

    /// Declaration-side modifier, e.g. `.defaultNow()`. `None` means no
    /// modifier is emitted.
    pub fn declaration_modifier(&self, column_type: &CanonicalType) -> Option<String> {
        match self {
            Self::GeneratedUuid => Some(".defaultRandom()".to_string()),
            Self::CurrentTimestamp => Some(".defaultNow()".to_string()),
            Self::Boolean(b) => Some(format!(".default({})", b)),
            Self::Number(n) => match column_type {
                CanonicalType::Integer => Some(format!(".default({})", n)),
                _ => Some(format!(".default('{}')", n)),
            },
            Self::Str(s) => Some(format!(".default('{}')", escape_single_quoted(s))),
            Self::Null | Self::Unclassified(_) => None,
        }
    }

    /// SQL `DEFAULT` clause body
    pub fn sql_default(&self) -> Option<String> {
        match self {
            Self::GeneratedUuid => Some("gen_random_uuid()".to_string()),
            Self::CurrentTimestamp => Some("now()".to_string()),
            Self::Boolean(b) => Some(b.to_string()),
            Self::Number(n) => Some(n.clone()),
            Self::Str(s) => Some(format!("'{}'", s.replace('\'', "''"))),
            Self::Null | Self::Unclassified(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generated_defaults() {
        assert_eq!(DefaultExpr::classify("gen_random_uuid()"), DefaultExpr::GeneratedUuid);
        assert_eq!(DefaultExpr::classify("uuid_generate_v4()"), DefaultExpr::GeneratedUuid);
        assert_eq!(DefaultExpr::classify("CURRENT_TIMESTAMP"), DefaultExpr::CurrentTimestamp);
        assert_eq!(DefaultExpr::classify("now()"), DefaultExpr::CurrentTimestamp);
    }

    #[test]
    fn test_literals() {
        assert_eq!(DefaultExpr::classify("true"), DefaultExpr::Boolean(true));
        assert_eq!(DefaultExpr::classify("false"), DefaultExpr::Boolean(false));
        assert_eq!(DefaultExpr::classify("0"), DefaultExpr::Number("0".into()));
        assert_eq!(DefaultExpr::classify("'0'::numeric"), DefaultExpr::Number("0".into()));
        assert_eq!(
            DefaultExpr::classify("0.00"),
            DefaultExpr::Number("0.00".into())
        );
        assert_eq!(
            DefaultExpr::classify("'draft'::invoice_status"),
            DefaultExpr::Str("draft".into())
        );
        assert_eq!(
            DefaultExpr::classify("'it''s'::character varying"),
            DefaultExpr::Str("it's".into())
        );
        assert_eq!(DefaultExpr::classify("NULL::text"), DefaultExpr::Null);
    }

    #[test]
    fn test_anything_else_is_unclassified() {
        let raw = "nextval('orders_id_seq'::regclass)";
        assert_eq!(DefaultExpr::classify(raw), DefaultExpr::Unclassified(raw.into()));
        assert!(!DefaultExpr::classify("'{}'::jsonb || foo()").is_classified());
    }

    #[test]
    fn test_modifiers() {
        assert_eq!(
            DefaultExpr::classify("CURRENT_TIMESTAMP").declaration_modifier(&CanonicalType::Timestamp),
            Some(".defaultNow()".to_string())
        );
        assert_eq!(
            DefaultExpr::Number("5".into()).declaration_modifier(&CanonicalType::Integer),
            Some(".default(5)".to_string())
        );
        assert_eq!(
            DefaultExpr::Number("0.00".into()).declaration_modifier(&CanonicalType::Numeric {
                precision: Some(10),
                scale: Some(2)
            }),
            Some(".default('0.00')".to_string())
        );
        assert_eq!(
            DefaultExpr::Str("it's".into()).sql_default(),
            Some("'it''s'".to_string())
        );
        assert_eq!(DefaultExpr::Unclassified("f()".into()).declaration_modifier(&CanonicalType::Text), None);
    }
}
