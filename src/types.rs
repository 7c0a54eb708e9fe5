//! Canonical type mapping
//!
//! Both sides of the audit speak different type dialects: the catalog reports
//! `udt_name`/`data_type` pairs (`int4`, `timestamptz`, `character varying`),
//! while declarations use constructor calls (`integer(...)`, `timestamp(..., {
//! withTimezone: true })`). Everything is folded into [`CanonicalType`] before
//! comparison.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of canonical type tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum CanonicalType {
    Uuid,
    Text,
    Varchar { length: Option<u32> },
    Boolean,
    Integer,
    Numeric { precision: Option<u32>, scale: Option<u32> },
    Timestamp,
    TimestampTz,
    Date,
    Json,
}

/// Map a native catalog type onto its canonical token.
///
/// `udt_name` is the most specific descriptor and wins over the generic
/// `data_type` class. Unknown types fall back to [`CanonicalType::Text`].
pub fn map_type(
    data_type: &str,
    udt_name: &str,
    precision: Option<u32>,
    scale: Option<u32>,
    length: Option<u32>,
) -> CanonicalType {
    let numeric = CanonicalType::Numeric { precision, scale };
    let varchar = CanonicalType::Varchar { length };

    let by_name = |name: &str| -> Option<CanonicalType> {
        match name.trim().to_ascii_lowercase().as_str() {
            "uuid" => Some(CanonicalType::Uuid),
            "text" => Some(CanonicalType::Text),
            "varchar" | "character varying" => Some(varchar),
            "bool" | "boolean" => Some(CanonicalType::Boolean),
            "int2" | "int4" | "smallint" | "integer" => Some(CanonicalType::Integer),
            "numeric" | "decimal" => Some(numeric),
            "timestamp" | "timestamp without time zone" => Some(CanonicalType::Timestamp),
            "timestamptz" | "timestamp with time zone" => Some(CanonicalType::TimestampTz),
            "date" => Some(CanonicalType::Date),
            "json" | "jsonb" => Some(CanonicalType::Json),
            _ => None,
        }
    };

    by_name(udt_name)
        .or_else(|| by_name(data_type))
        .unwrap_or(CanonicalType::Text)
}

/// Options recovered from a declaration constructor's option object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredTypeOptions {
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub with_timezone: bool,
}

impl CanonicalType {
    /// Map a declaration-side constructor (`varchar`, `timestamp`, ...) onto
    /// the canonical token. Unknown constructors, enum columns included, fall
    /// back to `text` just like user-defined types do on the catalog side.
    pub fn from_declaration(constructor: &str, options: &DeclaredTypeOptions) -> Self {
        match constructor {
            "uuid" => Self::Uuid,
            "text" => Self::Text,
            "varchar" => Self::Varchar {
                length: options.length,
            },
            "boolean" => Self::Boolean,
            "integer" | "serial" | "smallint" | "smallserial" => Self::Integer,
            "numeric" | "decimal" => Self::Numeric {
                precision: options.precision,
                scale: options.scale,
            },
            "timestamp" if options.with_timezone => Self::TimestampTz,
            "timestamp" => Self::Timestamp,
            "date" => Self::Date,
            "json" | "jsonb" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Render as a declaration constructor call for column `name`
    pub fn declaration_call(&self, name: &str) -> String {
        let name = escape_single_quoted(name);
        match self {
            Self::Uuid => format!("uuid('{}')", name),
            Self::Text => format!("text('{}')", name),
            Self::Varchar { length: Some(l) } => format!("varchar('{}', {{ length: {} }})", name, l),
            Self::Varchar { length: None } => format!("varchar('{}')", name),
            Self::Boolean => format!("boolean('{}')", name),
            Self::Integer => format!("integer('{}')", name),
            Self::Numeric {
                precision: Some(p),
                scale: Some(s),
            } => format!("numeric('{}', {{ precision: {}, scale: {} }})", name, p, s),
            Self::Numeric {
                precision: Some(p),
                scale: None,
            } => format!("numeric('{}', {{ precision: {} }})", name, p),
            Self::Numeric { .. } => format!("numeric('{}')", name),
            Self::Timestamp => format!("timestamp('{}')", name),
            Self::TimestampTz => format!("timestamp('{}', {{ withTimezone: true }})", name),
            Self::Date => format!("date('{}')", name),
            Self::Json => format!("jsonb('{}')", name),
        }
    }

    /// Render as a PostgreSQL type name
    pub fn sql_type(&self) -> String {
        match self {
            Self::Uuid => "uuid".to_string(),
            Self::Text => "text".to_string(),
            Self::Varchar { length: Some(l) } => format!("varchar({})", l),
            Self::Varchar { length: None } => "varchar".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::Integer => "integer".to_string(),
            Self::Numeric {
                precision: Some(p),
                scale: Some(s),
            } => format!("numeric({},{})", p, s),
            Self::Numeric {
                precision: Some(p),
                scale: None,
            } => format!("numeric({})", p),
            Self::Numeric { .. } => "numeric".to_string(),
            Self::Timestamp => "timestamp".to_string(),
            Self::TimestampTz => "timestamptz".to_string(),
            Self::Date => "date".to_string(),
            Self::Json => "jsonb".to_string(),
        }
    }

    pub fn is_timestamp(&self) -> bool {
        matches!(self, Self::Timestamp | Self::TimestampTz)
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid => write!(f, "uuid"),
            Self::Text => write!(f, "text"),
            Self::Varchar { length: Some(l) } => write!(f, "varchar({})", l),
            Self::Varchar { length: None } => write!(f, "varchar"),
            Self::Boolean => write!(f, "boolean"),
            Self::Integer => write!(f, "integer"),
            Self::Numeric {
                precision: Some(p),
                scale: Some(s),
            } => write!(f, "numeric({},{})", p, s),
            Self::Numeric {
                precision: Some(p),
                scale: None,
            } => write!(f, "numeric({})", p),
            Self::Numeric { .. } => write!(f, "numeric"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::TimestampTz => write!(f, "timestamp_tz"),
            Self::Date => write!(f, "date"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for CanonicalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (head, args) = match s.find('(') {
            Some(open) if s.ends_with(')') => (&s[..open], Some(&s[open + 1..s.len() - 1])),
            Some(_) => return Err(format!("unbalanced type token: {}", s)),
            None => (s, None),
        };

        let parse_u32 = |v: &str| -> Result<u32, String> {
            v.trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid type argument '{}' in {}", v, s))
        };

        match (head, args) {
            ("uuid", None) => Ok(Self::Uuid),
            ("text", None) => Ok(Self::Text),
            ("varchar", None) => Ok(Self::Varchar { length: None }),
            ("varchar", Some(a)) => Ok(Self::Varchar {
                length: Some(parse_u32(a)?),
            }),
            ("boolean", None) => Ok(Self::Boolean),
            ("integer", None) => Ok(Self::Integer),
            ("numeric", None) => Ok(Self::Numeric {
                precision: None,
                scale: None,
            }),
            ("numeric", Some(a)) => {
                let mut parts = a.splitn(2, ',');
                let precision = parts.next().map(parse_u32).transpose()?;
                let scale = parts.next().map(parse_u32).transpose()?;
                Ok(Self::Numeric { precision, scale })
            }
            ("timestamp", None) => Ok(Self::Timestamp),
            ("timestamp_tz", None) => Ok(Self::TimestampTz),
            ("date", None) => Ok(Self::Date),
            ("json", None) => Ok(Self::Json),
            _ => Err(format!("unknown canonical type token: {}", s)),
        }
    }
}

impl From<CanonicalType> for String {
    fn from(t: CanonicalType) -> Self {
        t.to_string()
    }
}

impl TryFrom<String> for CanonicalType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Escape a value for use inside a single-quoted literal
pub fn escape_single_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_udt_name_takes_priority() {
        assert_eq!(
            map_type("timestamp with time zone", "timestamptz", None, None, None),
            CanonicalType::TimestampTz
        );
        assert_eq!(
            map_type("timestamp without time zone", "timestamp", None, None, None),
            CanonicalType::Timestamp
        );
        // A specific udt overrides a misleading generic class
        assert_eq!(map_type("text", "uuid", None, None, None), CanonicalType::Uuid);
    }

    #[test]
    fn test_generic_class_used_when_udt_unknown() {
        assert_eq!(
            map_type("character varying", "", None, None, Some(64)),
            CanonicalType::Varchar { length: Some(64) }
        );
    }

    #[test]
    fn test_qualifiers_are_carried() {
        assert_eq!(
            map_type("numeric", "numeric", Some(10), Some(2), None),
            CanonicalType::Numeric {
                precision: Some(10),
                scale: Some(2)
            }
        );
        assert_eq!(
            map_type("character varying", "varchar", None, None, Some(255)),
            CanonicalType::Varchar { length: Some(255) }
        );
    }

    #[test]
    fn test_unknown_types_fall_back_to_text() {
        assert_eq!(map_type("USER-DEFINED", "invoice_status", None, None, None), CanonicalType::Text);
        assert_eq!(map_type("bigint", "int8", Some(64), Some(0), None), CanonicalType::Text);
        assert_eq!(map_type("", "", None, None, None), CanonicalType::Text);
    }

    #[test]
    fn test_map_type_is_deterministic() {
        let inputs = [
            ("uuid", "uuid"),
            ("text", "text"),
            ("character varying", "varchar"),
            ("boolean", "bool"),
            ("integer", "int4"),
            ("smallint", "int2"),
            ("numeric", "numeric"),
            ("timestamp without time zone", "timestamp"),
            ("timestamp with time zone", "timestamptz"),
            ("date", "date"),
            ("json", "json"),
            ("jsonb", "jsonb"),
        ];
        for (data_type, udt) in inputs {
            let a = map_type(data_type, udt, Some(12), Some(4), Some(32));
            let b = map_type(data_type, udt, Some(12), Some(4), Some(32));
            assert_eq!(a, b);
            assert_eq!(a.to_string(), b.to_string());
        }
    }

    #[test]
    fn test_declaration_mapping_matches_catalog_mapping() {
        let tz = DeclaredTypeOptions {
            with_timezone: true,
            ..Default::default()
        };
        assert_eq!(CanonicalType::from_declaration("timestamp", &tz), CanonicalType::TimestampTz);
        assert_eq!(
            CanonicalType::from_declaration("timestamp", &DeclaredTypeOptions::default()),
            CanonicalType::Timestamp
        );
        assert_eq!(
            CanonicalType::from_declaration("serial", &DeclaredTypeOptions::default()),
            map_type("integer", "int4", Some(32), Some(0), None)
        );
        assert_eq!(
            CanonicalType::from_declaration("invoiceStatusEnum", &DeclaredTypeOptions::default()),
            CanonicalType::Text
        );
    }

    #[test]
    fn test_declaration_call_rendering() {
        let numeric = CanonicalType::Numeric {
            precision: Some(10),
            scale: Some(2),
        };
        assert_eq!(
            numeric.declaration_call("total"),
            "numeric('total', { precision: 10, scale: 2 })"
        );
        assert_eq!(
            CanonicalType::TimestampTz.declaration_call("created_at"),
            "timestamp('created_at', { withTimezone: true })"
        );
        assert_eq!(CanonicalType::Json.declaration_call("meta"), "jsonb('meta')");
    }

    #[test]
    fn test_token_text_parses_back() {
        let tokens = [
            CanonicalType::Uuid,
            CanonicalType::Varchar { length: Some(255) },
            CanonicalType::Varchar { length: None },
            CanonicalType::Numeric {
                precision: Some(10),
                scale: Some(2),
            },
            CanonicalType::Numeric {
                precision: Some(8),
                scale: None,
            },
            CanonicalType::TimestampTz,
            CanonicalType::Json,
        ];
        for token in tokens {
            assert_eq!(token.to_string().parse::<CanonicalType>(), Ok(token));
        }
        assert!("money".parse::<CanonicalType>().is_err());
    }
}
