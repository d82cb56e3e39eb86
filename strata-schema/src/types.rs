//! SQL column types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A column type, expressed in terms of common SQL types.
///
/// Backends map these to their own names; `Custom` passes a raw type
/// string through untouched for anything not covered here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Single-precision float.
    Real,
    /// Double-precision float.
    DoublePrecision,
    /// Arbitrary-precision numeric with precision and scale.
    Numeric(u16, u16),
    /// Variable-length text without limit.
    Text,
    /// Variable-length text with a limit.
    Varchar(u32),
    /// Boolean.
    Boolean,
    /// Date without time.
    Date,
    /// Timestamp without time zone.
    Timestamp,
    /// Timestamp with time zone.
    Timestamptz,
    /// UUID.
    Uuid,
    /// JSON stored as text.
    Json,
    /// JSON stored in a binary format.
    Jsonb,
    /// Raw bytes.
    Bytea,
    /// A backend-specific type, passed through verbatim.
    Custom(String),
}

impl SqlType {
    /// The canonical SQL name of this type.
    pub fn sql_name(&self) -> String {
        match self {
            Self::SmallInt => "SMALLINT".to_string(),
            Self::Integer => "INTEGER".to_string(),
            Self::BigInt => "BIGINT".to_string(),
            Self::Real => "REAL".to_string(),
            Self::DoublePrecision => "DOUBLE PRECISION".to_string(),
            Self::Numeric(precision, scale) => format!("NUMERIC({}, {})", precision, scale),
            Self::Text => "TEXT".to_string(),
            Self::Varchar(len) => format!("VARCHAR({})", len),
            Self::Boolean => "BOOLEAN".to_string(),
            Self::Date => "DATE".to_string(),
            Self::Timestamp => "TIMESTAMP".to_string(),
            Self::Timestamptz => "TIMESTAMP WITH TIME ZONE".to_string(),
            Self::Uuid => "UUID".to_string(),
            Self::Json => "JSON".to_string(),
            Self::Jsonb => "JSONB".to_string(),
            Self::Bytea => "BYTEA".to_string(),
            Self::Custom(name) => name.clone(),
        }
    }

    /// Parse a catalog type name back into a [`SqlType`].
    ///
    /// Unrecognized names come back as `Custom`, preserving the original
    /// spelling so a round trip through introspection never loses the type.
    pub fn from_sql_name(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "smallint" | "int2" => Self::SmallInt,
            "integer" | "int" | "int4" => Self::Integer,
            "bigint" | "int8" => Self::BigInt,
            "real" | "float4" => Self::Real,
            "double precision" | "float8" => Self::DoublePrecision,
            "text" => Self::Text,
            "boolean" | "bool" => Self::Boolean,
            "date" => Self::Date,
            "timestamp" | "timestamp without time zone" => Self::Timestamp,
            "timestamptz" | "timestamp with time zone" => Self::Timestamptz,
            "uuid" => Self::Uuid,
            "json" => Self::Json,
            "jsonb" => Self::Jsonb,
            "bytea" => Self::Bytea,
            _ => {
                if let Some(inner) = parse_parenthesized(&normalized, "varchar")
                    .or_else(|| parse_parenthesized(&normalized, "character varying"))
                {
                    if let Ok(len) = inner.parse::<u32>() {
                        return Self::Varchar(len);
                    }
                }
                if let Some(inner) = parse_parenthesized(&normalized, "numeric") {
                    let parts: Vec<_> = inner.split(',').map(str::trim).collect();
                    if let [p, s] = parts.as_slice()
                        && let (Ok(p), Ok(s)) = (p.parse(), s.parse())
                    {
                        return Self::Numeric(p, s);
                    }
                }
                Self::Custom(name.trim().to_string())
            }
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_name())
    }
}

/// Extract the content of `prefix(...)`, if `s` has that shape.
fn parse_parenthesized<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    s.strip_prefix(prefix)?
        .trim()
        .strip_prefix('(')?
        .strip_suffix(')')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_name() {
        assert_eq!(SqlType::BigInt.sql_name(), "BIGINT");
        assert_eq!(SqlType::Varchar(255).sql_name(), "VARCHAR(255)");
        assert_eq!(SqlType::Numeric(10, 2).sql_name(), "NUMERIC(10, 2)");
        assert_eq!(
            SqlType::Custom("tsvector".to_string()).sql_name(),
            "tsvector"
        );
    }

    #[test]
    fn test_from_sql_name() {
        assert_eq!(SqlType::from_sql_name("bigint"), SqlType::BigInt);
        assert_eq!(SqlType::from_sql_name("int8"), SqlType::BigInt);
        assert_eq!(
            SqlType::from_sql_name("timestamp with time zone"),
            SqlType::Timestamptz
        );
        assert_eq!(SqlType::from_sql_name("varchar(64)"), SqlType::Varchar(64));
        assert_eq!(
            SqlType::from_sql_name("character varying(64)"),
            SqlType::Varchar(64)
        );
        assert_eq!(
            SqlType::from_sql_name("numeric(12, 4)"),
            SqlType::Numeric(12, 4)
        );
    }

    #[test]
    fn test_from_sql_name_unknown_is_custom() {
        assert_eq!(
            SqlType::from_sql_name("tsvector"),
            SqlType::Custom("tsvector".to_string())
        );
    }

    #[test]
    fn test_round_trip_through_names() {
        for ty in [
            SqlType::SmallInt,
            SqlType::Integer,
            SqlType::BigInt,
            SqlType::Text,
            SqlType::Boolean,
            SqlType::Timestamptz,
            SqlType::Uuid,
            SqlType::Jsonb,
            SqlType::Varchar(128),
            SqlType::Numeric(8, 3),
        ] {
            assert_eq!(SqlType::from_sql_name(&ty.sql_name()), ty);
        }
    }
}
