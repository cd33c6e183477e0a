use lazy_static::lazy_static;
use regex::Regex;
use sqlx::{Postgres, QueryBuilder};

use super::error::RepoError;

lazy_static! {
    static ref FIELD_NAME_RE: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_.]*$").unwrap();
}

const FORBIDDEN_TOKENS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "EXEC", "EXECUTE", "UNION",
    "SCRIPT", "--", "/*", "*/",
];

/// A field name is usable in a query only if it looks like an identifier and
/// contains no SQL keyword or comment marker.
pub fn is_valid_field_name(field: &str) -> bool {
    if !FIELD_NAME_RE.is_match(field) {
        return false;
    }
    let upper = field.to_ascii_uppercase();
    !FORBIDDEN_TOKENS.iter().any(|token| upper.contains(token))
}

/// Escapes `%`, `_` and `\` so user input matches literally inside ILIKE.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Int(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Case-insensitive substring match.
    Contains(String),
    Equals(FilterValue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
}

/// Conjunction of filter conditions over an allow-listed set of columns.
#[derive(Debug, Clone)]
pub struct Filters {
    allowed: &'static [&'static str],
    conditions: Vec<Condition>,
}

impl Filters {
    pub fn new(allowed: &'static [&'static str]) -> Self {
        Self {
            allowed,
            conditions: Vec::new(),
        }
    }

    fn check_field(&self, field: &str) -> Result<(), RepoError> {
        if self.allowed.contains(&field) && is_valid_field_name(field) {
            Ok(())
        } else {
            Err(RepoError::InvalidField(field.to_string()))
        }
    }

    /// Adds a substring match. Absent or empty values are skipped.
    pub fn contains(mut self, field: &str, value: Option<&str>) -> Result<Self, RepoError> {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return Ok(self);
        };
        self.check_field(field)?;
        self.conditions.push(Condition {
            field: field.to_string(),
            op: FilterOp::Contains(value.to_string()),
        });
        Ok(self)
    }

    pub fn equals(mut self, field: &str, value: Option<FilterValue>) -> Result<Self, RepoError> {
        let Some(value) = value else {
            return Ok(self);
        };
        if matches!(&value, FilterValue::Text(text) if text.is_empty()) {
            return Ok(self);
        }
        self.check_field(field)?;
        self.conditions.push(Condition {
            field: field.to_string(),
            op: FilterOp::Equals(value),
        });
        Ok(self)
    }

    #[cfg(test)]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Appends ` WHERE ...` with every value bound as a parameter.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for (i, condition) in self.conditions.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            qb.push(condition.field.as_str());
            match &condition.op {
                FilterOp::Contains(value) => {
                    qb.push(" ILIKE ");
                    qb.push_bind(format!("%{}%", escape_like(value)));
                }
                FilterOp::Equals(FilterValue::Text(value)) => {
                    qb.push(" = ");
                    qb.push_bind(value.clone());
                }
                FilterOp::Equals(FilterValue::Int(value)) => {
                    qb.push(" = ");
                    qb.push_bind(*value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWED: &[&str] = &["name", "email", "status"];

    #[test]
    fn field_names_must_be_identifiers() {
        assert!(is_valid_field_name("name"));
        assert!(is_valid_field_name("users.email"));
        assert!(!is_valid_field_name("1name"));
        assert!(!is_valid_field_name("name; DROP TABLE users"));
        assert!(!is_valid_field_name("name--"));
    }

    #[test]
    fn sql_keywords_are_rejected() {
        assert!(!is_valid_field_name("select_all"));
        assert!(!is_valid_field_name("dropzone"));
        assert!(!is_valid_field_name("union"));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = Filters::new(ALLOWED)
            .contains("password", Some("x"))
            .expect_err("password is not filterable");
        assert!(matches!(err, RepoError::InvalidField(f) if f == "password"));
    }

    #[test]
    fn empty_values_are_skipped() {
        let filters = Filters::new(ALLOWED)
            .contains("name", Some(""))
            .and_then(|f| f.contains("email", None))
            .expect("valid filters");
        assert!(filters.conditions().is_empty());
    }

    #[test]
    fn where_clause_binds_values() {
        let filters = Filters::new(ALLOWED)
            .contains("name", Some("an"))
            .and_then(|f| f.equals("status", Some(FilterValue::Int(1))))
            .expect("valid filters");
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM users");
        filters.push_where(&mut qb);
        assert_eq!(
            qb.sql(),
            "SELECT id FROM users WHERE name ILIKE $1 AND status = $2"
        );
    }
}
