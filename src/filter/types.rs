use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of comparison operators a list filter may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Like,
    StartsWith,
    EndsWith,
}

impl FilterOperator {
    /// Accepts the canonical names plus the common aliases clients send
    pub fn parse(raw: &str) -> Option<Self> {
        let op = match raw.trim().to_ascii_lowercase().as_str() {
            "eq" | "equal" | "=" | "==" => FilterOperator::Eq,
            "neq" | "ne" | "not_equal" | "!=" | "<>" => FilterOperator::Neq,
            "gt" | "greater_than" | ">" => FilterOperator::Gt,
            "gte" | "greater_than_or_equal" | ">=" => FilterOperator::Gte,
            "lt" | "less_than" | "<" => FilterOperator::Lt,
            "lte" | "less_than_or_equal" | "<=" => FilterOperator::Lte,
            "in" => FilterOperator::In,
            "not_in" | "nin" => FilterOperator::NotIn,
            "like" | "contains" => FilterOperator::Like,
            "starts_with" => FilterOperator::StartsWith,
            "ends_with" => FilterOperator::EndsWith,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not_in",
            FilterOperator::Like => "like",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::EndsWith => "ends_with",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn is_ascending(&self) -> bool {
        matches!(self, SortOrder::Asc)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// One `(field, operator, value)` predicate of a list request.
///
/// The operator stays a raw string so that validation can report an empty one
/// and the translator can skip one it does not know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOption {
    pub field: String,
    pub operator: String,
    pub value: Value,
}

impl FilterOption {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.as_str().to_string(),
            value: value.into(),
        }
    }

    pub fn raw(field: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    pub fn operator(&self) -> Option<FilterOperator> {
        FilterOperator::parse(&self.operator)
    }
}

/// Declarative mapping from a query parameter to a filterable column.
///
/// Each entity publishes a static table of these, so the set of filterable
/// columns and their operators is fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterField {
    pub param: &'static str,
    pub column: &'static str,
    pub operator: FilterOperator,
}

impl FilterField {
    pub const fn new(param: &'static str, column: &'static str, operator: FilterOperator) -> Self {
        Self { param, column, operator }
    }

    pub const fn eq(column: &'static str) -> Self {
        Self::new(column, column, FilterOperator::Eq)
    }

    pub fn bind(&self, raw: &str) -> FilterOption {
        FilterOption::new(self.column, self.operator, Value::String(raw.to_string()))
    }
}

/// Identifier check shared by sort and filter fields (letters, digits, `_`)
pub fn is_valid_column(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
