use serde::{Deserialize, Serialize};

use super::error::FilterError;
use super::types::{is_valid_column, FilterField, FilterOption, SortOrder};
use crate::validation::Violations;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;
/// Largest page whose offset fits in an `i64` at any page size
pub const MAX_PAGE: i64 = i64::MAX / MAX_PER_PAGE;

/// Page, sort, filter and search parameters of a list request.
///
/// `validate` and `limit_offset` normalize in place: after either call the
/// value holds the defaults and clamps that were applied, not what the client
/// sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    pub page: i64,
    pub per_page: i64,
    pub sort_by: Option<String>,
    pub sort_order: String,
    pub filters: Vec<FilterOption>,
    pub search: Option<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            sort_by: None,
            sort_order: SortOrder::default().as_str().to_string(),
            filters: Vec::new(),
            search: None,
        }
    }
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: i64) -> Self {
        self.page = page;
        self
    }

    pub fn per_page(mut self, per_page: i64) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: impl Into<String>) -> Self {
        self.sort_by = Some(field.into());
        self.sort_order = order.into();
        self
    }

    pub fn filter(mut self, filter: FilterOption) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Build options from raw query pairs.
    ///
    /// Recognizes `page`, `per_page` (alias `limit`), `sort_by` (alias `sort`),
    /// `sort_order` (alias `order`), `search` (alias `q`) and every parameter
    /// named in `filters`. Anything else is ignored.
    pub fn from_query_pairs(pairs: &[(String, String)], filters: &[FilterField]) -> Result<Self, FilterError> {
        let mut options = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "page" => options.page = parse_number(key, value)?,
                "per_page" | "limit" => options.per_page = parse_number(key, value)?,
                "sort_by" | "sort" => options.sort_by = Some(value.clone()),
                "sort_order" | "order" => options.sort_order = value.clone(),
                "search" | "q" => options.search = Some(value.clone()),
                other => {
                    if let Some(field) = filters.iter().find(|f| f.param == other) {
                        options.filters.push(field.bind(value));
                    }
                }
            }
        }
        Ok(options)
    }

    /// Normalize, then check every rule and report all violations together
    pub fn validate(&mut self) -> Result<(), FilterError> {
        let requested_page = self.page;
        self.normalize();

        let mut violations = Violations::new();

        if requested_page > MAX_PAGE {
            violations.push("page", format!("must not exceed {}", MAX_PAGE));
        }

        match SortOrder::parse(&self.sort_order) {
            Some(order) => self.sort_order = order.as_str().to_string(),
            None if self.sort_order.trim().is_empty() => {
                self.sort_order = SortOrder::default().as_str().to_string();
            }
            None => {
                violations.push(
                    "sort_order",
                    format!("must be 'asc' or 'desc', got '{}'", self.sort_order),
                );
            }
        }

        if let Some(sort_by) = &self.sort_by {
            if !is_valid_column(sort_by) {
                violations.push("sort_by", format!("invalid field name '{}'", sort_by));
            }
        }

        for (index, filter) in self.filters.iter().enumerate() {
            if filter.field.trim().is_empty() {
                violations.push(format!("filters[{}].field", index), "must not be empty");
            } else if !is_valid_column(&filter.field) {
                violations.push(
                    format!("filters[{}].field", index),
                    format!("invalid field name '{}'", filter.field),
                );
            }
            if filter.operator.trim().is_empty() {
                violations.push(format!("filters[{}].operator", index), "must not be empty");
            }
        }

        violations.finish()?;
        Ok(())
    }

    /// `(limit, offset)` for the current page, normalizing first
    pub fn limit_offset(&mut self) -> (i64, i64) {
        self.normalize();
        (self.per_page, (self.page - 1).saturating_mul(self.per_page))
    }

    pub fn sort_direction(&self) -> SortOrder {
        SortOrder::parse(&self.sort_order).unwrap_or_default()
    }

    /// Search term with surrounding whitespace removed; `None` when blank
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn normalize(&mut self) {
        if self.page < 1 {
            self.page = DEFAULT_PAGE;
        } else if self.page > MAX_PAGE {
            self.page = MAX_PAGE;
        }
        if self.per_page < 1 {
            self.per_page = DEFAULT_PER_PAGE;
        } else if self.per_page > MAX_PER_PAGE {
            self.per_page = MAX_PER_PAGE;
        }
        if self.sort_by.as_deref().map(str::trim).map_or(false, str::is_empty) {
            self.sort_by = None;
        }
        if self.search_term().is_none() {
            self.search = None;
        }
    }
}

fn parse_number(param: &str, raw: &str) -> Result<i64, FilterError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| FilterError::invalid_param(param, format!("expected an integer, got '{}'", raw)))
}
