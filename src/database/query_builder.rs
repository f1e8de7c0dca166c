use serde_json::Value;
use tracing::debug;

use crate::database::client::{Condition, Predicate, Query, QueryOp};
use crate::filter::{FilterOperator, FilterOption, ListOptions};

/// Translates list parameters into the backend operation chain of one collection.
///
/// Filter predicates are AND-ed; the free-text term is OR-ed across
/// `search_fields` and the resulting group is AND-ed with the filters.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    search_fields: &'static [&'static str],
}

impl QueryBuilder {
    pub fn new(search_fields: &'static [&'static str]) -> Self {
        Self { search_fields }
    }

    /// Filters, ordering and one range clause. The search term is not applied.
    pub fn list(&self, options: &mut ListOptions) -> Query {
        let mut query = self.predicates(&options.filters, None);
        Self::order_and_range(&mut query, options);
        query
    }

    /// Filters, the search group when a term is present, ordering and range
    pub fn search(&self, options: &mut ListOptions) -> Query {
        let mut query = self.predicates(&options.filters, options.search_term());
        Self::order_and_range(&mut query, options);
        query
    }

    /// Same predicates as `search`, without ordering or range
    pub fn count(&self, filters: &[FilterOption], search: Option<&str>) -> Query {
        self.predicates(filters, search)
    }

    fn predicates(&self, filters: &[FilterOption], search: Option<&str>) -> Query {
        let mut query = Query::new();
        for filter in filters {
            if let Some(condition) = translate(filter) {
                query.push(QueryOp::Where(condition));
            }
        }
        if let Some(group) = search.and_then(|term| self.search_group(term)) {
            query.push(group);
        }
        query
    }

    /// Case-insensitive substring match on every searchable field, OR-ed
    pub fn search_group(&self, term: &str) -> Option<QueryOp> {
        let term = strip_wildcards(term.trim());
        if term.is_empty() || self.search_fields.is_empty() {
            return None;
        }
        let pattern = format!("*{}*", term);
        Some(QueryOp::AnyOf(
            self.search_fields
                .iter()
                .map(|field| Condition::new(*field, Predicate::ILike, pattern.clone()))
                .collect(),
        ))
    }

    fn order_and_range(query: &mut Query, options: &mut ListOptions) {
        let (limit, offset) = options.limit_offset();
        if let Some(column) = &options.sort_by {
            query.push(QueryOp::Order {
                column: column.clone(),
                ascending: options.sort_direction().is_ascending(),
            });
        }
        query.push(QueryOp::Range { limit, offset });
    }
}

/// Backend predicate for one filter; `None` for an operator outside the closed set
pub fn translate(filter: &FilterOption) -> Option<Condition> {
    let Some(operator) = filter.operator() else {
        debug!("Skipping filter on '{}' with unsupported operator '{}'", filter.field, filter.operator);
        return None;
    };

    let (predicate, value) = match operator {
        FilterOperator::Eq => (Predicate::Eq, filter.value.clone()),
        FilterOperator::Neq => (Predicate::Neq, filter.value.clone()),
        FilterOperator::Gt => (Predicate::Gt, filter.value.clone()),
        FilterOperator::Gte => (Predicate::Gte, filter.value.clone()),
        FilterOperator::Lt => (Predicate::Lt, filter.value.clone()),
        FilterOperator::Lte => (Predicate::Lte, filter.value.clone()),
        FilterOperator::In => (Predicate::In, as_list(&filter.value)),
        FilterOperator::NotIn => (Predicate::NotIn, as_list(&filter.value)),
        FilterOperator::Like => (Predicate::Like, pattern(&filter.value, "*", "*")),
        FilterOperator::StartsWith => (Predicate::Like, pattern(&filter.value, "", "*")),
        FilterOperator::EndsWith => (Predicate::Like, pattern(&filter.value, "*", "")),
    };

    Some(Condition::new(filter.field.clone(), predicate, value))
}

/// Arrays pass through, strings split on commas, anything else becomes a one-element list
fn as_list(value: &Value) -> Value {
    match value {
        Value::Array(_) => value.clone(),
        Value::String(s) => Value::Array(
            s.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        ),
        other => Value::Array(vec![other.clone()]),
    }
}

fn pattern(value: &Value, prefix: &str, suffix: &str) -> Value {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Value::String(format!("{}{}{}", prefix, strip_wildcards(&text), suffix))
}

fn strip_wildcards(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '*' | '%')).collect()
}
