//! In-memory stand-ins for the data store and the file store.
//!
//! `MemoryQueryClient` evaluates the same `Query` chain the HTTP client
//! renders, so repository and orchestration code can be exercised without a
//! backend. Both fakes record what they were asked to do and can be told to
//! fail.

use async_trait::async_trait;
use axum::body::Bytes;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::database::client::{Condition, DatabaseError, Predicate, Query, QueryClient, QueryOp};
use crate::storage::{StorageClient, StorageError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct MemoryQueryClient {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    calls: Mutex<Vec<String>>,
    failing_inserts: Mutex<HashSet<String>>,
    failing_selects: Mutex<HashSet<String>>,
}

impl MemoryQueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, collection: &str, rows: Vec<Value>) {
        lock(&self.tables)
            .entry(collection.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, collection: &str) -> Vec<Value> {
        lock(&self.tables).get(collection).cloned().unwrap_or_default()
    }

    /// `"{method} {collection}"` for every call received, in order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Make every insert into `collection` fail from now on
    pub fn fail_inserts_into(&self, collection: &str) {
        lock(&self.failing_inserts).insert(collection.to_string());
    }

    /// Make every select from `collection` fail from now on
    pub fn fail_selects_from(&self, collection: &str) {
        lock(&self.failing_selects).insert(collection.to_string());
    }

    fn record(&self, method: &str, collection: &str) {
        lock(&self.calls).push(format!("{} {}", method, collection));
    }

    fn matching(&self, collection: &str, query: &Query) -> Vec<Value> {
        lock(&self.tables)
            .get(collection)
            .map(|rows| rows.iter().filter(|row| matches_query(row, query)).cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueryClient for MemoryQueryClient {
    async fn select(&self, collection: &str, query: &Query) -> Result<Vec<Value>, DatabaseError> {
        self.record("select", collection);
        if lock(&self.failing_selects).contains(collection) {
            return Err(DatabaseError::QueryError(format!("select from {} rejected", collection)));
        }
        let mut rows = self.matching(collection, query);

        let orders: Vec<(&str, bool)> = query
            .ops()
            .iter()
            .filter_map(|op| match op {
                QueryOp::Order { column, ascending } => Some((column.as_str(), *ascending)),
                _ => None,
            })
            .collect();
        rows.sort_by(|a, b| {
            orders
                .iter()
                .map(|(column, ascending)| {
                    let ord = compare(field(a, column), field(b, column));
                    if *ascending {
                        ord
                    } else {
                        ord.reverse()
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        for op in query.ops() {
            if let QueryOp::Range { limit, offset } = op {
                rows = rows
                    .into_iter()
                    .skip((*offset).max(0) as usize)
                    .take((*limit).max(0) as usize)
                    .collect();
            }
        }
        Ok(rows)
    }

    async fn count(&self, collection: &str, query: &Query) -> Result<i64, DatabaseError> {
        self.record("count", collection);
        Ok(self.matching(collection, query).len() as i64)
    }

    async fn insert(&self, collection: &str, rows: Vec<Value>) -> Result<Vec<Value>, DatabaseError> {
        self.record("insert", collection);
        if lock(&self.failing_inserts).contains(collection) {
            return Err(DatabaseError::QueryError(format!("insert into {} rejected", collection)));
        }
        lock(&self.tables)
            .entry(collection.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn update(&self, collection: &str, query: &Query, patch: Value) -> Result<Vec<Value>, DatabaseError> {
        self.record("update", collection);
        if !query.has_predicates() {
            return Err(DatabaseError::QueryError("refusing unfiltered update".to_string()));
        }
        let Value::Object(patch) = patch else {
            return Err(DatabaseError::QueryError("update patch must be an object".to_string()));
        };

        let mut tables = lock(&self.tables);
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(collection) {
            for row in rows.iter_mut().filter(|row| matches_query(row, query)) {
                if let Value::Object(fields) = row {
                    merge(fields, &patch);
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, collection: &str, query: &Query) -> Result<Vec<Value>, DatabaseError> {
        self.record("delete", collection);
        if !query.has_predicates() {
            return Err(DatabaseError::QueryError("refusing unfiltered delete".to_string()));
        }

        let mut tables = lock(&self.tables);
        let Some(rows) = tables.get_mut(collection) else {
            return Ok(Vec::new());
        };
        let (removed, kept): (Vec<Value>, Vec<Value>) = rows.drain(..).partition(|row| matches_query(row, query));
        *rows = kept;
        Ok(removed)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

fn merge(fields: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        fields.insert(key.clone(), value.clone());
    }
}

fn field<'a>(row: &'a Value, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn matches_query(row: &Value, query: &Query) -> bool {
    query.ops().iter().all(|op| match op {
        QueryOp::Where(condition) => matches_condition(row, condition),
        QueryOp::AnyOf(conditions) => conditions.is_empty() || conditions.iter().any(|c| matches_condition(row, c)),
        QueryOp::Order { .. } | QueryOp::Range { .. } => true,
    })
}

fn matches_condition(row: &Value, condition: &Condition) -> bool {
    let actual = field(row, &condition.column);
    let expected = &condition.value;
    match condition.predicate {
        Predicate::Eq if expected.is_null() => actual.is_null(),
        Predicate::Neq if expected.is_null() => !actual.is_null(),
        Predicate::Eq => loose_eq(actual, expected),
        Predicate::Neq => !loose_eq(actual, expected),
        Predicate::Gt => compare(actual, expected) == Ordering::Greater,
        Predicate::Gte => compare(actual, expected) != Ordering::Less,
        Predicate::Lt => compare(actual, expected) == Ordering::Less,
        Predicate::Lte => compare(actual, expected) != Ordering::Greater,
        Predicate::In => list(expected).iter().any(|v| loose_eq(actual, v)),
        Predicate::NotIn => !list(expected).iter().any(|v| loose_eq(actual, v)),
        Predicate::Like => !actual.is_null() && glob(&text(expected), &text(actual)),
        Predicate::ILike => {
            !actual.is_null() && glob(&text(expected).to_lowercase(), &text(actual).to_lowercase())
        }
    }
}

fn list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Query parameters arrive as strings, so `true` equals `"true"` here as it does in the backend
fn loose_eq(a: &Value, b: &Value) -> bool {
    a == b || (!a.is_null() && !b.is_null() && text(a) == text(b))
}

fn compare(a: &Value, b: &Value) -> Ordering {
    let number = |v: &Value| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => match (number(a), number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => text(a).cmp(&text(b)),
        },
    }
}

/// `*` matches any run of characters
fn glob(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

/// File store keeping objects in memory under `https://storage.test/public/`
pub struct MemoryStorage {
    base_url: String,
    objects: Mutex<BTreeMap<String, (String, Bytes)>>,
    removed: Mutex<Vec<String>>,
    uploads: Mutex<usize>,
    fail_after: Mutex<Option<usize>>,
    fail_removals: Mutex<bool>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            base_url: "https://storage.test/public/".to_string(),
            objects: Mutex::new(BTreeMap::new()),
            removed: Mutex::new(Vec::new()),
            uploads: Mutex::new(0),
            fail_after: Mutex::new(None),
            fail_removals: Mutex::new(false),
        }
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `n` more uploads succeed, then reject every one after
    pub fn fail_uploads_after(&self, n: usize) {
        let done = *lock(&self.uploads);
        *lock(&self.fail_after) = Some(done + n);
    }

    pub fn fail_removals(&self) {
        *lock(&self.fail_removals) = true;
    }

    pub fn paths(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        lock(&self.objects).contains_key(path)
    }

    /// Paths passed to `remove`, including ones that failed
    pub fn removed(&self) -> Vec<String> {
        lock(&self.removed).clone()
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn upload(&self, path: &str, content: Bytes, content_type: &str, upsert: bool) -> Result<(), StorageError> {
        let mut uploads = lock(&self.uploads);
        if lock(&self.fail_after).map_or(false, |limit| *uploads >= limit) {
            return Err(StorageError::Rejected {
                path: path.to_string(),
                status: 500,
                message: "upload rejected".to_string(),
            });
        }

        let mut objects = lock(&self.objects);
        if !upsert && objects.contains_key(path) {
            return Err(StorageError::Rejected {
                path: path.to_string(),
                status: 409,
                message: "object exists".to_string(),
            });
        }
        objects.insert(path.to_string(), (content_type.to_string(), content));
        *uploads += 1;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn path_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.base_url).map(str::to_string)
    }

    async fn remove(&self, paths: &[String]) -> Result<(), StorageError> {
        lock(&self.removed).extend(paths.iter().cloned());
        if *lock(&self.fail_removals) {
            return Err(StorageError::Rejected {
                path: paths.join(","),
                status: 503,
                message: "storage unavailable".to_string(),
            });
        }
        let mut objects = lock(&self.objects);
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn glob_matching() {
        assert!(glob("*jak*", "east jakarta"));
        assert!(glob("dev*", "devops"));
        assert!(!glob("dev*", "webdev"));
        assert!(glob("*ops", "devops"));
        assert!(glob("*", ""));
        assert!(!glob("a*b", "acd"));
    }

    #[tokio::test]
    async fn evaluates_filters_groups_and_ranges() {
        let client = MemoryQueryClient::new();
        client.seed(
            "items",
            vec![
                json!({ "name": "alpha", "rank": 3, "featured": true }),
                json!({ "name": "beta", "rank": 1, "featured": false }),
                json!({ "name": "gamma", "rank": 2, "featured": true }),
            ],
        );

        let mut query = Query::new().eq("featured", "true");
        query
            .push(QueryOp::Order { column: "rank".into(), ascending: true })
            .push(QueryOp::Range { limit: 1, offset: 1 });

        let rows = client.select("items", &query).await.unwrap();
        assert_eq!(rows, vec![json!({ "name": "alpha", "rank": 3, "featured": true })]);
        assert_eq!(client.count("items", &query).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn storage_fails_after_limit() {
        let storage = MemoryStorage::new();
        storage.fail_uploads_after(1);
        assert!(storage.upload("a", Bytes::from_static(b"1"), "text/plain", true).await.is_ok());
        assert!(storage.upload("b", Bytes::from_static(b"2"), "text/plain", true).await.is_err());
        assert_eq!(storage.paths(), vec!["a".to_string()]);
    }
}
