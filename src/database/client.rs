use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors raised by a backend query client
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Backend-native predicate forms. Pattern values use `*` as the wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Like,
    ILike,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub predicate: Predicate,
    pub value: Value,
}

impl Condition {
    pub fn new(column: impl Into<String>, predicate: Predicate, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            predicate,
            value: value.into(),
        }
    }
}

/// One link of the operation chain sent to the backend
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOp {
    /// AND-ed with every other `Where`
    Where(Condition),
    /// OR-ed internally, AND-ed with the rest of the chain
    AnyOf(Vec<Condition>),
    Order { column: String, ascending: bool },
    Range { limit: i64, offset: i64 },
}

/// Ordered chain of predicate, order and range operations against one collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    ops: Vec<QueryOp>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: QueryOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn filter(mut self, column: impl Into<String>, predicate: Predicate, value: impl Into<Value>) -> Self {
        self.ops.push(QueryOp::Where(Condition::new(column, predicate, value)));
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, Predicate::Eq, value)
    }

    pub fn ops(&self) -> &[QueryOp] {
        &self.ops
    }

    /// True when the chain carries at least one predicate
    pub fn has_predicates(&self) -> bool {
        self.ops
            .iter()
            .any(|op| matches!(op, QueryOp::Where(_) | QueryOp::AnyOf(_)))
    }

    /// Same chain with ordering and range removed, as used for counting
    pub fn predicates_only(&self) -> Query {
        Query {
            ops: self
                .ops
                .iter()
                .filter(|op| matches!(op, QueryOp::Where(_) | QueryOp::AnyOf(_)))
                .cloned()
                .collect(),
        }
    }
}

/// Contract of the hosted data store. Implementations must be safe to share
/// across requests.
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn select(&self, collection: &str, query: &Query) -> Result<Vec<Value>, DatabaseError>;

    /// Exact number of rows matching the predicates of `query`; order and range are ignored
    async fn count(&self, collection: &str, query: &Query) -> Result<i64, DatabaseError>;

    async fn insert(&self, collection: &str, rows: Vec<Value>) -> Result<Vec<Value>, DatabaseError>;

    async fn update(&self, collection: &str, query: &Query, patch: Value) -> Result<Vec<Value>, DatabaseError>;

    async fn delete(&self, collection: &str, query: &Query) -> Result<Vec<Value>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}
