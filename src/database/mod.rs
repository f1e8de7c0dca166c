pub mod client;
pub mod models;
pub mod postgrest;
pub mod query_builder;
pub mod reconcile;
pub mod repository;

pub use client::{Condition, DatabaseError, Predicate, Query, QueryClient, QueryOp};
pub use postgrest::PostgrestClient;
pub use query_builder::QueryBuilder;
pub use reconcile::{reconcile, Patch, Reconcile};
pub use repository::Repository;
