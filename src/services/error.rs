use thiserror::Error;

use crate::database::DatabaseError;
use crate::filter::FilterError;
use crate::storage::StorageError;
use crate::types::Operation;
use crate::validation::ValidationError;

/// Classified failure of a service operation, carrying the operation and
/// entity it happened in
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{operation} {entity} {target} failed: {source}")]
    Database {
        operation: Operation,
        entity: &'static str,
        target: String,
        #[source]
        source: DatabaseError,
    },

    #[error("{operation} {entity} {target} failed: {source}")]
    Storage {
        operation: Operation,
        entity: &'static str,
        target: String,
        #[source]
        source: StorageError,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Wrap a backend failure; a backend "not found" is reported as such
    pub fn database(operation: Operation, entity: &'static str, target: impl ToString) -> impl FnOnce(DatabaseError) -> Self {
        let target = target.to_string();
        move |source| match source {
            DatabaseError::NotFound(_) => ServiceError::NotFound { entity, id: target },
            DatabaseError::Conflict(message) => ServiceError::Conflict(format!("{} {} {}: {}", operation, entity, target, message)),
            source => ServiceError::Database {
                operation,
                entity,
                target,
                source,
            },
        }
    }

    pub fn storage(operation: Operation, entity: &'static str, target: impl ToString) -> impl FnOnce(StorageError) -> Self {
        let target = target.to_string();
        move |source| ServiceError::Storage {
            operation,
            entity,
            target,
            source,
        }
    }
}

impl From<FilterError> for ServiceError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::Validation(validation) => ServiceError::Validation(validation),
            FilterError::InvalidParam { param, message } => {
                ServiceError::Validation(ValidationError::single(param, message))
            }
        }
    }
}
