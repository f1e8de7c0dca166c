//! Compensation list for multi-step writes.
//!
//! Every step that leaves state behind pushes the action that undoes it.
//! On failure the actions run newest first; a compensation that itself fails
//! is logged and the rest still run.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::{Query, QueryClient};
use crate::services::error::ServiceError;
use crate::storage::StorageClient;

#[derive(Debug, Clone)]
pub enum Compensation {
    /// Remove uploaded objects
    RemoveFiles { paths: Vec<String> },
    /// Delete rows written by a step
    DeleteRows { collection: &'static str, query: Query },
    /// Re-insert rows a step deleted
    InsertRows { collection: &'static str, rows: Vec<Value> },
    /// Put back the previous version of an updated row
    RestoreRow { collection: &'static str, id: Uuid, row: Value },
}

pub struct Saga {
    label: String,
    steps: Vec<Compensation>,
    db: Arc<dyn QueryClient>,
    storage: Arc<dyn StorageClient>,
}

impl Saga {
    pub fn new(label: impl Into<String>, db: Arc<dyn QueryClient>, storage: Arc<dyn StorageClient>) -> Self {
        Self {
            label: label.into(),
            steps: Vec::new(),
            db,
            storage,
        }
    }

    pub fn push(&mut self, compensation: Compensation) {
        self.steps.push(compensation);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Pass a step result through, compensating everything recorded so far on error
    pub async fn check<T>(&mut self, result: Result<T, ServiceError>) -> Result<T, ServiceError> {
        if let Err(err) = &result {
            warn!("{} failed, compensating {} step(s): {}", self.label, self.steps.len(), err);
            self.compensate().await;
        }
        result
    }

    /// The write succeeded; nothing is undone
    pub fn commit(mut self) {
        debug!("{} committed with {} step(s)", self.label, self.steps.len());
        self.steps.clear();
    }

    pub async fn abort(mut self) {
        self.compensate().await;
    }

    async fn compensate(&mut self) {
        while let Some(step) = self.steps.pop() {
            if let Err(message) = self.run(&step).await {
                warn!("{}: compensation {:?} failed: {}", self.label, step, message);
            }
        }
    }

    async fn run(&self, step: &Compensation) -> Result<(), String> {
        match step {
            Compensation::RemoveFiles { paths } => self.storage.remove(paths).await.map_err(|e| e.to_string()),
            Compensation::DeleteRows { collection, query } => self
                .db
                .delete(collection, query)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Compensation::InsertRows { collection, rows } => {
                if rows.is_empty() {
                    return Ok(());
                }
                self.db
                    .insert(collection, rows.clone())
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
            Compensation::RestoreRow { collection, id, row } => self
                .db
                .update(collection, &Query::new().eq("id", id.to_string()), row.clone())
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
        }
    }
}

impl Drop for Saga {
    fn drop(&mut self) {
        if !self.steps.is_empty() {
            warn!(
                "{} dropped with {} uncompensated step(s) neither committed nor aborted",
                self.label,
                self.steps.len()
            );
        }
    }
}
