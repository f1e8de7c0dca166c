use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::Association;
use crate::database::{DatabaseError, Predicate, Query, QueryClient};

/// Join rows of one many-to-many relation
pub struct JoinTable {
    association: Association,
    db: Arc<dyn QueryClient>,
}

impl JoinTable {
    pub fn new(association: Association, db: Arc<dyn QueryClient>) -> Self {
        Self { association, db }
    }

    pub fn collection(&self) -> &'static str {
        self.association.join_collection
    }

    pub fn owner_query(&self, owner: Uuid) -> Query {
        Query::new().eq(self.association.owner_column, owner.to_string())
    }

    pub async fn rows_for(&self, owner: Uuid) -> Result<Vec<Value>, DatabaseError> {
        self.db.select(self.collection(), &self.owner_query(owner)).await
    }

    /// One row per distinct target, in the order given
    pub async fn insert(&self, owner: Uuid, targets: &[Uuid]) -> Result<Vec<Value>, DatabaseError> {
        let mut seen = Vec::with_capacity(targets.len());
        let rows: Vec<Value> = targets
            .iter()
            .filter(|target| {
                if seen.contains(*target) {
                    false
                } else {
                    seen.push(**target);
                    true
                }
            })
            .map(|target| {
                let mut row = Map::new();
                row.insert(self.association.owner_column.to_string(), Value::String(owner.to_string()));
                row.insert(self.association.target_column.to_string(), Value::String(target.to_string()));
                Value::Object(row)
            })
            .collect();

        if rows.is_empty() {
            return Ok(Vec::new());
        }
        self.db.insert(self.collection(), rows).await
    }

    /// Remove every join row of `owner`, returning what was removed
    pub async fn delete_for(&self, owner: Uuid) -> Result<Vec<Value>, DatabaseError> {
        self.db.delete(self.collection(), &self.owner_query(owner)).await
    }

    /// Secondary records linked to `owner`, in join-row order
    pub async fn resolve(&self, owner: Uuid) -> Result<Vec<Value>, DatabaseError> {
        let target_ids: Vec<String> = self
            .rows_for(owner)
            .await?
            .iter()
            .filter_map(|row| row.get(self.association.target_column))
            .filter_map(|id| id.as_str().map(str::to_string))
            .collect();

        if target_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = Query::new().filter("id", Predicate::In, target_ids.clone());
        let mut by_id: HashMap<String, Value> = self
            .db
            .select(self.association.target_collection, &query)
            .await?
            .into_iter()
            .filter_map(|row| {
                let id = row.get("id")?.as_str()?.to_string();
                Some((id, row))
            })
            .collect();

        Ok(target_ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }
}
