use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::Entity;
use crate::database::{QueryClient, Repository};
use crate::filter::{FilterOption, ListOptions, Pagination};
use crate::services::error::ServiceError;
use crate::services::orchestrator::{Attachments, Detailed, Orchestrator};
use crate::state::AppState;
use crate::storage::StorageClient;
use crate::types::Operation;

/// Read and write operations of one entity, as used by the HTTP layer
pub struct EntityService<E> {
    repo: Repository<E>,
    orchestrator: Orchestrator<E>,
}

impl<E: Entity> EntityService<E> {
    pub fn new(db: Arc<dyn QueryClient>, storage: Arc<dyn StorageClient>) -> Self {
        Self {
            repo: Repository::new(db.clone()),
            orchestrator: Orchestrator::new(db, storage),
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.db.clone(), state.storage.clone())
    }

    /// Validated, paginated search with an exact total
    pub async fn search(&self, mut options: ListOptions) -> Result<(Vec<E>, Pagination), ServiceError> {
        options.validate()?;
        let (items, total) = self
            .repo
            .search(&mut options)
            .await
            .map_err(ServiceError::database(Operation::Select, E::NAME, "search"))?;
        Ok((items, Pagination::new(total, options.page, options.per_page)))
    }

    /// One page without a total
    pub async fn list(&self, mut options: ListOptions) -> Result<Vec<E>, ServiceError> {
        options.validate()?;
        self.repo
            .list(&mut options)
            .await
            .map_err(ServiceError::database(Operation::Select, E::NAME, "list"))
    }

    pub async fn count(&self, filters: &[FilterOption]) -> Result<i64, ServiceError> {
        self.repo
            .count(filters)
            .await
            .map_err(ServiceError::database(Operation::Count, E::NAME, "count"))
    }

    pub async fn get(&self, id: Uuid) -> Result<Detailed<E>, ServiceError> {
        let entity = self
            .repo
            .find_by_id(id)
            .await
            .map_err(ServiceError::database(Operation::Select, E::NAME, id))?
            .ok_or_else(|| ServiceError::not_found(E::NAME, id))?;
        self.orchestrator.compose(entity).await
    }

    pub async fn create(&self, input: E::Create, files: Attachments) -> Result<Detailed<E>, ServiceError> {
        self.orchestrator.create(input, files).await
    }

    pub async fn update(&self, id: Uuid, patch: E::Patch, files: Attachments) -> Result<Detailed<E>, ServiceError> {
        self.orchestrator.update(id, patch, files).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<E, ServiceError> {
        self.orchestrator.delete(id).await
    }
}
