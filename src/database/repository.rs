use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::client::{DatabaseError, Query, QueryClient};
use crate::database::models::Entity;
use crate::database::query_builder::QueryBuilder;
use crate::filter::{is_valid_column, FilterOption, ListOptions};

/// Uniform data access for one entity collection
pub struct Repository<E> {
    client: Arc<dyn QueryClient>,
    builder: QueryBuilder,
    _phantom: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            builder: self.builder,
            _phantom: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(client: Arc<dyn QueryClient>) -> Self {
        Self {
            client,
            builder: QueryBuilder::new(E::SEARCH_FIELDS),
            _phantom: PhantomData,
        }
    }

    pub fn client(&self) -> &Arc<dyn QueryClient> {
        &self.client
    }

    pub async fn create(&self, entity: &E) -> Result<E, DatabaseError> {
        let row = serde_json::to_value(entity)?;
        let inserted = self.client.insert(E::COLLECTION, vec![row]).await?;
        // Backends that do not echo the row get the value that was sent
        match decode_rows::<E>(inserted)?.into_iter().next() {
            Some(created) => Ok(created),
            None => Ok(entity.clone()),
        }
    }

    pub async fn find_by_field(&self, field: &str, value: impl Into<Value>) -> Result<Vec<E>, DatabaseError> {
        if !is_valid_column(field) {
            return Err(DatabaseError::QueryError(format!("invalid field name: {}", field)));
        }
        let rows = self
            .client
            .select(E::COLLECTION, &Query::new().eq(field, value))
            .await?;
        decode_rows(rows)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<E>, DatabaseError> {
        Ok(self.find_by_field("id", id.to_string()).await?.into_iter().next())
    }

    /// Like `find_by_id`, but a missing row is an error
    pub async fn get(&self, id: Uuid) -> Result<E, DatabaseError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {} not found", E::NAME, id)))
    }

    /// Overwrite the stored row with `entity`
    pub async fn update(&self, entity: &E) -> Result<E, DatabaseError> {
        let patch = serde_json::to_value(entity)?;
        let query = Query::new().eq("id", entity.id().to_string());
        let updated = self.client.update(E::COLLECTION, &query, patch).await?;
        decode_rows::<E>(updated)?
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {} not found", E::NAME, entity.id())))
    }

    /// Remove the row and return it as it was stored
    pub async fn delete(&self, id: Uuid) -> Result<E, DatabaseError> {
        let query = Query::new().eq("id", id.to_string());
        let deleted = self.client.delete(E::COLLECTION, &query).await?;
        decode_rows::<E>(deleted)?
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {} not found", E::NAME, id)))
    }

    /// One page of rows; no total is computed
    pub async fn list(&self, options: &mut ListOptions) -> Result<Vec<E>, DatabaseError> {
        let query = self.builder.list(options);
        decode_rows(self.client.select(E::COLLECTION, &query).await?)
    }

    pub async fn count(&self, filters: &[FilterOption]) -> Result<i64, DatabaseError> {
        let query = self.builder.count(filters, None);
        self.client.count(E::COLLECTION, &query).await
    }

    pub async fn exists(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let query = Query::new().eq("id", id.to_string());
        Ok(self.client.count(E::COLLECTION, &query).await? > 0)
    }

    /// One page of rows matching filters and the search term, plus the exact total
    pub async fn search(&self, options: &mut ListOptions) -> Result<(Vec<E>, i64), DatabaseError> {
        let query = self.builder.search(options);
        let rows = decode_rows(self.client.select(E::COLLECTION, &query).await?)?;

        let count_query = self.builder.count(&options.filters, options.search_term());
        let total = self.client.count(E::COLLECTION, &count_query).await?;

        Ok((rows, total))
    }
}

pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, DatabaseError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(DatabaseError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::City;
    use crate::testing::MemoryQueryClient;
    use chrono::Utc;
    use serde_json::json;

    fn city(name: &str, description: &str, province_id: Uuid) -> Value {
        let now = Utc::now();
        json!({
            "id": Uuid::new_v4(),
            "province_id": province_id,
            "name": name,
            "description": description,
            "created_at": now,
            "updated_at": now,
        })
    }

    fn seeded() -> (Arc<MemoryQueryClient>, Uuid) {
        let java = Uuid::new_v4();
        let other = Uuid::new_v4();
        let client = Arc::new(MemoryQueryClient::new());
        client.seed(
            "cities",
            vec![
                city("Jakarta", "capital", java),
                city("Bogor", "near JAKARTA", java),
                city("Bandung", "highlands", java),
                city("Surabaya", "jakarta rival", other),
            ],
        );
        (client, java)
    }

    #[tokio::test]
    async fn search_ors_fields_and_ands_filters() {
        let (client, java) = seeded();
        let repo = Repository::<City>::new(client);

        let mut options = ListOptions::new()
            .search("jakarta")
            .sort("name", "asc")
            .filter(FilterOption::eq("province_id", java.to_string()));
        let (cities, total) = repo.search(&mut options).await.unwrap();

        let names: Vec<&str> = cities.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Bogor", "Jakarta"]);
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn total_is_exact_beyond_one_page() {
        let (client, _) = seeded();
        let repo = Repository::<City>::new(client);

        let mut options = ListOptions::new().per_page(1);
        let (cities, total) = repo.search(&mut options).await.unwrap();
        assert_eq!(cities.len(), 1);
        assert_eq!(total, 4);
        assert_eq!(repo.count(&[]).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn delete_returns_row_and_missing_is_not_found() {
        let (client, _) = seeded();
        let repo = Repository::<City>::new(client);

        let target = repo.find_by_field("name", "Bandung").await.unwrap().remove(0);
        assert!(repo.exists(target.id).await.unwrap());

        let deleted = repo.delete(target.id).await.unwrap();
        assert_eq!(deleted.name, "Bandung");
        assert!(!repo.exists(target.id).await.unwrap());
        assert!(matches!(repo.delete(target.id).await, Err(DatabaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn rejects_invalid_field_name() {
        let (client, _) = seeded();
        let repo = Repository::<City>::new(client);
        assert!(repo.find_by_field("name; drop", "x").await.is_err());
    }
}
