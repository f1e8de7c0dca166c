//! Multi-step writes: validate, map or reconcile, upload, persist, associate,
//! compose. Steps run one after another; each records its compensation in a
//! [`Saga`] so a failure anywhere leaves no partial entity behind.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::models::Entity;
use crate::database::reconcile::{reconcile, reconcile_files};
use crate::database::{Query, QueryClient, Repository};
use crate::services::association::JoinTable;
use crate::services::error::ServiceError;
use crate::services::saga::{Compensation, Saga};
use crate::storage::{object_path, StorageClient, UploadFile};
use crate::types::Operation;
use crate::validation::{Validate, ValidationError, Violations};

/// Uploaded files keyed by file field name
pub type Attachments = BTreeMap<String, Vec<UploadFile>>;

/// An entity plus its resolved related records
#[derive(Debug, Clone, Serialize)]
pub struct Detailed<E> {
    #[serde(flatten)]
    pub entity: E,
    #[serde(flatten)]
    pub related: BTreeMap<String, Value>,
}

impl<E> Detailed<E> {
    pub fn bare(entity: E) -> Self {
        Self {
            entity,
            related: BTreeMap::new(),
        }
    }
}

pub struct Orchestrator<E> {
    repo: Repository<E>,
    db: Arc<dyn QueryClient>,
    storage: Arc<dyn StorageClient>,
}

impl<E: Entity> Orchestrator<E> {
    pub fn new(db: Arc<dyn QueryClient>, storage: Arc<dyn StorageClient>) -> Self {
        Self {
            repo: Repository::new(db.clone()),
            db,
            storage,
        }
    }

    fn join_table(&self) -> Option<JoinTable> {
        E::ASSOCIATION.map(|association| JoinTable::new(association, self.db.clone()))
    }

    fn saga(&self, operation: Operation, id: Uuid) -> Saga {
        Saga::new(
            format!("{} {} {}", operation, E::NAME, id),
            self.db.clone(),
            self.storage.clone(),
        )
    }

    pub async fn create(&self, input: E::Create, files: Attachments) -> Result<Detailed<E>, ServiceError> {
        input.validate()?;
        check_attachments::<E>(&files)?;

        let id = Uuid::new_v4();
        let links = E::create_links(&input);
        let mut entity = E::from_create(id, input, Utc::now());
        entity.validate_record()?;
        let mut saga = self.saga(Operation::Create, id);

        for (field, urls) in self.upload(&mut saga, Operation::Create, id, files, &HashSet::new()).await? {
            entity.set_file_urls(field, urls);
        }

        let created = self
            .repo
            .create(&entity)
            .await
            .map_err(ServiceError::database(Operation::Create, E::NAME, id));
        let created = saga.check(created).await?;
        saga.push(Compensation::DeleteRows {
            collection: E::COLLECTION,
            query: Query::new().eq("id", id.to_string()),
        });

        if let Some(joins) = self.join_table().filter(|_| !links.is_empty()) {
            saga.push(Compensation::DeleteRows {
                collection: joins.collection(),
                query: joins.owner_query(id),
            });
            let linked = joins
                .insert(id, &links)
                .await
                .map_err(ServiceError::database(Operation::Associate, E::NAME, id));
            saga.check(linked).await?;
        }

        let detailed = self.compose(created).await;
        let detailed = saga.check(detailed).await?;
        saga.commit();

        info!("Created {} {}", E::NAME, id);
        Ok(detailed)
    }

    pub async fn update(&self, id: Uuid, patch: E::Patch, files: Attachments) -> Result<Detailed<E>, ServiceError> {
        patch.validate()?;
        check_attachments::<E>(&files)?;

        let existing = self
            .repo
            .find_by_id(id)
            .await
            .map_err(ServiceError::database(Operation::Select, E::NAME, id))?
            .ok_or_else(|| ServiceError::not_found(E::NAME, id))?;

        let links = E::update_links(&patch);
        let mut merged = reconcile(existing.clone(), patch, Utc::now());
        merged.validate_record()?;
        let mut saga = self.saga(Operation::Update, id);

        // Uploads may overwrite objects the stored record already points at;
        // those are not removed on rollback
        let stored_paths: HashSet<String> = existing
            .all_file_urls()
            .iter()
            .filter_map(|url| self.storage.path_from_url(url))
            .collect();
        for (field, urls) in self.upload(&mut saga, Operation::Update, id, files, &stored_paths).await? {
            merged.set_file_urls(field, reconcile_files(existing.file_urls(field), urls));
        }

        let previous = serde_json::to_value(&existing)
            .map_err(|e| ServiceError::database(Operation::Update, E::NAME, id)(e.into()));
        let previous = saga.check(previous).await?;
        let updated = self
            .repo
            .update(&merged)
            .await
            .map_err(ServiceError::database(Operation::Update, E::NAME, id));
        let updated = saga.check(updated).await?;
        saga.push(Compensation::RestoreRow {
            collection: E::COLLECTION,
            id,
            row: previous,
        });

        // No ids means the stored links stay as they are; any ids replace them all
        if let Some(joins) = self.join_table().filter(|_| !links.is_empty()) {
            let removed = joins
                .delete_for(id)
                .await
                .map_err(ServiceError::database(Operation::Associate, E::NAME, id));
            let removed = saga.check(removed).await?;
            saga.push(Compensation::InsertRows {
                collection: joins.collection(),
                rows: removed,
            });
            saga.push(Compensation::DeleteRows {
                collection: joins.collection(),
                query: joins.owner_query(id),
            });

            let linked = joins
                .insert(id, &links)
                .await
                .map_err(ServiceError::database(Operation::Associate, E::NAME, id));
            saga.check(linked).await?;
        }

        let detailed = self.compose(updated).await;
        let detailed = saga.check(detailed).await?;
        saga.commit();

        info!("Updated {} {}", E::NAME, id);
        Ok(detailed)
    }

    /// Remove the entity, then clean up its join rows and files. Cleanup
    /// failures are logged and never reported.
    pub async fn delete(&self, id: Uuid) -> Result<E, ServiceError> {
        let deleted = self
            .repo
            .delete(id)
            .await
            .map_err(ServiceError::database(Operation::Delete, E::NAME, id))?;

        if let Some(joins) = self.join_table() {
            if let Err(err) = joins.delete_for(id).await {
                warn!("Deleted {} {} but could not remove its {} rows: {}", E::NAME, id, joins.collection(), err);
            }
        }

        let paths: Vec<String> = deleted
            .all_file_urls()
            .iter()
            .filter_map(|url| self.storage.path_from_url(url))
            .collect();
        if !paths.is_empty() {
            if let Err(err) = self.storage.remove(&paths).await {
                warn!("Deleted {} {} but could not remove its files {:?}: {}", E::NAME, id, paths, err);
            }
        }

        info!("Deleted {} {}", E::NAME, id);
        Ok(deleted)
    }

    /// Attach the secondary records of the entity's association, if any
    pub async fn compose(&self, entity: E) -> Result<Detailed<E>, ServiceError> {
        let Some(joins) = self.join_table() else {
            return Ok(Detailed::bare(entity));
        };
        let id = entity.id();
        let related = joins
            .resolve(id)
            .await
            .map_err(ServiceError::database(Operation::Select, E::NAME, id))?;

        let mut detailed = Detailed::bare(entity);
        if let Some(association) = E::ASSOCIATION {
            detailed.related.insert(association.name.to_string(), Value::Array(related));
        }
        Ok(detailed)
    }

    /// Upload every attached file in declaration order, one at a time.
    /// Returns the public URLs per field that received files.
    async fn upload(
        &self,
        saga: &mut Saga,
        operation: Operation,
        id: Uuid,
        mut files: Attachments,
        stored_paths: &HashSet<String>,
    ) -> Result<Vec<(&'static str, Vec<String>)>, ServiceError> {
        let mut uploaded = Vec::new();

        for field in E::FILE_FIELDS {
            let Some(parts) = files.remove(field.name).filter(|parts| !parts.is_empty()) else {
                continue;
            };

            let mut urls = Vec::with_capacity(parts.len());
            for (index, file) in parts.into_iter().enumerate() {
                let path = object_path(E::COLLECTION, id, field.name, index, &file.file_name);
                let result = self
                    .storage
                    .upload(&path, file.content, &file.content_type, true)
                    .await
                    .map_err(ServiceError::storage(Operation::Upload, E::NAME, format!("{} ({})", id, path)));
                saga.check(result).await?;

                if !stored_paths.contains(&path) {
                    saga.push(Compensation::RemoveFiles { paths: vec![path.clone()] });
                }
                urls.push(self.storage.public_url(&path));
            }
            info!("{} {}: uploaded {} file(s) to {} during {}", E::NAME, id, urls.len(), field.name, operation);
            uploaded.push((field.name, urls));
        }

        Ok(uploaded)
    }
}

/// Files may only target declared file fields, and single-file fields take one
fn check_attachments<E: Entity>(files: &Attachments) -> Result<(), ValidationError> {
    let mut violations = Violations::new();
    for (name, parts) in files {
        match E::FILE_FIELDS.iter().find(|field| field.name == name.as_str()) {
            None => {
                violations.push(name.clone(), "does not accept files");
            }
            Some(field) if !field.multiple && parts.len() > 1 => {
                violations.push(name.clone(), "accepts a single file");
            }
            Some(_) => {}
        }
    }
    violations.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Badge, Experience, Project, Thread};
    use crate::testing::{MemoryQueryClient, MemoryStorage};
    use serde_json::json;

    struct Fixture {
        db: Arc<MemoryQueryClient>,
        storage: Arc<MemoryStorage>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                db: Arc::new(MemoryQueryClient::new()),
                storage: Arc::new(MemoryStorage::new()),
            }
        }

        fn orchestrator<E: Entity>(&self) -> Orchestrator<E> {
            Orchestrator::new(self.db.clone(), self.storage.clone())
        }

        fn tech_stack(&self, name: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.db.seed(
                "tech_stacks",
                vec![json!({
                    "id": id.to_string(),
                    "name": name,
                    "category": null,
                    "icon_url": null,
                    "created_at": Utc::now(),
                    "updated_at": Utc::now(),
                })],
            );
            id
        }
    }

    fn png(name: &str) -> UploadFile {
        UploadFile::new(name, "image/png", b"\x89PNG".to_vec())
    }

    fn images(names: &[&str]) -> Attachments {
        let mut files = Attachments::new();
        files.insert("images".to_string(), names.iter().map(|n| png(n)).collect());
        files
    }

    fn links(db: &MemoryQueryClient) -> Vec<String> {
        let mut ids: Vec<String> = db
            .rows("project_tech_stacks")
            .iter()
            .map(|row| row["tech_stack_id"].as_str().unwrap_or_default().to_string())
            .collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn create_uploads_persists_links_and_composes() {
        let fx = Fixture::new();
        let rust = fx.tech_stack("Rust");
        let input = serde_json::from_value(json!({ "name": "API", "tech_stack_ids": [rust] })).unwrap();

        let created = fx
            .orchestrator::<Project>()
            .create(input, images(&["a.png", "b.png"]))
            .await
            .unwrap();

        assert_eq!(created.entity.images.len(), 2);
        assert!(created.entity.images[1].ends_with("images_1.png"));
        assert_eq!(fx.storage.paths().len(), 2);
        assert_eq!(links(&fx.db), vec![rust.to_string()]);
        assert_eq!(created.related["tech_stacks"][0]["name"], json!("Rust"));

        let body = serde_json::to_value(&created).unwrap();
        assert_eq!(body["name"], json!("API"));
        assert_eq!(body["tech_stacks"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn failed_second_upload_leaves_nothing_behind() {
        let fx = Fixture::new();
        let rust = fx.tech_stack("Rust");
        fx.storage.fail_uploads_after(1);
        let input = serde_json::from_value(json!({ "name": "API", "tech_stack_ids": [rust] })).unwrap();

        let err = fx
            .orchestrator::<Project>()
            .create(input, images(&["a.png", "b.png"]))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Storage { operation: Operation::Upload, .. }));
        assert!(fx.db.rows("projects").is_empty());
        assert!(fx.db.rows("project_tech_stacks").is_empty());
        assert!(fx.storage.paths().is_empty());
        assert_eq!(fx.storage.removed().len(), 1);
    }

    #[tokio::test]
    async fn failed_association_rolls_back_entity_and_files() {
        let fx = Fixture::new();
        let rust = fx.tech_stack("Rust");
        fx.db.fail_inserts_into("project_tech_stacks");
        let input = serde_json::from_value(json!({ "name": "API", "tech_stack_ids": [rust] })).unwrap();

        let result = fx.orchestrator::<Project>().create(input, images(&["a.png"])).await;

        assert!(matches!(result, Err(ServiceError::Database { operation: Operation::Associate, .. })));
        assert!(fx.db.rows("projects").is_empty());
        assert!(fx.storage.paths().is_empty());
    }

    #[tokio::test]
    async fn validation_happens_before_any_side_effect() {
        let fx = Fixture::new();
        let input = serde_json::from_value(json!({ "name": "", "status": "nope" })).unwrap();

        let err = fx
            .orchestrator::<Project>()
            .create(input, images(&["a.png"]))
            .await
            .unwrap_err();

        let ServiceError::Validation(validation) = err else {
            panic!("expected validation error");
        };
        assert!(validation.has_field("name"));
        assert!(validation.has_field("status"));
        assert!(fx.db.calls().is_empty());
        assert!(fx.storage.paths().is_empty());
    }

    #[tokio::test]
    async fn rejects_files_for_undeclared_or_single_fields() {
        let fx = Fixture::new();
        let input = serde_json::from_value(json!({ "title": "t", "content": "c", "author": "a" })).unwrap();
        let err = fx
            .orchestrator::<Thread>()
            .create(input, images(&["a.png"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref v) if v.has_field("images")));

        let mut files = Attachments::new();
        files.insert("image".to_string(), vec![png("a.png"), png("b.png")]);
        let input = serde_json::from_value(json!({ "name": "Rustacean", "issuer": "Ferris" })).unwrap();
        let err = fx.orchestrator::<Badge>().create(input, files).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ref v) if v.has_field("image")));
    }

    #[tokio::test]
    async fn update_link_replacement_rules() {
        let fx = Fixture::new();
        let (rust, go, axum) = (fx.tech_stack("Rust"), fx.tech_stack("Go"), fx.tech_stack("Axum"));
        let orchestrator = fx.orchestrator::<Project>();

        let input = serde_json::from_value(json!({ "name": "API", "tech_stack_ids": [rust, go] })).unwrap();
        let id = orchestrator.create(input, Attachments::new()).await.unwrap().entity.id;

        let patch = serde_json::from_value(json!({ "description": "only text", "tech_stack_ids": [] })).unwrap();
        let updated = orchestrator.update(id, patch, Attachments::new()).await.unwrap();
        assert_eq!(updated.entity.description.as_deref(), Some("only text"));
        let mut expected = vec![rust.to_string(), go.to_string()];
        expected.sort();
        assert_eq!(links(&fx.db), expected);

        let patch = serde_json::from_value(json!({ "tech_stack_ids": [axum] })).unwrap();
        let updated = orchestrator.update(id, patch, Attachments::new()).await.unwrap();
        assert_eq!(links(&fx.db), vec![axum.to_string()]);
        assert_eq!(updated.related["tech_stacks"][0]["name"], json!("Axum"));
    }

    #[tokio::test]
    async fn update_keeps_images_unless_new_ones_arrive() {
        let fx = Fixture::new();
        let orchestrator = fx.orchestrator::<Project>();
        let input = serde_json::from_value(json!({ "name": "API" })).unwrap();
        let created = orchestrator.create(input, images(&["a.png", "b.png"])).await.unwrap();
        let id = created.entity.id;

        let patch = serde_json::from_value(json!({ "featured": true })).unwrap();
        let updated = orchestrator.update(id, patch, Attachments::new()).await.unwrap();
        assert_eq!(updated.entity.images, created.entity.images);
        assert!(updated.entity.featured);

        let patch = serde_json::from_value(json!({})).unwrap();
        let updated = orchestrator.update(id, patch, images(&["c.jpg"])).await.unwrap();
        assert_eq!(updated.entity.images.len(), 1);
        assert!(updated.entity.images[0].ends_with("images_0.jpg"));
        assert!(updated.entity.created_at == created.entity.created_at);
    }

    #[tokio::test]
    async fn failed_link_insert_keeps_row_but_loses_links() {
        let fx = Fixture::new();
        let (rust, go) = (fx.tech_stack("Rust"), fx.tech_stack("Go"));
        let orchestrator = fx.orchestrator::<Project>();
        let input = serde_json::from_value(json!({ "name": "API", "tech_stack_ids": [rust] })).unwrap();
        let id = orchestrator.create(input, Attachments::new()).await.unwrap().entity.id;

        fx.db.fail_inserts_into("project_tech_stacks");
        let patch = serde_json::from_value(json!({ "name": "Renamed", "tech_stack_ids": [go] })).unwrap();
        assert!(orchestrator.update(id, patch, Attachments::new()).await.is_err());

        let stored = fx.db.rows("projects");
        assert_eq!(stored[0]["name"], json!("API"));
        // InsertRows compensation is rejected too, so the old link cannot come back
        assert!(fx.db.rows("project_tech_stacks").is_empty());
    }

    #[tokio::test]
    async fn failure_after_link_replacement_restores_previous_links() {
        let fx = Fixture::new();
        let (rust, axum, go) = (fx.tech_stack("Rust"), fx.tech_stack("Axum"), fx.tech_stack("Go"));
        let orchestrator = fx.orchestrator::<Project>();
        let input = serde_json::from_value(json!({ "name": "API", "tech_stack_ids": [rust, axum] })).unwrap();
        let id = orchestrator.create(input, Attachments::new()).await.unwrap().entity.id;

        let original_links = fx.db.rows("project_tech_stacks");
        let original_project = fx.db.rows("projects");

        // Composing the response resolves tech stacks, which now fails after
        // the join rows were already replaced
        fx.db.fail_selects_from("tech_stacks");
        let patch = serde_json::from_value(json!({ "name": "Renamed", "tech_stack_ids": [go] })).unwrap();
        let err = orchestrator.update(id, patch, Attachments::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Database { .. }));

        let calls = fx.db.calls();
        let replaced = calls.iter().filter(|c| *c == "insert project_tech_stacks").count();
        // create, replacement, then the restore of the previous rows
        assert_eq!(replaced, 3, "{:?}", calls);

        assert_eq!(fx.db.rows("project_tech_stacks"), original_links);
        assert_eq!(links(&fx.db), {
            let mut ids = vec![rust.to_string(), axum.to_string()];
            ids.sort();
            ids
        });
        assert_eq!(fx.db.rows("projects"), original_project);
    }

    #[tokio::test]
    async fn merged_record_is_validated_before_any_write() {
        let fx = Fixture::new();
        let orchestrator = fx.orchestrator::<Experience>();
        let input = serde_json::from_value(json!({
            "company": "Acme",
            "role": "Engineer",
            "start_date": "2022-01-01"
        }))
        .unwrap();
        let id = orchestrator.create(input, Attachments::new()).await.unwrap().entity.id;
        let before = fx.db.rows("experiences");

        let patch = serde_json::from_value(json!({ "end_date": "2020-01-01" })).unwrap();
        let err = orchestrator.update(id, patch, Attachments::new()).await.unwrap_err();
        match err {
            ServiceError::Validation(violations) => assert!(violations.has_field("end_date")),
            other => panic!("expected a validation error, got {:?}", other),
        }
        assert_eq!(fx.db.rows("experiences"), before);
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let fx = Fixture::new();
        let patch = serde_json::from_value(json!({ "name": "x" })).unwrap();
        let err = fx
            .orchestrator::<Project>()
            .update(Uuid::new_v4(), patch, Attachments::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { entity: "project", .. }));
    }

    #[tokio::test]
    async fn delete_swallows_cleanup_failures() {
        let fx = Fixture::new();
        let rust = fx.tech_stack("Rust");
        let orchestrator = fx.orchestrator::<Project>();
        let input = serde_json::from_value(json!({ "name": "API", "tech_stack_ids": [rust] })).unwrap();
        let id = orchestrator.create(input, images(&["a.png"])).await.unwrap().entity.id;

        fx.storage.fail_removals();
        let deleted = orchestrator.delete(id).await.unwrap();

        assert_eq!(deleted.id, id);
        assert!(fx.db.rows("projects").is_empty());
        assert!(fx.db.rows("project_tech_stacks").is_empty());
        assert_eq!(fx.storage.removed().len(), 1);
        assert!(matches!(
            orchestrator.delete(id).await,
            Err(ServiceError::NotFound { .. })
        ));
    }
}
