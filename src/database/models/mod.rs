//! Entity records and their declarative tables.
//!
//! Each entity states, at compile time, which columns are searchable, which
//! query parameters filter which columns, which fields hold uploaded files and
//! which many-to-many relation it owns. Generic repository, orchestration and
//! HTTP code is driven entirely by these tables.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::database::reconcile::Reconcile;
use crate::filter::FilterField;
use crate::validation::{Validate, ValidationError};

mod badge;
mod city;
mod experience;
mod location;
mod project;
mod province;
mod tech_stack;
mod thread;

pub use badge::{Badge, CreateBadge, UpdateBadge};
pub use city::{City, CreateCity, UpdateCity};
pub use experience::{CreateExperience, Experience, UpdateExperience};
pub use location::{CreateLocation, Location, UpdateLocation};
pub use project::{CreateProject, Project, UpdateProject};
pub use province::{CreateProvince, Province, UpdateProvince};
pub use tech_stack::{CreateTechStack, TechStack, UpdateTechStack};
pub use thread::{CreateThread, Thread, UpdateThread};

/// A field whose value is the public URL (or URLs) of uploaded files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileField {
    /// Multipart part name, also used in storage paths
    pub name: &'static str,
    pub multiple: bool,
}

/// Many-to-many relation from the entity to a secondary collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Association {
    /// Key of the resolved secondary records in detailed responses
    pub name: &'static str,
    /// Payload key carrying the secondary ids on create and update
    pub ids_field: &'static str,
    pub join_collection: &'static str,
    pub owner_column: &'static str,
    pub target_column: &'static str,
    pub target_collection: &'static str,
}

pub trait Entity: Reconcile + Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
    const NAME: &'static str;
    const SEARCH_FIELDS: &'static [&'static str];
    const FILTERS: &'static [FilterField] = &[];
    const FILE_FIELDS: &'static [FileField] = &[];
    const ASSOCIATION: Option<Association> = None;

    type Create: DeserializeOwned + Validate + Send + 'static;

    fn id(&self) -> Uuid;

    /// Cross-field rules on a complete record, checked again after an update
    /// is merged since a patch alone may not carry every field involved
    fn validate_record(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn from_create(id: Uuid, input: Self::Create, now: DateTime<Utc>) -> Self;

    /// Secondary ids to link on create
    fn create_links(_input: &Self::Create) -> Vec<Uuid> {
        Vec::new()
    }

    /// Secondary ids to link on update; empty leaves the stored links alone
    fn update_links(_patch: &Self::Patch) -> Vec<Uuid> {
        Vec::new()
    }

    fn file_urls(&self, _field: &str) -> Vec<String> {
        Vec::new()
    }

    fn set_file_urls(&mut self, _field: &str, _urls: Vec<String>) {}

    /// Every stored file URL across all file fields
    fn all_file_urls(&self) -> Vec<String> {
        Self::FILE_FIELDS
            .iter()
            .flat_map(|field| self.file_urls(field.name))
            .collect()
    }
}

/// Implements the timestamp half of `Reconcile` for a struct with
/// `created_at`/`updated_at` fields
macro_rules! timestamps {
    () => {
        fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
            self.created_at
        }

        fn stamp(&mut self, created_at: chrono::DateTime<chrono::Utc>, updated_at: chrono::DateTime<chrono::Utc>) {
            self.created_at = created_at;
            self.updated_at = updated_at;
        }
    };
}
pub(crate) use timestamps;
