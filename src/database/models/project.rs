use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{timestamps, Association, Entity, FileField};
use crate::database::reconcile::{Patch, Reconcile};
use crate::filter::FilterField;
use crate::validation::{Validate, ValidationError, Violations};

pub const PROJECT_STATUSES: &[&str] = &["draft", "in_progress", "completed", "archived"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub featured: bool,
    pub repository_url: Option<String>,
    pub demo_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub demo_url: Option<String>,
    #[serde(default)]
    pub tech_stack_ids: Vec<Uuid>,
}

fn default_status() -> String {
    "draft".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProject {
    pub name: Patch<String>,
    pub description: Patch<String>,
    pub status: Patch<String>,
    pub featured: Patch<bool>,
    pub repository_url: Patch<String>,
    pub demo_url: Patch<String>,
    pub tech_stack_ids: Patch<Vec<Uuid>>,
}

fn check_status(v: &mut Violations, status: Option<&str>) {
    if let Some(status) = status {
        if !PROJECT_STATUSES.contains(&status) {
            v.push(
                "status",
                format!("must be one of {}, got '{}'", PROJECT_STATUSES.join(", "), status),
            );
        }
    }
}

impl Validate for CreateProject {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.require_text("name", &self.name)
            .check_url("repository_url", self.repository_url.as_deref())
            .check_url("demo_url", self.demo_url.as_deref());
        check_status(&mut v, Some(&self.status));
        v.finish()
    }
}

impl Validate for UpdateProject {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.require_text_patch("name", &self.name)
            .forbid_null("status", &self.status)
            .forbid_null("featured", &self.featured)
            .check_url_patch("repository_url", &self.repository_url)
            .check_url_patch("demo_url", &self.demo_url);
        check_status(&mut v, self.status.as_value().map(String::as_str));
        v.finish()
    }
}

impl Reconcile for Project {
    type Patch = UpdateProject;

    fn merge(self, patch: UpdateProject) -> Self {
        Self {
            name: patch.name.apply(self.name),
            description: patch.description.apply_opt(self.description),
            status: patch.status.apply(self.status),
            featured: patch.featured.apply(self.featured),
            repository_url: patch.repository_url.apply_opt(self.repository_url),
            demo_url: patch.demo_url.apply_opt(self.demo_url),
            ..self
        }
    }

    timestamps!();
}

impl Entity for Project {
    const COLLECTION: &'static str = "projects";
    const NAME: &'static str = "project";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "description"];
    const FILTERS: &'static [FilterField] = &[FilterField::eq("status"), FilterField::eq("featured")];
    const FILE_FIELDS: &'static [FileField] = &[FileField { name: "images", multiple: true }];
    const ASSOCIATION: Option<Association> = Some(Association {
        name: "tech_stacks",
        ids_field: "tech_stack_ids",
        join_collection: "project_tech_stacks",
        owner_column: "project_id",
        target_column: "tech_stack_id",
        target_collection: "tech_stacks",
    });

    type Create = CreateProject;

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, input: CreateProject, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name,
            description: input.description,
            status: input.status,
            featured: input.featured,
            repository_url: input.repository_url,
            demo_url: input.demo_url,
            images: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn create_links(input: &CreateProject) -> Vec<Uuid> {
        input.tech_stack_ids.clone()
    }

    fn update_links(patch: &UpdateProject) -> Vec<Uuid> {
        patch.tech_stack_ids.as_value().cloned().unwrap_or_default()
    }

    fn file_urls(&self, field: &str) -> Vec<String> {
        match field {
            "images" => self.images.clone(),
            _ => Vec::new(),
        }
    }

    fn set_file_urls(&mut self, field: &str, urls: Vec<String>) {
        if field == "images" {
            self.images = urls;
        }
    }
}
