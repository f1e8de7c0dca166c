use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{timestamps, Entity, FileField};
use crate::database::reconcile::{Patch, Reconcile};
use crate::filter::FilterField;
use crate::validation::{Validate, ValidationError, Violations};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechStack {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub icon_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTechStack {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateTechStack {
    pub name: Patch<String>,
    pub category: Patch<String>,
}

impl Validate for CreateTechStack {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.require_text("name", &self.name);
        v.finish()
    }
}

impl Validate for UpdateTechStack {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.require_text_patch("name", &self.name);
        v.finish()
    }
}

impl Reconcile for TechStack {
    type Patch = UpdateTechStack;

    fn merge(self, patch: UpdateTechStack) -> Self {
        Self {
            name: patch.name.apply(self.name),
            category: patch.category.apply_opt(self.category),
            ..self
        }
    }

    timestamps!();
}

impl Entity for TechStack {
    const COLLECTION: &'static str = "tech_stacks";
    const NAME: &'static str = "tech stack";
    const SEARCH_FIELDS: &'static [&'static str] = &["name"];
    const FILTERS: &'static [FilterField] = &[FilterField::eq("category")];
    const FILE_FIELDS: &'static [FileField] = &[FileField { name: "icon", multiple: false }];

    type Create = CreateTechStack;

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, input: CreateTechStack, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name,
            category: input.category,
            icon_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn file_urls(&self, field: &str) -> Vec<String> {
        match field {
            "icon" => self.icon_url.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    fn set_file_urls(&mut self, field: &str, urls: Vec<String>) {
        if field == "icon" {
            self.icon_url = urls.into_iter().next();
        }
    }
}
