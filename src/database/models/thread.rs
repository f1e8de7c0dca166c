use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{timestamps, Entity};
use crate::database::reconcile::{Patch, Reconcile};
use crate::filter::FilterField;
use crate::validation::{Validate, ValidationError, Violations};

/// A discussion post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateThread {
    pub title: String,
    pub content: String,
    pub author: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateThread {
    pub title: Patch<String>,
    pub content: Patch<String>,
    pub author: Patch<String>,
}

impl Validate for CreateThread {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.require_text("title", &self.title)
            .require_text("content", &self.content)
            .require_text("author", &self.author);
        v.finish()
    }
}

impl Validate for UpdateThread {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.require_text_patch("title", &self.title)
            .require_text_patch("content", &self.content)
            .require_text_patch("author", &self.author);
        v.finish()
    }
}

impl Reconcile for Thread {
    type Patch = UpdateThread;

    fn merge(self, patch: UpdateThread) -> Self {
        Self {
            title: patch.title.apply(self.title),
            content: patch.content.apply(self.content),
            author: patch.author.apply(self.author),
            ..self
        }
    }

    timestamps!();
}

impl Entity for Thread {
    const COLLECTION: &'static str = "threads";
    const NAME: &'static str = "thread";
    const SEARCH_FIELDS: &'static [&'static str] = &["title", "content"];
    const FILTERS: &'static [FilterField] = &[FilterField::eq("author")];

    type Create = CreateThread;

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, input: CreateThread, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: input.title,
            content: input.content,
            author: input.author,
            created_at: now,
            updated_at: now,
        }
    }
}
