use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{timestamps, Entity, FileField};
use crate::database::reconcile::{Patch, Reconcile};
use crate::filter::FilterField;
use crate::validation::{Validate, ValidationError, Violations};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    pub id: Uuid,
    pub name: String,
    pub issuer: String,
    pub issued_at: Option<NaiveDate>,
    pub credential_url: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBadge {
    pub name: String,
    pub issuer: String,
    #[serde(default)]
    pub issued_at: Option<NaiveDate>,
    #[serde(default)]
    pub credential_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateBadge {
    pub name: Patch<String>,
    pub issuer: Patch<String>,
    pub issued_at: Patch<NaiveDate>,
    pub credential_url: Patch<String>,
}

impl Validate for CreateBadge {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.require_text("name", &self.name)
            .require_text("issuer", &self.issuer)
            .check_url("credential_url", self.credential_url.as_deref());
        v.finish()
    }
}

impl Validate for UpdateBadge {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.require_text_patch("name", &self.name)
            .require_text_patch("issuer", &self.issuer)
            .check_url_patch("credential_url", &self.credential_url);
        v.finish()
    }
}

impl Reconcile for Badge {
    type Patch = UpdateBadge;

    fn merge(self, patch: UpdateBadge) -> Self {
        Self {
            name: patch.name.apply(self.name),
            issuer: patch.issuer.apply(self.issuer),
            issued_at: patch.issued_at.apply_opt(self.issued_at),
            credential_url: patch.credential_url.apply_opt(self.credential_url),
            ..self
        }
    }

    timestamps!();
}

impl Entity for Badge {
    const COLLECTION: &'static str = "badges";
    const NAME: &'static str = "badge";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "issuer"];
    const FILTERS: &'static [FilterField] = &[FilterField::eq("issuer")];
    const FILE_FIELDS: &'static [FileField] = &[FileField { name: "image", multiple: false }];

    type Create = CreateBadge;

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, input: CreateBadge, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name,
            issuer: input.issuer,
            issued_at: input.issued_at,
            credential_url: input.credential_url,
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn file_urls(&self, field: &str) -> Vec<String> {
        match field {
            "image" => self.image_url.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    fn set_file_urls(&mut self, field: &str, urls: Vec<String>) {
        if field == "image" {
            self.image_url = urls.into_iter().next();
        }
    }
}
