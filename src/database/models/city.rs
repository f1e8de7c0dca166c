use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{timestamps, Entity};
use crate::database::reconcile::{Patch, Reconcile};
use crate::filter::FilterField;
use crate::validation::{Validate, ValidationError, Violations};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: Uuid,
    pub province_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCity {
    pub province_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateCity {
    pub province_id: Patch<Uuid>,
    pub name: Patch<String>,
    pub description: Patch<String>,
}

impl Validate for CreateCity {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.require_text("name", &self.name);
        v.finish()
    }
}

impl Validate for UpdateCity {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.forbid_null("province_id", &self.province_id)
            .require_text_patch("name", &self.name);
        v.finish()
    }
}

impl Reconcile for City {
    type Patch = UpdateCity;

    fn merge(self, patch: UpdateCity) -> Self {
        Self {
            province_id: patch.province_id.apply(self.province_id),
            name: patch.name.apply(self.name),
            description: patch.description.apply_opt(self.description),
            ..self
        }
    }

    timestamps!();
}

impl Entity for City {
    const COLLECTION: &'static str = "cities";
    const NAME: &'static str = "city";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "description"];
    const FILTERS: &'static [FilterField] = &[FilterField::eq("province_id")];

    type Create = CreateCity;

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, input: CreateCity, now: DateTime<Utc>) -> Self {
        Self {
            id,
            province_id: input.province_id,
            name: input.name,
            description: input.description,
            created_at: now,
            updated_at: now,
        }
    }
}
