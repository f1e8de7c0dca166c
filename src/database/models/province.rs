use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{timestamps, Entity};
use crate::database::reconcile::{Patch, Reconcile};
use crate::validation::{Validate, ValidationError, Violations};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Province {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProvince {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProvince {
    pub name: Patch<String>,
}

impl Validate for CreateProvince {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.require_text("name", &self.name);
        v.finish()
    }
}

impl Validate for UpdateProvince {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.require_text_patch("name", &self.name);
        v.finish()
    }
}

impl Reconcile for Province {
    type Patch = UpdateProvince;

    fn merge(self, patch: UpdateProvince) -> Self {
        Self {
            name: patch.name.apply(self.name),
            ..self
        }
    }

    timestamps!();
}

impl Entity for Province {
    const COLLECTION: &'static str = "provinces";
    const NAME: &'static str = "province";
    const SEARCH_FIELDS: &'static [&'static str] = &["name"];

    type Create = CreateProvince;

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, input: CreateProvince, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: input.name,
            created_at: now,
            updated_at: now,
        }
    }
}
