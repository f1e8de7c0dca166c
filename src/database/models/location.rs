use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{timestamps, Entity};
use crate::database::reconcile::{Patch, Reconcile};
use crate::filter::FilterField;
use crate::validation::{Validate, ValidationError, Violations};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub city_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLocation {
    pub city_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateLocation {
    pub city_id: Patch<Uuid>,
    pub name: Patch<String>,
    pub address: Patch<String>,
    pub latitude: Patch<f64>,
    pub longitude: Patch<f64>,
}

fn check_coordinates(v: &mut Violations, latitude: Option<f64>, longitude: Option<f64>) {
    if latitude.map_or(false, |lat| !(-90.0..=90.0).contains(&lat)) {
        v.push("latitude", "must be between -90 and 90");
    }
    if longitude.map_or(false, |lng| !(-180.0..=180.0).contains(&lng)) {
        v.push("longitude", "must be between -180 and 180");
    }
}

impl Validate for CreateLocation {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.require_text("name", &self.name);
        check_coordinates(&mut v, self.latitude, self.longitude);
        v.finish()
    }
}

impl Validate for UpdateLocation {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.forbid_null("city_id", &self.city_id)
            .require_text_patch("name", &self.name);
        check_coordinates(&mut v, self.latitude.as_value().copied(), self.longitude.as_value().copied());
        v.finish()
    }
}

impl Reconcile for Location {
    type Patch = UpdateLocation;

    fn merge(self, patch: UpdateLocation) -> Self {
        Self {
            city_id: patch.city_id.apply(self.city_id),
            name: patch.name.apply(self.name),
            address: patch.address.apply_opt(self.address),
            latitude: patch.latitude.apply_opt(self.latitude),
            longitude: patch.longitude.apply_opt(self.longitude),
            ..self
        }
    }

    timestamps!();
}

impl Entity for Location {
    const COLLECTION: &'static str = "locations";
    const NAME: &'static str = "location";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "address"];
    const FILTERS: &'static [FilterField] = &[FilterField::eq("city_id")];

    type Create = CreateLocation;

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, input: CreateLocation, now: DateTime<Utc>) -> Self {
        Self {
            id,
            city_id: input.city_id,
            name: input.name,
            address: input.address,
            latitude: input.latitude,
            longitude: input.longitude,
            created_at: now,
            updated_at: now,
        }
    }
}
