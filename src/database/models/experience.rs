use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{timestamps, Entity, FileField};
use crate::database::reconcile::{Patch, Reconcile};
use crate::filter::FilterField;
use crate::validation::{Validate, ValidationError, Violations};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub id: Uuid,
    pub location_id: Option<Uuid>,
    pub company: String,
    pub role: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateExperience {
    #[serde(default)]
    pub location_id: Option<Uuid>,
    pub company: String,
    pub role: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_current: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateExperience {
    pub location_id: Patch<Uuid>,
    pub company: Patch<String>,
    pub role: Patch<String>,
    pub description: Patch<String>,
    pub start_date: Patch<NaiveDate>,
    pub end_date: Patch<NaiveDate>,
    pub is_current: Patch<bool>,
}

fn check_period(v: &mut Violations, start: Option<NaiveDate>, end: Option<NaiveDate>) {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            v.push("end_date", "must not be before start_date");
        }
    }
}

impl Validate for CreateExperience {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.require_text("company", &self.company)
            .require_text("role", &self.role);
        check_period(&mut v, Some(self.start_date), self.end_date);
        v.finish()
    }
}

impl Validate for UpdateExperience {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        v.require_text_patch("company", &self.company)
            .require_text_patch("role", &self.role)
            .forbid_null("start_date", &self.start_date)
            .forbid_null("is_current", &self.is_current);
        check_period(&mut v, self.start_date.as_value().copied(), self.end_date.as_value().copied());
        v.finish()
    }
}

impl Reconcile for Experience {
    type Patch = UpdateExperience;

    fn merge(self, patch: UpdateExperience) -> Self {
        Self {
            location_id: patch.location_id.apply_opt(self.location_id),
            company: patch.company.apply(self.company),
            role: patch.role.apply(self.role),
            description: patch.description.apply_opt(self.description),
            start_date: patch.start_date.apply(self.start_date),
            end_date: patch.end_date.apply_opt(self.end_date),
            is_current: patch.is_current.apply(self.is_current),
            ..self
        }
    }

    timestamps!();
}

impl Entity for Experience {
    const COLLECTION: &'static str = "experiences";
    const NAME: &'static str = "experience";
    const SEARCH_FIELDS: &'static [&'static str] = &["company", "role", "description"];
    const FILTERS: &'static [FilterField] = &[FilterField::eq("location_id"), FilterField::eq("is_current")];
    const FILE_FIELDS: &'static [FileField] = &[FileField { name: "logo", multiple: false }];

    type Create = CreateExperience;

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate_record(&self) -> Result<(), ValidationError> {
        let mut v = Violations::new();
        check_period(&mut v, Some(self.start_date), self.end_date);
        v.finish()
    }

    fn from_create(id: Uuid, input: CreateExperience, now: DateTime<Utc>) -> Self {
        Self {
            id,
            location_id: input.location_id,
            company: input.company,
            role: input.role,
            description: input.description,
            start_date: input.start_date,
            end_date: input.end_date,
            is_current: input.is_current,
            logo_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn file_urls(&self, field: &str) -> Vec<String> {
        match field {
            "logo" => self.logo_url.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    fn set_file_urls(&mut self, field: &str, urls: Vec<String>) {
        if field == "logo" {
            self.logo_url = urls.into_iter().next();
        }
    }
}
