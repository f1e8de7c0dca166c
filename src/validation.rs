//! Aggregated input validation.
//!
//! Validators collect every violation they find instead of stopping at the
//! first one, so a client can fix a payload in a single round trip.

use serde::Serialize;
use thiserror::Error;

use crate::database::reconcile::Patch;

/// A single rejected field with a human-readable reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed: {}", summarize(.0))]
pub struct ValidationError(pub Vec<FieldViolation>);

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![FieldViolation::new(field, message)])
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|v| v.field == field)
    }
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Payloads that can check themselves before any side effect happens
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Collector used by `Validate` impls
#[derive(Debug, Default)]
pub struct Violations(Vec<FieldViolation>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.0.push(FieldViolation::new(field, message));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Required text on create: must be present and not blank
    pub fn require_text(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.push(field, "is required");
        }
        self
    }

    /// Required text on update: may be omitted, but never cleared or blanked
    pub fn require_text_patch(&mut self, field: &str, value: &Patch<String>) -> &mut Self {
        match value {
            Patch::Unset => {}
            Patch::Null => {
                self.push(field, "cannot be cleared");
            }
            Patch::Value(v) => {
                self.require_text(field, v);
            }
        }
        self
    }

    /// Non-optional field on update: may be omitted but not set to null
    pub fn forbid_null<T>(&mut self, field: &str, value: &Patch<T>) -> &mut Self {
        if matches!(value, Patch::Null) {
            self.push(field, "cannot be cleared");
        }
        self
    }

    pub fn check_url(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(raw) = value {
            if url::Url::parse(raw).is_err() {
                self.push(field, format!("is not a valid URL: {}", raw));
            }
        }
        self
    }

    pub fn check_url_patch(&mut self, field: &str, value: &Patch<String>) -> &mut Self {
        self.check_url(field, value.as_value().map(String::as_str))
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError(self.0))
        }
    }
}
