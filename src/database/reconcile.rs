//! Field-by-field merge of a stored record with an update payload.
//!
//! Update payloads carry every field as a [`Patch`], so "omitted" and
//! "explicitly cleared" are distinct states. Timestamps never come from the
//! payload: `created_at` is carried over and `updated_at` is set to the time
//! of the merge.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::validation::Validate;

/// Presence-aware field of an update payload.
///
/// A missing key deserializes to `Unset` (the owning struct needs
/// `#[serde(default)]`), `null` to `Null` and anything else to `Value`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Patch<T> {
    #[default]
    Unset,
    Null,
    Value(T),
}

impl<T> Patch<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Patch::Unset)
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Patch::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Merge into a required field. `Null` keeps the current value; validation
    /// rejects it before a merge ever happens.
    pub fn apply(self, current: T) -> T {
        match self {
            Patch::Value(v) => v,
            Patch::Unset | Patch::Null => current,
        }
    }

    /// Merge into an optional field
    pub fn apply_opt(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Unset => current,
            Patch::Null => None,
            Patch::Value(v) => Some(v),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Patch::Value(v),
            None => Patch::Null,
        })
    }
}

/// Records that can absorb an update payload
pub trait Reconcile: Sized {
    type Patch: DeserializeOwned + Validate + Default + Send + 'static;

    /// Whole-field overwrite of every field the patch carries
    fn merge(self, patch: Self::Patch) -> Self;

    fn created_at(&self) -> DateTime<Utc>;

    fn stamp(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>);
}

pub fn reconcile<E: Reconcile>(existing: E, patch: E::Patch, now: DateTime<Utc>) -> E {
    let created_at = existing.created_at();
    let mut merged = existing.merge(patch);
    merged.stamp(created_at, now);
    merged
}

/// Zero-value test used where presence is implied by content, such as the
/// URL list produced by an upload step
pub trait ZeroValue {
    fn is_zero(&self) -> bool;
}

impl ZeroValue for String {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T> ZeroValue for Vec<T> {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T> ZeroValue for Option<T> {
    fn is_zero(&self) -> bool {
        self.is_none()
    }
}

/// Keep `old` when `new` is zero, otherwise take `new` whole
pub fn reconcile_zero<T: ZeroValue>(old: T, new: T) -> T {
    if new.is_zero() {
        old
    } else {
        new
    }
}

/// URLs of a file field after an update: nothing uploaded keeps the stored
/// set, any upload replaces it entirely
pub fn reconcile_files(old: Vec<String>, uploaded: Vec<String>) -> Vec<String> {
    reconcile_zero(old, uploaded)
}
