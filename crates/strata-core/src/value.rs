//! Observations attached to `(subject, attribute)` pairs.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Textual timestamp form used in storage and in exported JSON.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A timestamped numeric observation. Unique per
/// `(subject_id, attribute_id, timestamp)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedValue {
  pub subject_id:   Uuid,
  pub attribute_id: Uuid,
  pub timestamp:    NaiveDateTime,
  pub value:        f64,
}

impl TimedValue {
  /// The composite key that storage enforces uniqueness on.
  pub fn key(&self) -> (Uuid, Uuid, NaiveDateTime) {
    (self.subject_id, self.attribute_id, self.timestamp)
  }
}

/// A non-temporal string observation, e.g. a school's type. Several values may
/// exist per `(subject_id, attribute_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedValue {
  pub subject_id:   Uuid,
  pub attribute_id: Uuid,
  pub value:        String,
}

/// Outcome of a bulk save. Records that could not be written (duplicate keys
/// within the batch, dangling references) are counted as `skipped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
  pub saved:   usize,
  pub skipped: usize,
}

impl std::ops::AddAssign for SaveReport {
  fn add_assign(&mut self, rhs: Self) {
    self.saved += rhs.saved;
    self.skipped += rhs.skipped;
  }
}
