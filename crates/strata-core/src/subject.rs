//! A subject: one geographic or administrative entity that values attach to.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::Geometry;

/// A persisted subject. `label` is unique within its subject type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:      Uuid,
  pub subject_type_id: Uuid,
  pub label:           String,
  pub name:            String,
  pub geometry:        Option<Geometry>,
}

/// Input to [`crate::store::CatalogueStore::save_subjects`].
///
/// Saving a subject whose `(subject_type_id, label)` already exists updates the
/// name and geometry but keeps the existing `subject_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSubject {
  pub subject_type_id: Uuid,
  pub label:           String,
  pub name:            String,
  pub geometry:        Option<Geometry>,
}

impl NewSubject {
  pub fn new(
    subject_type_id: Uuid,
    label: impl Into<String>,
    name: impl Into<String>,
  ) -> Self {
    Self {
      subject_type_id,
      label: label.into(),
      name: name.into(),
      geometry: None,
    }
  }

  pub fn with_geometry(mut self, geometry: Geometry) -> Self {
    self.geometry = Some(geometry);
    self
  }
}
