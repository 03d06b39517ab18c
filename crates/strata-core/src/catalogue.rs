//! Catalogue metadata: providers, subject types and attributes.
//!
//! These are the durable identities that observations hang off. All three are
//! upserted by their natural key, so repeated imports never mint new ids for
//! an existing provider/label pair.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

// ─── Provider ────────────────────────────────────────────────────────────────

/// The organisation (or namespace) that publishes attributes and subject
/// types. Keyed by `label`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provider {
  pub label: String,
  pub name:  String,
}

impl Provider {
  pub fn new(label: impl Into<String>, name: impl Into<String>) -> Self {
    Self { label: label.into(), name: name.into() }
  }
}

// ─── SubjectType ─────────────────────────────────────────────────────────────

/// A category of geographic or administrative entity, e.g. `lsoa` or
/// `localAuthority`. Keyed by `(provider, label)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectType {
  pub subject_type_id: Uuid,
  /// Label of the owning [`Provider`].
  pub provider:        String,
  pub label:           String,
  pub name:            String,
}

/// Input to [`crate::store::CatalogueStore::upsert_subject_type`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubjectType {
  pub provider: String,
  pub label:    String,
  pub name:     String,
}

impl NewSubjectType {
  pub fn new(
    provider: impl Into<String>,
    label: impl Into<String>,
    name: impl Into<String>,
  ) -> Self {
    Self { provider: provider.into(), label: label.into(), name: name.into() }
  }
}

// ─── Attribute ───────────────────────────────────────────────────────────────

/// Whether an attribute carries numeric (timed) or string (fixed) values.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Display,
  EnumString,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DataKind {
  #[default]
  Numeric,
  String,
}

/// A named metric definition scoped to a provider.
///
/// The `attribute_id` is stable across re-imports: upserting an attribute with
/// an existing `(provider, label)` overwrites the descriptive fields in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
  pub attribute_id: Uuid,
  pub provider:     String,
  pub label:        String,
  pub name:         String,
  pub description:  String,
  pub kind:         DataKind,
}

/// Input to [`crate::store::CatalogueStore::upsert_attributes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAttribute {
  pub provider:    String,
  pub label:       String,
  pub name:        String,
  pub description: String,
  pub kind:        DataKind,
}

impl NewAttribute {
  /// A numeric attribute with an empty description.
  pub fn numeric(
    provider: impl Into<String>,
    label: impl Into<String>,
    name: impl Into<String>,
  ) -> Self {
    Self {
      provider:    provider.into(),
      label:       label.into(),
      name:        name.into(),
      description: String::new(),
      kind:        DataKind::Numeric,
    }
  }

  /// A string attribute with an empty description.
  pub fn string(
    provider: impl Into<String>,
    label: impl Into<String>,
    name: impl Into<String>,
  ) -> Self {
    Self { kind: DataKind::String, ..Self::numeric(provider, label, name) }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }
}
