//! Datasource metadata and import requests.

use serde::{Deserialize, Serialize};

use crate::catalogue::{NewAttribute, NewSubjectType, Provider};

/// Everything an importer declares about one of its datasources before any
/// value is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datasource {
  pub id:            String,
  pub name:          String,
  pub description:   String,
  pub provider:      Provider,
  /// Remote or local location of the underlying data, informational only.
  pub url:           Option<String>,
  /// Subject types this datasource creates subjects of.
  pub subject_types: Vec<NewSubjectType>,
  pub attributes:    Vec<NewAttribute>,
}

impl Datasource {
  pub fn new(
    id: impl Into<String>,
    name: impl Into<String>,
    description: impl Into<String>,
    provider: Provider,
  ) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      description: description.into(),
      provider,
      url: None,
      subject_types: Vec::new(),
      attributes: Vec::new(),
    }
  }

  pub fn attribute_by_label(&self, label: &str) -> Option<&NewAttribute> {
    self.attributes.iter().find(|a| a.label == label)
  }
}

/// A recipe-level request to import one datasource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceRecipe {
  /// Registered importer name.
  pub importer_class:     String,
  pub datasource_id:      String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub geography_scope:    Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub temporal_scope:     Option<Vec<String>>,
  /// Importer configuration file (TOML or JSON).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub configuration_file: Option<String>,
}

impl DatasourceRecipe {
  pub fn new(
    importer_class: impl Into<String>,
    datasource_id: impl Into<String>,
  ) -> Self {
    Self {
      importer_class: importer_class.into(),
      datasource_id: datasource_id.into(),
      ..Self::default()
    }
  }
}
