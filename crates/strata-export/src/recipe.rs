//! The export recipe document.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_core::datasource::DatasourceRecipe;
use strata_field::{FieldRecipe, SubjectRecipe};
use strum::{Display, EnumString};

use crate::{validate::validate_recipe, Error, Result};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExporterKind {
  Geojson,
  Csv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
  pub subjects:    Vec<SubjectRecipe>,
  #[serde(default)]
  pub datasources: Vec<DatasourceRecipe>,
  pub fields:      Vec<FieldRecipe>,
}

/// A complete export job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataExportRecipe {
  pub exporter: ExporterKind,
  pub dataset:  Dataset,
}

impl DataExportRecipe {
  /// Parse and validate a recipe. Every violation is reported at once as
  /// [`Error::InvalidRecipe`].
  pub fn from_json(source: &str) -> Result<Self> {
    let raw: Value = serde_json::from_str(source)?;
    Self::from_value(raw)
  }

  pub fn from_value(raw: Value) -> Result<Self> {
    let violations = validate_recipe(&raw);
    if !violations.is_empty() {
      return Err(Error::InvalidRecipe(violations));
    }
    Ok(serde_json::from_value(raw)?)
  }
}
