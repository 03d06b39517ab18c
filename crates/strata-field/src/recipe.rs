//! Serialisable field recipes.
//!
//! A recipe is pure data: it names attributes and subject types by their
//! natural keys and says nothing about whether they exist. [`Resolver`]
//! turns a recipe into a [`Field`] once a store is available.
//!
//! [`Resolver`]: crate::Resolver
//! [`Field`]: crate::Field

use serde::{Deserialize, Serialize};
use strata_core::datasource::DatasourceRecipe;
use strum::{Display, EnumString};

use crate::{error::Incomputable, field::Scalar, subjects::SubjectRecipe};

/// Names an attribute by `(provider, label)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMatcher {
  pub provider: String,
  pub label:    String,
}

impl AttributeMatcher {
  pub fn new(provider: impl Into<String>, label: impl Into<String>) -> Self {
    Self { provider: provider.into(), label: label.into() }
  }
}

/// Names a subject type by `(provider, subjectType)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTypeRef {
  pub provider:     String,
  pub subject_type: String,
}

impl SubjectTypeRef {
  pub fn new(provider: impl Into<String>, subject_type: impl Into<String>) -> Self {
    Self { provider: provider.into(), subject_type: subject_type.into() }
  }
}

// ─── Operators ───────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
  Div,
  Mul,
  Add,
  Sub,
}

impl Operation {
  /// Apply the operation; NaN and infinite results have no value.
  pub fn apply(self, left: f64, right: f64) -> Result<f64, Incomputable> {
    let result = match self {
      Self::Div => left / right,
      Self::Mul => left * right,
      Self::Add => left + right,
      Self::Sub => left - right,
    };
    if result.is_finite() {
      Ok(result)
    } else {
      Err(Incomputable::new(format!("{left} {self} {right} is not a finite number")))
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Aggregator {
  Mean,
  Sum,
  Min,
  Max,
}

impl Aggregator {
  /// `None` for an empty input.
  pub fn apply(self, values: &[f64]) -> Option<f64> {
    if values.is_empty() {
      return None;
    }
    let result = match self {
      Self::Sum => values.iter().sum(),
      Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
      Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
      Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };
    Some(result)
  }
}

// ─── Recipes ─────────────────────────────────────────────────────────────────

/// One field of an export recipe, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FieldRecipe {
  /// The most recent timed value of an attribute.
  LatestValue { label: String, attribute: AttributeMatcher },
  /// Every timed value of an attribute, oldest first.
  ValuesByTime { label: String, attribute: AttributeMatcher },
  FixedAnnotation { label: String, value: Scalar },
  /// 1 when the subject has a fixed value for the attribute (one of
  /// `values`, when given), otherwise 0.
  HasFixedAttribute {
    label:     String,
    attribute: AttributeMatcher,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    values:    Option<Vec<String>>,
  },
  Wrapper { label: String, fields: Vec<FieldRecipe> },
  FieldValueSum {
    label:  String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name:   Option<String>,
    fields: Vec<FieldRecipe>,
  },
  Arithmetic {
    label:     String,
    operation: Operation,
    field1:    Box<FieldRecipe>,
    field2:    Box<FieldRecipe>,
  },
  MapToContainingSubject { label: String, subject: SubjectTypeRef, field: Box<FieldRecipe> },
  MapToNearestSubject {
    label:      String,
    subject:    SubjectTypeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_radius: Option<f64>,
    field:      Box<FieldRecipe>,
  },
  /// Aggregates `field` over the subjects of `subject` type that lie within
  /// the evaluated subject.
  GeographicAggregation {
    label:      String,
    subject:    SubjectTypeRef,
    aggregator: Aggregator,
    field:      Box<FieldRecipe>,
  },
  Percentile {
    label:                  String,
    field:                  Box<FieldRecipe>,
    normalization_subjects: Vec<SubjectRecipe>,
    percentile_count:       usize,
    #[serde(default)]
    inverse:                bool,
  },
  /// A predefined bundle of fields with the datasources they depend on.
  Modelling {
    label:       String,
    #[serde(default)]
    datasources: Vec<DatasourceRecipe>,
    fields:      Vec<FieldRecipe>,
  },
}

impl FieldRecipe {
  pub fn label(&self) -> &str {
    match self {
      Self::LatestValue { label, .. }
      | Self::ValuesByTime { label, .. }
      | Self::FixedAnnotation { label, .. }
      | Self::HasFixedAttribute { label, .. }
      | Self::Wrapper { label, .. }
      | Self::FieldValueSum { label, .. }
      | Self::Arithmetic { label, .. }
      | Self::MapToContainingSubject { label, .. }
      | Self::MapToNearestSubject { label, .. }
      | Self::GeographicAggregation { label, .. }
      | Self::Percentile { label, .. }
      | Self::Modelling { label, .. } => label,
    }
  }

  /// Datasources declared by modelling fields anywhere in this tree, in
  /// depth-first order.
  pub fn datasources(&self) -> Vec<DatasourceRecipe> {
    let mut out = Vec::new();
    self.collect_datasources(&mut out);
    out
  }

  fn collect_datasources(&self, out: &mut Vec<DatasourceRecipe>) {
    match self {
      Self::Modelling { datasources, fields, .. } => {
        out.extend(datasources.iter().cloned());
        fields.iter().for_each(|f| f.collect_datasources(out));
      }
      Self::Wrapper { fields, .. } | Self::FieldValueSum { fields, .. } => {
        fields.iter().for_each(|f| f.collect_datasources(out));
      }
      Self::Arithmetic { field1, field2, .. } => {
        field1.collect_datasources(out);
        field2.collect_datasources(out);
      }
      Self::MapToContainingSubject { field, .. }
      | Self::MapToNearestSubject { field, .. }
      | Self::GeographicAggregation { field, .. }
      | Self::Percentile { field, .. } => field.collect_datasources(out),
      Self::LatestValue { .. }
      | Self::ValuesByTime { .. }
      | Self::FixedAnnotation { .. }
      | Self::HasFixedAttribute { .. } => {}
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn parses_nested_recipes() {
    let recipe: FieldRecipe = serde_json::from_value(json!({
      "kind": "arithmetic",
      "label": "density",
      "operation": "div",
      "field1": {
        "kind": "latestValue",
        "label": "population",
        "attribute": { "provider": "uk.gov.ons", "label": "population" }
      },
      "field2": {
        "kind": "mapToNearestSubject",
        "label": "area",
        "subject": { "provider": "uk.gov.ons", "subjectType": "lsoa" },
        "maxRadius": 0.5,
        "field": { "kind": "fixedAnnotation", "label": "one", "value": 1 }
      }
    }))
    .unwrap();

    let FieldRecipe::Arithmetic { operation, field2, .. } = &recipe else {
      panic!("expected arithmetic, got {recipe:?}");
    };
    assert_eq!(*operation, Operation::Div);
    assert!(matches!(
      field2.as_ref(),
      FieldRecipe::MapToNearestSubject { max_radius: Some(r), .. } if *r == 0.5
    ));
    assert_eq!(recipe.label(), "density");
  }

  #[test]
  fn rejects_unknown_kinds() {
    let err = serde_json::from_value::<FieldRecipe>(json!({
      "kind": "uk.org.tombolo.field.Unknown",
      "label": "x"
    }));
    assert!(err.is_err());
  }

  #[test]
  fn collects_modelling_datasources() {
    let recipe: FieldRecipe = serde_json::from_value(json!({
      "kind": "wrapper",
      "label": "bundle",
      "fields": [{
        "kind": "modelling",
        "label": "wellbeing",
        "datasources": [{ "importerClass": "csv-values", "datasourceId": "population" }],
        "fields": [{
          "kind": "modelling",
          "label": "inner",
          "datasources": [{ "importerClass": "geojson-subjects", "datasourceId": "lsoa" }],
          "fields": []
        }]
      }]
    }))
    .unwrap();

    let ids: Vec<_> = recipe.datasources().into_iter().map(|d| d.datasource_id).collect();
    assert_eq!(ids, ["population", "lsoa"]);
  }

  #[test]
  fn non_finite_arithmetic_is_incomputable() {
    assert_eq!(Operation::Div.apply(10.0, 4.0), Ok(2.5));
    assert!(Operation::Div.apply(1.0, 0.0).is_err());
    assert!(Operation::Div.apply(0.0, 0.0).is_err());
    assert!(Operation::Mul.apply(f64::MAX, 2.0).is_err());
  }

  #[test]
  fn aggregators() {
    let values = [100.0, 110.0, 90.0];
    assert_eq!(Aggregator::Mean.apply(&values), Some(100.0));
    assert_eq!(Aggregator::Sum.apply(&values), Some(300.0));
    assert_eq!(Aggregator::Min.apply(&values), Some(90.0));
    assert_eq!(Aggregator::Max.apply(&values), Some(110.0));
    assert_eq!(Aggregator::Mean.apply(&[]), None);
  }
}
