//! Resolved fields.
//!
//! A [`Field`] is only ever produced by [`Resolver`](crate::Resolver), so
//! every attribute and subject type it refers to is known to exist.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_core::{
  catalogue::{Attribute, SubjectType},
  subject::Subject,
};

use crate::{
  error::Incomputable,
  recipe::{Aggregator, Operation},
};

/// Identity of a field within one resolution run; the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub(crate) usize);

impl fmt::Display for FieldId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// A single value: a number, or text for annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
  Number(f64),
  Text(String),
}

impl Scalar {
  /// Text is parsed, so numeric annotations can be operands.
  pub fn as_number(&self) -> Result<f64, Incomputable> {
    match self {
      Self::Number(n) => Ok(*n),
      Self::Text(s) => s
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| Incomputable::new(format!("value {s:?} is not a finite number"))),
    }
  }

  pub fn to_json(&self) -> Value {
    match self {
      Self::Number(n) => Value::from(*n),
      Self::Text(s) => Value::String(s.clone()),
    }
  }
}

impl From<f64> for Scalar {
  fn from(value: f64) -> Self { Self::Number(value) }
}

impl From<&str> for Scalar {
  fn from(value: &str) -> Self { Self::Text(value.to_owned()) }
}

#[derive(Debug, Clone)]
pub struct Field {
  pub id:    FieldId,
  pub label: String,
  pub kind:  FieldKind,
}

#[derive(Debug, Clone)]
pub enum FieldKind {
  LatestValue {
    attribute:     Attribute,
    provider_name: String,
  },
  ValuesByTime {
    attribute:     Attribute,
    provider_name: String,
  },
  FixedAnnotation {
    value: Scalar,
  },
  HasFixedAttribute {
    attribute: Attribute,
    values:    Option<Vec<String>>,
  },
  Wrapper {
    fields: Vec<Field>,
  },
  FieldValueSum {
    name:   String,
    fields: Vec<Field>,
  },
  Arithmetic {
    operation: Operation,
    left:      Box<Field>,
    right:     Box<Field>,
  },
  MapToContainingSubject {
    subject_type: SubjectType,
    field:        Box<Field>,
  },
  MapToNearestSubject {
    subject_type: SubjectType,
    max_radius:   f64,
    field:        Box<Field>,
  },
  GeographicAggregation {
    subject_type: SubjectType,
    aggregator:   Aggregator,
    field:        Box<Field>,
  },
  Percentile {
    field:   Box<Field>,
    /// Normalisation subjects the boundaries are computed over.
    cohort:  Vec<Subject>,
    count:   usize,
    inverse: bool,
  },
  Modelling {
    fields: Vec<Field>,
  },
}

impl Field {
  /// Whether the field yields a scalar usable as an operand.
  pub fn is_single_value(&self) -> bool {
    match &self.kind {
      FieldKind::LatestValue { .. }
      | FieldKind::FixedAnnotation { .. }
      | FieldKind::HasFixedAttribute { .. }
      | FieldKind::FieldValueSum { .. }
      | FieldKind::Arithmetic { .. }
      | FieldKind::GeographicAggregation { .. }
      | FieldKind::Percentile { .. } => true,
      FieldKind::MapToContainingSubject { field, .. }
      | FieldKind::MapToNearestSubject { field, .. } => field.is_single_value(),
      FieldKind::ValuesByTime { .. } | FieldKind::Wrapper { .. } | FieldKind::Modelling { .. } => {
        false
      }
    }
  }
}
