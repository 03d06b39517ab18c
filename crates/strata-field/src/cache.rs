use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use uuid::Uuid;

use crate::{error::Incomputable, field::FieldId};

/// Memoised results for one export run.
///
/// Derived fields store their per-subject outcome, incomputable ones
/// included, keyed by `(field, subject)`. Percentile fields store their
/// sorted cohort values keyed by field. The cache is shared by reference and
/// safe to use from concurrent evaluations.
#[derive(Debug, Default)]
pub struct FieldCache {
  values:  Mutex<HashMap<(FieldId, Uuid), Result<f64, Incomputable>>>,
  cohorts: Mutex<HashMap<FieldId, Arc<Vec<f64>>>>,
}

impl FieldCache {
  pub fn new() -> Self { Self::default() }

  pub fn value(&self, field: FieldId, subject: Uuid) -> Option<Result<f64, Incomputable>> {
    self
      .values
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(&(field, subject))
      .cloned()
  }

  pub fn put_value(&self, field: FieldId, subject: Uuid, value: Result<f64, Incomputable>) {
    self
      .values
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert((field, subject), value);
  }

  pub fn cohort(&self, field: FieldId) -> Option<Arc<Vec<f64>>> {
    self.cohorts.lock().unwrap_or_else(PoisonError::into_inner).get(&field).cloned()
  }

  pub fn put_cohort(&self, field: FieldId, values: Arc<Vec<f64>>) {
    self.cohorts.lock().unwrap_or_else(PoisonError::into_inner).insert(field, values);
  }

  /// Number of memoised per-subject values.
  pub fn len(&self) -> usize {
    self.values.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}
