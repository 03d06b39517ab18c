//! Field evaluation.
//!
//! [`Field::json_value`] produces the value a field contributes under its
//! label; [`Field::scalar`] produces the operand form of single-value
//! fields. Both take an [`EvalContext`] carrying the store and the run's
//! cache.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use strata_core::{
  store::CatalogueStore,
  subject::Subject,
  value::{TimedValue, TIMESTAMP_FORMAT},
};
use tracing::warn;

use crate::{
  cache::FieldCache,
  error::{EvalError, EvalResult, Incomputable},
  field::{Field, FieldKind, Scalar},
  percentile,
};

/// Everything evaluation needs besides the field and subject.
pub struct EvalContext<'a, S> {
  pub store: &'a S,
  pub cache: &'a FieldCache,
}

impl<'a, S> EvalContext<'a, S> {
  pub fn new(store: &'a S, cache: &'a FieldCache) -> Self { Self { store, cache } }
}

impl<S> Clone for EvalContext<'_, S> {
  fn clone(&self) -> Self { *self }
}

impl<S> Copy for EvalContext<'_, S> {}

fn value_entry(value: &TimedValue) -> Value {
  json!({
    "timestamp": value.timestamp.format(TIMESTAMP_FORMAT).to_string(),
    "value": value.value,
  })
}

impl Field {
  /// The JSON value this field contributes for `subject`.
  pub fn json_value<'a, S: CatalogueStore>(
    &'a self,
    ctx: EvalContext<'a, S>,
    subject: &'a Subject,
  ) -> BoxFuture<'a, EvalResult<Value>> {
    Box::pin(async move {
      match &self.kind {
        FieldKind::LatestValue { attribute, provider_name } => {
          let latest = ctx
            .store
            .latest_timed_value(subject.subject_id, attribute.attribute_id)
            .await
            .map_err(EvalError::store)?
            .ok_or_else(|| no_value(&attribute.label, subject))?;
          Ok(json!({
            "name": attribute.name,
            "provider": provider_name,
            "values": [value_entry(&latest)],
          }))
        }
        FieldKind::ValuesByTime { attribute, provider_name } => {
          let values = ctx
            .store
            .timed_values(subject.subject_id, attribute.attribute_id)
            .await
            .map_err(EvalError::store)?;
          Ok(json!({
            "name": attribute.name,
            "provider": provider_name,
            "values": values.iter().map(value_entry).collect::<Vec<_>>(),
          }))
        }
        FieldKind::FieldValueSum { name, .. } => {
          let sum = self.scalar(ctx, subject).await?;
          Ok(json!({ "name": name, "values": [{ "value": sum.to_json() }] }))
        }
        FieldKind::Wrapper { fields } | FieldKind::Modelling { fields } => {
          let mut object = Map::new();
          for child in fields {
            match child.json_value(ctx, subject).await {
              Ok(value) => {
                object.insert(child.label.clone(), value);
              }
              Err(EvalError::Incomputable(e)) => {
                warn!(
                  field = %child.label,
                  subject = %subject.label,
                  reason = %e,
                  "could not compute field for subject"
                );
              }
              Err(e) => return Err(e),
            }
          }
          Ok(Value::Object(object))
        }
        FieldKind::MapToContainingSubject { .. } | FieldKind::MapToNearestSubject { .. } => {
          let (mapped, field) = self.map_subject(ctx, subject).await?;
          field.json_value(ctx, &mapped).await
        }
        FieldKind::FixedAnnotation { .. }
        | FieldKind::HasFixedAttribute { .. }
        | FieldKind::Arithmetic { .. }
        | FieldKind::GeographicAggregation { .. }
        | FieldKind::Percentile { .. } => Ok(self.scalar(ctx, subject).await?.to_json()),
      }
    })
  }

  /// The scalar value of a single-value field for `subject`.
  pub fn scalar<'a, S: CatalogueStore>(
    &'a self,
    ctx: EvalContext<'a, S>,
    subject: &'a Subject,
  ) -> BoxFuture<'a, EvalResult<Scalar>> {
    Box::pin(async move {
      match &self.kind {
        FieldKind::LatestValue { attribute, .. } => {
          let latest = ctx
            .store
            .latest_timed_value(subject.subject_id, attribute.attribute_id)
            .await
            .map_err(EvalError::store)?
            .ok_or_else(|| no_value(&attribute.label, subject))?;
          Ok(Scalar::Number(latest.value))
        }
        FieldKind::FixedAnnotation { value } => Ok(value.clone()),
        FieldKind::HasFixedAttribute { attribute, values } => {
          let fixed = ctx
            .store
            .fixed_values(subject.subject_id, attribute.attribute_id)
            .await
            .map_err(EvalError::store)?;
          let present = fixed.iter().any(|f| {
            values.as_ref().is_none_or(|wanted| wanted.iter().any(|w| *w == f.value))
          });
          Ok(Scalar::Number(if present { 1.0 } else { 0.0 }))
        }
        FieldKind::FieldValueSum { fields, .. } => {
          self
            .cached(ctx, subject, async {
              let mut sum = 0.0;
              for child in fields {
                sum += child.number(ctx, subject).await?;
              }
              Ok(finite(sum, || format!("sum {} for {}", self.label, subject.label))?)
            })
            .await
        }
        FieldKind::Arithmetic { operation, left, right } => {
          self
            .cached(ctx, subject, async {
              let l = left.number(ctx, subject).await?;
              let r = right.number(ctx, subject).await?;
              Ok(operation.apply(l, r)?)
            })
            .await
        }
        FieldKind::MapToContainingSubject { .. } | FieldKind::MapToNearestSubject { .. } => {
          let (mapped, field) = self.map_subject(ctx, subject).await?;
          field.scalar(ctx, &mapped).await
        }
        FieldKind::GeographicAggregation { subject_type, aggregator, field } => {
          let members = ctx
            .store
            .subjects_within(subject_type.subject_type_id, subject)
            .await
            .map_err(EvalError::store)?;
          let mut values = Vec::with_capacity(members.len());
          for member in &members {
            match field.number(ctx, member).await {
              Ok(v) => values.push(v),
              Err(EvalError::Incomputable(_)) => {}
              Err(e) => return Err(e),
            }
          }
          let aggregate = aggregator.apply(&values).ok_or_else(|| {
            EvalError::incomputable(format!(
              "no {} subject within {} has a value for {}",
              subject_type.label, subject.label, field.label
            ))
          })?;
          let aggregate = finite(aggregate, || {
            format!("{aggregator} of {} over {}", field.label, subject.label)
          })?;
          Ok(Scalar::Number(aggregate))
        }
        FieldKind::Percentile { field, cohort, count, inverse } => {
          let sorted = match ctx.cache.cohort(self.id) {
            Some(sorted) => sorted,
            None => {
              let mut values = Vec::with_capacity(cohort.len());
              for member in cohort {
                match field.number(ctx, member).await {
                  Ok(v) => values.push(v),
                  Err(EvalError::Incomputable(_)) => {}
                  Err(e) => return Err(e),
                }
              }
              values.sort_by(f64::total_cmp);
              let sorted = Arc::new(values);
              ctx.cache.put_cohort(self.id, Arc::clone(&sorted));
              sorted
            }
          };
          if sorted.is_empty() {
            return Err(EvalError::incomputable(format!(
              "normalisation subjects for {} have no values",
              self.label
            )));
          }
          let value = field.number(ctx, subject).await?;
          let bounds = percentile::boundaries(&sorted, *count);
          Ok(Scalar::Number(percentile::bucket(&bounds, value, *inverse) as f64))
        }
        FieldKind::ValuesByTime { .. } | FieldKind::Wrapper { .. } | FieldKind::Modelling { .. } => {
          Err(EvalError::incomputable(format!("field {} has no single value", self.label)))
        }
      }
    })
  }

  async fn number<S: CatalogueStore>(
    &self,
    ctx: EvalContext<'_, S>,
    subject: &Subject,
  ) -> EvalResult<f64> {
    Ok(self.scalar(ctx, subject).await?.as_number()?)
  }

  /// Memoise `compute` per `(field, subject)`, incomputable outcomes
  /// included. Store errors are not cached.
  async fn cached<S>(
    &self,
    ctx: EvalContext<'_, S>,
    subject: &Subject,
    compute: impl Future<Output = EvalResult<f64>>,
  ) -> EvalResult<Scalar> {
    if let Some(hit) = ctx.cache.value(self.id, subject.subject_id) {
      return Ok(Scalar::Number(hit?));
    }
    let outcome = match compute.await {
      Ok(v) => Ok(v),
      Err(EvalError::Incomputable(e)) => Err(e),
      Err(e) => return Err(e),
    };
    ctx.cache.put_value(self.id, subject.subject_id, outcome.clone());
    Ok(Scalar::Number(outcome?))
  }

  /// The subject a mapping field re-roots evaluation on, and its inner field.
  async fn map_subject<S: CatalogueStore>(
    &self,
    ctx: EvalContext<'_, S>,
    subject: &Subject,
  ) -> EvalResult<(Subject, &Field)> {
    match &self.kind {
      FieldKind::MapToContainingSubject { subject_type, field } => {
        let mut containing = ctx
          .store
          .subjects_containing(subject_type.subject_type_id, subject)
          .await
          .map_err(EvalError::store)?;
        match containing.len() {
          1 => Ok((containing.remove(0), field)),
          n => Err(EvalError::incomputable(format!(
            "found {n} {} subjects containing {}, expected exactly one",
            subject_type.label, subject.label
          ))),
        }
      }
      FieldKind::MapToNearestSubject { subject_type, max_radius, field } => {
        let nearest = ctx
          .store
          .nearest_subject(subject_type.subject_type_id, subject, *max_radius)
          .await
          .map_err(EvalError::store)?
          .ok_or_else(|| {
            EvalError::incomputable(format!(
              "no {} subject within {max_radius} of {}",
              subject_type.label, subject.label
            ))
          })?;
        Ok((nearest, field))
      }
      _ => Err(EvalError::incomputable(format!("field {} does not map subjects", self.label))),
    }
  }
}

fn finite(value: f64, what: impl FnOnce() -> String) -> Result<f64, Incomputable> {
  if value.is_finite() {
    Ok(value)
  } else {
    Err(Incomputable::new(format!("{} is not a finite number", what())))
  }
}

fn no_value(attribute: &str, subject: &Subject) -> Incomputable {
  Incomputable::new(format!("no value for attribute {attribute} on subject {}", subject.label))
}
