//! Two-phase construction: [`FieldRecipe`] to [`Field`].

use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::BoxFuture;
use strata_core::{
  catalogue::{Attribute, SubjectType},
  store::CatalogueStore,
};
use tracing::debug;

use crate::{
  field::{Field, FieldId, FieldKind},
  recipe::{AttributeMatcher, FieldRecipe, SubjectTypeRef},
  subjects::resolve_subjects,
  Error, Result,
};

/// Search radius for nearest-subject mapping when the recipe gives none, in
/// coordinate units.
pub const DEFAULT_MAX_RADIUS: f64 = 0.01;

/// Resolves recipes against a store. Every field it produces gets a distinct
/// [`FieldId`], so one resolver should build all fields of an export run.
pub struct Resolver<'a, S> {
  store:   &'a S,
  next_id: AtomicUsize,
}

impl<'a, S: CatalogueStore> Resolver<'a, S> {
  pub fn new(store: &'a S) -> Self { Self { store, next_id: AtomicUsize::new(0) } }

  pub async fn resolve_all(&self, recipes: &[FieldRecipe]) -> Result<Vec<Field>> {
    let mut fields = Vec::with_capacity(recipes.len());
    for recipe in recipes {
      fields.push(self.resolve(recipe).await?);
    }
    Ok(fields)
  }

  pub fn resolve<'r>(&'r self, recipe: &'r FieldRecipe) -> BoxFuture<'r, Result<Field>>
  where
    'a: 'r,
  {
    Box::pin(async move {
      let kind = match recipe {
        FieldRecipe::LatestValue { attribute, .. } => {
          let attribute = self.attribute(attribute).await?;
          let provider_name = self.provider_name(&attribute).await?;
          FieldKind::LatestValue { attribute, provider_name }
        }
        FieldRecipe::ValuesByTime { attribute, .. } => {
          let attribute = self.attribute(attribute).await?;
          let provider_name = self.provider_name(&attribute).await?;
          FieldKind::ValuesByTime { attribute, provider_name }
        }
        FieldRecipe::FixedAnnotation { value, .. } => {
          FieldKind::FixedAnnotation { value: value.clone() }
        }
        FieldRecipe::HasFixedAttribute { attribute, values, .. } => FieldKind::HasFixedAttribute {
          attribute: self.attribute(attribute).await?,
          values:    values.clone(),
        },
        FieldRecipe::Wrapper { fields, .. } => {
          FieldKind::Wrapper { fields: self.resolve_all(fields).await? }
        }
        FieldRecipe::FieldValueSum { label, name, fields } => {
          let fields = self.resolve_all(fields).await?;
          for field in &fields {
            require_single_value(field)?;
          }
          FieldKind::FieldValueSum { name: name.clone().unwrap_or_else(|| label.clone()), fields }
        }
        FieldRecipe::Arithmetic { operation, field1, field2, .. } => {
          let left = self.single_value(field1).await?;
          let right = self.single_value(field2).await?;
          FieldKind::Arithmetic {
            operation: *operation,
            left:      Box::new(left),
            right:     Box::new(right),
          }
        }
        FieldRecipe::MapToContainingSubject { subject, field, .. } => {
          FieldKind::MapToContainingSubject {
            subject_type: self.subject_type(subject).await?,
            field:        Box::new(self.resolve(field).await?),
          }
        }
        FieldRecipe::MapToNearestSubject { label, subject, max_radius, field } => {
          let max_radius = max_radius.unwrap_or(DEFAULT_MAX_RADIUS);
          if !max_radius.is_finite() || max_radius <= 0.0 {
            return Err(Error::InvalidField {
              label:  label.clone(),
              reason: format!("maxRadius must be a positive number, got {max_radius}"),
            });
          }
          FieldKind::MapToNearestSubject {
            subject_type: self.subject_type(subject).await?,
            max_radius,
            field: Box::new(self.resolve(field).await?),
          }
        }
        FieldRecipe::GeographicAggregation { subject, aggregator, field, .. } => {
          FieldKind::GeographicAggregation {
            subject_type: self.subject_type(subject).await?,
            aggregator:   *aggregator,
            field:        Box::new(self.single_value(field).await?),
          }
        }
        FieldRecipe::Percentile {
          label,
          field,
          normalization_subjects,
          percentile_count,
          inverse,
        } => {
          if *percentile_count == 0 {
            return Err(Error::InvalidField {
              label:  label.clone(),
              reason: "percentileCount must be at least 1".into(),
            });
          }
          let field = self.single_value(field).await?;
          let cohort = resolve_subjects(self.store, normalization_subjects).await?;
          debug!(field = %label, cohort = cohort.len(), "resolved percentile cohort");
          FieldKind::Percentile {
            field: Box::new(field),
            cohort,
            count: *percentile_count,
            inverse: *inverse,
          }
        }
        FieldRecipe::Modelling { fields, .. } => {
          FieldKind::Modelling { fields: self.resolve_all(fields).await? }
        }
      };
      Ok(Field { id: self.next_id(), label: recipe.label().to_owned(), kind })
    })
  }

  fn next_id(&self) -> FieldId { FieldId(self.next_id.fetch_add(1, Ordering::Relaxed)) }

  async fn single_value(&self, recipe: &FieldRecipe) -> Result<Field> {
    let field = self.resolve(recipe).await?;
    require_single_value(&field)?;
    Ok(field)
  }

  async fn attribute(&self, matcher: &AttributeMatcher) -> Result<Attribute> {
    self
      .store
      .get_attribute(matcher.provider.clone(), matcher.label.clone())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::UnknownAttribute {
        provider: matcher.provider.clone(),
        label:    matcher.label.clone(),
      })
  }

  /// Display name of the attribute's provider, falling back to its label.
  async fn provider_name(&self, attribute: &Attribute) -> Result<String> {
    let provider = self
      .store
      .get_provider(attribute.provider.clone())
      .await
      .map_err(Error::store)?;
    Ok(provider.map_or_else(|| attribute.provider.clone(), |p| p.name))
  }

  async fn subject_type(&self, reference: &SubjectTypeRef) -> Result<SubjectType> {
    self
      .store
      .get_subject_type(reference.provider.clone(), reference.subject_type.clone())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::UnknownSubjectType {
        provider: reference.provider.clone(),
        label:    reference.subject_type.clone(),
      })
  }
}

fn require_single_value(field: &Field) -> Result<()> {
  if field.is_single_value() {
    Ok(())
  } else {
    Err(Error::NotSingleValue { label: field.label.clone() })
  }
}
