//! Subject selection: [`SubjectRecipe`] and its resolution against a store.

use std::collections::HashSet;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use strata_core::{
  store::{CatalogueStore, SubjectQuery},
  subject::Subject,
};

use crate::{Error, Result};

/// Selects subjects of one type, optionally filtered by a `LIKE` pattern
/// over label or name and by geographic relation to other selections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecipe {
  pub provider:       String,
  pub subject_type:   String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub match_rule:     Option<MatchRule>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub geo_match_rule: Option<GeoMatchRule>,
}

impl SubjectRecipe {
  pub fn new(provider: impl Into<String>, subject_type: impl Into<String>) -> Self {
    Self {
      provider:       provider.into(),
      subject_type:   subject_type.into(),
      match_rule:     None,
      geo_match_rule: None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchAttribute {
  Label,
  Name,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
  pub attribute: MatchAttribute,
  /// SQL `LIKE` pattern.
  pub pattern:   String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoRelation {
  Within,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoMatchRule {
  pub geo_relation: GeoRelation,
  pub subjects:     Vec<SubjectRecipe>,
}

/// Resolve every recipe and concatenate the results, dropping repeats.
/// Subjects keep the order of the recipes and, within one recipe, label
/// order.
pub fn resolve_subjects<'a, S: CatalogueStore>(
  store: &'a S,
  recipes: &'a [SubjectRecipe],
) -> BoxFuture<'a, Result<Vec<Subject>>> {
  Box::pin(async move {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for recipe in recipes {
      for subject in resolve_one(store, recipe).await? {
        if seen.insert(subject.subject_id) {
          out.push(subject);
        }
      }
    }
    Ok(out)
  })
}

async fn resolve_one<S: CatalogueStore>(
  store: &S,
  recipe: &SubjectRecipe,
) -> Result<Vec<Subject>> {
  let subject_type = store
    .get_subject_type(recipe.provider.clone(), recipe.subject_type.clone())
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::UnknownSubjectType {
      provider: recipe.provider.clone(),
      label:    recipe.subject_type.clone(),
    })?;

  let mut query = SubjectQuery::of_type(subject_type.subject_type_id);
  match &recipe.match_rule {
    Some(MatchRule { attribute: MatchAttribute::Label, pattern }) => {
      query.label_pattern = Some(pattern.clone());
    }
    Some(MatchRule { attribute: MatchAttribute::Name, pattern }) => {
      query.name_pattern = Some(pattern.clone());
    }
    None => {}
  }
  let subjects = store.list_subjects(&query).await.map_err(Error::store)?;

  let Some(rule) = &recipe.geo_match_rule else {
    return Ok(subjects);
  };
  let parents = resolve_subjects(store, &rule.subjects).await?;
  let parent_geometries: Vec<_> = parents.iter().filter_map(|p| p.geometry.as_ref()).collect();
  Ok(
    subjects
      .into_iter()
      .filter(|s| match (&rule.geo_relation, &s.geometry) {
        (GeoRelation::Within, Some(g)) => parent_geometries.iter().any(|p| p.contains(g)),
        (GeoRelation::Within, None) => false,
      })
      .collect(),
  )
}
