//! [`ImportRunner`]: journal-aware execution of datasource imports.

use std::{collections::HashMap, path::Path};

use strata_core::{
  datasource::{Datasource, DatasourceRecipe},
  journal::JournalEntry,
  store::CatalogueStore,
};
use tracing::{info, instrument};

use crate::{
  buffer::{BatchWriter, ImportCounts},
  importer::{Importer, Scope},
  matcher::ImporterMatcher,
  registry::ImporterRegistry,
  Error, Result,
};

/// Buffer size at which the batch writer flushes.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// The result of one import request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
  /// A journal entry already existed and the import was not forced.
  Skipped,
  Imported(ImportCounts),
}

/// Runs imports against a store.
pub struct ImportRunner<'a, S> {
  store:      &'a S,
  registry:   &'a ImporterRegistry,
  batch_size: usize,
}

impl<'a, S: CatalogueStore> ImportRunner<'a, S> {
  pub fn new(store: &'a S, registry: &'a ImporterRegistry) -> Self {
    Self { store, registry, batch_size: DEFAULT_BATCH_SIZE }
  }

  pub fn with_batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size;
    self
  }

  /// Import every recipe in order, forcing those selected by `force`.
  pub async fn import_all(
    &self,
    recipes: &[DatasourceRecipe],
    force: &ImporterMatcher,
  ) -> Result<Vec<ImportOutcome>> {
    let mut outcomes = Vec::with_capacity(recipes.len());
    for recipe in recipes {
      let forced = force.matches(&recipe.importer_class, &recipe.datasource_id);
      outcomes.push(self.import(recipe, forced).await?);
    }
    Ok(outcomes)
  }

  /// Resolve the recipe's importer through the registry and import.
  pub async fn import(&self, recipe: &DatasourceRecipe, force: bool) -> Result<ImportOutcome> {
    let importer = self
      .registry
      .create(&recipe.importer_class, recipe.configuration_file.as_deref().map(Path::new))?;
    self.import_with(importer.as_ref(), recipe, force).await
  }

  /// Import `recipe.datasource_id` using an already-built importer.
  ///
  /// No journal entry is written unless every step succeeds, so a failed
  /// import can be retried.
  #[instrument(
    skip_all,
    fields(importer = importer.name(), datasource = %recipe.datasource_id)
  )]
  pub async fn import_with(
    &self,
    importer: &dyn Importer,
    recipe: &DatasourceRecipe,
    force: bool,
  ) -> Result<ImportOutcome> {
    if !importer.datasource_exists(&recipe.datasource_id) {
      return Err(Error::UnknownDatasource {
        importer:   importer.name().to_owned(),
        datasource: recipe.datasource_id.clone(),
      });
    }

    let entry = JournalEntry::for_datasource(
      importer.name(),
      &recipe.datasource_id,
      recipe.geography_scope.as_deref(),
      recipe.temporal_scope.as_deref(),
    );
    if !force && self.store.journal_has_entry(&entry).await.map_err(Error::store)? {
      info!("datasource already imported, skipping");
      return Ok(ImportOutcome::Skipped);
    }

    info!(force, "importing datasource");
    let datasource = importer.datasource(&recipe.datasource_id).await?;
    let mut writer = self.prepare(&datasource).await?;

    let scope = Scope {
      geography: recipe.geography_scope.clone(),
      temporal:  recipe.temporal_scope.clone(),
    };
    importer.import(&datasource, &scope, &mut writer).await?;
    let counts = writer.finish().await?;

    self.store.add_journal_entry(&entry).await.map_err(Error::store)?;
    info!(
      subjects = counts.subjects,
      timed_values = counts.timed_values,
      fixed_values = counts.fixed_values,
      skipped = counts.skipped,
      "import complete"
    );
    Ok(ImportOutcome::Imported(counts))
  }

  /// Persist provider, subject types and attributes, and build a writer that
  /// knows their identities.
  async fn prepare(&self, datasource: &Datasource) -> Result<BatchWriter<'a, S>> {
    self
      .store
      .upsert_provider(datasource.provider.clone())
      .await
      .map_err(Error::store)?;

    let mut subject_types = HashMap::with_capacity(datasource.subject_types.len());
    for subject_type in &datasource.subject_types {
      let saved = self
        .store
        .upsert_subject_type(subject_type.clone())
        .await
        .map_err(Error::store)?;
      subject_types.insert(saved.label, saved.subject_type_id);
    }

    let attributes = self
      .store
      .upsert_attributes(datasource.attributes.clone())
      .await
      .map_err(Error::store)?;

    Ok(BatchWriter::new(self.store, self.batch_size, subject_types, attributes))
  }
}
