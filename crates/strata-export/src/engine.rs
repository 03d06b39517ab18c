//! [`ExportEngine`]: imports, field resolution, evaluation and output.

use std::io::Write;

use serde::Serialize;
use serde_json::Map;
use strata_core::store::CatalogueStore;
use strata_field::{resolve_subjects, EvalContext, EvalError, FieldCache, Resolver};
use strata_import::{
  ImportOutcome, ImportRunner, ImporterMatcher, ImporterRegistry, DEFAULT_BATCH_SIZE,
};
use tracing::{info, instrument, warn};

use crate::{
  exporter::{exporter_for, ExportedSubject},
  recipe::DataExportRecipe,
  Result,
};

/// What one export run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
  /// Imports that ran, as opposed to being skipped by the journal.
  pub imported:     usize,
  pub skipped:      usize,
  pub subjects:     usize,
  /// Top-level `(subject, field)` pairs left out of the output.
  pub incomputable: usize,
}

impl ExportSummary {
  fn record(&mut self, outcomes: &[ImportOutcome]) {
    for outcome in outcomes {
      match outcome {
        ImportOutcome::Imported(_) => self.imported += 1,
        ImportOutcome::Skipped => self.skipped += 1,
      }
    }
  }
}

pub struct ExportEngine<'a, S> {
  store:      &'a S,
  registry:   &'a ImporterRegistry,
  batch_size: usize,
}

impl<'a, S: CatalogueStore> ExportEngine<'a, S> {
  pub fn new(store: &'a S, registry: &'a ImporterRegistry) -> Self {
    Self { store, registry, batch_size: DEFAULT_BATCH_SIZE }
  }

  pub fn with_batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size;
    self
  }

  /// Run the recipe and write the export to `out`.
  ///
  /// Every import, field and subject selection is settled before evaluation
  /// starts, so configuration errors surface before anything is written.
  #[instrument(skip_all, fields(exporter = %recipe.exporter))]
  pub async fn run(
    &self,
    recipe: &DataExportRecipe,
    force: &ImporterMatcher,
    out: &mut dyn Write,
  ) -> Result<ExportSummary> {
    let dataset = &recipe.dataset;
    let mut summary = ExportSummary::default();
    let runner = ImportRunner::new(self.store, self.registry).with_batch_size(self.batch_size);

    summary.record(&runner.import_all(&dataset.datasources, force).await?);
    for field in &dataset.fields {
      let datasources = field.datasources();
      if !datasources.is_empty() {
        info!(field = field.label(), count = datasources.len(), "importing field datasources");
        summary.record(&runner.import_all(&datasources, force).await?);
      }
    }

    let fields = Resolver::new(self.store).resolve_all(&dataset.fields).await?;
    let subjects = resolve_subjects(self.store, &dataset.subjects).await?;
    info!(subjects = subjects.len(), fields = fields.len(), "exporting");

    let cache = FieldCache::new();
    let ctx = EvalContext::new(self.store, &cache);
    let mut exported = Vec::with_capacity(subjects.len());
    for subject in &subjects {
      let mut values = Map::new();
      for field in &fields {
        match field.json_value(ctx, subject).await {
          Ok(value) => {
            values.insert(field.label.clone(), value);
          }
          Err(EvalError::Incomputable(e)) => {
            warn!(
              field = %field.label,
              subject = %subject.label,
              reason = %e,
              "could not compute field for subject, omitting"
            );
            summary.incomputable += 1;
          }
          Err(e) => return Err(e.into()),
        }
      }
      exported.push(ExportedSubject::new(subject, values));
    }
    summary.subjects = exported.len();

    exporter_for(recipe.exporter).write(out, &exported)?;
    info!(
      subjects = summary.subjects,
      incomputable = summary.incomputable,
      "export complete"
    );
    Ok(summary)
  }
}
