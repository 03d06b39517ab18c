//! [`BatchWriter`]: buffers importer records and writes them in batches.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use strata_core::{
  catalogue::{Attribute, DataKind},
  store::CatalogueStore,
  subject::NewSubject,
  value::{FixedValue, TimedValue},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  importer::{FixedValueRecord, RecordSink, SubjectRecord, TimedValueRecord},
  Error, Result,
};

/// What one import run wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
  pub subjects:     usize,
  pub timed_values: usize,
  pub fixed_values: usize,
  /// Records that were dropped: unresolvable labels, duplicate keys, bad
  /// references.
  pub skipped:      usize,
}

/// A [`RecordSink`] that resolves labels and flushes to a [`CatalogueStore`]
/// whenever a buffer reaches `batch_size`.
///
/// Values are buffered by label and only resolved at flush time, after any
/// pending subjects have been written, so an importer may emit a subject and
/// its values in one pass.
pub struct BatchWriter<'s, S> {
  store:         &'s S,
  batch_size:    usize,
  subject_types: HashMap<String, Uuid>,
  attributes:    HashMap<String, Attribute>,
  /// Subject label to id; `None` marks labels already reported unresolvable.
  subject_ids:   HashMap<String, Option<Uuid>>,
  subjects:      Vec<NewSubject>,
  timed:         Vec<TimedValueRecord>,
  fixed:         Vec<FixedValueRecord>,
  counts:        ImportCounts,
}

impl<'s, S: CatalogueStore> BatchWriter<'s, S> {
  /// `subject_types` and `attributes` map the datasource's labels to the
  /// persisted identities.
  pub fn new(
    store: &'s S,
    batch_size: usize,
    subject_types: HashMap<String, Uuid>,
    attributes: impl IntoIterator<Item = Attribute>,
  ) -> Self {
    Self {
      store,
      batch_size: batch_size.max(1),
      subject_types,
      attributes: attributes.into_iter().map(|a| (a.label.clone(), a)).collect(),
      subject_ids: HashMap::new(),
      subjects: Vec::new(),
      timed: Vec::new(),
      fixed: Vec::new(),
      counts: ImportCounts::default(),
    }
  }

  /// Flush every buffer and return the final counts.
  pub async fn finish(mut self) -> Result<ImportCounts> {
    self.flush_timed().await?;
    self.flush_fixed().await?;
    Ok(self.counts)
  }

  async fn flush_subjects(&mut self) -> Result<()> {
    if self.subjects.is_empty() {
      return Ok(());
    }
    let batch = std::mem::take(&mut self.subjects);
    debug!(count = batch.len(), "flushing subjects");
    let saved = self.store.save_subjects(batch).await.map_err(Error::store)?;
    self.counts.subjects += saved.len();
    for subject in saved {
      match self.subject_ids.get(&subject.label).copied() {
        None => {
          self.subject_ids.insert(subject.label, Some(subject.subject_id));
        }
        Some(Some(id)) if id == subject.subject_id => {}
        // Another subject shares the label, or it was unresolvable before
        // this flush; the next lookup goes to the store.
        Some(_) => {
          self.subject_ids.remove(&subject.label);
        }
      }
    }
    Ok(())
  }

  async fn flush_timed(&mut self) -> Result<()> {
    self.flush_subjects().await?;
    if self.timed.is_empty() {
      return Ok(());
    }
    let batch = std::mem::take(&mut self.timed);
    let mut values = Vec::with_capacity(batch.len());
    for record in batch {
      let Some(attribute_id) =
        self.attribute_id(&record.attribute_label, DataKind::Numeric)
      else {
        self.counts.skipped += 1;
        continue;
      };
      let Some(subject_id) = self.subject_id(&record.subject_label).await? else {
        self.counts.skipped += 1;
        continue;
      };
      values.push(TimedValue {
        subject_id,
        attribute_id,
        timestamp: record.timestamp,
        value: record.value,
      });
    }
    debug!(count = values.len(), "flushing timed values");
    let report = self.store.save_timed_values(values).await.map_err(Error::store)?;
    self.counts.timed_values += report.saved;
    self.counts.skipped += report.skipped;
    Ok(())
  }

  async fn flush_fixed(&mut self) -> Result<()> {
    self.flush_subjects().await?;
    if self.fixed.is_empty() {
      return Ok(());
    }
    let batch = std::mem::take(&mut self.fixed);
    let mut values = Vec::with_capacity(batch.len());
    for record in batch {
      let Some(attribute_id) =
        self.attribute_id(&record.attribute_label, DataKind::String)
      else {
        self.counts.skipped += 1;
        continue;
      };
      let Some(subject_id) = self.subject_id(&record.subject_label).await? else {
        self.counts.skipped += 1;
        continue;
      };
      values.push(FixedValue { subject_id, attribute_id, value: record.value });
    }
    debug!(count = values.len(), "flushing fixed values");
    let report = self.store.save_fixed_values(values).await.map_err(Error::store)?;
    self.counts.fixed_values += report.saved;
    self.counts.skipped += report.skipped;
    Ok(())
  }

  fn attribute_id(&self, label: &str, kind: DataKind) -> Option<Uuid> {
    match self.attributes.get(label) {
      Some(attribute) if attribute.kind == kind => Some(attribute.attribute_id),
      Some(attribute) => {
        warn!(
          attribute = label,
          expected = %kind,
          actual = %attribute.kind,
          "attribute kind mismatch, skipping value"
        );
        None
      }
      None => {
        warn!(attribute = label, "attribute not declared by datasource, skipping value");
        None
      }
    }
  }

  async fn subject_id(&mut self, label: &str) -> Result<Option<Uuid>> {
    if let Some(id) = self.subject_ids.get(label) {
      return Ok(*id);
    }
    let matches = self
      .store
      .subjects_by_label(label.to_owned())
      .await
      .map_err(Error::store)?;
    let id = match matches.as_slice() {
      [only] => Some(only.subject_id),
      [] => {
        warn!(subject = label, "unknown subject label, skipping values");
        None
      }
      _ => {
        warn!(
          subject = label,
          count = matches.len(),
          "ambiguous subject label, skipping values"
        );
        None
      }
    };
    self.subject_ids.insert(label.to_owned(), id);
    Ok(id)
  }
}

#[async_trait]
impl<S: CatalogueStore> RecordSink for BatchWriter<'_, S> {
  async fn subject(&mut self, record: SubjectRecord) -> Result<()> {
    let Some(&subject_type_id) = self.subject_types.get(&record.subject_type) else {
      warn!(
        subject = %record.label,
        subject_type = %record.subject_type,
        "subject type not declared by datasource, skipping subject"
      );
      self.counts.skipped += 1;
      return Ok(());
    };
    if let Some(Err(e)) = record.geometry.as_ref().map(|g| g.validate()) {
      warn!(subject = %record.label, error = %e, "invalid geometry, skipping subject");
      self.counts.skipped += 1;
      return Ok(());
    }
    self.subjects.push(NewSubject {
      subject_type_id,
      label: record.label,
      name: record.name,
      geometry: record.geometry,
    });
    if self.subjects.len() >= self.batch_size {
      self.flush_subjects().await?;
    }
    Ok(())
  }

  async fn timed_value(&mut self, record: TimedValueRecord) -> Result<()> {
    self.timed.push(record);
    if self.timed.len() >= self.batch_size {
      self.flush_timed().await?;
    }
    Ok(())
  }

  async fn fixed_value(&mut self, record: FixedValueRecord) -> Result<()> {
    self.fixed.push(record);
    if self.fixed.len() >= self.batch_size {
      self.flush_fixed().await?;
    }
    Ok(())
  }
}
