//! The [`Importer`] and [`RecordSink`] traits.
//!
//! Importers never touch the store directly. They describe their datasources
//! and push label-keyed records into a sink; the runner owns persistence.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDateTime};
use strata_core::{catalogue::Provider, datasource::Datasource, geometry::Geometry};

use crate::Result;

// ─── Records ─────────────────────────────────────────────────────────────────

/// A subject discovered by an importer.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectRecord {
  /// Label of one of the datasource's subject types.
  pub subject_type: String,
  pub label:        String,
  pub name:         String,
  pub geometry:     Option<Geometry>,
}

/// A timed value keyed by subject and attribute labels.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedValueRecord {
  pub subject_label:   String,
  pub attribute_label: String,
  pub timestamp:       NaiveDateTime,
  pub value:           f64,
}

/// A fixed value keyed by subject and attribute labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedValueRecord {
  pub subject_label:   String,
  pub attribute_label: String,
  pub value:           String,
}

// ─── Scope ───────────────────────────────────────────────────────────────────

/// The geography and time restrictions of one import request.
///
/// `None` and an empty list both mean "unrestricted".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
  pub geography: Option<Vec<String>>,
  pub temporal:  Option<Vec<String>>,
}

impl Scope {
  /// Whether a subject label falls inside the geography scope.
  pub fn includes_subject(&self, label: &str) -> bool {
    match &self.geography {
      Some(labels) if !labels.is_empty() => labels.iter().any(|l| l == label),
      _ => true,
    }
  }

  /// Whether a timestamp falls inside the temporal scope, which lists years.
  pub fn includes_time(&self, timestamp: NaiveDateTime) -> bool {
    match &self.temporal {
      Some(years) if !years.is_empty() => {
        let year = timestamp.year().to_string();
        years.iter().any(|y| *y == year)
      }
      _ => true,
    }
  }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Receives the records an importer extracts.
#[async_trait]
pub trait RecordSink: Send {
  async fn subject(&mut self, record: SubjectRecord) -> Result<()>;

  async fn timed_value(&mut self, record: TimedValueRecord) -> Result<()>;

  async fn fixed_value(&mut self, record: FixedValueRecord) -> Result<()>;
}

/// A source of one or more datasources.
#[async_trait]
pub trait Importer: Send + Sync {
  /// Registered name, used in recipes as `importerClass`.
  fn name(&self) -> &str;

  fn provider(&self) -> Provider;

  fn datasource_ids(&self) -> Vec<String>;

  fn datasource_exists(&self, id: &str) -> bool {
    self.datasource_ids().iter().any(|d| d == id)
  }

  /// Metadata for `id`: name, description, subject types and attributes.
  async fn datasource(&self, id: &str) -> Result<Datasource>;

  /// Extract the records of `datasource` that fall inside `scope`.
  ///
  /// Malformed individual records are logged and skipped; only file-level
  /// failures are returned as errors.
  async fn import(
    &self,
    datasource: &Datasource,
    scope: &Scope,
    sink: &mut dyn RecordSink,
  ) -> Result<()>;
}
