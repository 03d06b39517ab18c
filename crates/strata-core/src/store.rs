//! The `CatalogueStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `strata-store-sqlite`).
//! The import runner, the field engine and the export engine depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  catalogue::{Attribute, NewAttribute, NewSubjectType, Provider, SubjectType},
  journal::JournalEntry,
  subject::{NewSubject, Subject},
  value::{FixedValue, SaveReport, TimedValue},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`CatalogueStore::list_subjects`].
///
/// Patterns use SQL `LIKE` syntax (`%` and `_` wildcards).
#[derive(Debug, Clone, Default)]
pub struct SubjectQuery {
  pub subject_type_id: Option<Uuid>,
  pub label_pattern:   Option<String>,
  pub name_pattern:    Option<String>,
  pub limit:           Option<usize>,
}

impl SubjectQuery {
  pub fn of_type(subject_type_id: Uuid) -> Self {
    Self { subject_type_id: Some(subject_type_id), ..Self::default() }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Strata catalogue backend.
///
/// Metadata writes are upserts keyed on natural keys; identities never change
/// once minted. Journal entries are only ever removed by [`clear_all`].
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded async runtimes.
///
/// [`clear_all`]: CatalogueStore::clear_all
pub trait CatalogueStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Providers ─────────────────────────────────────────────────────────

  /// Insert the provider, or update its name if the label exists.
  fn upsert_provider(
    &self,
    provider: Provider,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_provider(
    &self,
    label: String,
  ) -> impl Future<Output = Result<Option<Provider>, Self::Error>> + Send + '_;

  // ── Subject types ─────────────────────────────────────────────────────

  /// Insert or update a subject type keyed on `(provider, label)`. The
  /// provider must already exist.
  fn upsert_subject_type(
    &self,
    input: NewSubjectType,
  ) -> impl Future<Output = Result<SubjectType, Self::Error>> + Send + '_;

  fn get_subject_type(
    &self,
    provider: String,
    label: String,
  ) -> impl Future<Output = Result<Option<SubjectType>, Self::Error>> + Send + '_;

  // ── Attributes ────────────────────────────────────────────────────────

  /// Insert or update attributes keyed on `(provider, label)`.
  ///
  /// Existing rows keep their `attribute_id`; only the descriptive fields are
  /// overwritten. Returns the persisted attributes in input order.
  fn upsert_attributes(
    &self,
    input: Vec<NewAttribute>,
  ) -> impl Future<Output = Result<Vec<Attribute>, Self::Error>> + Send + '_;

  fn get_attribute(
    &self,
    provider: String,
    label: String,
  ) -> impl Future<Output = Result<Option<Attribute>, Self::Error>> + Send + '_;

  fn list_attributes(
    &self,
    provider: String,
  ) -> impl Future<Output = Result<Vec<Attribute>, Self::Error>> + Send + '_;

  // ── Subjects ──────────────────────────────────────────────────────────

  /// Insert or update subjects keyed on `(subject_type_id, label)`.
  fn save_subjects(
    &self,
    input: Vec<NewSubject>,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  fn get_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// All subjects with the given label, across subject types.
  fn subjects_by_label(
    &self,
    label: String,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  /// Subjects matching `query`, ordered by label.
  fn list_subjects<'a>(
    &'a self,
    query: &'a SubjectQuery,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + 'a;

  /// Subjects of `subject_type_id` whose geometry contains `subject`.
  /// Empty when `subject` has no geometry.
  fn subjects_containing<'a>(
    &'a self,
    subject_type_id: Uuid,
    subject: &'a Subject,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + 'a;

  /// Subjects of `subject_type_id` whose geometry lies within `subject`.
  fn subjects_within<'a>(
    &'a self,
    subject_type_id: Uuid,
    subject: &'a Subject,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + 'a;

  /// The closest subject of `subject_type_id` no further than `max_radius`
  /// from `subject`. Ties resolve to the lowest label.
  fn nearest_subject<'a>(
    &'a self,
    subject_type_id: Uuid,
    subject: &'a Subject,
    max_radius: f64,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + 'a;

  // ── Values ────────────────────────────────────────────────────────────

  /// Write a batch of timed values.
  ///
  /// A key repeated within the batch is skipped (first occurrence wins); a key
  /// already in the store is overwritten. A record that fails to write is
  /// skipped without aborting the rest of the batch.
  fn save_timed_values(
    &self,
    values: Vec<TimedValue>,
  ) -> impl Future<Output = Result<SaveReport, Self::Error>> + Send + '_;

  /// All timed values for the pair, ascending by timestamp.
  fn timed_values(
    &self,
    subject_id: Uuid,
    attribute_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TimedValue>, Self::Error>> + Send + '_;

  /// The timed value with the greatest timestamp for the pair.
  fn latest_timed_value(
    &self,
    subject_id: Uuid,
    attribute_id: Uuid,
  ) -> impl Future<Output = Result<Option<TimedValue>, Self::Error>> + Send + '_;

  /// Write a batch of fixed values; exact duplicates are skipped.
  fn save_fixed_values(
    &self,
    values: Vec<FixedValue>,
  ) -> impl Future<Output = Result<SaveReport, Self::Error>> + Send + '_;

  fn fixed_values(
    &self,
    subject_id: Uuid,
    attribute_id: Uuid,
  ) -> impl Future<Output = Result<Vec<FixedValue>, Self::Error>> + Send + '_;

  // ── Journal ───────────────────────────────────────────────────────────

  fn journal_has_entry<'a>(
    &'a self,
    entry: &'a JournalEntry,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Record a completed import. Adding an existing entry is a no-op.
  fn add_journal_entry<'a>(
    &'a self,
    entry: &'a JournalEntry,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Maintenance ───────────────────────────────────────────────────────

  /// Remove every row, journal included.
  fn clear_all(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
