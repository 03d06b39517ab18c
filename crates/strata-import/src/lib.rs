//! Import orchestration for the Strata catalogue.
//!
//! An [`Importer`] knows how to describe and extract the datasources it
//! provides. The [`ImportRunner`] decides whether an import needs to run
//! (consulting the journal), persists the datasource metadata, and streams the
//! importer's records into the store through a [`BatchWriter`].

pub mod buffer;
pub mod error;
pub mod importer;
pub mod importers;
pub mod matcher;
pub mod registry;
pub mod runner;

pub use buffer::{BatchWriter, ImportCounts};
pub use error::{Error, Result};
pub use importer::{
  FixedValueRecord, Importer, RecordSink, Scope, SubjectRecord, TimedValueRecord,
};
pub use matcher::ImporterMatcher;
pub use registry::ImporterRegistry;
pub use runner::{ImportOutcome, ImportRunner, DEFAULT_BATCH_SIZE};
