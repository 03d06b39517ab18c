//! The Strata export engine.
//!
//! [`ExportEngine::run`] takes a validated [`DataExportRecipe`] through
//! imports, field resolution, subject selection and evaluation, and hands
//! the per-subject results to an [`Exporter`].

mod engine;
pub mod error;
pub mod exporter;
pub mod recipe;
pub mod validate;

pub use engine::{ExportEngine, ExportSummary};
pub use error::{Error, Result};
pub use exporter::{exporter_for, ExportedSubject, Exporter};
pub use recipe::{DataExportRecipe, Dataset, ExporterKind};
pub use validate::{validate_recipe, Violation};
