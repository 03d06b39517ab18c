//! Output formats.

mod csv_table;
mod geojson;

use std::io::Write;

use serde_json::{Map, Value};
use strata_core::{geometry::Geometry, subject::Subject};

pub use self::{csv_table::CsvExporter, geojson::GeoJsonExporter};
use crate::{recipe::ExporterKind, Result};

/// One subject and the values of the fields that could be computed for it,
/// keyed by field label in recipe order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedSubject {
  pub label:    String,
  pub name:     String,
  pub geometry: Option<Geometry>,
  pub fields:   Map<String, Value>,
}

impl ExportedSubject {
  pub fn new(subject: &Subject, fields: Map<String, Value>) -> Self {
    Self {
      label: subject.label.clone(),
      name: subject.name.clone(),
      geometry: subject.geometry.clone(),
      fields,
    }
  }
}

/// Frames evaluated subjects into an output format.
pub trait Exporter {
  fn write(&self, out: &mut dyn Write, subjects: &[ExportedSubject]) -> Result<()>;
}

pub fn exporter_for(kind: ExporterKind) -> Box<dyn Exporter> {
  match kind {
    ExporterKind::Geojson => Box::new(GeoJsonExporter),
    ExporterKind::Csv => Box::new(CsvExporter),
  }
}
