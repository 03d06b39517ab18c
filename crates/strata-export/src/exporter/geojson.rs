use std::io::Write;

use serde_json::{json, Map, Value};

use super::{ExportedSubject, Exporter};
use crate::Result;

/// A GeoJSON `FeatureCollection` with one feature per subject.
///
/// Properties hold `label`, `name` and then every field value. Subjects
/// without geometry get `"geometry": null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonExporter;

impl Exporter for GeoJsonExporter {
  fn write(&self, out: &mut dyn Write, subjects: &[ExportedSubject]) -> Result<()> {
    let features = subjects
      .iter()
      .map(|subject| -> Result<Value> {
        let mut properties = Map::new();
        properties.insert("label".into(), Value::String(subject.label.clone()));
        properties.insert("name".into(), Value::String(subject.name.clone()));
        properties.extend(subject.fields.clone());
        Ok(json!({
          "type": "Feature",
          "geometry": serde_json::to_value(&subject.geometry)?,
          "properties": properties,
        }))
      })
      .collect::<Result<Vec<_>>>()?;

    serde_json::to_writer(&mut *out, &json!({ "type": "FeatureCollection", "features": features }))?;
    out.flush()?;
    Ok(())
  }
}
