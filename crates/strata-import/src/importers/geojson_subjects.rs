//! `geojson-subjects`: subjects and their categorical properties from a GeoJSON
//! `FeatureCollection`.
//!
//! ```toml
//! [provider]
//! label = "uk.gov.ons"
//! name  = "Office for National Statistics"
//!
//! [datasources.lsoa]
//! name           = "Lower super output areas"
//! file           = "lsoa.geojson"
//! subject_type   = { label = "lsoa", name = "LSOA" }
//! label_property = "LSOA11CD"
//! name_property  = "LSOA11NM"
//!
//! [[datasources.lsoa.attributes]]
//! label    = "local_authority"
//! name     = "Local authority"
//! property = "LAD11NM"
//! ```

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use strata_core::{
  catalogue::{NewAttribute, NewSubjectType, Provider},
  datasource::Datasource,
  geometry::Geometry,
};
use tracing::{debug, warn};

use super::{load_config, resolve, ProviderConfig};
use crate::{
  importer::{FixedValueRecord, Importer, RecordSink, Scope, SubjectRecord},
  Error, Result,
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct GeoJsonConfig {
  provider:    ProviderConfig,
  #[serde(default)]
  datasources: BTreeMap<String, GeoJsonDatasourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeoJsonDatasourceConfig {
  name:           String,
  #[serde(default)]
  description:    String,
  file:           PathBuf,
  subject_type:   SubjectTypeConfig,
  label_property: String,
  /// Falls back to the label when absent.
  name_property:  Option<String>,
  #[serde(default)]
  attributes:     Vec<PropertyAttributeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct SubjectTypeConfig {
  label: String,
  name:  String,
}

#[derive(Debug, Clone, Deserialize)]
struct PropertyAttributeConfig {
  label:       String,
  name:        String,
  #[serde(default)]
  description: String,
  property:    String,
}

// ─── GeoJSON input ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FeatureCollection {
  features: Vec<Feature>,
}

/// Geometry is kept raw so one unsupported shape does not sink the file.
#[derive(Debug, Deserialize)]
struct Feature {
  #[serde(default)]
  geometry:   Value,
  #[serde(default)]
  properties: Map<String, Value>,
}

/// Property values as text; numbers and booleans are stringified.
fn property(properties: &Map<String, Value>, key: &str) -> Option<String> {
  match properties.get(key)? {
    Value::String(s) => Some(s.trim().to_owned()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
  .filter(|s| !s.is_empty())
}

// ─── Importer ────────────────────────────────────────────────────────────────

pub struct GeoJsonSubjectsImporter {
  provider:    Provider,
  base:        PathBuf,
  datasources: BTreeMap<String, GeoJsonDatasourceConfig>,
}

impl GeoJsonSubjectsImporter {
  pub const NAME: &'static str = "geojson-subjects";

  pub fn from_config_file(path: Option<&Path>) -> Result<Self> {
    let (config, base): (GeoJsonConfig, _) = load_config(Self::NAME, path)?;
    Ok(Self { provider: config.provider.into(), base, datasources: config.datasources })
  }

  fn config(&self, id: &str) -> Result<&GeoJsonDatasourceConfig> {
    self.datasources.get(id).ok_or_else(|| Error::UnknownDatasource {
      importer:   Self::NAME.to_owned(),
      datasource: id.to_owned(),
    })
  }
}

#[async_trait]
impl Importer for GeoJsonSubjectsImporter {
  fn name(&self) -> &str { Self::NAME }

  fn provider(&self) -> Provider { self.provider.clone() }

  fn datasource_ids(&self) -> Vec<String> { self.datasources.keys().cloned().collect() }

  async fn datasource(&self, id: &str) -> Result<Datasource> {
    let config = self.config(id)?;
    let provider = &self.provider.label;
    let mut datasource =
      Datasource::new(id, &config.name, &config.description, self.provider.clone());
    datasource.url = Some(resolve(&self.base, &config.file).display().to_string());
    datasource.subject_types.push(NewSubjectType::new(
      provider,
      &config.subject_type.label,
      &config.subject_type.name,
    ));
    datasource.attributes = config
      .attributes
      .iter()
      .map(|a| {
        NewAttribute::string(provider, &a.label, &a.name).with_description(&a.description)
      })
      .collect();
    Ok(datasource)
  }

  async fn import(
    &self,
    datasource: &Datasource,
    scope: &Scope,
    sink: &mut dyn RecordSink,
  ) -> Result<()> {
    let config = self.config(&datasource.id)?;
    let file = resolve(&self.base, &config.file);
    let bytes = std::fs::read(&file)?;
    let collection: FeatureCollection = serde_json::from_slice(&bytes)?;

    let mut subjects = 0usize;
    for (index, feature) in collection.features.into_iter().enumerate() {
      let Some(label) = property(&feature.properties, &config.label_property) else {
        warn!(index, property = %config.label_property, "feature has no label, skipping");
        continue;
      };
      if !scope.includes_subject(&label) {
        continue;
      }
      let geometry = match feature.geometry {
        Value::Null => None,
        raw => match serde_json::from_value::<Geometry>(raw) {
          Ok(geometry) => Some(geometry),
          Err(e) => {
            warn!(subject = %label, error = %e, "unsupported geometry, skipping feature");
            continue;
          }
        },
      };
      let name = config
        .name_property
        .as_deref()
        .and_then(|key| property(&feature.properties, key))
        .unwrap_or_else(|| label.clone());

      sink
        .subject(SubjectRecord {
          subject_type: config.subject_type.label.clone(),
          label: label.clone(),
          name,
          geometry,
        })
        .await?;
      subjects += 1;

      for attribute in &config.attributes {
        if let Some(value) = property(&feature.properties, &attribute.property) {
          sink
            .fixed_value(FixedValueRecord {
              subject_label: label.clone(),
              attribute_label: attribute.label.clone(),
              value,
            })
            .await?;
        }
      }
    }

    debug!(subjects, file = %file.display(), "read geojson datasource");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::{
    fs,
    sync::{Arc, Mutex},
  };

  use super::*;
  use crate::importer::TimedValueRecord;

  #[derive(Default, Clone)]
  struct Collect {
    subjects: Arc<Mutex<Vec<SubjectRecord>>>,
    fixed:    Arc<Mutex<Vec<FixedValueRecord>>>,
  }

  #[async_trait]
  impl RecordSink for Collect {
    async fn subject(&mut self, record: SubjectRecord) -> Result<()> {
      self.subjects.lock().unwrap().push(record);
      Ok(())
    }

    async fn timed_value(&mut self, _record: TimedValueRecord) -> Result<()> { Ok(()) }

    async fn fixed_value(&mut self, record: FixedValueRecord) -> Result<()> {
      self.fixed.lock().unwrap().push(record);
      Ok(())
    }
  }

  fn fixture(dir: &Path) -> PathBuf {
    let features = serde_json::json!({
      "type": "FeatureCollection",
      "features": [
        {
          "type": "Feature",
          "geometry": { "type": "Point", "coordinates": [-0.09, 51.51] },
          "properties": { "code": "E01000001", "name": "City of London 001A", "lad": "City of London" }
        },
        {
          "type": "Feature",
          "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] },
          "properties": { "code": "E01000002" }
        },
        {
          "type": "Feature",
          "geometry": null,
          "properties": { "code": 12345 }
        },
        {
          "type": "Feature",
          "geometry": null,
          "properties": { "name": "no label" }
        }
      ]
    });
    fs::write(dir.join("lsoa.geojson"), features.to_string()).unwrap();
    let config = dir.join("subjects.json");
    fs::write(
      &config,
      serde_json::json!({
        "provider": { "label": "uk.gov.ons", "name": "ONS" },
        "datasources": {
          "lsoa": {
            "name": "Lower super output areas",
            "file": "lsoa.geojson",
            "subject_type": { "label": "lsoa", "name": "LSOA" },
            "label_property": "code",
            "name_property": "name",
            "attributes": [
              { "label": "local_authority", "name": "Local authority", "property": "lad" }
            ]
          }
        }
      })
      .to_string(),
    )
    .unwrap();
    config
  }

  #[tokio::test]
  async fn declares_subject_type_and_string_attributes() {
    let dir = tempfile::tempdir().unwrap();
    let importer = GeoJsonSubjectsImporter::from_config_file(Some(&fixture(dir.path()))).unwrap();
    let ds = importer.datasource("lsoa").await.unwrap();
    assert_eq!(ds.subject_types, [NewSubjectType::new("uk.gov.ons", "lsoa", "LSOA")]);
    assert_eq!(ds.attributes[0].label, "local_authority");
  }

  #[tokio::test]
  async fn reads_features_and_skips_unusable_ones() {
    let dir = tempfile::tempdir().unwrap();
    let importer = GeoJsonSubjectsImporter::from_config_file(Some(&fixture(dir.path()))).unwrap();
    let ds = importer.datasource("lsoa").await.unwrap();

    let mut sink = Collect::default();
    importer.import(&ds, &Scope::default(), &mut sink).await.unwrap();

    let subjects = sink.subjects.lock().unwrap();
    let labels: Vec<_> = subjects.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, ["E01000001", "12345"]);
    assert_eq!(subjects[0].geometry, Some(Geometry::point(-0.09, 51.51)));
    assert_eq!(subjects[1].name, "12345");

    let fixed = sink.fixed.lock().unwrap();
    assert_eq!(fixed.len(), 1);
    assert_eq!(fixed[0].value, "City of London");
  }
}
