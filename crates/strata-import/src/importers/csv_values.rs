//! `csv-values`: numeric and categorical values from CSV files.
//!
//! ```toml
//! [provider]
//! label = "uk.gov.ons"
//! name  = "Office for National Statistics"
//!
//! [datasources.population]
//! name             = "Population estimates"
//! file             = "population.csv"
//! subject_column   = "lsoa"
//! timestamp_column = "year"        # or: timestamp = "2011"
//!
//! [[datasources.population.attributes]]
//! label  = "population"
//! name   = "Usual residents"
//! column = "All persons"
//! ```

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use strata_core::{
  catalogue::{DataKind, NewAttribute, Provider},
  datasource::Datasource,
};
use tracing::{debug, warn};

use super::{load_config, resolve, timestamp::parse_timestamp_string, ProviderConfig};
use crate::{
  importer::{FixedValueRecord, Importer, RecordSink, Scope, TimedValueRecord},
  Error, Result,
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct CsvValuesConfig {
  provider:    ProviderConfig,
  #[serde(default)]
  datasources: BTreeMap<String, CsvDatasourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct CsvDatasourceConfig {
  name:             String,
  #[serde(default)]
  description:      String,
  file:             PathBuf,
  subject_column:   String,
  timestamp_column: Option<String>,
  /// Period applied to every row when there is no timestamp column.
  timestamp:        Option<String>,
  #[serde(default)]
  attributes:       Vec<CsvAttributeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct CsvAttributeConfig {
  label:       String,
  name:        String,
  #[serde(default)]
  description: String,
  column:      String,
  #[serde(default)]
  kind:        DataKind,
}

enum Timestamp {
  Column(usize),
  Fixed(NaiveDateTime),
}

// ─── Importer ────────────────────────────────────────────────────────────────

pub struct CsvValuesImporter {
  provider:    Provider,
  base:        PathBuf,
  datasources: BTreeMap<String, CsvDatasourceConfig>,
}

impl CsvValuesImporter {
  pub const NAME: &'static str = "csv-values";

  pub fn from_config_file(path: Option<&Path>) -> Result<Self> {
    let (config, base): (CsvValuesConfig, _) = load_config(Self::NAME, path)?;
    for (id, ds) in &config.datasources {
      if ds.timestamp_column.is_none() && ds.timestamp.is_none() {
        return Err(Error::Configuration(format!(
          "datasource {id} needs either timestamp_column or timestamp"
        )));
      }
    }
    Ok(Self { provider: config.provider.into(), base, datasources: config.datasources })
  }

  fn config(&self, id: &str) -> Result<&CsvDatasourceConfig> {
    self.datasources.get(id).ok_or_else(|| Error::UnknownDatasource {
      importer:   Self::NAME.to_owned(),
      datasource: id.to_owned(),
    })
  }
}

fn column(headers: &csv::StringRecord, name: &str, file: &Path) -> Result<usize> {
  headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
    Error::Configuration(format!("column {name:?} not found in {}", file.display()))
  })
}

#[async_trait]
impl Importer for CsvValuesImporter {
  fn name(&self) -> &str { Self::NAME }

  fn provider(&self) -> Provider { self.provider.clone() }

  fn datasource_ids(&self) -> Vec<String> { self.datasources.keys().cloned().collect() }

  async fn datasource(&self, id: &str) -> Result<Datasource> {
    let config = self.config(id)?;
    let mut datasource =
      Datasource::new(id, &config.name, &config.description, self.provider.clone());
    datasource.url = Some(resolve(&self.base, &config.file).display().to_string());
    datasource.attributes = config
      .attributes
      .iter()
      .map(|a| NewAttribute {
        provider:    self.provider.label.clone(),
        label:       a.label.clone(),
        name:        a.name.clone(),
        description: a.description.clone(),
        kind:        a.kind,
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
    let mut reader = csv::Reader::from_path(&file)?;
    let headers = reader.headers()?.clone();

    let subject_idx = column(&headers, &config.subject_column, &file)?;
    let timestamp = match (&config.timestamp_column, &config.timestamp) {
      (Some(col), _) => Timestamp::Column(column(&headers, col, &file)?),
      (None, Some(period)) => Timestamp::Fixed(parse_timestamp_string(period).ok_or_else(|| {
        Error::Configuration(format!("unparseable timestamp {period:?}"))
      })?),
      (None, None) => {
        return Err(Error::Configuration(format!(
          "datasource {} has no timestamp",
          datasource.id
        )));
      }
    };
    let attributes = config
      .attributes
      .iter()
      .map(|a| column(&headers, &a.column, &file).map(|idx| (a, idx)))
      .collect::<Result<Vec<_>>>()?;

    let mut rows = 0usize;
    for (line, record) in reader.records().enumerate() {
      let record = match record {
        Ok(record) => record,
        Err(e) => {
          warn!(line = line + 2, error = %e, "malformed csv row, skipping");
          continue;
        }
      };
      let Some(subject) = record.get(subject_idx).map(str::trim) else {
        continue;
      };
      if subject.is_empty() || !scope.includes_subject(subject) {
        continue;
      }

      let ts = match &timestamp {
        Timestamp::Fixed(ts) => *ts,
        Timestamp::Column(idx) => {
          let raw = record.get(*idx).unwrap_or_default();
          match parse_timestamp_string(raw) {
            Some(ts) => ts,
            None => {
              warn!(line = line + 2, timestamp = raw, "unparseable timestamp, skipping row");
              continue;
            }
          }
        }
      };
      if !scope.includes_time(ts) {
        continue;
      }

      for (attribute, idx) in &attributes {
        let cell = record.get(*idx).map(str::trim).unwrap_or_default();
        if cell.is_empty() {
          continue;
        }
        match attribute.kind {
          DataKind::Numeric => match cell.replace(',', "").parse::<f64>() {
            Ok(value) if value.is_finite() => {
              sink
                .timed_value(TimedValueRecord {
                  subject_label:   subject.to_owned(),
                  attribute_label: attribute.label.clone(),
                  timestamp:       ts,
                  value,
                })
                .await?
            }
            _ => {
              warn!(
                line = line + 2,
                attribute = %attribute.label,
                value = cell,
                "not a finite number, skipping"
              );
            }
          },
          DataKind::String => {
            sink
              .fixed_value(FixedValueRecord {
                subject_label:   subject.to_owned(),
                attribute_label: attribute.label.clone(),
                value:           cell.to_owned(),
              })
              .await?
          }
        }
      }
      rows += 1;
    }

    debug!(rows, file = %file.display(), "read csv datasource");
    Ok(())
  }
}
