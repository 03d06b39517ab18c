//! Built-in importers.
//!
//! Both are driven by a configuration file (TOML or JSON, chosen by
//! extension) that declares the provider and one section per datasource.
//! Relative data file paths resolve against the configuration file's
//! directory.

mod csv_values;
mod geojson_subjects;
pub mod timestamp;

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize};
use strata_core::catalogue::Provider;

pub use self::{csv_values::CsvValuesImporter, geojson_subjects::GeoJsonSubjectsImporter};
use crate::{Error, Result};

/// `[provider]` section shared by the configuration formats.
#[derive(Debug, Clone, Deserialize)]
struct ProviderConfig {
  label: String,
  name:  String,
}

impl From<ProviderConfig> for Provider {
  fn from(c: ProviderConfig) -> Self { Provider::new(c.label, c.name) }
}

/// Load and deserialise an importer configuration file, returning it with
/// the directory relative paths resolve against.
fn load_config<T: DeserializeOwned>(importer: &str, path: Option<&Path>) -> Result<(T, PathBuf)> {
  let path = path.ok_or_else(|| {
    Error::Configuration(format!("importer {importer} requires a configuration file"))
  })?;
  let config = config::Config::builder()
    .add_source(config::File::from(path))
    .build()?
    .try_deserialize::<T>()?;
  let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
  Ok((config, base))
}

fn resolve(base: &Path, file: &Path) -> PathBuf {
  if file.is_absolute() { file.to_path_buf() } else { base.join(file) }
}
