//! Name-to-constructor registry for importers.

use std::{collections::BTreeMap, path::Path};

use crate::{
  importer::Importer,
  importers::{CsvValuesImporter, GeoJsonSubjectsImporter},
  Error, Result,
};

/// Builds an importer from its optional configuration file.
pub type ImporterFactory = fn(Option<&Path>) -> Result<Box<dyn Importer>>;

/// Resolves `importerClass` strings to importer instances.
#[derive(Clone, Default)]
pub struct ImporterRegistry {
  factories: BTreeMap<String, ImporterFactory>,
}

impl ImporterRegistry {
  pub fn new() -> Self { Self::default() }

  /// A registry holding every built-in importer.
  pub fn with_defaults() -> Self {
    let mut registry = Self::new();
    registry.register(CsvValuesImporter::NAME, |config| {
      Ok(Box::new(CsvValuesImporter::from_config_file(config)?))
    });
    registry.register(GeoJsonSubjectsImporter::NAME, |config| {
      Ok(Box::new(GeoJsonSubjectsImporter::from_config_file(config)?))
    });
    registry
  }

  pub fn register(&mut self, name: impl Into<String>, factory: ImporterFactory) {
    self.factories.insert(name.into(), factory);
  }

  /// Registered names, sorted.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.factories.keys().map(String::as_str)
  }

  pub fn contains(&self, name: &str) -> bool { self.factories.contains_key(name) }

  /// Instantiate `name` with the given configuration file.
  pub fn create(&self, name: &str, config: Option<&Path>) -> Result<Box<dyn Importer>> {
    let factory = self
      .factories
      .get(name)
      .ok_or_else(|| Error::UnknownImporter(name.to_owned()))?;
    factory(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_registered() {
    let registry = ImporterRegistry::with_defaults();
    let names: Vec<_> = registry.names().collect();
    assert_eq!(names, ["csv-values", "geojson-subjects"]);
  }

  #[test]
  fn unknown_importer_is_a_configuration_error() {
    let err = ImporterRegistry::with_defaults().create("shapefile", None).err().unwrap();
    assert!(matches!(err, Error::UnknownImporter(ref n) if n == "shapefile"));
    assert!(err.is_configuration());
  }

  #[test]
  fn configurable_importers_require_a_file() {
    let err = ImporterRegistry::with_defaults().create("csv-values", None).err().unwrap();
    assert!(matches!(err, Error::Configuration(_)));
  }
}
