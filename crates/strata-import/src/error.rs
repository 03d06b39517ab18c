//! Error type for `strata-import`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Fatal misconfiguration: missing or invalid importer configuration.
  #[error("configuration error: {0}")]
  Configuration(String),

  #[error("unknown importer: {0}")]
  UnknownImporter(String),

  #[error("importer {importer} has no datasource {datasource:?}")]
  UnknownDatasource { importer: String, datasource: String },

  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("config error: {0}")]
  Config(#[from] config::ConfigError),

  #[error("core error: {0}")]
  Core(#[from] strata_core::Error),

  #[error("store error: {0}")]
  Store(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  /// Whether the error stems from the recipe or importer configuration
  /// rather than from the data or the store.
  pub fn is_configuration(&self) -> bool {
    matches!(
      self,
      Self::Configuration(_)
        | Self::UnknownImporter(_)
        | Self::UnknownDatasource { .. }
        | Self::Config(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
