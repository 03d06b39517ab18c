//! Error types for `strata-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid geometry: {0}")]
  InvalidGeometry(String),

  #[error("unknown data kind: {0:?}")]
  UnknownDataKind(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
