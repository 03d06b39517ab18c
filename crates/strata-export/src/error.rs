//! Error types for `strata-export`.

use thiserror::Error;

use crate::validate::Violation;

#[derive(Debug, Error)]
pub enum Error {
  #[error("recipe is invalid ({} violations)", .0.len())]
  InvalidRecipe(Vec<Violation>),

  #[error("import error: {0}")]
  Import(#[from] strata_import::Error),

  #[error("field error: {0}")]
  Field(#[from] strata_field::Error),

  #[error("evaluation error: {0}")]
  Evaluation(#[from] strata_field::EvalError),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("CSV error: {0}")]
  Csv(#[from] csv::Error),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  /// Whether the run failed before producing output because of the recipe
  /// or importer configuration.
  pub fn is_configuration(&self) -> bool {
    match self {
      Self::InvalidRecipe(_) => true,
      Self::Import(e) => e.is_configuration(),
      Self::Field(strata_field::Error::Store(_)) => false,
      Self::Field(_) => true,
      _ => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
