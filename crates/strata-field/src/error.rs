//! Error types for `strata-field`.
//!
//! [`Error`] covers resolution: a recipe that names something the store does
//! not know, or combines fields in an unsupported way. [`EvalError`] covers
//! evaluation, where [`Incomputable`] is the routine outcome for a subject
//! that lacks the data a field needs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no attribute found for provider {provider} and label {label}")]
  UnknownAttribute { provider: String, label: String },

  #[error("no subject type found for provider {provider} and label {label}")]
  UnknownSubjectType { provider: String, label: String },

  #[error("field {label} needs single value operands")]
  NotSingleValue { label: String },

  #[error("invalid field {label}: {reason}")]
  InvalidField { label: String, reason: String },

  #[error("store error: {0}")]
  Store(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A field has no value for a subject.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct Incomputable {
  pub reason: String,
}

impl Incomputable {
  pub fn new(reason: impl Into<String>) -> Self { Self { reason: reason.into() } }
}

#[derive(Debug, Error)]
pub enum EvalError {
  #[error("incomputable field: {0}")]
  Incomputable(#[from] Incomputable),

  #[error("store error: {0}")]
  Store(Box<dyn std::error::Error + Send + Sync>),
}

impl EvalError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  pub fn incomputable(reason: impl Into<String>) -> Self {
    Self::Incomputable(Incomputable::new(reason))
  }
}

pub type EvalResult<T> = std::result::Result<T, EvalError>;
