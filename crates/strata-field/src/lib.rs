//! The Strata field engine.
//!
//! A [`FieldRecipe`] is the declarative, serialisable description of a
//! computation over a subject. Recipes are resolved against a store into
//! [`Field`]s, which hold every attribute and subject type reference they
//! need, and only then evaluated. Evaluation takes an explicit
//! [`EvalContext`] carrying the store and the per-run [`FieldCache`].
//!
//! A field that cannot be computed for one subject yields
//! [`EvalError::Incomputable`]; parents decide whether to degrade or
//! propagate.

mod cache;
mod eval;
mod field;
mod percentile;
mod resolve;

pub mod error;
pub mod recipe;
pub mod subjects;

pub use cache::FieldCache;
pub use error::{Error, EvalError, EvalResult, Incomputable, Result};
pub use eval::EvalContext;
pub use field::{Field, FieldId, FieldKind, Scalar};
pub use recipe::{Aggregator, AttributeMatcher, FieldRecipe, Operation, SubjectTypeRef};
pub use resolve::{Resolver, DEFAULT_MAX_RADIUS};
pub use subjects::{resolve_subjects, SubjectRecipe};

#[cfg(test)]
mod tests;
