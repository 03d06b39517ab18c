//! Core types and trait definitions for the Strata data catalogue.
//!
//! This crate is deliberately free of database and file-format dependencies.
//! Every other crate depends on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod catalogue;
pub mod datasource;
pub mod error;
pub mod geometry;
pub mod journal;
pub mod store;
pub mod subject;
pub mod value;

pub use error::{Error, Result};
