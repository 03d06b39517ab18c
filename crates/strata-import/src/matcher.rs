//! Matching of `className:datasourceId,...` force-import lists.

use std::{convert::Infallible, str::FromStr};

/// Selects which `(importer, datasource)` pairs to re-import regardless of
/// the journal.
///
/// Each comma-separated rule is either an importer name, matching all of its
/// datasources, or `importer:datasource`. An empty list matches
/// nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImporterMatcher {
  rules: Vec<(String, Option<String>)>,
}

impl ImporterMatcher {
  pub fn parse(input: &str) -> Self {
    let rules = input
      .split(',')
      .map(str::trim)
      .filter(|rule| !rule.is_empty())
      .map(|rule| match rule.split_once(':') {
        Some((importer, datasource)) => {
          (importer.trim().to_owned(), Some(datasource.trim().to_owned()))
        }
        None => (rule.to_owned(), None),
      })
      .collect();
    Self { rules }
  }

  pub fn matches(&self, importer: &str, datasource: &str) -> bool {
    self.rules.iter().any(|(i, d)| {
      i == importer && d.as_deref().is_none_or(|d| d == datasource)
    })
  }

  pub fn is_empty(&self) -> bool { self.rules.is_empty() }
}

impl FromStr for ImporterMatcher {
  type Err = Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Ok(Self::parse(s)) }
}
