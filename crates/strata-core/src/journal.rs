//! Journal entries mark completed imports.
//!
//! The key combines the datasource id with a digest of the requested scope so
//! that differently scoped imports of the same datasource are tracked
//! separately while keys stay short.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Joins labels within one scope list.
pub const INTRA_SCOPE_SEPARATOR: &str = "\t";
/// Joins the geography scope to the temporal scope.
pub const INTER_SCOPE_SEPARATOR: &str = "|";

/// A completed `(importer, key)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JournalEntry {
  pub importer: String,
  pub key:      String,
}

impl JournalEntry {
  /// Build the entry for an import of `datasource_id` under the given scopes.
  ///
  /// Scope lists are sorted before hashing, so label order does not matter.
  /// Missing and empty scopes both collapse to the bare datasource id.
  pub fn for_datasource(
    importer: &str,
    datasource_id: &str,
    geography_scope: Option<&[String]>,
    temporal_scope: Option<&[String]>,
  ) -> Self {
    let geography = geography_scope.unwrap_or_default();
    let temporal = temporal_scope.unwrap_or_default();

    let key = if geography.is_empty() && temporal.is_empty() {
      datasource_id.to_owned()
    } else {
      let scope = [sorted_join(geography), sorted_join(temporal)]
        .join(INTER_SCOPE_SEPARATOR);
      format!("{datasource_id}:{}", hex::encode(Sha256::digest(scope.as_bytes())))
    };

    Self { importer: importer.to_owned(), key }
  }
}

fn sorted_join(labels: &[String]) -> String {
  let mut labels: Vec<&str> = labels.iter().map(String::as_str).collect();
  labels.sort_unstable();
  labels.join(INTRA_SCOPE_SEPARATOR)
}
