use std::{collections::HashMap, io::Write};

use serde_json::Value;

use super::{ExportedSubject, Exporter};
use crate::Result;

/// One row per subject, one column per leaf field path.
///
/// Nested objects flatten to `_`-joined paths. A value series (an object
/// with a `values` array) contributes a single `<path>_latest_value` column
/// holding the entry with the greatest timestamp; series metadata such as
/// `name` and `provider` is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExporter;

const LATEST_VALUE_SUFFIX: &str = "latest_value";

impl Exporter for CsvExporter {
  fn write(&self, out: &mut dyn Write, subjects: &[ExportedSubject]) -> Result<()> {
    let mut header = vec!["label".to_owned(), "name".to_owned()];
    let mut columns: HashMap<String, usize> = HashMap::new();
    let mut rows = Vec::with_capacity(subjects.len());

    for subject in subjects {
      let mut cells = Vec::new();
      for (label, value) in &subject.fields {
        flatten(label, value, &mut cells);
      }
      for (column, _) in &cells {
        if !columns.contains_key(column) {
          columns.insert(column.clone(), header.len());
          header.push(column.clone());
        }
      }
      rows.push((subject, cells));
    }

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&header)?;
    for (subject, cells) in rows {
      let mut record = vec![String::new(); header.len()];
      record[0] = subject.label.clone();
      record[1] = subject.name.clone();
      for (column, cell) in cells {
        if let Some(&idx) = columns.get(&column) {
          record[idx] = cell;
        }
      }
      writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
  }
}

fn join(prefix: &str, key: &str) -> String {
  if prefix.is_empty() { key.to_owned() } else { format!("{prefix}_{key}") }
}

fn flatten(path: &str, value: &Value, cells: &mut Vec<(String, String)>) {
  match value {
    Value::Object(object) => match object.get("values") {
      Some(Value::Array(series)) => {
        if let Some(latest) = latest_entry(series) {
          cells.push((join(path, LATEST_VALUE_SUFFIX), cell(&latest["value"])));
        }
      }
      _ => {
        for (key, child) in object {
          flatten(&join(path, key), child, cells);
        }
      }
    },
    other => cells.push((path.to_owned(), cell(other))),
  }
}

/// The entry with the greatest timestamp; the last entry when untimed.
/// Timestamps share one fixed-width format, so they compare as text.
fn latest_entry(series: &[Value]) -> Option<&Value> {
  let timed = series
    .iter()
    .filter_map(|entry| entry.get("timestamp").and_then(Value::as_str).map(|ts| (ts, entry)))
    .max_by(|a, b| a.0.cmp(b.0))
    .map(|(_, entry)| entry);
  timed.or_else(|| series.last())
}

fn cell(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    other => other.to_string(),
  }
}
