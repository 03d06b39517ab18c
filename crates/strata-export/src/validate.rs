//! Structural validation of raw recipe JSON.
//!
//! Deserialisation stops at the first problem; the validator walks the whole
//! document and reports every violation with the JSON pointer of the
//! offending value, so an operator can fix a recipe in one pass.

use std::fmt;

use serde_json::{Map, Value};

/// One problem in a recipe document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
  /// JSON pointer; empty for the document root.
  pub path:    String,
  pub message: String,
}

impl fmt::Display for Violation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let path = if self.path.is_empty() { "/" } else { &self.path };
    write!(f, "{path}: {}", self.message)
  }
}

const EXPORTERS: &[&str] = &["geojson", "csv"];
const OPERATIONS: &[&str] = &["div", "mul", "add", "sub"];
const AGGREGATORS: &[&str] = &["mean", "sum", "min", "max"];
const MATCH_ATTRIBUTES: &[&str] = &["label", "name"];
const GEO_RELATIONS: &[&str] = &["within"];
const FIELD_KINDS: &[&str] = &[
  "latestValue",
  "valuesByTime",
  "fixedAnnotation",
  "hasFixedAttribute",
  "wrapper",
  "fieldValueSum",
  "arithmetic",
  "mapToContainingSubject",
  "mapToNearestSubject",
  "geographicAggregation",
  "percentile",
  "modelling",
];

/// Every violation in `raw`, in document order. Empty means the recipe can
/// be deserialised.
pub fn validate_recipe(raw: &Value) -> Vec<Violation> {
  let mut v = Validator::default();
  if let Some(root) = v.object(raw, "") {
    v.one_of(root, "", "exporter", EXPORTERS, true);
    if let Some(dataset) = v.required(root, "", "dataset").and_then(|d| v.object(d, "/dataset")) {
      let path = "/dataset";
      v.each(dataset, path, "subjects", true, Validator::subject);
      v.each(dataset, path, "datasources", false, Validator::datasource);
      v.each(dataset, path, "fields", true, Validator::field);
    }
  }
  v.violations
}

fn pointer(path: &str, key: &str) -> String {
  format!("{path}/{}", key.replace('~', "~0").replace('/', "~1"))
}

fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

#[derive(Default)]
struct Validator {
  violations: Vec<Violation>,
}

type Obj = Map<String, Value>;

impl Validator {
  fn fail(&mut self, path: impl Into<String>, message: impl Into<String>) {
    self.violations.push(Violation { path: path.into(), message: message.into() });
  }

  fn object<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Obj> {
    let object = value.as_object();
    if object.is_none() {
      self.fail(path, format!("expected object, found {}", type_name(value)));
    }
    object
  }

  fn required<'v>(&mut self, obj: &'v Obj, path: &str, key: &str) -> Option<&'v Value> {
    let value = obj.get(key);
    if value.is_none() {
      self.fail(path, format!("missing required property {key:?}"));
    }
    value
  }

  fn get<'v>(&mut self, obj: &'v Obj, path: &str, key: &str, required: bool) -> Option<&'v Value> {
    if required { self.required(obj, path, key) } else { obj.get(key) }
  }

  fn string<'v>(&mut self, obj: &'v Obj, path: &str, key: &str, required: bool) -> Option<&'v str> {
    let value = self.get(obj, path, key, required)?;
    let s = value.as_str();
    if s.is_none() {
      self.fail(pointer(path, key), format!("expected string, found {}", type_name(value)));
    }
    s
  }

  fn one_of(&mut self, obj: &Obj, path: &str, key: &str, allowed: &[&str], required: bool) {
    if let Some(s) = self.string(obj, path, key, required)
      && !allowed.contains(&s)
    {
      self.fail(pointer(path, key), format!("{s:?} is not one of {}", allowed.join(", ")));
    }
  }

  fn array<'v>(
    &mut self,
    obj: &'v Obj,
    path: &str,
    key: &str,
    required: bool,
  ) -> Option<&'v Vec<Value>> {
    let value = self.get(obj, path, key, required)?;
    let array = value.as_array();
    if array.is_none() {
      self.fail(pointer(path, key), format!("expected array, found {}", type_name(value)));
    }
    array
  }

  /// Run `check` on every element of the array at `key`.
  fn each(
    &mut self,
    obj: &Obj,
    path: &str,
    key: &str,
    required: bool,
    check: fn(&mut Self, &Value, &str),
  ) {
    let Some(items) = self.array(obj, path, key, required) else {
      return;
    };
    let base = pointer(path, key);
    for (i, item) in items.iter().enumerate() {
      check(self, item, &format!("{base}/{i}"));
    }
  }

  fn string_array(&mut self, obj: &Obj, path: &str, key: &str) {
    let Some(items) = self.array(obj, path, key, false) else {
      return;
    };
    let base = pointer(path, key);
    for (i, item) in items.iter().enumerate() {
      if !item.is_string() {
        self.fail(format!("{base}/{i}"), format!("expected string, found {}", type_name(item)));
      }
    }
  }

  fn number(&mut self, obj: &Obj, path: &str, key: &str, required: bool) -> Option<f64> {
    let value = self.get(obj, path, key, required)?;
    let n = value.as_f64();
    if n.is_none() {
      self.fail(pointer(path, key), format!("expected number, found {}", type_name(value)));
    }
    n
  }

  fn boolean(&mut self, obj: &Obj, path: &str, key: &str) {
    if let Some(value) = obj.get(key)
      && !value.is_boolean()
    {
      self.fail(pointer(path, key), format!("expected boolean, found {}", type_name(value)));
    }
  }

  fn nested(&mut self, obj: &Obj, path: &str, key: &str, check: fn(&mut Self, &Value, &str)) {
    if let Some(value) = self.required(obj, path, key) {
      check(self, value, &pointer(path, key));
    }
  }

  // ─── Document parts ──────────────────────────────────────────────────────

  fn subject(&mut self, value: &Value, path: &str) {
    let Some(obj) = self.object(value, path) else {
      return;
    };
    self.string(obj, path, "provider", true);
    self.string(obj, path, "subjectType", true);
    if let Some(rule) = obj.get("matchRule") {
      let rule_path = pointer(path, "matchRule");
      if let Some(rule) = self.object(rule, &rule_path) {
        self.one_of(rule, &rule_path, "attribute", MATCH_ATTRIBUTES, true);
        self.string(rule, &rule_path, "pattern", true);
      }
    }
    if let Some(rule) = obj.get("geoMatchRule") {
      let rule_path = pointer(path, "geoMatchRule");
      if let Some(rule) = self.object(rule, &rule_path) {
        self.one_of(rule, &rule_path, "geoRelation", GEO_RELATIONS, true);
        self.each(rule, &rule_path, "subjects", true, Self::subject);
      }
    }
  }

  fn datasource(&mut self, value: &Value, path: &str) {
    let Some(obj) = self.object(value, path) else {
      return;
    };
    self.string(obj, path, "importerClass", true);
    self.string(obj, path, "datasourceId", true);
    self.string_array(obj, path, "geographyScope");
    self.string_array(obj, path, "temporalScope");
    self.string(obj, path, "configurationFile", false);
  }

  fn attribute(&mut self, value: &Value, path: &str) {
    if let Some(obj) = self.object(value, path) {
      self.string(obj, path, "provider", true);
      self.string(obj, path, "label", true);
    }
  }

  fn subject_type(&mut self, value: &Value, path: &str) {
    if let Some(obj) = self.object(value, path) {
      self.string(obj, path, "provider", true);
      self.string(obj, path, "subjectType", true);
    }
  }

  fn field(&mut self, value: &Value, path: &str) {
    let Some(obj) = self.object(value, path) else {
      return;
    };
    self.string(obj, path, "label", true);
    let Some(kind) = self.string(obj, path, "kind", true) else {
      return;
    };
    match kind {
      "latestValue" | "valuesByTime" => self.nested(obj, path, "attribute", Self::attribute),
      "fixedAnnotation" => {
        if let Some(value) = self.required(obj, path, "value")
          && !(value.is_string() || value.is_number())
        {
          self.fail(
            pointer(path, "value"),
            format!("expected string or number, found {}", type_name(value)),
          );
        }
      }
      "hasFixedAttribute" => {
        self.nested(obj, path, "attribute", Self::attribute);
        self.string_array(obj, path, "values");
      }
      "wrapper" => self.each(obj, path, "fields", true, Self::field),
      "fieldValueSum" => {
        self.string(obj, path, "name", false);
        self.each(obj, path, "fields", true, Self::field);
      }
      "arithmetic" => {
        self.one_of(obj, path, "operation", OPERATIONS, true);
        self.nested(obj, path, "field1", Self::field);
        self.nested(obj, path, "field2", Self::field);
      }
      "mapToContainingSubject" => {
        self.nested(obj, path, "subject", Self::subject_type);
        self.nested(obj, path, "field", Self::field);
      }
      "mapToNearestSubject" => {
        self.nested(obj, path, "subject", Self::subject_type);
        if let Some(radius) = self.number(obj, path, "maxRadius", false)
          && radius <= 0.0
        {
          self.fail(pointer(path, "maxRadius"), "must be greater than 0");
        }
        self.nested(obj, path, "field", Self::field);
      }
      "geographicAggregation" => {
        self.nested(obj, path, "subject", Self::subject_type);
        self.one_of(obj, path, "aggregator", AGGREGATORS, true);
        self.nested(obj, path, "field", Self::field);
      }
      "percentile" => {
        self.nested(obj, path, "field", Self::field);
        self.each(obj, path, "normalizationSubjects", true, Self::subject);
        if let Some(count) = self.required(obj, path, "percentileCount")
          && count.as_u64().is_none_or(|n| n == 0)
        {
          self.fail(pointer(path, "percentileCount"), "expected a positive integer");
        }
        self.boolean(obj, path, "inverse");
      }
      "modelling" => {
        self.each(obj, path, "datasources", false, Self::datasource);
        self.each(obj, path, "fields", true, Self::field);
      }
      other => self.fail(
        pointer(path, "kind"),
        format!("unknown field kind {other:?}, expected one of {}", FIELD_KINDS.join(", ")),
      ),
    }
  }
}
