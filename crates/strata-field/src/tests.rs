use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use strata_core::{
  catalogue::{NewAttribute, NewSubjectType, Provider, SubjectType},
  geometry::Geometry,
  store::CatalogueStore,
  subject::{NewSubject, Subject},
  value::{FixedValue, TimedValue},
};
use strata_store_sqlite::SqliteStore;

use crate::*;

const ONS: &str = "uk.gov.ons";

fn ts(year: i32) -> NaiveDateTime {
  NaiveDate::from_ymd_opt(year, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

/// A store with a 10x10 local authority holding two LSOA points, one LSOA
/// point outside it, and numeric attributes `attr`, `a` and `b`.
struct Fixture {
  store: SqliteStore,
  lsoa:  SubjectType,
  la:    SubjectType,
}

impl Fixture {
  async fn new() -> Self {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store.upsert_provider(Provider::new(ONS, "Office for National Statistics")).await.unwrap();
    let lsoa = store.upsert_subject_type(NewSubjectType::new(ONS, "lsoa", "LSOA")).await.unwrap();
    let la = store
      .upsert_subject_type(NewSubjectType::new(ONS, "localauthority", "Local authority"))
      .await
      .unwrap();
    store
      .upsert_attributes(vec![
        NewAttribute::numeric(ONS, "attr", "Attribute"),
        NewAttribute::numeric(ONS, "a", "A"),
        NewAttribute::numeric(ONS, "b", "B"),
        NewAttribute::string(ONS, "district", "District"),
      ])
      .await
      .unwrap();
    store
      .save_subjects(vec![
        NewSubject::new(la.subject_type_id, "E09000001", "City of London")
          .with_geometry(Geometry::rectangle(0.0, 0.0, 10.0, 10.0)),
        NewSubject::new(lsoa.subject_type_id, "E01000001", "City of London 001A")
          .with_geometry(Geometry::point(1.0, 1.0)),
        NewSubject::new(lsoa.subject_type_id, "E01000002", "City of London 001B")
          .with_geometry(Geometry::point(2.0, 2.0)),
        NewSubject::new(lsoa.subject_type_id, "E01000003", "Elsewhere")
          .with_geometry(Geometry::point(20.0, 20.0)),
      ])
      .await
      .unwrap();
    Self { store, lsoa, la }
  }

  async fn subject(&self, label: &str) -> Subject {
    self.store.subjects_by_label(label.into()).await.unwrap().remove(0)
  }

  async fn set(&self, subject: &str, attribute: &str, year: i32, value: f64) {
    let subject = self.subject(subject).await;
    let attribute =
      self.store.get_attribute(ONS.into(), attribute.into()).await.unwrap().unwrap();
    self
      .store
      .save_timed_values(vec![TimedValue {
        subject_id: subject.subject_id,
        attribute_id: attribute.attribute_id,
        timestamp: ts(year),
        value,
      }])
      .await
      .unwrap();
  }

  async fn field(&self, recipe: Value) -> Field {
    let recipe: FieldRecipe = serde_json::from_value(recipe).unwrap();
    Resolver::new(&self.store).resolve(&recipe).await.unwrap()
  }

  async fn eval(&self, field: &Field, subject: &str) -> EvalResult<Value> {
    let cache = FieldCache::new();
    let subject = self.subject(subject).await;
    field.json_value(EvalContext::new(&self.store, &cache), &subject).await
  }
}

fn latest(label: &str, attribute: &str) -> Value {
  json!({
    "kind": "latestValue",
    "label": label,
    "attribute": { "provider": ONS, "label": attribute }
  })
}

fn number(value: &Value) -> Option<f64> { value.as_f64() }

#[tokio::test]
async fn latest_value_json() {
  let fx = Fixture::new().await;
  fx.set("E01000001", "attr", 2011, 100.0).await;

  let field = fx.field(latest("attr", "attr")).await;
  let value = fx.eval(&field, "E01000001").await.unwrap();

  assert_eq!(value["name"], "Attribute");
  assert_eq!(value["provider"], "Office for National Statistics");
  let values = value["values"].as_array().unwrap();
  assert_eq!(values.len(), 1);
  assert_eq!(values[0]["timestamp"], "2011-01-01T00:00:00");
  assert_eq!(number(&values[0]["value"]), Some(100.0));
}

#[tokio::test]
async fn latest_value_picks_greatest_timestamp() {
  let fx = Fixture::new().await;
  fx.set("E01000001", "attr", 2013, 130.0).await;
  fx.set("E01000001", "attr", 2011, 110.0).await;

  let field = fx.field(latest("attr", "attr")).await;
  let value = fx.eval(&field, "E01000001").await.unwrap();
  assert_eq!(value["values"][0]["timestamp"], "2013-01-01T00:00:00");
}

#[tokio::test]
async fn missing_value_is_incomputable() {
  let fx = Fixture::new().await;
  let field = fx.field(latest("attr", "attr")).await;
  let err = fx.eval(&field, "E01000001").await.unwrap_err();
  assert!(matches!(err, EvalError::Incomputable(_)));
}

#[tokio::test]
async fn values_by_time_lists_series_in_order() {
  let fx = Fixture::new().await;
  fx.set("E01000001", "attr", 2012, 2.0).await;
  fx.set("E01000001", "attr", 2011, 1.0).await;

  let field = fx
    .field(json!({
      "kind": "valuesByTime",
      "label": "series",
      "attribute": { "provider": ONS, "label": "attr" }
    }))
    .await;
  let value = fx.eval(&field, "E01000001").await.unwrap();
  let stamps: Vec<_> = value["values"]
    .as_array()
    .unwrap()
    .iter()
    .map(|v| v["timestamp"].as_str().unwrap().to_owned())
    .collect();
  assert_eq!(stamps, ["2011-01-01T00:00:00", "2012-01-01T00:00:00"]);

  let empty = fx.eval(&field, "E01000002").await.unwrap();
  assert_eq!(empty["values"], json!([]));
}

#[tokio::test]
async fn field_value_sum() {
  let fx = Fixture::new().await;
  fx.set("E01000001", "a", 2011, 10.0).await;
  fx.set("E01000001", "b", 2011, 40.0).await;

  let field = fx
    .field(json!({
      "kind": "fieldValueSum",
      "label": "total",
      "name": "Total",
      "fields": [latest("a", "a"), latest("b", "b")]
    }))
    .await;
  let value = fx.eval(&field, "E01000001").await.unwrap();
  assert_eq!(value["name"], "Total");
  assert_eq!(number(&value["values"][0]["value"]), Some(50.0));
}

#[tokio::test]
async fn arithmetic_caches_per_subject() {
  let fx = Fixture::new().await;
  fx.set("E01000001", "a", 2011, 10.0).await;
  fx.set("E01000001", "b", 2011, 4.0).await;

  let field = fx
    .field(json!({
      "kind": "arithmetic",
      "label": "ratio",
      "operation": "div",
      "field1": latest("a", "a"),
      "field2": latest("b", "b")
    }))
    .await;
  let cache = FieldCache::new();
  let subject = fx.subject("E01000001").await;
  let ctx = EvalContext::new(&fx.store, &cache);

  assert_eq!(field.scalar(ctx, &subject).await.unwrap(), Scalar::Number(2.5));
  assert_eq!(cache.len(), 1);
  fx.set("E01000001", "a", 2012, 1000.0).await;
  assert_eq!(field.scalar(ctx, &subject).await.unwrap(), Scalar::Number(2.5));
}

#[tokio::test]
async fn division_by_zero_is_incomputable() {
  let fx = Fixture::new().await;
  fx.set("E01000001", "a", 2011, 10.0).await;
  fx.set("E01000001", "b", 2011, 0.0).await;

  let field = fx
    .field(json!({
      "kind": "arithmetic",
      "label": "ratio",
      "operation": "div",
      "field1": latest("a", "a"),
      "field2": latest("b", "b")
    }))
    .await;
  let err = fx.eval(&field, "E01000001").await.unwrap_err();
  assert!(matches!(err, EvalError::Incomputable(_)));
}

#[tokio::test]
async fn geographic_aggregation_mean() {
  let fx = Fixture::new().await;
  fx.set("E01000001", "attr", 2011, 100.0).await;
  fx.set("E01000002", "attr", 2011, 110.0).await;
  fx.set("E01000003", "attr", 2011, 1000.0).await;

  let field = fx
    .field(json!({
      "kind": "geographicAggregation",
      "label": "mean_attr",
      "subject": { "provider": ONS, "subjectType": "lsoa" },
      "aggregator": "mean",
      "field": latest("attr", "attr")
    }))
    .await;
  let value = fx.eval(&field, "E09000001").await.unwrap();
  assert_eq!(number(&value), Some(105.0));
}

#[tokio::test]
async fn aggregation_without_values_is_incomputable() {
  let fx = Fixture::new().await;
  let field = fx
    .field(json!({
      "kind": "geographicAggregation",
      "label": "sum_attr",
      "subject": { "provider": ONS, "subjectType": "lsoa" },
      "aggregator": "sum",
      "field": latest("attr", "attr")
    }))
    .await;
  assert!(matches!(
    fx.eval(&field, "E09000001").await,
    Err(EvalError::Incomputable(_))
  ));
}

#[tokio::test]
async fn overflowing_sum_is_incomputable() {
  let fx = Fixture::new().await;
  fx.set("E01000001", "a", 2011, 1e308).await;
  fx.set("E01000001", "b", 2011, 1e308).await;

  let field = fx
    .field(json!({
      "kind": "fieldValueSum",
      "label": "total",
      "fields": [latest("a", "a"), latest("b", "b")]
    }))
    .await;
  let cache = FieldCache::new();
  let subject = fx.subject("E01000001").await;
  let ctx = EvalContext::new(&fx.store, &cache);

  assert!(matches!(field.json_value(ctx, &subject).await, Err(EvalError::Incomputable(_))));
  assert!(matches!(cache.value(field.id, subject.subject_id), Some(Err(_))));
}

#[tokio::test]
async fn overflowing_aggregation_is_incomputable() {
  let fx = Fixture::new().await;
  fx.set("E01000001", "attr", 2011, 1e308).await;
  fx.set("E01000002", "attr", 2011, 1e308).await;

  for aggregator in ["sum", "mean"] {
    let field = fx
      .field(json!({
        "kind": "geographicAggregation",
        "label": "total_attr",
        "subject": { "provider": ONS, "subjectType": "lsoa" },
        "aggregator": aggregator,
        "field": latest("attr", "attr")
      }))
      .await;
    assert!(
      matches!(fx.eval(&field, "E09000001").await, Err(EvalError::Incomputable(_))),
      "{aggregator}"
    );
  }
}

#[tokio::test]
async fn infinite_annotation_is_not_an_operand() {
  let fx = Fixture::new().await;
  fx.set("E01000001", "a", 2011, 10.0).await;

  let field = fx
    .field(json!({
      "kind": "arithmetic",
      "label": "scaled",
      "operation": "mul",
      "field1": latest("a", "a"),
      "field2": { "kind": "fixedAnnotation", "label": "factor", "value": "inf" }
    }))
    .await;
  assert!(matches!(
    fx.eval(&field, "E01000001").await,
    Err(EvalError::Incomputable(_))
  ));
}

#[tokio::test]
async fn containing_subject_needs_exactly_one_match() {
  let fx = Fixture::new().await;
  let field = fx
    .field(json!({
      "kind": "mapToContainingSubject",
      "label": "authority",
      "subject": { "provider": ONS, "subjectType": "localauthority" },
      "field": { "kind": "fixedAnnotation", "label": "flag", "value": "inside" }
    }))
    .await;

  assert_eq!(fx.eval(&field, "E01000001").await.unwrap(), json!("inside"));
  assert!(matches!(
    fx.eval(&field, "E01000003").await,
    Err(EvalError::Incomputable(_))
  ));

  fx.store
    .save_subjects(vec![
      NewSubject::new(fx.la.subject_type_id, "E09000002", "Overlap")
        .with_geometry(Geometry::rectangle(0.0, 0.0, 5.0, 5.0)),
    ])
    .await
    .unwrap();
  assert!(matches!(
    fx.eval(&field, "E01000001").await,
    Err(EvalError::Incomputable(_))
  ));
}

#[tokio::test]
async fn containing_subject_evaluates_on_the_parent() {
  let fx = Fixture::new().await;
  fx.set("E09000001", "attr", 2011, 7.0).await;
  let field = fx
    .field(json!({
      "kind": "mapToContainingSubject",
      "label": "authority_attr",
      "subject": { "provider": ONS, "subjectType": "localauthority" },
      "field": latest("attr", "attr")
    }))
    .await;
  let value = fx.eval(&field, "E01000002").await.unwrap();
  assert_eq!(number(&value["values"][0]["value"]), Some(7.0));
}

#[tokio::test]
async fn nearest_subject_respects_radius() {
  let fx = Fixture::new().await;
  fx.set("E01000002", "attr", 2011, 2.0).await;
  let recipe = |radius: f64| {
    json!({
      "kind": "mapToNearestSubject",
      "label": "nearest",
      "subject": { "provider": ONS, "subjectType": "lsoa" },
      "maxRadius": radius,
      "field": latest("attr", "attr")
    })
  };

  let near = fx.field(recipe(2.0)).await;
  let value = fx.eval(&near, "E01000001").await.unwrap();
  assert_eq!(number(&value["values"][0]["value"]), Some(2.0));

  let tight = fx.field(recipe(0.5)).await;
  assert!(matches!(
    fx.eval(&tight, "E01000001").await,
    Err(EvalError::Incomputable(_))
  ));
}

#[tokio::test]
async fn has_fixed_attribute() {
  let fx = Fixture::new().await;
  let subject = fx.subject("E01000001").await;
  let district = fx.store.get_attribute(ONS.into(), "district".into()).await.unwrap().unwrap();
  fx.store
    .save_fixed_values(vec![FixedValue {
      subject_id:   subject.subject_id,
      attribute_id: district.attribute_id,
      value:        "City of London".into(),
    }])
    .await
    .unwrap();

  let any = fx
    .field(json!({
      "kind": "hasFixedAttribute",
      "label": "has_district",
      "attribute": { "provider": ONS, "label": "district" }
    }))
    .await;
  assert_eq!(number(&fx.eval(&any, "E01000001").await.unwrap()), Some(1.0));
  assert_eq!(number(&fx.eval(&any, "E01000002").await.unwrap()), Some(0.0));

  let specific = fx
    .field(json!({
      "kind": "hasFixedAttribute",
      "label": "in_westminster",
      "attribute": { "provider": ONS, "label": "district" },
      "values": ["Westminster"]
    }))
    .await;
  assert_eq!(number(&fx.eval(&specific, "E01000001").await.unwrap()), Some(0.0));
}

#[tokio::test]
async fn wrapper_omits_incomputable_children() {
  let fx = Fixture::new().await;
  fx.set("E01000001", "a", 2011, 10.0).await;

  let field = fx
    .field(json!({
      "kind": "wrapper",
      "label": "bundle",
      "fields": [
        latest("a", "a"),
        latest("b", "b"),
        { "kind": "fixedAnnotation", "label": "note", "value": "ok" }
      ]
    }))
    .await;
  let value = fx.eval(&field, "E01000001").await.unwrap();
  let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
  assert_eq!(keys.len(), 2);
  assert!(value.get("a").is_some());
  assert!(value.get("b").is_none());
  assert_eq!(value["note"], "ok");
}

#[tokio::test]
async fn percentile_buckets_against_cohort() {
  let fx = Fixture::new().await;
  fx.set("E01000001", "attr", 2011, 10.0).await;
  fx.set("E01000002", "attr", 2011, 20.0).await;
  fx.set("E01000003", "attr", 2011, 40.0).await;

  let recipe = |inverse: bool| {
    json!({
      "kind": "percentile",
      "label": "attr_percentile",
      "field": latest("attr", "attr"),
      "normalizationSubjects": [{ "provider": ONS, "subjectType": "lsoa" }],
      "percentileCount": 2,
      "inverse": inverse
    })
  };

  // Cohort 10, 20, 40: median boundary 20, top boundary 40.
  let field = fx.field(recipe(false)).await;
  let cache = FieldCache::new();
  let ctx = EvalContext::new(&fx.store, &cache);
  for (label, expected) in [("E01000001", 1.0), ("E01000002", 1.0), ("E01000003", 2.0)] {
    let subject = fx.subject(label).await;
    assert_eq!(field.scalar(ctx, &subject).await.unwrap(), Scalar::Number(expected), "{label}");
  }

  let inverse = fx.field(recipe(true)).await;
  assert_eq!(number(&fx.eval(&inverse, "E01000001").await.unwrap()), Some(2.0));
}

#[tokio::test]
async fn unknown_attribute_fails_resolution() {
  let fx = Fixture::new().await;
  let recipe: FieldRecipe = serde_json::from_value(latest("x", "missing")).unwrap();
  let err = Resolver::new(&fx.store).resolve(&recipe).await.unwrap_err();
  assert!(matches!(err, Error::UnknownAttribute { label, .. } if label == "missing"));
}

#[tokio::test]
async fn operands_must_be_single_values() {
  let fx = Fixture::new().await;
  let recipe: FieldRecipe = serde_json::from_value(json!({
    "kind": "arithmetic",
    "label": "bad",
    "operation": "add",
    "field1": latest("a", "a"),
    "field2": {
      "kind": "valuesByTime",
      "label": "series",
      "attribute": { "provider": ONS, "label": "b" }
    }
  }))
  .unwrap();
  let err = Resolver::new(&fx.store).resolve(&recipe).await.unwrap_err();
  assert!(matches!(err, Error::NotSingleValue { label } if label == "series"));
}

#[tokio::test]
async fn subject_recipes_filter_by_pattern_and_geography() {
  let fx = Fixture::new().await;
  let recipes: Vec<SubjectRecipe> = serde_json::from_value(json!([
    {
      "provider": ONS,
      "subjectType": "lsoa",
      "matchRule": { "attribute": "name", "pattern": "City of London%" }
    },
    {
      "provider": ONS,
      "subjectType": "lsoa",
      "geoMatchRule": {
        "geoRelation": "within",
        "subjects": [{ "provider": ONS, "subjectType": "localauthority" }]
      }
    }
  ]))
  .unwrap();

  let subjects = resolve_subjects(&fx.store, &recipes).await.unwrap();
  let labels: Vec<_> = subjects.iter().map(|s| s.label.as_str()).collect();
  assert_eq!(labels, ["E01000001", "E01000002"]);
  assert!(subjects.iter().all(|s| s.subject_type_id == fx.lsoa.subject_type_id));

  let unknown = [SubjectRecipe::new(ONS, "msoa")];
  assert!(matches!(
    resolve_subjects(&fx.store, &unknown).await,
    Err(Error::UnknownSubjectType { .. })
  ));
}
