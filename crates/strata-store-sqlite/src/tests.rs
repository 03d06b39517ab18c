//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{NaiveDate, NaiveDateTime};
use strata_core::{
  catalogue::{DataKind, NewAttribute, NewSubjectType, Provider, SubjectType},
  geometry::Geometry,
  journal::JournalEntry,
  store::{CatalogueStore, SubjectQuery},
  subject::{NewSubject, Subject},
  value::{FixedValue, TimedValue},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn ts(year: i32) -> NaiveDateTime {
  NaiveDate::from_ymd_opt(year, 12, 31)
    .unwrap()
    .and_hms_opt(23, 59, 59)
    .unwrap()
}

async fn subject_type(s: &SqliteStore, label: &str) -> SubjectType {
  s.upsert_provider(Provider::new("uk.gov.ons", "Office for National Statistics"))
    .await
    .unwrap();
  s.upsert_subject_type(NewSubjectType::new("uk.gov.ons", label, label))
    .await
    .unwrap()
}

async fn one_subject(s: &SqliteStore, st: &SubjectType, label: &str, geometry: Geometry) -> Subject {
  s.save_subjects(vec![
    NewSubject::new(st.subject_type_id, label, label).with_geometry(geometry),
  ])
  .await
  .unwrap()
  .remove(0)
}

// ─── Metadata ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn provider_upsert_updates_name() {
  let s = store().await;
  s.upsert_provider(Provider::new("org.example", "Old")).await.unwrap();
  s.upsert_provider(Provider::new("org.example", "New")).await.unwrap();

  let p = s.get_provider("org.example".into()).await.unwrap().unwrap();
  assert_eq!(p.name, "New");
  assert!(s.get_provider("missing".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn subject_type_requires_provider() {
  let s = store().await;
  let err = s
    .upsert_subject_type(NewSubjectType::new("nobody", "lsoa", "LSOA"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UnknownProvider(p) if p == "nobody"));
}

#[tokio::test]
async fn subject_type_id_is_stable() {
  let s = store().await;
  let first = subject_type(&s, "lsoa").await;
  let second = subject_type(&s, "lsoa").await;
  assert_eq!(first.subject_type_id, second.subject_type_id);

  let fetched = s
    .get_subject_type("uk.gov.ons".into(), "lsoa".into())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched, first);
}

#[tokio::test]
async fn attribute_upsert_keeps_identity_and_updates_description() {
  let s = store().await;
  s.upsert_provider(Provider::new("uk.gov.ons", "ONS")).await.unwrap();

  let first = s
    .upsert_attributes(vec![
      NewAttribute::numeric("uk.gov.ons", "population", "Population"),
      NewAttribute::string("uk.gov.ons", "region_code", "Region code"),
    ])
    .await
    .unwrap();
  assert_eq!(first.len(), 2);

  let second = s
    .upsert_attributes(vec![
      NewAttribute::numeric("uk.gov.ons", "population", "Population")
        .with_description("Usual residents"),
    ])
    .await
    .unwrap();
  assert_eq!(second[0].attribute_id, first[0].attribute_id);
  assert_eq!(second[0].description, "Usual residents");

  let all = s.list_attributes("uk.gov.ons".into()).await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[1].kind, DataKind::String);

  let fetched = s
    .get_attribute("uk.gov.ons".into(), "population".into())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched.description, "Usual residents");
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn save_subjects_upserts_by_type_and_label() {
  let s = store().await;
  let st = subject_type(&s, "lsoa").await;

  let first = one_subject(&s, &st, "E01000001", Geometry::point(0.0, 0.0)).await;
  let second = s
    .save_subjects(vec![NewSubject::new(st.subject_type_id, "E01000001", "City of London 001A")])
    .await
    .unwrap()
    .remove(0);

  assert_eq!(first.subject_id, second.subject_id);
  assert_eq!(second.name, "City of London 001A");
  assert!(second.geometry.is_none());

  let fetched = s.get_subject(first.subject_id).await.unwrap().unwrap();
  assert_eq!(fetched, second);
}

#[tokio::test]
async fn subjects_by_label_spans_types() {
  let s = store().await;
  let a = subject_type(&s, "lsoa").await;
  let b = subject_type(&s, "msoa").await;
  one_subject(&s, &a, "X1", Geometry::point(0.0, 0.0)).await;
  one_subject(&s, &b, "X1", Geometry::point(1.0, 1.0)).await;

  assert_eq!(s.subjects_by_label("X1".into()).await.unwrap().len(), 2);
  assert!(s.subjects_by_label("X2".into()).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_subjects_filters_and_limits() {
  let s = store().await;
  let st = subject_type(&s, "lsoa").await;
  let other = subject_type(&s, "localAuthority").await;
  s.save_subjects(vec![
    NewSubject::new(st.subject_type_id, "E01000002", "Camden 001"),
    NewSubject::new(st.subject_type_id, "E01000001", "City of London 001A"),
    NewSubject::new(st.subject_type_id, "W01000001", "Cardiff 001"),
    NewSubject::new(other.subject_type_id, "E09000001", "City of London"),
  ])
  .await
  .unwrap();

  let lsoas = s.list_subjects(&SubjectQuery::of_type(st.subject_type_id)).await.unwrap();
  let labels: Vec<_> = lsoas.iter().map(|s| s.label.as_str()).collect();
  assert_eq!(labels, ["E01000001", "E01000002", "W01000001"]);

  let query = SubjectQuery {
    label_pattern: Some("E%".into()),
    name_pattern: Some("City%".into()),
    ..SubjectQuery::default()
  };
  let cities = s.list_subjects(&query).await.unwrap();
  assert_eq!(cities.len(), 2);

  let query = SubjectQuery { limit: Some(1), ..SubjectQuery::of_type(st.subject_type_id) };
  assert_eq!(s.list_subjects(&query).await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_geometry_is_rejected() {
  let s = store().await;
  let st = subject_type(&s, "lsoa").await;
  let broken = Geometry::Polygon { coordinates: vec![vec![[0.0, 0.0]]] };
  let err = s
    .save_subjects(vec![NewSubject::new(st.subject_type_id, "bad", "bad").with_geometry(broken)])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(_)));
}

// ─── Spatial ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn containment_and_within() {
  let s = store().await;
  let la = subject_type(&s, "localAuthority").await;
  let lsoa = subject_type(&s, "lsoa").await;

  let west = one_subject(&s, &la, "west", Geometry::rectangle(0.0, 0.0, 10.0, 10.0)).await;
  one_subject(&s, &la, "east", Geometry::rectangle(10.0, 0.0, 20.0, 10.0)).await;
  let inner = one_subject(&s, &lsoa, "inner", Geometry::rectangle(1.0, 1.0, 2.0, 2.0)).await;
  let edge = one_subject(&s, &lsoa, "edge", Geometry::rectangle(9.0, 1.0, 11.0, 2.0)).await;

  let containing = s.subjects_containing(la.subject_type_id, &inner).await.unwrap();
  assert_eq!(containing.len(), 1);
  assert_eq!(containing[0].label, "west");

  assert!(s.subjects_containing(la.subject_type_id, &edge).await.unwrap().is_empty());

  let within = s.subjects_within(lsoa.subject_type_id, &west).await.unwrap();
  assert_eq!(within.len(), 1);
  assert_eq!(within[0].subject_id, inner.subject_id);
}

#[tokio::test]
async fn nearest_respects_radius_and_breaks_ties_by_label() {
  let s = store().await;
  let stations = subject_type(&s, "station").await;
  let schools = subject_type(&s, "school").await;

  let school = one_subject(&s, &schools, "school", Geometry::point(0.0, 0.0)).await;
  one_subject(&s, &stations, "b-station", Geometry::point(0.005, 0.0)).await;
  one_subject(&s, &stations, "a-station", Geometry::point(-0.005, 0.0)).await;
  one_subject(&s, &stations, "far", Geometry::point(0.5, 0.5)).await;

  let nearest = s
    .nearest_subject(stations.subject_type_id, &school, 0.01)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(nearest.label, "a-station");

  let none = s
    .nearest_subject(stations.subject_type_id, &school, 0.001)
    .await
    .unwrap();
  assert!(none.is_none());
}

#[tokio::test]
async fn spatial_queries_without_geometry_are_empty() {
  let s = store().await;
  let st = subject_type(&s, "lsoa").await;
  let bare = s
    .save_subjects(vec![NewSubject::new(st.subject_type_id, "bare", "bare")])
    .await
    .unwrap()
    .remove(0);

  assert!(s.subjects_containing(st.subject_type_id, &bare).await.unwrap().is_empty());
  assert!(s.nearest_subject(st.subject_type_id, &bare, 1.0).await.unwrap().is_none());
}

// ─── Values ──────────────────────────────────────────────────────────────────

async fn subject_and_attribute(s: &SqliteStore) -> (Uuid, Uuid) {
  let st = subject_type(s, "lsoa").await;
  let subject = one_subject(s, &st, "E01000001", Geometry::point(0.0, 0.0)).await;
  let attrs = s
    .upsert_attributes(vec![NewAttribute::numeric("uk.gov.ons", "population", "Population")])
    .await
    .unwrap();
  (subject.subject_id, attrs[0].attribute_id)
}

#[tokio::test]
async fn duplicate_in_batch_is_skipped() {
  let s = store().await;
  let (subject_id, attribute_id) = subject_and_attribute(&s).await;

  let value = |year, value| TimedValue { subject_id, attribute_id, timestamp: ts(year), value };
  let report = s
    .save_timed_values(vec![value(2013, 1.0), value(2013, 2.0), value(2014, 3.0)])
    .await
    .unwrap();
  assert_eq!(report.saved, 2);
  assert_eq!(report.skipped, 1);

  let stored = s.timed_values(subject_id, attribute_id).await.unwrap();
  assert_eq!(stored.len(), 2);
  assert_eq!(stored[0].value, 1.0);
}

#[tokio::test]
async fn later_batch_overwrites_existing_key() {
  let s = store().await;
  let (subject_id, attribute_id) = subject_and_attribute(&s).await;

  let value = |value| TimedValue { subject_id, attribute_id, timestamp: ts(2013), value };
  s.save_timed_values(vec![value(1.0)]).await.unwrap();
  s.save_timed_values(vec![value(5.0)]).await.unwrap();

  let stored = s.timed_values(subject_id, attribute_id).await.unwrap();
  assert_eq!(stored.len(), 1);
  assert_eq!(stored[0].value, 5.0);
}

#[tokio::test]
async fn dangling_reference_is_skipped_not_fatal() {
  let s = store().await;
  let (subject_id, attribute_id) = subject_and_attribute(&s).await;

  let report = s
    .save_timed_values(vec![
      TimedValue { subject_id: Uuid::new_v4(), attribute_id, timestamp: ts(2013), value: 1.0 },
      TimedValue { subject_id, attribute_id, timestamp: ts(2013), value: 2.0 },
    ])
    .await
    .unwrap();
  assert_eq!(report.saved, 1);
  assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn latest_value_is_greatest_timestamp() {
  let s = store().await;
  let (subject_id, attribute_id) = subject_and_attribute(&s).await;

  let value = |year, value| TimedValue { subject_id, attribute_id, timestamp: ts(year), value };
  s.save_timed_values(vec![value(2015, 3.0), value(2013, 1.0), value(2014, 2.0)])
    .await
    .unwrap();

  let latest = s.latest_timed_value(subject_id, attribute_id).await.unwrap().unwrap();
  assert_eq!(latest.timestamp, ts(2015));
  assert_eq!(latest.value, 3.0);

  let series = s.timed_values(subject_id, attribute_id).await.unwrap();
  let values: Vec<_> = series.iter().map(|v| v.value).collect();
  assert_eq!(values, [1.0, 2.0, 3.0]);

  assert!(s.latest_timed_value(subject_id, Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn fixed_values_ignore_exact_duplicates() {
  let s = store().await;
  let (subject_id, attribute_id) = subject_and_attribute(&s).await;

  let fixed = |value: &str| FixedValue { subject_id, attribute_id, value: value.into() };
  let report = s
    .save_fixed_values(vec![fixed("Academy"), fixed("Academy"), fixed("Free school")])
    .await
    .unwrap();
  assert_eq!(report.saved, 2);
  assert_eq!(report.skipped, 1);

  let stored = s.fixed_values(subject_id, attribute_id).await.unwrap();
  assert_eq!(stored.len(), 2);
}

// ─── Journal ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn journal_round_trip_and_clear() {
  let s = store().await;
  let entry = JournalEntry::for_datasource("csv-values", "population", None, None);

  assert!(!s.journal_has_entry(&entry).await.unwrap());
  s.add_journal_entry(&entry).await.unwrap();
  s.add_journal_entry(&entry).await.unwrap();
  assert!(s.journal_has_entry(&entry).await.unwrap());

  subject_and_attribute(&s).await;
  s.clear_all().await.unwrap();
  assert!(!s.journal_has_entry(&entry).await.unwrap());
  assert!(s.list_subjects(&SubjectQuery::default()).await.unwrap().is_empty());
  assert!(s.get_provider("uk.gov.ons".into()).await.unwrap().is_none());
}
