//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored with a fixed-width fractional part so that lexical
//! order matches chronological order. Geometries are stored as GeoJSON text.

use std::str::FromStr;

use chrono::{NaiveDateTime, Utc};
use strata_core::{
  catalogue::{Attribute, DataKind, SubjectType},
  geometry::Geometry,
  subject::Subject,
  value::{FixedValue, TimedValue},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Timestamps ──────────────────────────────────────────────────────────────

const STORED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub fn encode_ts(ts: NaiveDateTime) -> String {
  ts.format(STORED_FORMAT).to_string()
}

pub fn decode_ts(s: &str) -> Result<NaiveDateTime> {
  NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn now() -> String { encode_ts(Utc::now().naive_utc()) }

// ─── DataKind ────────────────────────────────────────────────────────────────

pub fn decode_kind(s: &str) -> Result<DataKind> {
  DataKind::from_str(s)
    .map_err(|_| Error::Core(strata_core::Error::UnknownDataKind(s.to_owned())))
}

// ─── Geometry ────────────────────────────────────────────────────────────────

/// GeoJSON text plus bounding box columns, all `None` without a geometry.
pub struct EncodedGeometry {
  pub json:  Option<String>,
  pub min_x: Option<f64>,
  pub min_y: Option<f64>,
  pub max_x: Option<f64>,
  pub max_y: Option<f64>,
}

pub fn encode_geometry(geometry: Option<&Geometry>) -> Result<EncodedGeometry> {
  let Some(geometry) = geometry else {
    return Ok(EncodedGeometry {
      json:  None,
      min_x: None,
      min_y: None,
      max_x: None,
      max_y: None,
    });
  };
  geometry.validate()?;
  let bbox = geometry.bbox();
  Ok(EncodedGeometry {
    json:  Some(serde_json::to_string(geometry)?),
    min_x: Some(bbox.min_x),
    min_y: Some(bbox.min_y),
    max_x: Some(bbox.max_x),
    max_y: Some(bbox.max_y),
  })
}

pub fn decode_geometry(s: Option<&str>) -> Result<Option<Geometry>> {
  Ok(s.map(serde_json::from_str).transpose()?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const SUBJECT_COLUMNS: &str =
  "subject_id, subject_type_id, label, name, geometry";

/// Raw strings read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id:      String,
  pub subject_type_id: String,
  pub label:           String,
  pub name:            String,
  pub geometry:        Option<String>,
}

impl RawSubject {
  /// Read the columns listed in [`SUBJECT_COLUMNS`], in order.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:      row.get(0)?,
      subject_type_id: row.get(1)?,
      label:           row.get(2)?,
      name:            row.get(3)?,
      geometry:        row.get(4)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id:      decode_uuid(&self.subject_id)?,
      subject_type_id: decode_uuid(&self.subject_type_id)?,
      label:           self.label,
      name:            self.name,
      geometry:        decode_geometry(self.geometry.as_deref())?,
    })
  }
}

pub struct RawSubjectType {
  pub subject_type_id: String,
  pub provider:        String,
  pub label:           String,
  pub name:            String,
}

impl RawSubjectType {
  pub fn into_subject_type(self) -> Result<SubjectType> {
    Ok(SubjectType {
      subject_type_id: decode_uuid(&self.subject_type_id)?,
      provider:        self.provider,
      label:           self.label,
      name:            self.name,
    })
  }
}

pub const ATTRIBUTE_COLUMNS: &str =
  "attribute_id, provider, label, name, description, kind";

pub struct RawAttribute {
  pub attribute_id: String,
  pub provider:     String,
  pub label:        String,
  pub name:         String,
  pub description:  String,
  pub kind:         String,
}

impl RawAttribute {
  /// Read the columns listed in [`ATTRIBUTE_COLUMNS`], in order.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      attribute_id: row.get(0)?,
      provider:     row.get(1)?,
      label:        row.get(2)?,
      name:         row.get(3)?,
      description:  row.get(4)?,
      kind:         row.get(5)?,
    })
  }

  pub fn into_attribute(self) -> Result<Attribute> {
    Ok(Attribute {
      attribute_id: decode_uuid(&self.attribute_id)?,
      provider:     self.provider,
      label:        self.label,
      name:         self.name,
      description:  self.description,
      kind:         decode_kind(&self.kind)?,
    })
  }
}

pub struct RawTimedValue {
  pub subject_id:   String,
  pub attribute_id: String,
  pub timestamp:    String,
  pub value:        f64,
}

impl RawTimedValue {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:   row.get(0)?,
      attribute_id: row.get(1)?,
      timestamp:    row.get(2)?,
      value:        row.get(3)?,
    })
  }

  pub fn into_timed_value(self) -> Result<TimedValue> {
    Ok(TimedValue {
      subject_id:   decode_uuid(&self.subject_id)?,
      attribute_id: decode_uuid(&self.attribute_id)?,
      timestamp:    decode_ts(&self.timestamp)?,
      value:        self.value,
    })
  }
}

pub struct RawFixedValue {
  pub subject_id:   String,
  pub attribute_id: String,
  pub value:        String,
}

impl RawFixedValue {
  pub fn into_fixed_value(self) -> Result<FixedValue> {
    Ok(FixedValue {
      subject_id:   decode_uuid(&self.subject_id)?,
      attribute_id: decode_uuid(&self.attribute_id)?,
      value:        self.value,
    })
  }
}
