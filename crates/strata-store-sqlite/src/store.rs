//! [`SqliteStore`], the SQLite implementation of [`CatalogueStore`].

use std::{cmp::Ordering, collections::HashSet, path::Path};

use rusqlite::OptionalExtension as _;
use tracing::{debug, warn};
use uuid::Uuid;

use strata_core::{
  catalogue::{Attribute, NewAttribute, NewSubjectType, Provider, SubjectType},
  geometry::BoundingBox,
  journal::JournalEntry,
  store::{CatalogueStore, SubjectQuery},
  subject::{NewSubject, Subject},
  value::{FixedValue, SaveReport, TimedValue},
};

use crate::{
  encode::{
    encode_geometry, encode_ts, encode_uuid, now, RawAttribute, RawFixedValue,
    RawSubject, RawSubjectType, RawTimedValue, ATTRIBUTE_COLUMNS, SUBJECT_COLUMNS,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Strata catalogue backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Subjects of `subject_type_id` whose bounding box satisfies `filter`.
  ///
  /// `filter` is a SQL fragment over the `min_x..max_y` columns using the
  /// positional parameters `?2` to `?5` (the probe box, in
  /// `min_x, min_y, max_x, max_y` order).
  async fn bbox_candidates(
    &self,
    subject_type_id: Uuid,
    filter: &'static str,
    probe: BoundingBox,
  ) -> Result<Vec<Subject>> {
    let type_str = encode_uuid(subject_type_id);

    let raws: Vec<RawSubject> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBJECT_COLUMNS} FROM subjects
           WHERE subject_type_id = ?1 AND geometry IS NOT NULL AND {filter}
           ORDER BY label"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![type_str, probe.min_x, probe.min_y, probe.max_x, probe.max_y],
            RawSubject::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }
}

// ─── CatalogueStore impl ─────────────────────────────────────────────────────

impl CatalogueStore for SqliteStore {
  type Error = Error;

  // ── Providers ─────────────────────────────────────────────────────────────

  async fn upsert_provider(&self, provider: Provider) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO providers (label, name) VALUES (?1, ?2)
           ON CONFLICT (label) DO UPDATE SET name = excluded.name",
          rusqlite::params![provider.label, provider.name],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_provider(&self, label: String) -> Result<Option<Provider>> {
    let provider = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT label, name FROM providers WHERE label = ?1",
            rusqlite::params![label],
            |row| Ok(Provider { label: row.get(0)?, name: row.get(1)? }),
          )
          .optional()?)
      })
      .await?;
    Ok(provider)
  }

  // ── Subject types ─────────────────────────────────────────────────────────

  async fn upsert_subject_type(&self, input: NewSubjectType) -> Result<SubjectType> {
    if self.get_provider(input.provider.clone()).await?.is_none() {
      return Err(Error::UnknownProvider(input.provider));
    }

    let id_str = encode_uuid(Uuid::new_v4());

    let raw: RawSubjectType = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subject_types (subject_type_id, provider, label, name)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (provider, label) DO UPDATE SET name = excluded.name",
          rusqlite::params![id_str, input.provider, input.label, input.name],
        )?;
        Ok(conn.query_row(
          "SELECT subject_type_id, provider, label, name FROM subject_types
           WHERE provider = ?1 AND label = ?2",
          rusqlite::params![input.provider, input.label],
          |row| {
            Ok(RawSubjectType {
              subject_type_id: row.get(0)?,
              provider:        row.get(1)?,
              label:           row.get(2)?,
              name:            row.get(3)?,
            })
          },
        )?)
      })
      .await?;

    raw.into_subject_type()
  }

  async fn get_subject_type(
    &self,
    provider: String,
    label: String,
  ) -> Result<Option<SubjectType>> {
    let raw: Option<RawSubjectType> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT subject_type_id, provider, label, name FROM subject_types
             WHERE provider = ?1 AND label = ?2",
            rusqlite::params![provider, label],
            |row| {
              Ok(RawSubjectType {
                subject_type_id: row.get(0)?,
                provider:        row.get(1)?,
                label:           row.get(2)?,
                name:            row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSubjectType::into_subject_type).transpose()
  }

  // ── Attributes ────────────────────────────────────────────────────────────

  async fn upsert_attributes(&self, input: Vec<NewAttribute>) -> Result<Vec<Attribute>> {
    let raws: Vec<RawAttribute> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut out = Vec::with_capacity(input.len());
        {
          let mut upsert = tx.prepare(
            "INSERT INTO attributes (attribute_id, provider, label, name, description, kind)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (provider, label) DO UPDATE SET
               name        = excluded.name,
               description = excluded.description,
               kind        = excluded.kind",
          )?;
          let mut select = tx.prepare(&format!(
            "SELECT {ATTRIBUTE_COLUMNS} FROM attributes WHERE provider = ?1 AND label = ?2"
          ))?;
          for attr in input {
            upsert.execute(rusqlite::params![
              encode_uuid(Uuid::new_v4()),
              attr.provider,
              attr.label,
              attr.name,
              attr.description,
              attr.kind.to_string(),
            ])?;
            out.push(select.query_row(
              rusqlite::params![attr.provider, attr.label],
              RawAttribute::from_row,
            )?);
          }
        }
        tx.commit()?;
        Ok(out)
      })
      .await?;

    raws.into_iter().map(RawAttribute::into_attribute).collect()
  }

  async fn get_attribute(&self, provider: String, label: String) -> Result<Option<Attribute>> {
    let raw: Option<RawAttribute> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {ATTRIBUTE_COLUMNS} FROM attributes WHERE provider = ?1 AND label = ?2"
            ),
            rusqlite::params![provider, label],
            RawAttribute::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawAttribute::into_attribute).transpose()
  }

  async fn list_attributes(&self, provider: String) -> Result<Vec<Attribute>> {
    let raws: Vec<RawAttribute> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ATTRIBUTE_COLUMNS} FROM attributes WHERE provider = ?1 ORDER BY label"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![provider], RawAttribute::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttribute::into_attribute).collect()
  }

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn save_subjects(&self, input: Vec<NewSubject>) -> Result<Vec<Subject>> {
    let mut rows = Vec::with_capacity(input.len());
    for subject in input {
      let geometry = encode_geometry(subject.geometry.as_ref())?;
      rows.push((subject, geometry));
    }

    let raws: Vec<RawSubject> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut out = Vec::with_capacity(rows.len());
        {
          let mut upsert = tx.prepare(
            "INSERT INTO subjects (
               subject_id, subject_type_id, label, name, geometry,
               min_x, min_y, max_x, max_y
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (subject_type_id, label) DO UPDATE SET
               name     = excluded.name,
               geometry = excluded.geometry,
               min_x    = excluded.min_x,
               min_y    = excluded.min_y,
               max_x    = excluded.max_x,
               max_y    = excluded.max_y",
          )?;
          let mut select = tx.prepare(&format!(
            "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE subject_type_id = ?1 AND label = ?2"
          ))?;
          for (subject, geometry) in rows {
            let type_str = encode_uuid(subject.subject_type_id);
            upsert.execute(rusqlite::params![
              encode_uuid(Uuid::new_v4()),
              type_str,
              subject.label,
              subject.name,
              geometry.json,
              geometry.min_x,
              geometry.min_y,
              geometry.max_x,
              geometry.max_y,
            ])?;
            out.push(select.query_row(
              rusqlite::params![type_str, subject.label],
              RawSubject::from_row,
            )?);
          }
        }
        tx.commit()?;
        Ok(out)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE subject_id = ?1"),
            rusqlite::params![id_str],
            RawSubject::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn subjects_by_label(&self, label: String) -> Result<Vec<Subject>> {
    let raws: Vec<RawSubject> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE label = ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![label], RawSubject::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  async fn list_subjects<'a>(&'a self, query: &'a SubjectQuery) -> Result<Vec<Subject>> {
    let mut clauses = Vec::new();
    let mut params: Vec<String> = Vec::new();

    if let Some(id) = query.subject_type_id {
      params.push(encode_uuid(id));
      clauses.push(format!("subject_type_id = ?{}", params.len()));
    }
    if let Some(pattern) = &query.label_pattern {
      params.push(pattern.clone());
      clauses.push(format!("label LIKE ?{}", params.len()));
    }
    if let Some(pattern) = &query.name_pattern {
      params.push(pattern.clone());
      clauses.push(format!("name LIKE ?{}", params.len()));
    }

    let mut sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects");
    if !clauses.is_empty() {
      sql.push_str(" WHERE ");
      sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY label");
    if let Some(limit) = query.limit {
      sql.push_str(&format!(" LIMIT {limit}"));
    }

    let raws: Vec<RawSubject> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawSubject::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  async fn subjects_containing<'a>(
    &'a self,
    subject_type_id: Uuid,
    subject: &'a Subject,
  ) -> Result<Vec<Subject>> {
    let Some(geometry) = &subject.geometry else {
      return Ok(Vec::new());
    };
    let candidates = self
      .bbox_candidates(
        subject_type_id,
        "min_x <= ?2 AND min_y <= ?3 AND max_x >= ?4 AND max_y >= ?5",
        geometry.bbox(),
      )
      .await?;

    Ok(
      candidates
        .into_iter()
        .filter(|c| c.geometry.as_ref().is_some_and(|g| g.contains(geometry)))
        .collect(),
    )
  }

  async fn subjects_within<'a>(
    &'a self,
    subject_type_id: Uuid,
    subject: &'a Subject,
  ) -> Result<Vec<Subject>> {
    let Some(geometry) = &subject.geometry else {
      return Ok(Vec::new());
    };
    let candidates = self
      .bbox_candidates(
        subject_type_id,
        "min_x >= ?2 AND min_y >= ?3 AND max_x <= ?4 AND max_y <= ?5",
        geometry.bbox(),
      )
      .await?;

    Ok(
      candidates
        .into_iter()
        .filter(|c| c.geometry.as_ref().is_some_and(|g| geometry.contains(g)))
        .collect(),
    )
  }

  async fn nearest_subject<'a>(
    &'a self,
    subject_type_id: Uuid,
    subject: &'a Subject,
    max_radius: f64,
  ) -> Result<Option<Subject>> {
    let Some(geometry) = &subject.geometry else {
      return Ok(None);
    };
    // Boxes intersecting the probe box grown by the radius.
    let candidates = self
      .bbox_candidates(
        subject_type_id,
        "max_x >= ?2 AND max_y >= ?3 AND min_x <= ?4 AND min_y <= ?5",
        geometry.bbox().expand(max_radius),
      )
      .await?;

    let nearest = candidates
      .into_iter()
      .filter(|c| c.subject_id != subject.subject_id)
      .filter_map(|c| {
        let d = c.geometry.as_ref()?.distance(geometry);
        (d <= max_radius).then_some((d, c))
      })
      .min_by(|(da, a), (db, b)| {
        da.partial_cmp(db)
          .unwrap_or(Ordering::Equal)
          .then_with(|| a.label.cmp(&b.label))
      })
      .map(|(_, c)| c);

    Ok(nearest)
  }

  // ── Values ────────────────────────────────────────────────────────────────

  async fn save_timed_values(&self, values: Vec<TimedValue>) -> Result<SaveReport> {
    let report = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut report = SaveReport::default();
        {
          let mut upsert = tx.prepare(
            "INSERT INTO timed_values (subject_id, attribute_id, timestamp, value)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (subject_id, attribute_id, timestamp)
             DO UPDATE SET value = excluded.value",
          )?;
          let mut seen = HashSet::with_capacity(values.len());
          for value in values {
            if !seen.insert(value.key()) {
              warn!(
                subject_id = %value.subject_id,
                attribute_id = %value.attribute_id,
                timestamp = %value.timestamp,
                "duplicate timed value in batch, skipping"
              );
              report.skipped += 1;
              continue;
            }
            let written = upsert.execute(rusqlite::params![
              encode_uuid(value.subject_id),
              encode_uuid(value.attribute_id),
              encode_ts(value.timestamp),
              value.value,
            ]);
            match written {
              Ok(_) => report.saved += 1,
              Err(e) => {
                warn!(
                  subject_id = %value.subject_id,
                  attribute_id = %value.attribute_id,
                  error = %e,
                  "could not save timed value, skipping"
                );
                report.skipped += 1;
              }
            }
          }
        }
        tx.commit()?;
        Ok(report)
      })
      .await?;

    debug!(saved = report.saved, skipped = report.skipped, "saved timed values");
    Ok(report)
  }

  async fn timed_values(&self, subject_id: Uuid, attribute_id: Uuid) -> Result<Vec<TimedValue>> {
    let subject_str = encode_uuid(subject_id);
    let attribute_str = encode_uuid(attribute_id);

    let raws: Vec<RawTimedValue> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT subject_id, attribute_id, timestamp, value FROM timed_values
           WHERE subject_id = ?1 AND attribute_id = ?2
           ORDER BY timestamp ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![subject_str, attribute_str], RawTimedValue::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTimedValue::into_timed_value).collect()
  }

  async fn latest_timed_value(
    &self,
    subject_id: Uuid,
    attribute_id: Uuid,
  ) -> Result<Option<TimedValue>> {
    let subject_str = encode_uuid(subject_id);
    let attribute_str = encode_uuid(attribute_id);

    let raw: Option<RawTimedValue> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT subject_id, attribute_id, timestamp, value FROM timed_values
             WHERE subject_id = ?1 AND attribute_id = ?2
             ORDER BY timestamp DESC, rowid DESC
             LIMIT 1",
            rusqlite::params![subject_str, attribute_str],
            RawTimedValue::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawTimedValue::into_timed_value).transpose()
  }

  async fn save_fixed_values(&self, values: Vec<FixedValue>) -> Result<SaveReport> {
    let report = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut report = SaveReport::default();
        {
          let mut insert = tx.prepare(
            "INSERT OR IGNORE INTO fixed_values (subject_id, attribute_id, value)
             VALUES (?1, ?2, ?3)",
          )?;
          for value in values {
            let written = insert.execute(rusqlite::params![
              encode_uuid(value.subject_id),
              encode_uuid(value.attribute_id),
              value.value,
            ]);
            match written {
              Ok(1) => report.saved += 1,
              Ok(_) => report.skipped += 1,
              Err(e) => {
                warn!(
                  subject_id = %value.subject_id,
                  attribute_id = %value.attribute_id,
                  error = %e,
                  "could not save fixed value, skipping"
                );
                report.skipped += 1;
              }
            }
          }
        }
        tx.commit()?;
        Ok(report)
      })
      .await?;

    debug!(saved = report.saved, skipped = report.skipped, "saved fixed values");
    Ok(report)
  }

  async fn fixed_values(&self, subject_id: Uuid, attribute_id: Uuid) -> Result<Vec<FixedValue>> {
    let subject_str = encode_uuid(subject_id);
    let attribute_str = encode_uuid(attribute_id);

    let raws: Vec<RawFixedValue> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT subject_id, attribute_id, value FROM fixed_values
           WHERE subject_id = ?1 AND attribute_id = ?2
           ORDER BY value",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![subject_str, attribute_str], |row| {
            Ok(RawFixedValue {
              subject_id:   row.get(0)?,
              attribute_id: row.get(1)?,
              value:        row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFixedValue::into_fixed_value).collect()
  }

  // ── Journal ───────────────────────────────────────────────────────────────

  async fn journal_has_entry<'a>(&'a self, entry: &'a JournalEntry) -> Result<bool> {
    let importer = entry.importer.clone();
    let key = entry.key.clone();

    let exists = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT 1 FROM journal_entries WHERE importer = ?1 AND key = ?2",
            rusqlite::params![importer, key],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false))
      })
      .await?;
    Ok(exists)
  }

  async fn add_journal_entry<'a>(&'a self, entry: &'a JournalEntry) -> Result<()> {
    let importer = entry.importer.clone();
    let key = entry.key.clone();
    let at = now();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO journal_entries (importer, key, recorded_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![importer, key, at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  async fn clear_all(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(
          "BEGIN;
           DELETE FROM timed_values;
           DELETE FROM fixed_values;
           DELETE FROM subjects;
           DELETE FROM subject_types;
           DELETE FROM attributes;
           DELETE FROM providers;
           DELETE FROM journal_entries;
           COMMIT;",
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
