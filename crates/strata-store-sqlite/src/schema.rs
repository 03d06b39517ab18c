//! SQL schema for the Strata SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS providers (
    label TEXT PRIMARY KEY,
    name  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subject_types (
    subject_type_id TEXT PRIMARY KEY,
    provider        TEXT NOT NULL REFERENCES providers(label),
    label           TEXT NOT NULL,
    name            TEXT NOT NULL,
    UNIQUE (provider, label)
);

-- Geometry is GeoJSON in SRID 4326; the bbox columns drive spatial prefilters.
CREATE TABLE IF NOT EXISTS subjects (
    subject_id      TEXT PRIMARY KEY,
    subject_type_id TEXT NOT NULL REFERENCES subject_types(subject_type_id),
    label           TEXT NOT NULL,
    name            TEXT NOT NULL,
    geometry        TEXT,
    min_x           REAL,
    min_y           REAL,
    max_x           REAL,
    max_y           REAL,
    UNIQUE (subject_type_id, label)
);

CREATE TABLE IF NOT EXISTS attributes (
    attribute_id TEXT PRIMARY KEY,
    provider     TEXT NOT NULL REFERENCES providers(label),
    label        TEXT NOT NULL,
    name         TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT '',
    kind         TEXT NOT NULL,   -- 'numeric' | 'string'
    UNIQUE (provider, label)
);

CREATE TABLE IF NOT EXISTS timed_values (
    subject_id   TEXT NOT NULL REFERENCES subjects(subject_id),
    attribute_id TEXT NOT NULL REFERENCES attributes(attribute_id),
    timestamp    TEXT NOT NULL,   -- fixed-width ISO 8601, sorts lexically
    value        REAL NOT NULL,
    PRIMARY KEY (subject_id, attribute_id, timestamp)
);

CREATE TABLE IF NOT EXISTS fixed_values (
    subject_id   TEXT NOT NULL REFERENCES subjects(subject_id),
    attribute_id TEXT NOT NULL REFERENCES attributes(attribute_id),
    value        TEXT NOT NULL,
    UNIQUE (subject_id, attribute_id, value)
);

CREATE TABLE IF NOT EXISTS journal_entries (
    importer    TEXT NOT NULL,
    key         TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (importer, key)
);

CREATE INDEX IF NOT EXISTS subjects_type_idx  ON subjects(subject_type_id);
CREATE INDEX IF NOT EXISTS subjects_label_idx ON subjects(label);

PRAGMA user_version = 1;
";
