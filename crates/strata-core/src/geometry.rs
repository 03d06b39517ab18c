//! Subject geometry and the spatial predicates the field engine relies on.
//!
//! Geometries use the GeoJSON object layout so they serialise straight into
//! exported features. Coordinates are `[longitude, latitude]` in SRID 4326;
//! distances are therefore expressed in degrees.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Fixed spatial reference system for every stored geometry.
pub const SRID: u32 = 4326;

/// Tolerance used for on-boundary tests.
const EPSILON: f64 = 1e-12;

/// A `[x, y]` coordinate pair.
pub type Position = [f64; 2];

// ─── Geometry ────────────────────────────────────────────────────────────────

/// A point or (multi)polygon in GeoJSON layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
  Point { coordinates: Position },
  /// Exterior ring followed by zero or more holes.
  Polygon { coordinates: Vec<Vec<Position>> },
  MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
}

/// Axis-aligned bounding box, used to prefilter spatial queries in SQL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub min_x: f64,
  pub min_y: f64,
  pub max_x: f64,
  pub max_y: f64,
}

impl BoundingBox {
  /// Grow the box by `margin` on every side.
  pub fn expand(self, margin: f64) -> Self {
    Self {
      min_x: self.min_x - margin,
      min_y: self.min_y - margin,
      max_x: self.max_x + margin,
      max_y: self.max_y + margin,
    }
  }
}

impl Geometry {
  pub fn point(x: f64, y: f64) -> Self { Self::Point { coordinates: [x, y] } }

  /// A closed axis-aligned rectangle; handy for tests and fixtures.
  pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
    Self::Polygon {
      coordinates: vec![vec![
        [min_x, min_y],
        [max_x, min_y],
        [max_x, max_y],
        [min_x, max_y],
        [min_x, min_y],
      ]],
    }
  }

  /// Reject geometries the predicates cannot reason about: empty rings and
  /// non-finite coordinates.
  pub fn validate(&self) -> Result<()> {
    if self.vertices().any(|p| !p[0].is_finite() || !p[1].is_finite()) {
      return Err(Error::InvalidGeometry("non-finite coordinate".into()));
    }
    for polygon in self.polygons() {
      match polygon.first() {
        Some(exterior) if exterior.len() >= 3 => {}
        _ => {
          return Err(Error::InvalidGeometry(
            "polygon exterior ring needs at least three positions".into(),
          ));
        }
      }
    }
    if matches!(self, Self::MultiPolygon { coordinates } if coordinates.is_empty()) {
      return Err(Error::InvalidGeometry("empty multipolygon".into()));
    }
    Ok(())
  }

  /// Polygons making up this geometry; empty for a point.
  fn polygons(&self) -> Vec<&[Vec<Position>]> {
    match self {
      Self::Point { .. } => Vec::new(),
      Self::Polygon { coordinates } => vec![coordinates.as_slice()],
      Self::MultiPolygon { coordinates } => {
        coordinates.iter().map(Vec::as_slice).collect()
      }
    }
  }

  /// Every exterior-ring vertex (or the point itself).
  pub fn vertices(&self) -> Box<dyn Iterator<Item = Position> + '_> {
    match self {
      Self::Point { coordinates } => Box::new(std::iter::once(*coordinates)),
      Self::Polygon { coordinates } => {
        Box::new(coordinates.iter().take(1).flatten().copied())
      }
      Self::MultiPolygon { coordinates } => Box::new(
        coordinates
          .iter()
          .flat_map(|polygon| polygon.iter().take(1))
          .flatten()
          .copied(),
      ),
    }
  }

  /// All ring edges, holes included.
  fn segments(&self) -> Vec<(Position, Position)> {
    self
      .polygons()
      .into_iter()
      .flatten()
      .flat_map(|ring| ring.windows(2).map(|w| (w[0], w[1])))
      .collect()
  }

  pub fn bbox(&self) -> BoundingBox {
    let mut bbox = BoundingBox {
      min_x: f64::INFINITY,
      min_y: f64::INFINITY,
      max_x: f64::NEG_INFINITY,
      max_y: f64::NEG_INFINITY,
    };
    for [x, y] in self.vertices() {
      bbox.min_x = bbox.min_x.min(x);
      bbox.min_y = bbox.min_y.min(y);
      bbox.max_x = bbox.max_x.max(x);
      bbox.max_y = bbox.max_y.max(y);
    }
    bbox
  }

  /// Boundary-inclusive point test. Points inside a hole are outside.
  pub fn contains_point(&self, p: Position) -> bool {
    match self {
      Self::Point { coordinates } => distance(*coordinates, p) <= EPSILON,
      _ => self.polygons().into_iter().any(|rings| {
        let Some((exterior, holes)) = rings.split_first() else {
          return false;
        };
        ring_position(exterior, p) != RingPosition::Outside
          && holes
            .iter()
            .all(|hole| ring_position(hole, p) != RingPosition::Inside)
      }),
    }
  }

  /// `true` when every vertex of `other` lies inside or on the boundary of
  /// `self`.
  pub fn contains(&self, other: &Geometry) -> bool {
    let mut vertices = other.vertices().peekable();
    vertices.peek().is_some() && vertices.all(|p| self.contains_point(p))
  }

  /// Planar distance between two geometries; zero when they overlap.
  pub fn distance(&self, other: &Geometry) -> f64 {
    if other.vertices().any(|p| self.contains_point(p))
      || self.vertices().any(|p| other.contains_point(p))
    {
      return 0.0;
    }
    let forward = other
      .vertices()
      .map(|p| self.distance_to_point(p))
      .fold(f64::INFINITY, f64::min);
    let backward = self
      .vertices()
      .map(|p| other.distance_to_point(p))
      .fold(f64::INFINITY, f64::min);
    forward.min(backward)
  }

  fn distance_to_point(&self, p: Position) -> f64 {
    match self {
      Self::Point { coordinates } => distance(*coordinates, p),
      _ => self
        .segments()
        .into_iter()
        .map(|(a, b)| segment_distance(p, a, b))
        .fold(f64::INFINITY, f64::min),
    }
  }
}

// ─── Planar helpers ──────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum RingPosition {
  Inside,
  Boundary,
  Outside,
}

fn ring_position(ring: &[Position], p: Position) -> RingPosition {
  if ring.windows(2).any(|w| on_segment(p, w[0], w[1])) {
    return RingPosition::Boundary;
  }
  // Ray casting towards +x. A closed ring repeats its first vertex, which
  // only adds a zero-length edge.
  let mut inside = false;
  let n = ring.len();
  for i in 0..n {
    let a = ring[i];
    let b = ring[(i + n - 1) % n];
    if (a[1] > p[1]) != (b[1] > p[1]) {
      let x = (b[0] - a[0]) * (p[1] - a[1]) / (b[1] - a[1]) + a[0];
      if p[0] < x {
        inside = !inside;
      }
    }
  }
  if inside { RingPosition::Inside } else { RingPosition::Outside }
}

fn on_segment(p: Position, a: Position, b: Position) -> bool {
  let cross = (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0]);
  cross.abs() <= EPSILON
    && p[0] >= a[0].min(b[0]) - EPSILON
    && p[0] <= a[0].max(b[0]) + EPSILON
    && p[1] >= a[1].min(b[1]) - EPSILON
    && p[1] <= a[1].max(b[1]) + EPSILON
}

fn distance(a: Position, b: Position) -> f64 {
  (a[0] - b[0]).hypot(a[1] - b[1])
}

fn segment_distance(p: Position, a: Position, b: Position) -> f64 {
  let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
  let len2 = dx * dx + dy * dy;
  if len2 == 0.0 {
    return distance(p, a);
  }
  let t = (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / len2).clamp(0.0, 1.0);
  distance(p, [a[0] + t * dx, a[1] + t * dy])
}
