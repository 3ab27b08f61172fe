//! # Catalog records
//!
//! Core data model for a single star system as it appears on a catalog
//! shard: a name, optional galactic coordinates, and an opaque payload of
//! every other field the producer wrote.
//!
//! ## Overview
//! -----------------
//! A [`SystemRecord`] is one line of newline-delimited JSON. The crate only
//! interprets `name` and `coords`; all remaining fields are carried through
//! a flattened map so downstream consumers (rule engines, clustering,
//! enrichment pipelines) see exactly what the producer wrote.
//!
//! Records are immutable once read. Coordinates may be absent; such records
//! are readable but take part in no distance computation and are routed to
//! the reserved [`UNKNOWN_SECTOR`](crate::constants::UNKNOWN_SECTOR) during
//! nearest-centroid assignment.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Galactic position in light years.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coords {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// View as a [`Vector3`] for linear-algebra operations.
    #[inline]
    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Squared Euclidean distance to `other`.
    ///
    /// Used on hot paths where the comparison can be done against a squared
    /// radius, avoiding the square root.
    #[inline]
    pub fn squared_distance_to(&self, other: &Coords) -> f64 {
        (self.as_vector() - other.as_vector()).norm_squared()
    }

    /// Euclidean distance to `other` in light years.
    #[inline]
    pub fn distance_to(&self, other: &Coords) -> f64 {
        (self.as_vector() - other.as_vector()).norm()
    }
}

impl From<Vector3<f64>> for Coords {
    fn from(v: Vector3<f64>) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

/// A single star system record from a catalog shard.
///
/// Fields
/// -----------------
/// * `name` – System name; drives sector assignment via
///   [`parse_system_name`](crate::name_parser::parse_system_name).
/// * `coords` – Optional galactic position.
/// * `extra` – Every other field of the source JSON object, preserved
///   verbatim through serde flattening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<Coords>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SystemRecord {
    /// Parse one newline-delimited JSON line into a record.
    ///
    /// Return
    /// ----------
    /// * The parsed record, or the underlying serde error for the caller to
    ///   count as a skipped line.
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Serialize back to a single JSON line (no trailing newline).
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrip_preserves_extra_fields() {
        let line = r#"{"name":"Sol","coords":{"x":0.0,"y":0.0,"z":0.0},"population":123}"#;
        let record = SystemRecord::from_json_line(line).unwrap();
        assert_eq!(record.name, "Sol");
        assert_eq!(record.coords, Some(Coords::new(0.0, 0.0, 0.0)));
        assert_eq!(record.extra["population"], 123);

        let out = record.to_json_line().unwrap();
        let back = SystemRecord::from_json_line(&out).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn record_without_coords_parses() {
        let record = SystemRecord::from_json_line(r#"{"name":"Barnard's Star"}"#).unwrap();
        assert!(record.coords.is_none());
    }

    #[test]
    fn squared_distance_matches_distance() {
        let a = Coords::new(1.0, 2.0, 3.0);
        let b = Coords::new(4.0, 6.0, 3.0);
        assert_eq!(a.distance_to(&b), 5.0);
        assert_eq!(a.squared_distance_to(&b), 25.0);
    }
}
