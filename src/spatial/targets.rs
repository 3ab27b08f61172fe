//! # Target file parsing
//!
//! Target points arrive as operator-exported tabular files in a zoo of
//! close-but-not-identical shapes: comma or tab delimited, coordinate
//! columns named `x` / `coord_x` / `pos_x` / `galactic_x`, name columns
//! named `system_name` / `star_system` / `systemname`. This module
//! normalizes all of that into a [`TargetSet`].
//!
//! Parsing is forgiving per row and strict per file: rows with missing or
//! non-numeric coordinates are skipped (counted, warned), but a file with
//! no usable coordinate columns or no valid rows at all is a structural
//! error – prefiltering against zero targets would silently select
//! nothing.

use std::fs::File;
use std::io::{BufRead, BufReader};

use camino::Utf8Path;
use csv::StringRecord;
use itertools::Itertools;
use tracing::{debug, warn};

use crate::constants::LightYear;
use crate::sector_errors::SectorDbError;
use crate::system_record::Coords;

/// Column-name synonyms for the system name, lowercase.
const NAME_SYNONYMS: &[&str] = &[
    "name",
    "system_name",
    "system",
    "star_system",
    "systemname",
    "starname",
];

const X_SYNONYMS: &[&str] = &["x", "coord_x", "x_coord", "pos_x", "position_x", "x_ly", "galactic_x"];
const Y_SYNONYMS: &[&str] = &["y", "coord_y", "y_coord", "pos_y", "position_y", "y_ly", "galactic_y"];
const Z_SYNONYMS: &[&str] = &["z", "coord_z", "z_coord", "pos_z", "position_z", "z_ly", "galactic_z"];

/// One target point: a position, optionally labeled.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPoint {
    pub name: Option<String>,
    pub coords: Coords,
}

/// The parsed targets of one tabular file.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSet {
    targets: Vec<TargetPoint>,
    /// Rows dropped for missing or non-numeric coordinates.
    pub skipped_rows: u64,
}

impl TargetSet {
    /// Build a set from in-memory points (tests, programmatic callers).
    pub fn from_points(targets: Vec<TargetPoint>) -> Self {
        Self {
            targets,
            skipped_rows: 0,
        }
    }

    /// Parse a CSV or TSV target file.
    ///
    /// The delimiter is sniffed from the header line (tab wins when
    /// present), and columns are matched case-insensitively against the
    /// synonym lists, preferring exact matches, then `..._x`-style
    /// suffixes, then substrings.
    ///
    /// Return
    /// ----------
    /// * [`SectorDbError::MissingCoordinateColumns`] when no x/y/z columns
    ///   match.
    /// * [`SectorDbError::NoValidTargets`] when every row was dropped.
    pub fn from_path(path: &Utf8Path) -> Result<Self, SectorDbError> {
        let delimiter = sniff_delimiter(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let x_col = find_column(&headers, X_SYNONYMS, true);
        let y_col = find_column(&headers, Y_SYNONYMS, true);
        let z_col = find_column(&headers, Z_SYNONYMS, true);
        let name_col = find_column(&headers, NAME_SYNONYMS, false);

        let (Some(x_col), Some(y_col), Some(z_col)) = (x_col, y_col, z_col) else {
            return Err(SectorDbError::MissingCoordinateColumns {
                path: path.to_string(),
                available: headers.iter().join(", "),
            });
        };
        debug!(
            x = headers.get(x_col),
            y = headers.get(y_col),
            z = headers.get(z_col),
            name = name_col.and_then(|i| headers.get(i)),
            "detected target file columns"
        );

        let mut targets = Vec::new();
        let mut skipped_rows = 0u64;
        for (row_number, record) in reader.records().enumerate() {
            let record = record?;
            match parse_row(&record, x_col, y_col, z_col) {
                Some(coords) => {
                    let name = name_col
                        .and_then(|i| record.get(i))
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_owned);
                    targets.push(TargetPoint { name, coords });
                }
                None => {
                    warn!(row = row_number + 2, "skipping target row with invalid coordinates");
                    skipped_rows += 1;
                }
            }
        }

        if targets.is_empty() {
            return Err(SectorDbError::NoValidTargets(path.to_string()));
        }
        Ok(Self {
            targets,
            skipped_rows,
        })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TargetPoint> {
        self.targets.iter()
    }

    /// Squared distance from `coords` to the nearest target.
    ///
    /// `None` only for an empty set (never the case for a set built by
    /// [`from_path`](Self::from_path)).
    pub fn min_squared_distance(&self, coords: &Coords) -> Option<f64> {
        self.targets
            .iter()
            .map(|t| t.coords.squared_distance_to(coords))
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Whether `coords` lies within `range_ly` of any target (boundary
    /// inclusive).
    pub fn within_range(&self, coords: &Coords, range_ly: LightYear) -> bool {
        self.min_squared_distance(coords)
            .map(|d2| d2 <= range_ly * range_ly)
            .unwrap_or(false)
    }
}

/// Tab wins when the header line contains one, otherwise comma.
fn sniff_delimiter(path: &Utf8Path) -> Result<u8, SectorDbError> {
    let mut first_line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first_line)?;
    Ok(if first_line.contains('\t') { b'\t' } else { b',' })
}

/// Match one synonym list against the headers.
///
/// Exact (case-insensitive) matches win; for coordinate columns a
/// `..._x` / `... x` suffix match is tried next, and bare single-letter
/// synonyms never fall through to substring matching (`"x"` must not grab
/// a `"max_distance"` column).
fn find_column(headers: &StringRecord, synonyms: &[&str], coordinate: bool) -> Option<usize> {
    let lowered: Vec<String> = headers
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    for syn in synonyms {
        if let Some(i) = lowered.iter().position(|h| h == syn) {
            return Some(i);
        }
    }
    if coordinate {
        for syn in synonyms {
            if let Some(i) = lowered
                .iter()
                .position(|h| h.ends_with(&format!("_{syn}")) || h.ends_with(&format!(" {syn}")))
            {
                return Some(i);
            }
        }
    }
    for syn in synonyms {
        if syn.len() == 1 {
            continue;
        }
        if let Some(i) = lowered.iter().position(|h| h.contains(syn)) {
            return Some(i);
        }
    }
    None
}

fn parse_row(record: &StringRecord, x: usize, y: usize, z: usize) -> Option<Coords> {
    let field = |i: usize| record.get(i).map(str::trim).filter(|s| !s.is_empty());
    Some(Coords::new(
        field(x)?.parse().ok()?,
        field(y)?.parse().ok()?,
        field(z)?.parse().ok()?,
    ))
}
