//! # Sector index
//!
//! The serialized build artifact: one JSON document mapping each surviving
//! sector to its file, centroid, and population, plus global build
//! metadata.
//!
//! ## Overview
//! -----------------
//! A [`SectorIndex`] is written once per build and never patched in place.
//! Sector entries live in a [`BTreeMap`] so identical builds serialize the
//! sector set in identical (name) order. The index is written with
//! [`write_atomic`](SectorIndex::write_atomic): the document goes to a
//! temporary file in the destination directory and is renamed over the
//! final path, so a crashed build can never leave a truncated index behind
//! for a reader to trip on.
//!
//! Every `filename` in [`sectors`](SectorIndex::sectors) is relative to the
//! database root. Readers must treat a missing referenced file as a
//! non-fatal per-sector condition; only a missing or unparsable index is
//! structural.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::sector_errors::SectorDbError;
use crate::system_record::Coords;

/// Index entry for one surviving sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorIndexEntry {
    /// Sector file name relative to the database root.
    pub filename: String,
    /// Final member count, including nearest-centroid assignments.
    pub system_count: u64,
    /// Coordinate-wise mean of the member records.
    pub center: Coords,
}

/// Global metadata describing one build run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Records parsed successfully across all shards.
    pub total_systems: u64,
    /// Surviving sectors materialized in the index.
    pub total_sectors: usize,
    pub min_systems_per_sector: u64,
    /// Records written during the standard streaming pass.
    pub standard_systems: u64,
    /// Records routed through nearest-centroid assignment.
    pub non_standard_systems: u64,
    /// Records lost to undersized sectors (accounted, not silently dropped).
    pub dropped_below_threshold: u64,
    /// Malformed input lines skipped during the build.
    pub skipped_lines: u64,
    /// Shard file names the build consumed.
    pub source_files: Vec<String>,
    pub created_at: String,
}

/// The sector database index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorIndex {
    pub metadata: IndexMetadata,
    pub sectors: BTreeMap<String, SectorIndexEntry>,
}

impl SectorIndex {
    /// Load an index document from `path`.
    ///
    /// Return
    /// ----------
    /// * [`SectorDbError::IndexNotFound`] when no file exists at `path`.
    /// * [`SectorDbError::CorruptIndex`] when the file cannot be parsed.
    pub fn load(path: &Utf8Path) -> Result<Self, SectorDbError> {
        if !path.exists() {
            return Err(SectorDbError::IndexNotFound(path.to_string()));
        }
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            SectorDbError::CorruptIndex {
                path: path.to_string(),
                source,
            }
        })
    }

    /// Write the index to `path` via write-then-rename.
    ///
    /// The document is serialized to `<path>.tmp` in the same directory and
    /// renamed over `path` once fully flushed, so concurrent readers either
    /// see the previous index or the complete new one.
    pub fn write_atomic(&self, path: &Utf8Path) -> Result<(), SectorDbError> {
        let tmp = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Names of all indexed sectors, in stable (sorted) order.
    pub fn sector_names(&self) -> impl Iterator<Item = &str> {
        self.sectors.keys().map(String::as_str)
    }

    /// Index entry for `sector`, if present.
    pub fn get(&self, sector: &str) -> Option<&SectorIndexEntry> {
        self.sectors.get(sector)
    }

    /// Sum of the final member counts of all indexed sectors.
    pub fn total_indexed_systems(&self) -> u64 {
        self.sectors.values().map(|e| e.system_count).sum()
    }
}

/// Sanitized file name (without extension) for a sector label.
///
/// Spaces, path separators, and drive separators become underscores, so any
/// label the name parser can produce maps to a plain file name.
pub fn sector_file_stem(sector: &str) -> String {
    sector.replace([' ', '/', '\\', ':'], "_")
}

/// Uncompressed sector file name for a sector label.
pub fn sector_filename(sector: &str) -> String {
    format!("{}.{}", sector_file_stem(sector), crate::constants::SECTOR_FILE_EXT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn filename_sanitizes_separators() {
        assert_eq!(sector_filename("Hypoae Aihm"), "Hypoae_Aihm.jsonl");
        assert_eq!(sector_filename("A/B\\C:D"), "A_B_C_D.jsonl");
    }

    #[test]
    fn write_atomic_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("sector_index.json")).unwrap();

        let mut index = SectorIndex::default();
        index.metadata.total_systems = 12;
        index.metadata.total_sectors = 1;
        index.sectors.insert(
            "Foo".to_owned(),
            SectorIndexEntry {
                filename: sector_filename("Foo"),
                system_count: 12,
                center: Coords::new(1.0, 2.0, 3.0),
            },
        );

        index.write_atomic(&path).unwrap();
        let loaded = SectorIndex::load(&path).unwrap();
        assert_eq!(loaded, index);
        // No temporary file left behind.
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn load_missing_index_is_structural() {
        let err = SectorIndex::load(Utf8Path::new("/nonexistent/sector_index.json")).unwrap_err();
        assert!(matches!(err, SectorDbError::IndexNotFound(_)));
    }

    #[test]
    fn load_corrupt_index_is_structural() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("sector_index.json")).unwrap();
        std::fs::write(&path, b"{ not json").unwrap();
        let err = SectorIndex::load(&path).unwrap_err();
        assert!(matches!(err, SectorDbError::CorruptIndex { .. }));
    }
}
