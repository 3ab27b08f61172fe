//! # Constants and type definitions for SectorDb
//!
//! This module centralizes the **tuning defaults**, **reserved names**, and **common type
//! definitions** used throughout the `sectordb` library.
//!
//! ## Overview
//!
//! - Default thresholds for the sector build (minimum sector population,
//!   non-standard buffer capacity, open-handle budget)
//! - Reserved sector and file names
//! - Core type aliases used across the crate
//!
//! These definitions are used by all main modules, including the builder,
//! the indexed reader, and the spatial prefilter.

use std::collections::HashMap;

// -------------------------------------------------------------------------------------------------
// Reserved names
// -------------------------------------------------------------------------------------------------

/// File name of the serialized sector index, stored alongside the sector files.
pub const SECTOR_INDEX_FILENAME: &str = "sector_index.json";

/// Reserved sector receiving non-standard records that carry no coordinates.
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// Extension of uncompressed sector files and input catalog shards.
pub const SECTOR_FILE_EXT: &str = "jsonl";

// -------------------------------------------------------------------------------------------------
// Build tuning defaults
// -------------------------------------------------------------------------------------------------

/// Minimum member count for a sector to be materialized in the index.
pub const DEFAULT_MIN_SYSTEMS_PER_SECTOR: u64 = 10;

/// Capacity of the in-memory buffer holding non-standard records between passes.
///
/// Inputs with more non-standard records than this are re-streamed from the
/// source shards during the assignment pass instead of being held in memory.
pub const DEFAULT_NON_STANDARD_CAP: usize = 10_000;

/// Upper bound on simultaneously open sector file handles during a build.
pub const DEFAULT_MAX_OPEN_FILES: usize = 512;

/// Default worker count for parallel sector reads.
pub const DEFAULT_READER_WORKERS: usize = 4;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Distance expressed in light years.
pub type LightYear = f64;

/// Fast hash map keyed by sector name, used for all hot per-sector lookups.
pub type SectorMap<V> = HashMap<String, V, ahash::RandomState>;
