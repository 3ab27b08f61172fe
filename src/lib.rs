//! # SectorDb: sector-partitioned star catalog store
//!
//! `sectordb` partitions a large catalog of star system records into named,
//! file-backed spatial buckets ("sectors"), indexes each bucket's location
//! and centroid, and uses that index to answer *"which records lie within
//! radius R of these target points"* without scanning the whole catalog.
//!
//! ## Pipeline
//! -----------------
//! 1. [`builder::SectorBuilder`] streams raw catalog shards once, writing
//!    records with a parseable sector label straight to per-sector JSONL
//!    files while [`sector_stats::SectorStatsAccumulator`] tracks running
//!    counts and coordinate sums.
//! 2. Undersized sectors are dropped, centroids finalized, and the
//!    remaining non-standard records placed by nearest centroid.
//! 3. The resulting [`index::SectorIndex`] is written atomically next to
//!    the sector files.
//! 4. [`reader::IndexedDatabaseReader`] streams records back out,
//!    sequentially or through a bounded worker pool.
//! 5. [`spatial::prefilter::SpatialPrefilter`] restricts a scan to the
//!    sectors (and optionally records) within range of a set of
//!    [`spatial::targets::TargetPoint`]s.
//!
//! ## Memory model
//! -----------------
//! The build is streaming end to end: peak memory is proportional to the
//! number of sectors plus a bounded buffer of non-standard records, never
//! to the catalog size. Readers decode sector files line by line, plain or
//! gzip-compressed.
//!
//! ## Errors
//! -----------------
//! Per-record anomalies (malformed lines, unparseable names, missing
//! sector files) are counted and reported through summary statistics;
//! only structural failures (missing input directory, corrupt index,
//! unwritable output) surface as [`SectorDbError`].

pub mod builder;
pub mod constants;
pub mod index;
pub mod name_parser;
pub mod reader;
pub mod sector_errors;
pub mod sector_stats;
pub mod spatial;
pub mod system_record;

pub use builder::{BuildSummary, BuilderConfig, SectorBuilder};
pub use index::{SectorIndex, SectorIndexEntry};
pub use name_parser::{parse_system_name, ParsedName};
pub use reader::IndexedDatabaseReader;
pub use sector_errors::SectorDbError;
pub use sector_stats::SectorStatsAccumulator;
pub use spatial::prefilter::{PrefilterParams, SpatialPrefilter};
pub use spatial::targets::{TargetPoint, TargetSet};
pub use system_record::{Coords, SystemRecord};
