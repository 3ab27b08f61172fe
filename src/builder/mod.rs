//! # Sector database builder
//!
//! End-to-end build orchestration: stream catalog shards once, write
//! standard-named records straight to their sector files, then place the
//! leftovers by nearest centroid and serialize the index.
//!
//! ## Build protocol
//! -----------------
//! 1. **Streaming pass** – every record with a usable sector label is
//!    appended to that sector's file through an LRU-capped handle cache
//!    while a [`SectorStatsAccumulator`] tracks per-sector counts and
//!    coordinate sums. Non-standard records are buffered raw (up to a
//!    configurable cap; beyond it the input is re-streamed later instead
//!    of growing the buffer).
//! 2. **Finalize** – centroids are computed for every sector that reached
//!    `min_systems_per_sector`; the files of undersized sectors are
//!    deleted so they never appear in the index.
//! 3. **Assignment pass** – each non-standard record goes to the surviving
//!    sector with the nearest centroid; records without coordinates go to
//!    the reserved [`UNKNOWN_SECTOR`](crate::constants::UNKNOWN_SECTOR).
//! 4. **Optional compression** – surviving sector files are re-written
//!    through gzip and the plain files removed.
//! 5. **Index write** – the [`SectorIndex`] is serialized atomically
//!    (write-then-rename), so a crash never leaves a truncated index.
//!
//! ## Contracts
//! -----------------
//! * Time is linear in total input size.
//! * Peak memory is O(#sectors + bounded non-standard buffer), never
//!   O(#records).
//! * Malformed lines are skipped and counted; a sector whose file cannot
//!   be opened is logged and excluded; only structural failures (missing
//!   input directory, unwritable output directory) abort the build.
//! * Long builds can be cancelled cooperatively: the signal is polled
//!   between shards and between sectors.

pub(crate) mod handle_cache;
mod progress;
pub mod shards;

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{info, warn};

use crate::constants::{
    SectorMap, DEFAULT_MAX_OPEN_FILES, DEFAULT_MIN_SYSTEMS_PER_SECTOR, DEFAULT_NON_STANDARD_CAP,
    SECTOR_INDEX_FILENAME, UNKNOWN_SECTOR,
};
use crate::index::{sector_filename, IndexMetadata, SectorIndex, SectorIndexEntry};
use crate::name_parser::sector_label;
use crate::sector_errors::SectorDbError;
use crate::sector_stats::{SectorCentroid, SectorCentroids, SectorStatsAccumulator};
use crate::system_record::{Coords, SystemRecord};

use handle_cache::SectorFileCache;
use progress::BuildProgress;

/// Configuration of one build run.
///
/// Constructed with [`BuilderConfig::new`] and adjusted through the
/// chainable `with_*` setters; defaults follow
/// [`constants`](crate::constants).
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub input_dir: Utf8PathBuf,
    pub output_dir: Utf8PathBuf,
    pub min_systems_per_sector: u64,
    /// Re-write surviving sector files through gzip after assignment.
    pub compress: bool,
    pub non_standard_cap: usize,
    pub max_open_files: usize,
}

impl BuilderConfig {
    pub fn new(input_dir: impl Into<Utf8PathBuf>, output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            min_systems_per_sector: DEFAULT_MIN_SYSTEMS_PER_SECTOR,
            compress: false,
            non_standard_cap: DEFAULT_NON_STANDARD_CAP,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
        }
    }

    pub fn with_min_systems(mut self, min_systems_per_sector: u64) -> Self {
        self.min_systems_per_sector = min_systems_per_sector;
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_non_standard_cap(mut self, cap: usize) -> Self {
        self.non_standard_cap = cap;
        self
    }

    pub fn with_max_open_files(mut self, max_open_files: usize) -> Self {
        self.max_open_files = max_open_files;
        self
    }
}

/// Counters reported at the end of a build.
///
/// All per-record anomalies end up here; none of them abort a build.
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    /// Records parsed successfully across all shards.
    pub total_systems: u64,
    /// Standard-named records written during the streaming pass.
    pub standard_written: u64,
    /// Non-standard records seen during the streaming pass.
    pub non_standard: u64,
    /// Non-standard records appended by nearest-centroid assignment.
    pub assigned: u64,
    /// Records without coordinates routed to the reserved Unknown sector.
    pub unknown_assigned: u64,
    /// Malformed or nameless input lines skipped.
    pub skipped_lines: u64,
    /// Records belonging to undersized sectors whose files were deleted.
    pub dropped_below_threshold: u64,
    /// Undersized sectors removed during finalize.
    pub dropped_sectors: u64,
    /// Sectors materialized in the final index.
    pub surviving_sectors: u64,
    /// Failed appends (sector open/write errors).
    pub write_errors: u64,
    pub elapsed: Duration,
}

impl std::fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "total systems:        {}", self.total_systems)?;
        writeln!(f, "standard written:     {}", self.standard_written)?;
        writeln!(f, "non-standard:         {}", self.non_standard)?;
        writeln!(f, "assigned by centroid: {}", self.assigned)?;
        writeln!(f, "assigned to Unknown:  {}", self.unknown_assigned)?;
        writeln!(f, "skipped lines:        {}", self.skipped_lines)?;
        writeln!(
            f,
            "dropped (< minimum):  {} records in {} sectors",
            self.dropped_below_threshold, self.dropped_sectors
        )?;
        writeln!(f, "surviving sectors:    {}", self.surviving_sectors)?;
        writeln!(f, "write errors:         {}", self.write_errors)?;
        write!(f, "elapsed:              {:.1}s", self.elapsed.as_secs_f64())
    }
}

/// A non-standard record buffered between the streaming and assignment
/// passes. The raw line is kept so the record lands on disk byte-identical
/// to its source.
struct BufferedRecord {
    line: String,
    coords: Option<Coords>,
}

struct StreamingPass {
    acc: SectorStatsAccumulator,
    buffered: Vec<BufferedRecord>,
    overflowed: bool,
    total_systems: u64,
    standard_written: u64,
    non_standard: u64,
    skipped_lines: u64,
    failed_sectors: HashSet<String>,
    write_errors: u64,
}

/// Orchestrates the multi-pass sector database build.
pub struct SectorBuilder {
    config: BuilderConfig,
}

impl SectorBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    /// Run the full build.
    pub fn build(&self) -> Result<BuildSummary, SectorDbError> {
        self.build_with_cancel(|| false)
    }

    /// Run the full build, polling `should_cancel` between shards and
    /// between sectors. A positive poll aborts with
    /// [`SectorDbError::Cancelled`]; already-written sector files are left
    /// behind (the next build regenerates everything).
    pub fn build_with_cancel<F>(&self, mut should_cancel: F) -> Result<BuildSummary, SectorDbError>
    where
        F: FnMut() -> bool,
    {
        let start = Instant::now();
        let shards = shards::discover_shards(&self.config.input_dir)?;
        fs::create_dir_all(&self.config.output_dir)?;
        info!(
            shards = shards.len(),
            output = %self.config.output_dir,
            "starting sector database build"
        );

        let mut pass = self.stream_standard(&shards, &mut should_cancel)?;

        let centroids = self.finalize_sectors(&mut pass)?;
        let (assigned_counts, assigned, unknown_assigned) =
            self.assign_non_standard(&shards, &mut pass, &centroids, &mut should_cancel)?;

        let compressed = if self.config.compress {
            self.compress_sectors(&centroids.survivors, unknown_assigned > 0, &mut should_cancel)?
        } else {
            HashSet::new()
        };

        let index = self.write_index(
            &shards,
            &pass,
            &centroids,
            &assigned_counts,
            unknown_assigned,
            &compressed,
        )?;

        let summary = BuildSummary {
            total_systems: pass.total_systems,
            standard_written: pass.standard_written,
            non_standard: pass.non_standard,
            assigned,
            unknown_assigned,
            skipped_lines: pass.skipped_lines,
            dropped_below_threshold: centroids.dropped_records(),
            dropped_sectors: centroids.dropped.len() as u64,
            surviving_sectors: index.sectors.len() as u64,
            write_errors: pass.write_errors,
            elapsed: start.elapsed(),
        };
        info!(
            sectors = summary.surviving_sectors,
            systems = summary.total_systems,
            elapsed_s = summary.elapsed.as_secs_f64(),
            "sector database build complete"
        );
        Ok(summary)
    }

    /// Pass 1: stream every shard, writing standard records to their
    /// sector files and buffering non-standard ones.
    fn stream_standard<F>(
        &self,
        shards: &[Utf8PathBuf],
        should_cancel: &mut F,
    ) -> Result<StreamingPass, SectorDbError>
    where
        F: FnMut() -> bool,
    {
        let mut cache = SectorFileCache::new(&self.config.output_dir, self.config.max_open_files);
        let mut pass = StreamingPass {
            acc: SectorStatsAccumulator::with_cap(self.config.non_standard_cap),
            buffered: Vec::new(),
            overflowed: false,
            total_systems: 0,
            standard_written: 0,
            non_standard: 0,
            skipped_lines: 0,
            failed_sectors: HashSet::new(),
            write_errors: 0,
        };
        let bar = BuildProgress::new(shards.len() as u64);

        for shard in shards {
            if should_cancel() {
                return Err(SectorDbError::Cancelled);
            }
            let reader = BufReader::new(File::open(shard)?);
            for line in reader.lines() {
                let line = line?;
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let record = match SystemRecord::from_json_line(trimmed) {
                    Ok(r) if !r.name.is_empty() => r,
                    _ => {
                        pass.skipped_lines += 1;
                        continue;
                    }
                };
                pass.total_systems += 1;

                match sector_label(&record.name) {
                    Some(sector) => {
                        if cache.append_line(sector, trimmed) {
                            pass.acc.record_standard(sector, record.coords.as_ref());
                            pass.standard_written += 1;
                        }
                    }
                    None => {
                        pass.non_standard += 1;
                        if pass.buffered.len() < self.config.non_standard_cap {
                            pass.buffered.push(BufferedRecord {
                                line: trimmed.to_owned(),
                                coords: record.coords,
                            });
                        } else {
                            pass.overflowed = true;
                        }
                    }
                }
            }
            bar.set_message(format!(
                "{} systems, {} sectors",
                pass.total_systems,
                pass.acc.sector_count()
            ));
            bar.inc();
        }
        bar.finish();

        cache.close_all();
        pass.failed_sectors = cache.failed_sectors().clone();
        pass.write_errors = cache.write_errors;
        info!(
            systems = pass.total_systems,
            standard = pass.standard_written,
            non_standard = pass.non_standard,
            sectors = pass.acc.sector_count(),
            skipped = pass.skipped_lines,
            "streaming pass complete"
        );
        Ok(pass)
    }

    /// Compute centroids, delete the files of undersized sectors, and drop
    /// sectors whose files failed during the streaming pass.
    fn finalize_sectors(
        &self,
        pass: &mut StreamingPass,
    ) -> Result<SectorCentroids, SectorDbError> {
        let mut centroids = pass.acc.finalize(self.config.min_systems_per_sector);

        for (name, _) in &centroids.dropped {
            let path = self.config.output_dir.join(sector_filename(name));
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(sector = %name, error = %e, "cannot delete undersized sector file"),
            }
        }

        if !pass.failed_sectors.is_empty() {
            centroids
                .survivors
                .retain(|s| !pass.failed_sectors.contains(&s.name));
        }
        info!(
            surviving = centroids.survivors.len(),
            dropped = centroids.dropped.len(),
            "sector centroids finalized"
        );
        Ok(centroids)
    }

    /// Pass 3: nearest-centroid assignment of the non-standard records.
    ///
    /// Uses the in-memory buffer when it held every non-standard record;
    /// otherwise re-streams the shards so the memory bound holds even on
    /// pathological inputs.
    fn assign_non_standard<F>(
        &self,
        shards: &[Utf8PathBuf],
        pass: &mut StreamingPass,
        centroids: &SectorCentroids,
        should_cancel: &mut F,
    ) -> Result<(SectorMap<u64>, u64, u64), SectorDbError>
    where
        F: FnMut() -> bool,
    {
        let mut cache = SectorFileCache::new(&self.config.output_dir, self.config.max_open_files);
        for sector in &centroids.survivors {
            cache.mark_existing(&sector.name);
        }

        let mut assigned_counts = SectorMap::<u64>::default();
        let mut assigned = 0u64;
        let mut unknown_assigned = 0u64;

        let mut assign_one = |line: &str,
                              coords: Option<&Coords>,
                              cache: &mut SectorFileCache| {
            match coords.and_then(|c| centroids.nearest(c)) {
                Some(sector) => {
                    if cache.append_line(&sector.name, line) {
                        *assigned_counts.entry(sector.name.clone()).or_insert(0) += 1;
                        assigned += 1;
                    }
                }
                None => {
                    if cache.append_line(UNKNOWN_SECTOR, line) {
                        unknown_assigned += 1;
                    }
                }
            }
        };

        if pass.overflowed {
            // The buffer did not hold every non-standard record: re-stream
            // the shards and assign as we go.
            pass.buffered.clear();
            let bar = BuildProgress::new(shards.len() as u64);
            for shard in shards {
                if should_cancel() {
                    return Err(SectorDbError::Cancelled);
                }
                let reader = BufReader::new(File::open(shard)?);
                for line in reader.lines() {
                    let line = line?;
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let Ok(record) = SystemRecord::from_json_line(trimmed) else {
                        continue;
                    };
                    if record.name.is_empty() || sector_label(&record.name).is_some() {
                        continue;
                    }
                    assign_one(trimmed, record.coords.as_ref(), &mut cache);
                }
                bar.inc();
            }
            bar.finish();
        } else {
            if should_cancel() {
                return Err(SectorDbError::Cancelled);
            }
            for record in &pass.buffered {
                assign_one(&record.line, record.coords.as_ref(), &mut cache);
            }
        }

        cache.close_all();
        pass.write_errors += cache.write_errors;
        info!(assigned, unknown = unknown_assigned, "assignment pass complete");
        Ok((assigned_counts, assigned, unknown_assigned))
    }

    /// Re-write surviving sector files through gzip, removing the plain
    /// files. A per-sector compression failure keeps that sector on its
    /// plain file; only the successfully compressed set is returned.
    fn compress_sectors<F>(
        &self,
        survivors: &[SectorCentroid],
        include_unknown: bool,
        should_cancel: &mut F,
    ) -> Result<HashSet<String>, SectorDbError>
    where
        F: FnMut() -> bool,
    {
        let mut compressed = HashSet::new();
        let names = survivors
            .iter()
            .map(|s| s.name.as_str())
            .chain(include_unknown.then_some(UNKNOWN_SECTOR));

        for name in names {
            if should_cancel() {
                return Err(SectorDbError::Cancelled);
            }
            let plain = self.config.output_dir.join(sector_filename(name));
            let gz = Utf8PathBuf::from(format!("{plain}.gz"));
            match compress_file(&plain, &gz) {
                Ok(()) => {
                    fs::remove_file(&plain)?;
                    compressed.insert(name.to_owned());
                }
                Err(e) => {
                    warn!(sector = %name, error = %e, "compression failed, keeping plain file");
                    let _ = fs::remove_file(&gz);
                }
            }
        }
        info!(compressed = compressed.len(), "compression pass complete");
        Ok(compressed)
    }

    fn write_index(
        &self,
        shards: &[Utf8PathBuf],
        pass: &StreamingPass,
        centroids: &SectorCentroids,
        assigned_counts: &SectorMap<u64>,
        unknown_assigned: u64,
        compressed: &HashSet<String>,
    ) -> Result<SectorIndex, SectorDbError> {
        let filename_for = |name: &str| {
            let plain = sector_filename(name);
            if compressed.contains(name) {
                format!("{plain}.gz")
            } else {
                plain
            }
        };

        let mut index = SectorIndex::default();
        for sector in &centroids.survivors {
            let extra = assigned_counts.get(&sector.name).copied().unwrap_or(0);
            index.sectors.insert(
                sector.name.clone(),
                SectorIndexEntry {
                    filename: filename_for(&sector.name),
                    system_count: sector.count + extra,
                    center: sector.center,
                },
            );
        }
        if unknown_assigned > 0 {
            // A catalog can legitimately contain a sector labeled like the
            // reserved one; both populations share the file and the entry.
            index
                .sectors
                .entry(UNKNOWN_SECTOR.to_owned())
                .and_modify(|e| e.system_count += unknown_assigned)
                .or_insert_with(|| SectorIndexEntry {
                    filename: filename_for(UNKNOWN_SECTOR),
                    system_count: unknown_assigned,
                    center: Coords::new(0.0, 0.0, 0.0),
                });
        }

        index.metadata = IndexMetadata {
            total_systems: pass.total_systems,
            total_sectors: index.sectors.len(),
            min_systems_per_sector: self.config.min_systems_per_sector,
            standard_systems: pass.standard_written,
            non_standard_systems: pass.non_standard,
            dropped_below_threshold: centroids.dropped_records(),
            skipped_lines: pass.skipped_lines,
            source_files: shards.iter().filter_map(|s| s.file_name()).map(str::to_owned).collect(),
            created_at: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };

        let index_path = self.config.output_dir.join(SECTOR_INDEX_FILENAME);
        index.write_atomic(&index_path)?;
        info!(index = %index_path, "sector index written");
        Ok(index)
    }
}

/// Stream-copy `src` into a gzip-compressed `dst`.
fn compress_file(src: &Utf8Path, dst: &Utf8Path) -> Result<(), std::io::Error> {
    let mut reader = BufReader::new(File::open(src)?);
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(dst)?), Compression::default());
    std::io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?.into_inner().map_err(|e| e.into_error())?;
    Ok(())
}
