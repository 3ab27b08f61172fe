//! # Indexed database reader
//!
//! Loads a [`SectorIndex`] and streams records back out of the sector
//! files it references, sequentially or through a bounded worker pool.
//!
//! ## Overview
//! -----------------
//! Construction fails only on a **structural** problem: a missing or
//! unparsable index. Everything else degrades per sector – an index entry
//! whose file has gone missing is logged and read as an empty sequence,
//! and malformed lines inside a sector file are skipped and counted.
//!
//! [`read_sector`](IndexedDatabaseReader::read_sector) returns a lazy,
//! finite, restartable iterator: each call re-opens the file and decodes
//! line by line, so callers can re-scan a sector without holding records
//! in memory. Compressed (`.gz`) and plain sector files are detected by
//! suffix, with a fallback probe for databases compressed (or expanded)
//! after the index was written.
//!
//! [`read_sectors_parallel`](IndexedDatabaseReader::read_sectors_parallel)
//! fans sector reads out across a bounded worker pool and yields records
//! as each sector completes: order **across** sectors is unspecified,
//! order **within** one sector is the on-disk order.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::MultiGzDecoder;
use tracing::{debug, warn};

use crate::constants::SECTOR_INDEX_FILENAME;
use crate::index::{SectorIndex, SectorIndexEntry};
use crate::sector_errors::SectorDbError;
use crate::system_record::SystemRecord;

/// Reader over a built sector database.
#[derive(Debug, Clone)]
pub struct IndexedDatabaseReader {
    database_path: Utf8PathBuf,
    index: SectorIndex,
}

/// Shape of a loaded database, for operator-facing reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderStatistics {
    pub total_sectors: usize,
    pub total_systems: u64,
    pub database_path: Utf8PathBuf,
}

impl IndexedDatabaseReader {
    /// Open the database rooted at `database_path`, expecting the index at
    /// its default location inside that directory.
    pub fn load(database_path: impl AsRef<Utf8Path>) -> Result<Self, SectorDbError> {
        let database_path = database_path.as_ref();
        Self::load_with_index(database_path, &database_path.join(SECTOR_INDEX_FILENAME))
    }

    /// Open the database with an explicit index location.
    ///
    /// Return
    /// ----------
    /// * [`SectorDbError::IndexNotFound`] / [`SectorDbError::CorruptIndex`]
    ///   when the index cannot be loaded – structural, nothing is readable
    ///   without it.
    pub fn load_with_index(
        database_path: impl AsRef<Utf8Path>,
        index_path: &Utf8Path,
    ) -> Result<Self, SectorDbError> {
        let index = SectorIndex::load(index_path)?;
        Ok(Self {
            database_path: database_path.as_ref().to_owned(),
            index,
        })
    }

    pub fn index(&self) -> &SectorIndex {
        &self.index
    }

    /// Names of all indexed sectors, in stable (sorted) order.
    pub fn sector_names(&self) -> Vec<&str> {
        self.index.sector_names().collect()
    }

    /// Index entry for `sector`, if present.
    pub fn sector_info(&self, sector: &str) -> Option<&SectorIndexEntry> {
        self.index.get(sector)
    }

    pub fn statistics(&self) -> ReaderStatistics {
        ReaderStatistics {
            total_sectors: self.index.sectors.len(),
            total_systems: self.index.total_indexed_systems(),
            database_path: self.database_path.clone(),
        }
    }

    /// Resolve the on-disk file for `sector`, probing the compressed
    /// variant when the indexed name is absent (and vice versa).
    pub fn resolve_sector_file(&self, sector: &str) -> Option<Utf8PathBuf> {
        let entry = self.index.get(sector)?;
        let indexed = self.database_path.join(&entry.filename);
        if indexed.exists() {
            return Some(indexed);
        }
        let alternate = match indexed.as_str().strip_suffix(".gz") {
            Some(plain) => Utf8PathBuf::from(plain),
            None => Utf8PathBuf::from(format!("{indexed}.gz")),
        };
        alternate.exists().then_some(alternate)
    }

    /// Stream every record of `sector`.
    ///
    /// Lazy and restartable: the file is opened on the first `next()` call
    /// of each returned iterator. An unknown sector name or a missing
    /// sector file logs a warning and yields nothing; malformed lines are
    /// skipped and counted on the iterator.
    pub fn read_sector(&self, sector: &str) -> SectorIter {
        let path = match self.index.get(sector) {
            None => {
                warn!(sector, "sector not present in index");
                None
            }
            Some(_) => match self.resolve_sector_file(sector) {
                Some(path) => Some(path),
                None => {
                    warn!(sector, "sector file missing, yielding no records");
                    None
                }
            },
        };
        SectorIter::new(sector.to_owned(), path)
    }

    /// Read several sectors through a bounded worker pool.
    ///
    /// Arguments
    /// -----------------
    /// * `sectors`: Sector names to read; unknown names and missing files
    ///   are skipped with a warning, like [`read_sector`](Self::read_sector).
    /// * `workers`: Pool size (clamped to at least 1 and at most the
    ///   sector count).
    ///
    /// Return
    /// ----------
    /// * An iterator yielding records as each sector's read completes.
    ///   **No ordering across sectors**; within one sector the on-disk
    ///   order is preserved.
    pub fn read_sectors_parallel<S: AsRef<str>>(
        &self,
        sectors: &[S],
        workers: usize,
    ) -> ParallelSectorIter {
        let jobs: Vec<(String, Option<Utf8PathBuf>)> = sectors
            .iter()
            .map(|s| {
                let name = s.as_ref().to_owned();
                let path = match self.index.get(&name) {
                    None => {
                        warn!(sector = %name, "sector not present in index");
                        None
                    }
                    Some(_) => {
                        let path = self.resolve_sector_file(&name);
                        if path.is_none() {
                            warn!(sector = %name, "sector file missing, yielding no records");
                        }
                        path
                    }
                };
                (name, path)
            })
            .collect();
        ParallelSectorIter::spawn(jobs, workers)
    }
}

enum SectorIterState {
    /// Not yet opened; holds the resolved path (`None` for a known-absent
    /// file, which yields an empty sequence).
    Pending(Option<Utf8PathBuf>),
    Reading(std::io::Lines<BufReader<Box<dyn Read + Send>>>),
    Done,
}

/// Lazy line-by-line record stream over one sector file.
pub struct SectorIter {
    sector: String,
    state: SectorIterState,
    /// Malformed lines skipped so far.
    pub skipped_lines: u64,
}

impl SectorIter {
    fn new(sector: String, path: Option<Utf8PathBuf>) -> Self {
        Self {
            sector,
            state: SectorIterState::Pending(path),
            skipped_lines: 0,
        }
    }
}

impl Iterator for SectorIter {
    type Item = SystemRecord;

    fn next(&mut self) -> Option<SystemRecord> {
        loop {
            match &mut self.state {
                SectorIterState::Pending(path) => {
                    let Some(path) = path.take() else {
                        self.state = SectorIterState::Done;
                        return None;
                    };
                    match open_sector_reader(&path) {
                        Ok(reader) => self.state = SectorIterState::Reading(reader.lines()),
                        Err(e) => {
                            warn!(sector = %self.sector, error = %e, "cannot open sector file");
                            self.state = SectorIterState::Done;
                            return None;
                        }
                    }
                }
                SectorIterState::Reading(lines) => match lines.next() {
                    None => {
                        self.state = SectorIterState::Done;
                        return None;
                    }
                    Some(Err(e)) => {
                        warn!(sector = %self.sector, error = %e, "read error, truncating sector stream");
                        self.state = SectorIterState::Done;
                        return None;
                    }
                    Some(Ok(line)) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match SystemRecord::from_json_line(trimmed) {
                            Ok(record) => return Some(record),
                            Err(e) => {
                                debug!(sector = %self.sector, error = %e, "skipping malformed line");
                                self.skipped_lines += 1;
                            }
                        }
                    }
                },
                SectorIterState::Done => return None,
            }
        }
    }
}

/// Record stream over several sectors read by a worker pool.
///
/// Dropping the iterator early shuts the pool down: workers notice the
/// closed channel on their next send and exit.
pub struct ParallelSectorIter {
    rx: Option<mpsc::Receiver<Vec<SystemRecord>>>,
    current: std::vec::IntoIter<SystemRecord>,
    handles: Vec<JoinHandle<()>>,
}

impl ParallelSectorIter {
    fn spawn(jobs: Vec<(String, Option<Utf8PathBuf>)>, workers: usize) -> Self {
        let worker_count = workers.clamp(1, jobs.len().max(1));
        let queue = Arc::new(Mutex::new(jobs));
        let (tx, rx) = mpsc::channel::<Vec<SystemRecord>>();

        let handles = (0..worker_count)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let tx = tx.clone();
                std::thread::spawn(move || loop {
                    let job = {
                        let mut q = queue.lock().unwrap_or_else(|e| e.into_inner());
                        q.pop()
                    };
                    let Some((sector, path)) = job else { break };
                    let Some(path) = path else { continue };
                    let records: Vec<SystemRecord> =
                        SectorIter::new(sector, Some(path)).collect();
                    if tx.send(records).is_err() {
                        // Receiver dropped: consumer stopped early.
                        break;
                    }
                })
            })
            .collect();

        Self {
            rx: Some(rx),
            current: Vec::new().into_iter(),
            handles,
        }
    }
}

impl Iterator for ParallelSectorIter {
    type Item = SystemRecord;

    fn next(&mut self) -> Option<SystemRecord> {
        loop {
            if let Some(record) = self.current.next() {
                return Some(record);
            }
            match self.rx.as_ref()?.recv() {
                Ok(batch) => self.current = batch.into_iter(),
                Err(_) => {
                    // All workers done; join them before reporting the end.
                    self.rx = None;
                    for handle in self.handles.drain(..) {
                        let _ = handle.join();
                    }
                    return None;
                }
            }
        }
    }
}

impl Drop for ParallelSectorIter {
    fn drop(&mut self) {
        // Close the channel first so workers stop producing.
        self.rx = None;
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Open a sector file for streaming, transparently decoding `.gz`.
fn open_sector_reader(path: &Utf8Path) -> std::io::Result<BufReader<Box<dyn Read + Send>>> {
    let file = File::open(path)?;
    let inner: Box<dyn Read + Send> = if path.as_str().ends_with(".gz") {
        Box::new(MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(file)
    };
    Ok(BufReader::new(inner))
}
