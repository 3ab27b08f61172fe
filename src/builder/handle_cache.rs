//! LRU-capped cache of append handles for sector output files.
//!
//! A build touches as many output files as there are sectors (tens of
//! thousands on a full catalog), far more than any sane file-descriptor
//! budget. This cache keeps at most `cap` handles open, evicting the least
//! recently used one when a new sector needs a handle. Evicted sectors are
//! transparently re-opened in append mode on their next record, so file
//! descriptor usage stays deterministic regardless of sector count.
//!
//! A sector whose file cannot be opened is remembered as failed: later
//! records for it are counted in `write_errors` without retrying the open,
//! and the builder excludes the sector from the index.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

use crate::constants::SectorMap;
use crate::index::sector_filename;

struct OpenHandle {
    writer: BufWriter<File>,
    last_use: u64,
}

pub(crate) struct SectorFileCache {
    dir: Utf8PathBuf,
    open: SectorMap<OpenHandle>,
    /// Sectors whose file already exists on disk; opened in append mode.
    existing: HashSet<String>,
    failed: HashSet<String>,
    cap: usize,
    tick: u64,
    pub(crate) write_errors: u64,
}

impl SectorFileCache {
    pub(crate) fn new(dir: &Utf8Path, cap: usize) -> Self {
        Self {
            dir: dir.to_owned(),
            open: SectorMap::default(),
            existing: HashSet::new(),
            failed: HashSet::new(),
            cap: cap.max(1),
            tick: 0,
            write_errors: 0,
        }
    }

    /// Mark a sector file as already present so its first open appends
    /// instead of truncating. Used by the assignment pass, which must not
    /// clobber files written by the streaming pass.
    pub(crate) fn mark_existing(&mut self, sector: &str) {
        self.existing.insert(sector.to_owned());
    }

    /// Append one JSON line (newline added here) to the sector's file.
    ///
    /// Return
    /// ----------
    /// * `true` on success; `false` when the sector's file could not be
    ///   opened or written (counted in `write_errors`).
    pub(crate) fn append_line(&mut self, sector: &str, line: &str) -> bool {
        if self.failed.contains(sector) {
            self.write_errors += 1;
            return false;
        }
        self.tick += 1;
        let tick = self.tick;

        if !self.open.contains_key(sector) {
            if self.open.len() >= self.cap {
                self.evict_lru();
            }
            match self.open_handle(sector) {
                Ok(writer) => {
                    self.open
                        .insert(sector.to_owned(), OpenHandle { writer, last_use: tick });
                }
                Err(e) => {
                    warn!(sector, error = %e, "cannot open sector file, excluding sector");
                    self.failed.insert(sector.to_owned());
                    self.write_errors += 1;
                    return false;
                }
            }
        }

        let Some(handle) = self.open.get_mut(sector) else {
            self.write_errors += 1;
            return false;
        };
        handle.last_use = tick;
        if let Err(e) = handle
            .writer
            .write_all(line.as_bytes())
            .and_then(|_| handle.writer.write_all(b"\n"))
        {
            warn!(sector, error = %e, "write to sector file failed, excluding sector");
            self.open.remove(sector);
            self.failed.insert(sector.to_owned());
            self.write_errors += 1;
            return false;
        }
        true
    }

    fn open_handle(&mut self, sector: &str) -> std::io::Result<BufWriter<File>> {
        let path = self.dir.join(sector_filename(sector));
        let file = if self.existing.contains(sector) {
            OpenOptions::new().append(true).create(true).open(path)?
        } else {
            self.existing.insert(sector.to_owned());
            File::create(path)?
        };
        Ok(BufWriter::new(file))
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .open
            .iter()
            .min_by_key(|(_, h)| h.last_use)
            .map(|(name, _)| name.clone());
        if let Some(name) = oldest {
            if let Some(mut handle) = self.open.remove(&name) {
                if let Err(e) = handle.writer.flush() {
                    warn!(sector = %name, error = %e, "flush on eviction failed, excluding sector");
                    self.failed.insert(name);
                    self.write_errors += 1;
                }
            }
        }
    }

    /// Flush and drop every open handle.
    ///
    /// Sectors whose final flush fails are added to the failed set so the
    /// builder can exclude them from the index.
    pub(crate) fn close_all(&mut self) {
        for (name, mut handle) in self.open.drain() {
            if let Err(e) = handle.writer.flush() {
                warn!(sector = %name, error = %e, "final flush failed, excluding sector");
                self.failed.insert(name);
                self.write_errors += 1;
            }
        }
    }

    /// Sectors excluded by open, write, or flush failures.
    pub(crate) fn failed_sectors(&self) -> &HashSet<String> {
        &self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8_dir(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn eviction_reopens_in_append_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8_dir(&tmp);
        let mut cache = SectorFileCache::new(&dir, 1);

        assert!(cache.append_line("Aaa", r#"{"name":"Aaa AB-C d1"}"#));
        // Forces eviction of Aaa.
        assert!(cache.append_line("Bbb", r#"{"name":"Bbb AB-C d1"}"#));
        // Re-opened handle must append, not truncate.
        assert!(cache.append_line("Aaa", r#"{"name":"Aaa AB-C d2"}"#));
        cache.close_all();

        let content = std::fs::read_to_string(dir.join("Aaa.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(cache.write_errors, 0);
    }

    #[test]
    fn open_failure_marks_sector_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8_dir(&tmp).join("missing_subdir");
        let mut cache = SectorFileCache::new(&dir, 4);
        assert!(!cache.append_line("Aaa", "{}"));
        assert!(!cache.append_line("Aaa", "{}"));
        assert_eq!(cache.write_errors, 2);
        assert!(cache.failed_sectors().contains("Aaa"));
    }
}
