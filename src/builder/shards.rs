//! # Catalog shard discovery and parallel accumulation
//!
//! Input to a build is a directory of newline-delimited JSON shards. This
//! module finds them and offers a worker-pool statistics pass that streams
//! each shard into a shard-local [`SectorStatsAccumulator`], merged
//! sequentially by the coordinator once all workers are done – no shared
//! mutable state between workers.
//!
//! The merged accumulator is exactly what a sequential pass over the same
//! shards would produce (merge is commutative and associative), so the
//! parallel pass can be used to size thresholds or survey a catalog before
//! committing to a full build.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Mutex;
use std::thread;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::constants::SECTOR_FILE_EXT;
use crate::sector_errors::SectorDbError;
use crate::sector_stats::SectorStatsAccumulator;
use crate::system_record::SystemRecord;

/// Enumerate the `*.jsonl` shards of `input_dir`, sorted by name.
///
/// Return
/// ----------
/// * [`SectorDbError::InputDirNotFound`] when the directory is absent.
/// * [`SectorDbError::EmptyInputDir`] when it holds no shards.
pub fn discover_shards(input_dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, SectorDbError> {
    if !input_dir.is_dir() {
        return Err(SectorDbError::InputDirNotFound(input_dir.to_string()));
    }
    let mut shards: Vec<Utf8PathBuf> = input_dir
        .read_dir_utf8()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension() == Some(SECTOR_FILE_EXT))
        .collect();
    if shards.is_empty() {
        return Err(SectorDbError::EmptyInputDir(input_dir.to_string()));
    }
    shards.sort();
    Ok(shards)
}

/// Stream one shard into `acc`, counting malformed lines.
pub fn accumulate_file(
    path: &Utf8Path,
    acc: &mut SectorStatsAccumulator,
) -> Result<(), SectorDbError> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match SystemRecord::from_json_line(trimmed) {
            Ok(record) if !record.name.is_empty() => acc.accumulate(record),
            _ => acc.skipped_lines += 1,
        }
    }
    Ok(())
}

/// Accumulate statistics over `shards` with a bounded worker pool.
///
/// Each worker owns a shard-local accumulator; the coordinator merges them
/// sequentially after all workers complete. The result is identical to a
/// sequential pass over the same shards.
///
/// Arguments
/// -----------------
/// * `shards`: Shard files to stream, typically from [`discover_shards`].
/// * `workers`: Worker thread count (clamped to at least 1 and at most the
///   shard count).
/// * `non_standard_cap`: Buffer capacity of the merged accumulator.
pub fn accumulate_shards(
    shards: &[Utf8PathBuf],
    workers: usize,
    non_standard_cap: usize,
) -> Result<SectorStatsAccumulator, SectorDbError> {
    let worker_count = workers.clamp(1, shards.len().max(1));
    let queue: Mutex<VecDeque<&Utf8PathBuf>> = Mutex::new(shards.iter().collect());

    let locals = thread::scope(|scope| {
        let handles: Vec<_> = (0..worker_count)
            .map(|worker| {
                let queue = &queue;
                scope.spawn(move || -> Result<SectorStatsAccumulator, SectorDbError> {
                    let mut local = SectorStatsAccumulator::with_cap(non_standard_cap);
                    loop {
                        let shard = {
                            let mut q = queue.lock().unwrap_or_else(|e| e.into_inner());
                            q.pop_front()
                        };
                        let Some(shard) = shard else { break };
                        debug!(worker, shard = %shard, "accumulating shard");
                        accumulate_file(shard, &mut local)?;
                    }
                    Ok(local)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect::<Vec<_>>()
    });

    let mut merged = SectorStatsAccumulator::with_cap(non_standard_cap);
    for local in locals {
        merged.merge(local?);
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_shard(dir: &Utf8Path, name: &str, lines: &[String]) {
        let mut f = File::create(dir.join(name)).unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
    }

    fn system_line(name: &str, x: f64) -> String {
        format!(r#"{{"name":"{name}","coords":{{"x":{x},"y":0.0,"z":0.0}}}}"#)
    }

    #[test]
    fn parallel_accumulation_matches_sequential() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        write_shard(
            &dir,
            "a.jsonl",
            &[system_line("Foo AB-C d1", 1.0), system_line("Sol", 0.0)],
        );
        write_shard(
            &dir,
            "b.jsonl",
            &[
                system_line("Foo AB-C d2", 3.0),
                "not json".to_owned(),
                system_line("Bar XY-Z d1", 9.0),
            ],
        );

        let shards = discover_shards(&dir).unwrap();
        assert_eq!(shards.len(), 2);

        let mut sequential = SectorStatsAccumulator::new();
        for shard in &shards {
            accumulate_file(shard, &mut sequential).unwrap();
        }
        let parallel = accumulate_shards(&shards, 4, 10_000).unwrap();

        assert_eq!(parallel.records_seen, sequential.records_seen);
        assert_eq!(parallel.skipped_lines, 1);
        assert_eq!(parallel.sector_count(), sequential.sector_count());
        let seq = sequential.sector_stats("Foo").unwrap();
        let par = parallel.sector_stats("Foo").unwrap();
        assert_eq!(seq.count, par.count);
        assert_eq!(seq.sum, par.sum);
    }

    #[test]
    fn missing_input_dir_is_structural() {
        let err = discover_shards(Utf8Path::new("/nonexistent/shards")).unwrap_err();
        assert!(matches!(err, SectorDbError::InputDirNotFound(_)));
    }
}
