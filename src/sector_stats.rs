//! # Streaming sector statistics
//!
//! Mergeable, constant-memory aggregation of per-sector population counts
//! and coordinate sums, from which sector centroids are derived.
//!
//! ## Overview
//! -----------------
//! A [`SectorStatsAccumulator`] consumes records one at a time and keeps one
//! [`SectorStats`] entry per sector label – memory is O(#sectors), never
//! O(#records). Non-standard records (no usable sector label) are retained
//! in a bounded buffer for the later nearest-centroid pass; overflow past
//! the cap is counted but not retained, so pathological inputs cannot blow
//! the memory budget.
//!
//! Accumulators [`merge`](SectorStatsAccumulator::merge) commutatively and
//! associatively: shard-local accumulators built by parallel workers can be
//! combined in any order with identical results.
//!
//! [`finalize`](SectorStatsAccumulator::finalize) turns the running sums
//! into [`SectorCentroids`]: the centroid map of every sector that reached
//! the minimum population, plus the list of dropped undersized sectors.

use nalgebra::Vector3;

use crate::constants::{SectorMap, DEFAULT_NON_STANDARD_CAP};
use crate::name_parser::sector_label;
use crate::system_record::{Coords, SystemRecord};

/// Running population count and coordinate sums for one sector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SectorStats {
    /// Member records, including any without coordinates.
    pub count: u64,
    /// Member records that contributed to `sum`.
    pub coord_count: u64,
    pub sum: Vector3<f64>,
}

impl SectorStats {
    fn add(&mut self, coords: Option<&Coords>) {
        self.count += 1;
        if let Some(c) = coords {
            self.coord_count += 1;
            self.sum += c.as_vector();
        }
    }

    fn merge(&mut self, other: &SectorStats) {
        self.count += other.count;
        self.coord_count += other.coord_count;
        self.sum += other.sum;
    }

    /// Coordinate-wise mean of the member records seen so far.
    pub fn center(&self) -> Coords {
        if self.coord_count == 0 {
            Coords::new(0.0, 0.0, 0.0)
        } else {
            Coords::from(self.sum / self.coord_count as f64)
        }
    }
}

/// A surviving sector after threshold filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorCentroid {
    pub name: String,
    pub count: u64,
    pub center: Coords,
}

/// Result of [`SectorStatsAccumulator::finalize`].
///
/// `survivors` and `dropped` are both sorted by sector name, which fixes
/// the centroid-iteration order used to break nearest-centroid ties.
#[derive(Debug, Clone, Default)]
pub struct SectorCentroids {
    pub survivors: Vec<SectorCentroid>,
    /// Undersized sectors excluded from the index: `(name, member count)`.
    pub dropped: Vec<(String, u64)>,
}

impl SectorCentroids {
    /// The surviving sector whose centroid is closest to `coords`.
    ///
    /// Ties are broken by iteration order (sorted by name): the first
    /// centroid at the minimal distance wins.
    pub fn nearest(&self, coords: &Coords) -> Option<&SectorCentroid> {
        let mut best: Option<(&SectorCentroid, f64)> = None;
        for sector in &self.survivors {
            let d2 = sector.center.squared_distance_to(coords);
            match best {
                Some((_, best_d2)) if d2 >= best_d2 => {}
                _ => best = Some((sector, d2)),
            }
        }
        best.map(|(s, _)| s)
    }

    /// Total records belonging to dropped sectors.
    pub fn dropped_records(&self) -> u64 {
        self.dropped.iter().map(|(_, n)| n).sum()
    }
}

/// Streaming, mergeable aggregator of per-sector statistics.
#[derive(Debug)]
pub struct SectorStatsAccumulator {
    stats: SectorMap<SectorStats>,
    non_standard: Vec<SystemRecord>,
    non_standard_cap: usize,
    /// Records routed through this accumulator (standard + non-standard).
    pub records_seen: u64,
    /// Non-standard records seen, retained or not.
    pub non_standard_seen: u64,
    /// Malformed input lines counted by the streaming caller.
    pub skipped_lines: u64,
}

impl Default for SectorStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl SectorStatsAccumulator {
    pub fn new() -> Self {
        Self::with_cap(DEFAULT_NON_STANDARD_CAP)
    }

    /// Accumulator with an explicit non-standard buffer capacity.
    pub fn with_cap(non_standard_cap: usize) -> Self {
        Self {
            stats: SectorMap::default(),
            non_standard: Vec::new(),
            non_standard_cap,
            records_seen: 0,
            non_standard_seen: 0,
            skipped_lines: 0,
        }
    }

    /// Route one record: standard names update the sector's running stats,
    /// non-standard records go to the bounded buffer.
    pub fn accumulate(&mut self, record: SystemRecord) {
        match sector_label(&record.name) {
            Some(sector) => {
                let coords = record.coords;
                self.record_standard(sector, coords.as_ref());
            }
            None => {
                self.push_non_standard(record);
            }
        }
    }

    /// Update the running stats of `sector` with one member record.
    pub fn record_standard(&mut self, sector: &str, coords: Option<&Coords>) {
        self.records_seen += 1;
        if let Some(stats) = self.stats.get_mut(sector) {
            stats.add(coords);
        } else {
            let mut stats = SectorStats::default();
            stats.add(coords);
            self.stats.insert(sector.to_owned(), stats);
        }
    }

    /// Buffer a non-standard record for the assignment pass.
    ///
    /// Return
    /// ----------
    /// * `true` when the record was retained, `false` when the buffer is at
    ///   capacity and the record was only counted.
    pub fn push_non_standard(&mut self, record: SystemRecord) -> bool {
        self.records_seen += 1;
        self.non_standard_seen += 1;
        if self.non_standard.len() < self.non_standard_cap {
            self.non_standard.push(record);
            true
        } else {
            false
        }
    }

    /// Whether non-standard records were seen beyond the buffer capacity.
    pub fn overflowed(&self) -> bool {
        self.non_standard_seen > self.non_standard.len() as u64
    }

    /// The retained non-standard records, in arrival order.
    pub fn non_standard(&self) -> &[SystemRecord] {
        &self.non_standard
    }

    /// Drain the retained non-standard records, in arrival order.
    pub fn take_non_standard(&mut self) -> Vec<SystemRecord> {
        std::mem::take(&mut self.non_standard)
    }

    /// Number of distinct sector labels seen.
    pub fn sector_count(&self) -> usize {
        self.stats.len()
    }

    /// Running stats for one sector, if seen.
    pub fn sector_stats(&self, sector: &str) -> Option<&SectorStats> {
        self.stats.get(sector)
    }

    /// Fold `other` into `self`.
    ///
    /// Element-wise sum of matching sector entries plus counter addition;
    /// commutative and associative up to the shared buffer cap, so
    /// shard-local accumulators can be merged in any order.
    pub fn merge(&mut self, other: SectorStatsAccumulator) {
        for (sector, stats) in other.stats {
            self.stats
                .entry(sector)
                .or_default()
                .merge(&stats);
        }
        self.records_seen += other.records_seen;
        self.non_standard_seen += other.non_standard_seen;
        self.skipped_lines += other.skipped_lines;
        for record in other.non_standard {
            if self.non_standard.len() < self.non_standard_cap {
                self.non_standard.push(record);
            }
        }
    }

    /// Compute centroids for every sector with `count >= min_systems`.
    ///
    /// Sectors below the threshold are returned in
    /// [`SectorCentroids::dropped`] and must not be materialized as output
    /// files.
    pub fn finalize(&self, min_systems: u64) -> SectorCentroids {
        let mut survivors = Vec::new();
        let mut dropped = Vec::new();
        for (name, stats) in &self.stats {
            if stats.count >= min_systems {
                survivors.push(SectorCentroid {
                    name: name.clone(),
                    count: stats.count,
                    center: stats.center(),
                });
            } else {
                dropped.push((name.clone(), stats.count));
            }
        }
        survivors.sort_by(|a, b| a.name.cmp(&b.name));
        dropped.sort_by(|a, b| a.0.cmp(&b.0));
        SectorCentroids { survivors, dropped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(name: &str, x: f64, y: f64, z: f64) -> SystemRecord {
        SystemRecord {
            name: name.to_owned(),
            coords: Some(Coords::new(x, y, z)),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn centroid_is_mean_of_members() {
        let mut acc = SectorStatsAccumulator::new();
        acc.accumulate(record("Foo AB-C d1", 0.0, 0.0, 0.0));
        acc.accumulate(record("Foo AB-C d2", 2.0, 4.0, 6.0));
        let centroids = acc.finalize(1);
        assert_eq!(centroids.survivors.len(), 1);
        let foo = &centroids.survivors[0];
        assert_eq!(foo.name, "Foo");
        assert_eq!(foo.count, 2);
        assert_relative_eq!(foo.center.x, 1.0);
        assert_relative_eq!(foo.center.y, 2.0);
        assert_relative_eq!(foo.center.z, 3.0);
    }

    #[test]
    fn merge_is_order_independent() {
        let build = |names: &[(&str, f64)]| {
            let mut acc = SectorStatsAccumulator::new();
            for (name, x) in names {
                acc.accumulate(record(name, *x, 0.0, 0.0));
            }
            acc
        };
        let a = || build(&[("Foo AB-C d1", 1.0), ("Bar XY-Z d2", 10.0)]);
        let b = || build(&[("Foo AB-C d3", 3.0), ("Bar XY-Z d4", 30.0)]);

        let mut ab = a();
        ab.merge(b());
        let mut ba = b();
        ba.merge(a());

        let fab = ab.finalize(1);
        let fba = ba.finalize(1);
        assert_eq!(fab.survivors.len(), fba.survivors.len());
        for (x, y) in fab.survivors.iter().zip(fba.survivors.iter()) {
            assert_eq!(x.name, y.name);
            assert_eq!(x.count, y.count);
            assert_relative_eq!(x.center.x, y.center.x);
            assert_relative_eq!(x.center.y, y.center.y);
            assert_relative_eq!(x.center.z, y.center.z);
        }
    }

    #[test]
    fn undersized_sectors_are_dropped() {
        let mut acc = SectorStatsAccumulator::new();
        for i in 0..5 {
            acc.accumulate(record(&format!("Foo AB-C d{i}"), 0.0, 0.0, 0.0));
        }
        acc.accumulate(record("Bar XY-Z d1", 1.0, 1.0, 1.0));
        let centroids = acc.finalize(5);
        assert_eq!(centroids.survivors.len(), 1);
        assert_eq!(centroids.dropped, vec![("Bar".to_owned(), 1)]);
        assert_eq!(centroids.dropped_records(), 1);
    }

    #[test]
    fn non_standard_buffer_is_bounded() {
        let mut acc = SectorStatsAccumulator::with_cap(2);
        assert!(acc.push_non_standard(record("Sol", 0.0, 0.0, 0.0)));
        assert!(acc.push_non_standard(record("Achenar", 1.0, 1.0, 1.0)));
        assert!(!acc.push_non_standard(record("Alioth", 2.0, 2.0, 2.0)));
        assert!(acc.overflowed());
        assert_eq!(acc.non_standard().len(), 2);
        assert_eq!(acc.non_standard_seen, 3);
    }

    #[test]
    fn nearest_breaks_ties_by_name_order() {
        let centroids = SectorCentroids {
            survivors: vec![
                SectorCentroid {
                    name: "Aaa".into(),
                    count: 1,
                    center: Coords::new(1.0, 0.0, 0.0),
                },
                SectorCentroid {
                    name: "Bbb".into(),
                    count: 1,
                    center: Coords::new(-1.0, 0.0, 0.0),
                },
            ],
            dropped: Vec::new(),
        };
        // Equidistant from both centroids: first in name order wins.
        let nearest = centroids.nearest(&Coords::new(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(nearest.name, "Aaa");
    }

    #[test]
    fn empty_sector_label_counts_as_non_standard() {
        let mut acc = SectorStatsAccumulator::new();
        acc.accumulate(record("AB-C d1", 0.0, 0.0, 0.0));
        assert_eq!(acc.sector_count(), 0);
        assert_eq!(acc.non_standard_seen, 1);
    }
}
