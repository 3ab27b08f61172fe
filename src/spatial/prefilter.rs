//! # Index-level spatial prefilter
//!
//! Selects, from a [`SectorIndex`], the sectors whose centroids lie within
//! a radius of at least one target point, and optionally filters
//! individual records by true distance before they reach downstream
//! consumers.
//!
//! ## Semantics
//! -----------------
//! * A sector is **in range** iff the squared distance from its centroid
//!   to the nearest target is ≤ `range_ly²` (squared on purpose: the
//!   selection loop is `#sectors × #targets` and needs no square root).
//! * A sector below `min_sector_systems` is excluded even when in range.
//!   That trades recall for I/O – deliberate, and surfaced in
//!   [`PrefilterStats`] so the operator sees what was skipped.
//! * [`should_process`](SpatialPrefilter::should_process) is fail-open:
//!   a record without coordinates is never silently excluded.

use std::collections::BTreeSet;

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use tracing::info;

use crate::constants::{LightYear, SECTOR_INDEX_FILENAME};
use crate::index::SectorIndex;
use crate::sector_errors::SectorDbError;
use crate::spatial::targets::TargetSet;
use crate::system_record::SystemRecord;

/// Tuning knobs of the prefilter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefilterParams {
    /// Sectors with fewer members are excluded from selection.
    pub min_sector_systems: u64,
    /// Enable the per-record second-stage distance filter.
    pub filter_records: bool,
}

impl Default for PrefilterParams {
    fn default() -> Self {
        Self {
            min_sector_systems: 1,
            filter_records: true,
        }
    }
}

/// Pairwise spacing of the target points, light years.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetSpacing {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Operator-facing statistics: what the prefilter kept, what it excluded,
/// and the expected scan reduction. Meant for tuning `range_ly` before
/// committing to a full scan.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefilterStats {
    pub target_count: usize,
    pub range_ly: LightYear,
    pub total_sectors: usize,
    pub sectors_in_range: usize,
    /// Sectors excluded for being under `min_sector_systems`.
    pub undersized_excluded: usize,
    /// Member count over the whole index.
    pub total_systems: u64,
    /// Member count over the selected sectors (an upper bound on what the
    /// second-stage record filter lets through).
    pub systems_in_range: u64,
    /// Percentage of sectors the selection eliminates.
    pub sector_reduction: f64,
    /// Percentage of records the selection eliminates.
    pub system_reduction: f64,
    /// Pairwise target spacing; `None` with fewer than two targets.
    pub target_spacing: Option<TargetSpacing>,
}

/// Spatial prefilter over one sector index.
#[derive(Debug, Clone)]
pub struct SpatialPrefilter {
    index: SectorIndex,
    targets: TargetSet,
    range_ly: LightYear,
    params: PrefilterParams,
    in_range: BTreeSet<String>,
    stats: PrefilterStats,
}

impl SpatialPrefilter {
    /// Prefilter against the database rooted at `database_path`, loading
    /// its index from the default location.
    pub fn from_database(
        database_path: &Utf8Path,
        targets: TargetSet,
        range_ly: LightYear,
        params: PrefilterParams,
    ) -> Result<Self, SectorDbError> {
        let index = SectorIndex::load(&database_path.join(SECTOR_INDEX_FILENAME))?;
        Ok(Self::new(index, targets, range_ly, params))
    }

    /// Prefilter over an already-loaded index.
    pub fn new(
        index: SectorIndex,
        targets: TargetSet,
        range_ly: LightYear,
        params: PrefilterParams,
    ) -> Self {
        let range_squared = range_ly * range_ly;
        let mut in_range = BTreeSet::new();
        let mut undersized_excluded = 0usize;
        let mut total_systems = 0u64;
        let mut systems_in_range = 0u64;

        for (name, entry) in &index.sectors {
            total_systems += entry.system_count;
            if entry.system_count < params.min_sector_systems {
                undersized_excluded += 1;
                continue;
            }
            let selected = targets
                .min_squared_distance(&entry.center)
                .map(|d2| d2 <= range_squared)
                .unwrap_or(false);
            if selected {
                systems_in_range += entry.system_count;
                in_range.insert(name.clone());
            }
        }

        let total_sectors = index.sectors.len();
        let pct = |kept: f64, total: f64| {
            if total > 0.0 {
                (1.0 - kept / total) * 100.0
            } else {
                0.0
            }
        };
        let stats = PrefilterStats {
            target_count: targets.len(),
            range_ly,
            total_sectors,
            sectors_in_range: in_range.len(),
            undersized_excluded,
            total_systems,
            systems_in_range,
            sector_reduction: pct(in_range.len() as f64, total_sectors as f64),
            system_reduction: pct(systems_in_range as f64, total_systems as f64),
            target_spacing: target_spacing(&targets),
        };
        info!(
            targets = stats.target_count,
            range_ly,
            sectors_in_range = stats.sectors_in_range,
            total_sectors = stats.total_sectors,
            sector_reduction_pct = stats.sector_reduction,
            "spatial prefilter ready"
        );

        Self {
            index,
            targets,
            range_ly,
            params,
            in_range,
            stats,
        }
    }

    /// Names of the selected sectors, in stable (sorted) order.
    pub fn in_range_sectors(&self) -> impl Iterator<Item = &str> {
        self.in_range.iter().map(String::as_str)
    }

    pub fn is_in_range(&self, sector: &str) -> bool {
        self.in_range.contains(sector)
    }

    /// Second-stage record filter.
    ///
    /// Fail-open: `true` for records without coordinates (ambiguous data
    /// is never silently excluded), for any record when record filtering
    /// is disabled, and for records within `range_ly` of the nearest
    /// target – boundary inclusive, compared in squared space to keep the
    /// square root off the hot path.
    pub fn should_process(&self, record: &SystemRecord) -> bool {
        if !self.params.filter_records {
            return true;
        }
        let Some(coords) = &record.coords else {
            return true;
        };
        self.targets.within_range(coords, self.range_ly)
    }

    /// True Euclidean distance from `record` to its nearest target;
    /// `None` when the record has no coordinates.
    pub fn closest_target_distance(&self, record: &SystemRecord) -> Option<f64> {
        let coords = record.coords.as_ref()?;
        self.targets.min_squared_distance(coords).map(f64::sqrt)
    }

    /// On-disk files of the selected sectors under `database_root`,
    /// preferring the compressed variant when both exist. Sectors whose
    /// file is missing are silently absent from the list (the reader
    /// reports those per sector).
    pub fn sector_files(&self, database_root: &Utf8Path) -> Vec<Utf8PathBuf> {
        self.in_range
            .iter()
            .filter_map(|name| {
                let entry = self.index.get(name)?;
                let indexed = database_root.join(&entry.filename);
                let gz = if indexed.as_str().ends_with(".gz") {
                    indexed.clone()
                } else {
                    Utf8PathBuf::from(format!("{indexed}.gz"))
                };
                if gz.exists() {
                    Some(gz)
                } else if indexed.exists() {
                    Some(indexed)
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn stats(&self) -> &PrefilterStats {
        &self.stats
    }

    pub fn index(&self) -> &SectorIndex {
        &self.index
    }

    pub fn range_ly(&self) -> LightYear {
        self.range_ly
    }
}

fn target_spacing(targets: &TargetSet) -> Option<TargetSpacing> {
    if targets.len() < 2 {
        return None;
    }
    let distances: Vec<f64> = targets
        .iter()
        .tuple_combinations()
        .map(|(a, b)| a.coords.distance_to(&b.coords))
        .collect();
    let min = distances.iter().copied().fold(f64::INFINITY, f64::min);
    let max = distances.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let avg = distances.iter().sum::<f64>() / distances.len() as f64;
    Some(TargetSpacing { min, max, avg })
}
