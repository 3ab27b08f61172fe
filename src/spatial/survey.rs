//! Pairwise centroid-distance survey of a sector index.
//!
//! Picking a `range_ly` blind is guesswork: too tight selects nothing,
//! too wide defeats the point of prefiltering. The survey measures how
//! far sector centroids sit from each other and derives radius presets an
//! operator can start from.

use itertools::Itertools;

use crate::constants::LightYear;
use crate::index::SectorIndex;

/// Radius presets derived from the centroid spacing distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuggestedRanges {
    /// Half the 25th-percentile spacing.
    pub tight: LightYear,
    /// Half the median spacing.
    pub normal: LightYear,
    /// The 75th-percentile spacing.
    pub wide: LightYear,
    /// The mean spacing.
    pub very_wide: LightYear,
}

/// Distribution of pairwise centroid distances over one index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialSurvey {
    pub total_sectors: usize,
    pub min_distance: f64,
    pub max_distance: f64,
    pub median_distance: f64,
    pub avg_distance: f64,
    pub percentile_25: f64,
    pub percentile_75: f64,
    pub suggested: SuggestedRanges,
}

/// Survey the centroid spacing of `index`.
///
/// Return
/// ----------
/// * `None` when the index holds fewer than two sectors (no pairwise
///   distances to measure).
pub fn survey_index(index: &SectorIndex) -> Option<SpatialSurvey> {
    let centers: Vec<_> = index.sectors.values().map(|e| e.center).collect();
    if centers.len() < 2 {
        return None;
    }

    let mut distances: Vec<f64> = centers
        .iter()
        .tuple_combinations()
        .map(|(a, b)| a.distance_to(b))
        .collect();
    distances.sort_by(f64::total_cmp);

    let n = distances.len();
    let avg = distances.iter().sum::<f64>() / n as f64;
    let percentile_25 = distances[(n as f64 * 0.25) as usize];
    let median = distances[n / 2];
    let percentile_75 = distances[(n as f64 * 0.75) as usize];

    Some(SpatialSurvey {
        total_sectors: centers.len(),
        min_distance: distances[0],
        max_distance: distances[n - 1],
        median_distance: median,
        avg_distance: avg,
        percentile_25,
        percentile_75,
        suggested: SuggestedRanges {
            tight: (percentile_25 / 2.0).round(),
            normal: (median / 2.0).round(),
            wide: percentile_75.round(),
            very_wide: avg.round(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{sector_filename, SectorIndexEntry};
    use crate::system_record::Coords;

    fn index_with_centers(centers: &[(f64, f64, f64)]) -> SectorIndex {
        let mut index = SectorIndex::default();
        for (i, (x, y, z)) in centers.iter().enumerate() {
            let name = format!("S{i}");
            index.sectors.insert(
                name.clone(),
                SectorIndexEntry {
                    filename: sector_filename(&name),
                    system_count: 10,
                    center: Coords::new(*x, *y, *z),
                },
            );
        }
        index
    }

    #[test]
    fn survey_needs_two_sectors() {
        assert!(survey_index(&index_with_centers(&[(0.0, 0.0, 0.0)])).is_none());
    }

    #[test]
    fn survey_measures_pairwise_distances() {
        let survey =
            survey_index(&index_with_centers(&[(0.0, 0.0, 0.0), (0.0, 0.0, 100.0)])).unwrap();
        assert_eq!(survey.total_sectors, 2);
        assert_eq!(survey.min_distance, 100.0);
        assert_eq!(survey.max_distance, 100.0);
        assert_eq!(survey.suggested.normal, 50.0);
        assert_eq!(survey.suggested.very_wide, 100.0);
    }
}
