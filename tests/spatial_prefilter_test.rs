mod common;

use std::io::Write;

use sectordb::builder::{BuilderConfig, SectorBuilder};
use sectordb::spatial::prefilter::{PrefilterParams, SpatialPrefilter};
use sectordb::spatial::survey::survey_index;
use sectordb::spatial::targets::TargetSet;
use sectordb::IndexedDatabaseReader;

use common::{system_line, utf8_path, write_shard};

/// Two well-separated sectors: one around the origin, one 1000 ly out.
fn two_sector_database(compress: bool) -> (tempfile::TempDir, camino::Utf8PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let root = utf8_path(&tmp);
    let input = root.join("input");
    let output = root.join("sectors");
    std::fs::create_dir_all(&input).unwrap();

    let mut lines = Vec::new();
    for i in 0..8 {
        lines.push(system_line(&format!("Near AB-C d{i}"), i as f64, 0.0, 0.0));
    }
    for i in 0..8 {
        lines.push(system_line(
            &format!("Distant XY-Z d{i}"),
            1000.0 + i as f64,
            0.0,
            0.0,
        ));
    }
    write_shard(&input, "chunk_000.jsonl", &lines);

    let config = BuilderConfig::new(input, output.clone())
        .with_min_systems(5)
        .with_compression(compress);
    SectorBuilder::new(config).build().unwrap();
    (tmp, output)
}

fn write_targets(dir: &camino::Utf8Path, content: &str) -> camino::Utf8PathBuf {
    let path = dir.join("targets.tsv");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn prefilter_selects_only_sectors_in_range() {
    let (_tmp, output) = two_sector_database(false);
    let targets = write_targets(
        output.parent().unwrap(),
        "system_name\tcoord_x\tcoord_y\tcoord_z\nSol\t0.0\t0.0\t0.0\n",
    );

    let pf = SpatialPrefilter::from_database(
        &output,
        TargetSet::from_path(&targets).unwrap(),
        100.0,
        PrefilterParams::default(),
    )
    .unwrap();

    let selected: Vec<_> = pf.in_range_sectors().collect();
    assert_eq!(selected, vec!["Near"]);

    let stats = pf.stats();
    assert_eq!(stats.target_count, 1);
    assert_eq!(stats.total_sectors, 2);
    assert_eq!(stats.sectors_in_range, 1);
    assert_eq!(stats.total_systems, 16);
    assert_eq!(stats.systems_in_range, 8);
    assert!((stats.sector_reduction - 50.0).abs() < 1e-9);
    assert!((stats.system_reduction - 50.0).abs() < 1e-9);
}

#[test]
fn prefiltered_scan_flows_into_reader() {
    let (_tmp, output) = two_sector_database(false);
    let targets = write_targets(
        output.parent().unwrap(),
        "name,x,y,z\nSol,0.0,0.0,0.0\n",
    );

    let pf = SpatialPrefilter::from_database(
        &output,
        TargetSet::from_path(&targets).unwrap(),
        100.0,
        PrefilterParams::default(),
    )
    .unwrap();
    let reader = IndexedDatabaseReader::load(&output).unwrap();

    let selected: Vec<_> = pf.in_range_sectors().collect();
    let records: Vec<_> = reader
        .read_sectors_parallel(&selected, 2)
        .filter(|r| pf.should_process(r))
        .collect();
    assert_eq!(records.len(), 8);
    assert!(records.iter().all(|r| r.name.starts_with("Near")));
}

#[test]
fn sector_files_prefer_compressed_variant() {
    let (_tmp, output) = two_sector_database(true);
    let targets = write_targets(
        output.parent().unwrap(),
        "name,x,y,z\nSol,0.0,0.0,0.0\n",
    );

    let pf = SpatialPrefilter::from_database(
        &output,
        TargetSet::from_path(&targets).unwrap(),
        100.0,
        PrefilterParams::default(),
    )
    .unwrap();
    let files = pf.sector_files(&output);
    assert_eq!(files.len(), 1);
    assert!(files[0].as_str().ends_with("Near.jsonl.gz"));
}

#[test]
fn undersized_sectors_trade_recall_for_io() {
    let (_tmp, output) = two_sector_database(false);
    let targets = write_targets(
        output.parent().unwrap(),
        "name,x,y,z\nSol,0.0,0.0,0.0\n",
    );

    // Both sectors hold 8 systems; demanding 9 excludes everything.
    let pf = SpatialPrefilter::from_database(
        &output,
        TargetSet::from_path(&targets).unwrap(),
        100.0,
        PrefilterParams {
            min_sector_systems: 9,
            filter_records: true,
        },
    )
    .unwrap();
    assert_eq!(pf.in_range_sectors().count(), 0);
    assert_eq!(pf.stats().undersized_excluded, 2);
}

#[test]
fn survey_suggests_ranges_from_built_index() {
    let (_tmp, output) = two_sector_database(false);
    let reader = IndexedDatabaseReader::load(&output).unwrap();
    let survey = survey_index(reader.index()).unwrap();
    assert_eq!(survey.total_sectors, 2);
    // Centroids sit at x = 3.5 and x = 1003.5.
    assert!((survey.min_distance - 1000.0).abs() < 1e-9);
    assert_eq!(survey.suggested.normal, 500.0);
}
