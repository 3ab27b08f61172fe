use std::fs::File;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};

pub fn utf8_path(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
}

/// One catalog shard line with coordinates and a passthrough payload field.
pub fn system_line(name: &str, x: f64, y: f64, z: f64) -> String {
    format!(r#"{{"name":"{name}","coords":{{"x":{x},"y":{y},"z":{z}}},"id64":42}}"#)
}

/// One catalog shard line without coordinates.
pub fn coordless_line(name: &str) -> String {
    format!(r#"{{"name":"{name}"}}"#)
}

pub fn write_shard(dir: &Utf8Path, name: &str, lines: &[String]) {
    let mut f = File::create(dir.join(name)).unwrap();
    for line in lines {
        writeln!(f, "{line}").unwrap();
    }
}

/// The scenario used across the integration suite: ten standard systems in
/// one sector plus two famous non-standard ones.
pub fn foo_sector_lines() -> Vec<String> {
    let mut lines: Vec<String> = (1..=10)
        .map(|i| system_line(&format!("Foo AB-C d{i}"), i as f64, 0.0, 0.0))
        .collect();
    lines.push(system_line("Sol", 0.0, 0.0, 0.0));
    lines.push(system_line("Barnard's Star", -3.03, 0.0, 3.16));
    lines
}
