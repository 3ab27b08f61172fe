//! # System name parsing
//!
//! Splits a procedurally generated system name into its sector label, mass
//! code, and suffix.
//!
//! ## Overview
//! -----------------
//! Standard catalog names follow the pattern `<sector> <mass code> <suffix>`,
//! where the *mass code* is a whole-word token of two uppercase letters, a
//! dash, and one uppercase letter (`SG-E`, `AB-C`). The sector label is the
//! trimmed text before the mass code, the suffix the trimmed text after it:
//!
//! ```text
//! "Hypoae Aihm SG-E c12-5"  →  sector "Hypoae Aihm", mass code "SG-E", suffix "c12-5"
//! ```
//!
//! Names without such a token ("Sol", "Barnard's Star") are *non-standard*
//! and must be placed by nearest-centroid assignment instead.
//!
//! ## Ambiguity
//! -----------------
//! A name containing several candidate tokens always uses the **left-most**
//! match. This is deliberate and must not change: downstream consumers rely
//! on the same record landing in the same sector across rebuilds.

use once_cell::sync::Lazy;
use regex::Regex;

/// Whole-word mass code: two uppercase letters, dash, one uppercase letter.
static MASS_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{2}-[A-Z]\b").expect("mass code pattern is valid"));

/// Decomposition of a standard system name.
///
/// All three fields borrow from the input string. `sector` may be empty when
/// the name begins with the mass code itself; callers treating the sector
/// label as a partition key must reject that case (see
/// [`sector_label`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedName<'a> {
    pub sector: &'a str,
    pub mass_code: &'a str,
    pub suffix: &'a str,
}

/// Split `name` at the left-most mass code token.
///
/// Arguments
/// -----------------
/// * `name`: The raw system name.
///
/// Return
/// ----------
/// * `Some(ParsedName)` when a mass code is present, `None` for
///   non-standard names.
pub fn parse_system_name(name: &str) -> Option<ParsedName<'_>> {
    let m = MASS_CODE.find(name)?;
    Some(ParsedName {
        sector: name[..m.start()].trim(),
        mass_code: m.as_str(),
        suffix: name[m.end()..].trim(),
    })
}

/// The sector label of `name`, if it is standard **and** carries a
/// non-empty label.
///
/// This is the partition key used by the builder: a name that starts with
/// its mass code parses but yields no usable label and is treated as
/// non-standard.
pub fn sector_label(name: &str) -> Option<&str> {
    parse_system_name(name).map(|p| p.sector).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_name() {
        let parsed = parse_system_name("Hypoae Aihm SG-E c12-5").unwrap();
        assert_eq!(parsed.sector, "Hypoae Aihm");
        assert_eq!(parsed.mass_code, "SG-E");
        assert_eq!(parsed.suffix, "c12-5");
    }

    #[test]
    fn non_standard_names_do_not_parse() {
        assert!(parse_system_name("Sol").is_none());
        assert!(parse_system_name("Barnard's Star").is_none());
        assert!(parse_system_name("HIP 23692").is_none());
    }

    #[test]
    fn first_match_wins_on_multiple_candidates() {
        let parsed = parse_system_name("Foo AB-C DE-F d1").unwrap();
        assert_eq!(parsed.sector, "Foo");
        assert_eq!(parsed.mass_code, "AB-C");
        assert_eq!(parsed.suffix, "DE-F d1");
    }

    #[test]
    fn mass_code_must_be_whole_word() {
        // Embedded in a longer token, the pattern must not match.
        assert!(parse_system_name("XAB-C d1").is_none());
        assert!(parse_system_name("Foo AB-CD d1").is_none());
    }

    #[test]
    fn leading_mass_code_has_no_sector_label() {
        let parsed = parse_system_name("AB-C d1").unwrap();
        assert_eq!(parsed.sector, "");
        assert!(sector_label("AB-C d1").is_none());
        assert_eq!(sector_label("Foo AB-C d1"), Some("Foo"));
    }
}
