//! # Spatial prefiltering
//!
//! Restricts a full catalog scan to the sectors and records within a
//! radius of one or more target points, using only the sector index –
//! the point is to cut I/O and CPU *before* any downstream rule engine
//! sees a record.
//!
//! Modules
//! -----------------
//! * [`targets`] – Flexible CSV/TSV target-file parsing (delimiter
//!   sniffing, column-name synonyms).
//! * [`prefilter`] – Index-level sector selection plus the optional
//!   per-record distance filter, with operator-facing statistics.
//! * [`survey`] – Pairwise centroid-distance survey of an index, with
//!   suggested radius presets for tuning `range_ly`.

pub mod prefilter;
pub mod survey;
pub mod targets;
