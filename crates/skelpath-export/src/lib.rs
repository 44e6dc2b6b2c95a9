//! skelpath-export: Pure format serializers (sans-IO)
//!
//! Converts path sets into output formats: the JSON path archive and
//! SVG. Returns `String`s and parses `&str`; file handling belongs to
//! the caller.

pub mod archive;
pub mod svg;

pub use archive::{ArchiveError, from_archive_json, to_archive_json};
pub use svg::{SvgMetadata, build_fitted_data, build_path_data, to_svg};
