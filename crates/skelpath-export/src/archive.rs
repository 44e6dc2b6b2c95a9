//! Persisted path archive (JSON).
//!
//! The archive is the serde form of [`PathSet`]:
//!
//! ```text
//! {
//!   "image_size": [height, width, channels],
//!   "paths": [[[x, y], ...], ...],
//!   "endpoints": [[x, y], ...],
//!   "crosspoints": [[x, y], ...],
//!   "fitted_paths": [{"type": "line" | "bezier", "points": [[x, y], ...]}, ...]
//! }
//! ```
//!
//! `fitted_paths` is omitted when fitting did not run. Loading rejects
//! missing keys, coordinate pairs not of length 2, and sets that fail
//! [`PathSet::validate`].

use skelpath_pipeline::{PathSet, PipelineError};

/// Errors from reading or writing an archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The text is not a well-formed archive.
    #[error("malformed path archive: {0}")]
    Json(#[from] serde_json::Error),

    /// The archive parsed but its contents are inconsistent.
    #[error("invalid path archive: {0}")]
    Invalid(#[from] PipelineError),
}

/// Serialize a path set as pretty-printed archive JSON.
///
/// # Errors
///
/// Returns [`ArchiveError::Json`] if serialization fails.
pub fn to_archive_json(set: &PathSet) -> Result<String, ArchiveError> {
    Ok(serde_json::to_string_pretty(set)?)
}

/// Parse and validate archive JSON.
///
/// # Errors
///
/// Returns [`ArchiveError::Json`] for malformed JSON, missing keys or
/// bad coordinate pairs, and [`ArchiveError::Invalid`] when the parsed
/// set fails [`PathSet::validate`].
pub fn from_archive_json(json: &str) -> Result<PathSet, ArchiveError> {
    let set: PathSet = serde_json::from_str(json)?;
    set.validate()?;
    Ok(set)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use skelpath_pipeline::{FittedPath, ImageSize, Path, Point};

    use super::*;

    fn sample_set() -> PathSet {
        PathSet {
            image_size: ImageSize {
                height: 20,
                width: 30,
                channels: 3,
            },
            paths: vec![Path::new(vec![
                Point::new(1, 2),
                Point::new(2, 2),
                Point::new(3, 3),
            ])],
            endpoints: vec![Point::new(1, 2), Point::new(3, 3)],
            junctions: vec![],
            fitted_paths: Some(vec![FittedPath::Line {
                p0: Point::new(1, 2),
                p1: Point::new(3, 3),
            }]),
        }
    }

    #[test]
    fn wire_shape_uses_archive_keys() {
        let json: serde_json::Value =
            serde_json::from_str(&to_archive_json(&sample_set()).unwrap()).unwrap();
        assert_eq!(json["image_size"], serde_json::json!([20, 30, 3]));
        assert_eq!(json["paths"][0][2], serde_json::json!([3, 3]));
        assert_eq!(json["crosspoints"], serde_json::json!([]));
        assert_eq!(json["fitted_paths"][0]["type"], "line");
        assert_eq!(
            json["fitted_paths"][0]["points"],
            serde_json::json!([[1, 2], [3, 3]])
        );
    }

    #[test]
    fn unfitted_set_omits_fitted_paths() {
        let mut set = sample_set();
        set.fitted_paths = None;
        let json = to_archive_json(&set).unwrap();
        assert!(!json.contains("fitted_paths"));
        assert_eq!(from_archive_json(&json).unwrap(), set);
    }

    #[test]
    fn missing_key_is_rejected() {
        let json = r#"{"image_size": [2, 2, 1], "paths": [], "endpoints": []}"#;
        assert!(matches!(from_archive_json(json), Err(ArchiveError::Json(_))));
    }

    #[test]
    fn short_coordinate_pair_is_rejected() {
        let json = r#"{"image_size": [5, 5, 1], "paths": [[[1, 1], [2]]],
                       "endpoints": [], "crosspoints": []}"#;
        assert!(matches!(from_archive_json(json), Err(ArchiveError::Json(_))));
    }

    #[test]
    fn out_of_bounds_point_is_invalid() {
        let json = r#"{"image_size": [5, 5, 1], "paths": [[[1, 1], [9, 1]]],
                       "endpoints": [], "crosspoints": []}"#;
        assert!(matches!(
            from_archive_json(json),
            Err(ArchiveError::Invalid(PipelineError::InvalidInput(_)))
        ));
    }

    #[test]
    fn fitted_count_must_match_paths() {
        let mut set = sample_set();
        set.fitted_paths = Some(vec![]);
        let json = serde_json::to_string(&set).unwrap();
        assert!(matches!(
            from_archive_json(&json),
            Err(ArchiveError::Invalid(_))
        ));
    }

    #[test]
    fn bezier_with_three_points_loads_as_unfit() {
        let json = r#"{"image_size": [10, 10, 1],
                       "paths": [[[0, 0], [4, 4], [8, 0]]],
                       "endpoints": [[0, 0], [8, 0]], "crosspoints": [],
                       "fitted_paths": [{"type": "bezier", "points": [[0, 0], [4, 4], [8, 0]]}]}"#;
        let set = from_archive_json(json).unwrap();
        assert!(matches!(
            set.fitted_paths.as_deref(),
            Some([FittedPath::Unfit(_)])
        ));
    }
}
