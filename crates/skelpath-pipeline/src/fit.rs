//! Line / cubic Bezier classification and fitting.
//!
//! A path is classified by its straightness (chord length over arc
//! length). Straight paths get a total-least-squares line; the rest get
//! a cubic Bezier whose end points are the path's own ends and whose
//! handles follow the tangent at each end.

use crate::types::{FitConfig, FittedPath, LineEndpoints, Path, PipelineError, Point};

/// Maximum number of segments averaged for an end tangent.
const MAX_TANGENT_SEGMENTS: usize = 5;

/// Shrink factor applied to the Bezier handle length.
const HANDLE_DAMPING: f64 = 0.8;

/// Whether `path` should be fitted as a straight line.
///
/// Paths under 3 points are always lines. A path with zero arc length
/// (every point identical) is not.
#[must_use]
pub fn is_line(path: &Path, threshold: f64) -> bool {
    if path.len() < 3 {
        return true;
    }
    path.straightness().is_some_and(|s| s > threshold)
}

/// Fit one path.
///
/// # Errors
///
/// Returns [`PipelineError::Unsupported`] if the path has fewer than 2
/// points.
pub fn fit_path(path: &Path, config: &FitConfig) -> Result<FittedPath, PipelineError> {
    if path.len() < 2 {
        return Err(PipelineError::Unsupported(format!(
            "cannot fit a path of {} point(s)",
            path.len()
        )));
    }
    if is_line(path, config.line_threshold) {
        Ok(fit_line(path, config.line_endpoints))
    } else {
        Ok(fit_bezier(path, config.control_dist_factor))
    }
}

/// Fit every path, preserving order.
///
/// # Errors
///
/// Returns the first [`fit_path`] error.
pub fn fit_paths(paths: &[Path], config: &FitConfig) -> Result<Vec<FittedPath>, PipelineError> {
    paths.iter().map(|p| fit_path(p, config)).collect()
}

/// How many fits of each variant a run produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FitCounts {
    pub lines: usize,
    pub curves: usize,
    pub unfit: usize,
}

/// Count `fits` by variant.
#[must_use]
pub fn count_fits(fits: &[FittedPath]) -> FitCounts {
    let mut counts = FitCounts::default();
    for fit in fits {
        match fit {
            FittedPath::Line { .. } => counts.lines += 1,
            FittedPath::Bezier { .. } => counts.curves += 1,
            FittedPath::Unfit(_) => counts.unfit += 1,
        }
    }
    counts
}

/// Total-least-squares line through the points of `path`.
///
/// The line passes through the centroid along the principal axis of
/// the point scatter, oriented from the path's first point toward its
/// last. See [`LineEndpoints`] for how the two output points are placed.
#[must_use]
pub fn fit_line(path: &Path, endpoints: LineEndpoints) -> FittedPath {
    let points = path.points();
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        let origin = Point::new(0, 0);
        return FittedPath::Line {
            p0: origin,
            p1: origin,
        };
    };

    let (cx, cy) = centroid(points);
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in points {
        let (x, y) = p.to_f64();
        let (dx, dy) = (x - cx, y - cy);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let (mut ux, mut uy) = (theta.cos(), theta.sin());

    let (fx, fy) = first.to_f64();
    let (lx, ly) = last.to_f64();
    if ux.mul_add(lx - fx, uy * (ly - fy)) < 0.0 {
        ux = -ux;
        uy = -uy;
    }

    let (t0, t1) = match endpoints {
        LineEndpoints::UnitStep => (0.0, 1.0),
        LineEndpoints::Projected => (
            ux.mul_add(fx - cx, uy * (fy - cy)),
            ux.mul_add(lx - cx, uy * (ly - cy)),
        ),
    };
    FittedPath::Line {
        p0: Point::from_f64(ux.mul_add(t0, cx), uy.mul_add(t0, cy)),
        p1: Point::from_f64(ux.mul_add(t1, cx), uy.mul_add(t1, cy)),
    }
}

/// Cubic Bezier through the ends of `path`.
///
/// End tangents average the first and last `min(n / 6, 5)` segments.
/// Each handle sits `arc_length * control_dist_factor * 0.8` from its
/// end point along the tangent. Short paths (`n < 24`) average fewer
/// segments; below 6 points the tangents vanish and both handles
/// coincide with the end points. Paths under 4 points are returned
/// as [`FittedPath::Unfit`].
#[must_use]
pub fn fit_bezier(path: &Path, control_dist_factor: f64) -> FittedPath {
    let points = path.points();
    let n = points.len();
    let (Some(&p0), Some(&p3)) = (points.first(), points.last()) else {
        return FittedPath::Unfit(path.clone());
    };
    if n < 4 {
        return FittedPath::Unfit(path.clone());
    }

    let segments = (n / 6).min(MAX_TANGENT_SEGMENTS);
    let start = unit(sum_steps(&points[..=segments.min(n - 1)]));
    let end = unit(sum_steps(&points[n.saturating_sub(segments + 1)..]));

    let reach = path.arc_length() * control_dist_factor * HANDLE_DAMPING;
    let (x0, y0) = p0.to_f64();
    let (x3, y3) = p3.to_f64();
    FittedPath::Bezier {
        p0,
        p1: Point::from_f64(start.0.mul_add(reach, x0), start.1.mul_add(reach, y0)),
        p2: Point::from_f64((-end.0).mul_add(reach, x3), (-end.1).mul_add(reach, y3)),
        p3,
    }
}

/// Evaluate a cubic Bezier at `t` by repeated linear interpolation.
#[must_use]
pub fn cubic_point(control: [(f64, f64); 4], t: f64) -> (f64, f64) {
    let mut pts = control;
    for level in (1..4).rev() {
        for i in 0..level {
            let (ax, ay) = pts[i];
            let (bx, by) = pts[i + 1];
            pts[i] = ((bx - ax).mul_add(t, ax), (by - ay).mul_add(t, ay));
        }
    }
    pts[0]
}

fn centroid(points: &[Point]) -> (f64, f64) {
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| {
        let (x, y) = p.to_f64();
        (sx + x, sy + y)
    });
    #[allow(clippy::cast_precision_loss)]
    let n = points.len().max(1) as f64;
    (sx / n, sy / n)
}

/// Sum of the displacement vectors between consecutive points.
fn sum_steps(points: &[Point]) -> (f64, f64) {
    points.windows(2).fold((0.0, 0.0), |(sx, sy), w| {
        (
            sx + f64::from(w[1].x - w[0].x),
            sy + f64::from(w[1].y - w[0].y),
        )
    })
}

/// Normalize to unit length; the zero vector is returned unchanged.
fn unit((x, y): (f64, f64)) -> (f64, f64) {
    let norm = x.hypot(y);
    if norm > 0.0 { (x / norm, y / norm) } else { (x, y) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn path(points: &[(i32, i32)]) -> Path {
        Path::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    fn near_straight() -> Path {
        path(&[(0, 0), (25, 0), (50, 1), (75, 0), (100, 0)])
    }

    #[test]
    fn counts_cover_every_fit() {
        let config = FitConfig::default();
        let paths = [
            near_straight(),
            path(&[(0, 0), (5, 5), (10, 0)]),
            path(&[(0, 0), (6, 8), (12, 10), (18, 8), (24, 0)]),
        ];
        let fits = fit_paths(&paths, &config).unwrap();
        let counts = count_fits(&fits);
        assert_eq!(
            counts,
            FitCounts {
                lines: 1,
                curves: 1,
                unfit: 1
            }
        );
        assert_eq!(counts.lines + counts.curves + counts.unfit, paths.len());
    }

    #[test]
    fn short_paths_are_lines() {
        assert!(is_line(&path(&[(0, 0), (5, 5)]), 0.98));
        assert!(is_line(&path(&[(0, 0)]), 0.98));
    }

    #[test]
    fn threshold_decides_classification() {
        let p = near_straight();
        let config = FitConfig::default();
        assert!(matches!(fit_path(&p, &config).unwrap(), FittedPath::Line { .. }));

        let strict = FitConfig {
            line_threshold: 1.5,
            ..FitConfig::default()
        };
        assert!(matches!(fit_path(&p, &strict).unwrap(), FittedPath::Bezier { .. }));
    }

    #[test]
    fn unit_step_line_starts_at_centroid() {
        let p = Path::new((5..55).map(|x| Point::new(x, 10)).collect());
        let fitted = fit_line(&p, LineEndpoints::UnitStep);
        // Centroid (29.5, 10) rounds to 30; one unit along +x is 30.5 -> 31.
        assert_eq!(
            fitted,
            FittedPath::Line {
                p0: Point::new(30, 10),
                p1: Point::new(31, 10),
            }
        );
    }

    #[test]
    fn projected_line_spans_the_path() {
        let p = Path::new((5..55).map(|x| Point::new(x, 10)).collect());
        let fitted = fit_line(&p, LineEndpoints::Projected);
        assert_eq!(
            fitted,
            FittedPath::Line {
                p0: Point::new(5, 10),
                p1: Point::new(54, 10),
            }
        );
    }

    #[test]
    fn line_direction_follows_path_order() {
        let p = Path::new((0..20).rev().map(|y| Point::new(3, y)).collect());
        let FittedPath::Line { p0, p1 } = fit_line(&p, LineEndpoints::Projected) else {
            unreachable!("fit_line always returns a line");
        };
        assert_eq!(p0, Point::new(3, 19));
        assert_eq!(p1, Point::new(3, 0));
    }

    #[test]
    fn total_least_squares_handles_vertical_scatter() {
        // Ordinary y-on-x regression is undefined here.
        let p = path(&[(7, 0), (7, 10), (7, 20), (7, 30)]);
        let FittedPath::Line { p0, p1 } = fit_line(&p, LineEndpoints::Projected) else {
            unreachable!("fit_line always returns a line");
        };
        assert_eq!((p0, p1), (Point::new(7, 0), Point::new(7, 30)));
    }

    #[test]
    fn bezier_handles_follow_end_tangents() {
        // 13 points along +x, then 12 points down +y: an L of 25 points.
        let mut pts: Vec<(i32, i32)> = (0..=12).map(|x| (x, 0)).collect();
        pts.extend((1..=12).map(|y| (12, y)));
        let fitted = fit_bezier(&path(&pts), 0.25);
        // arc 24, reach 24 * 0.25 * 0.8 = 4.8
        assert_eq!(
            fitted,
            FittedPath::Bezier {
                p0: Point::new(0, 0),
                p1: Point::new(5, 0),
                p2: Point::new(12, 7),
                p3: Point::new(12, 12),
            }
        );
    }

    #[test]
    fn three_point_curve_is_unfit() {
        let p = path(&[(0, 0), (5, 5), (10, 0)]);
        let fitted = fit_path(&p, &FitConfig::default()).unwrap();
        assert_eq!(fitted, FittedPath::Unfit(p));
    }

    #[test]
    fn single_point_is_unsupported() {
        let result = fit_path(&path(&[(1, 1)]), &FitConfig::default());
        assert!(matches!(result, Err(PipelineError::Unsupported(_))));
    }

    #[test]
    fn de_casteljau_midpoint() {
        let control = [(0.0, 0.0), (0.0, 4.0), (4.0, 4.0), (4.0, 0.0)];
        let (x, y) = cubic_point(control, 0.5);
        assert!((x - 2.0).abs() < 1e-12);
        assert!((y - 3.0).abs() < 1e-12);
    }

    #[test]
    fn de_casteljau_endpoints() {
        let control = [(1.0, 2.0), (5.0, 9.0), (-3.0, 4.0), (8.0, 8.0)];
        assert_eq!(cubic_point(control, 0.0), (1.0, 2.0));
        let (x, y) = cubic_point(control, 1.0);
        assert!((x - 8.0).abs() < 1e-12 && (y - 8.0).abs() < 1e-12);
    }
}
