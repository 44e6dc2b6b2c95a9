//! Greedy proximity clustering of special points.
//!
//! Thinning leaves several adjacent pixels classified as the same
//! junction (a 1px "+" yields five), and short spurs leave endpoint
//! pairs a few pixels apart. Clustering replaces each group with its
//! rounded centroid.
//!
//! The pass is greedy and single-shot: points are visited in raster
//! order, and each unconsumed point gathers every input point strictly
//! closer than the threshold (including ones already consumed by an
//! earlier group). Output points can therefore still lie within the
//! threshold of one another; there is no transitive closure.

use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::types::Point;

/// An input point tagged with its index in the sorted input.
type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Merge points that lie closer than `threshold` pixels.
///
/// A point with no neighbour inside the threshold is emitted unchanged.
/// A group of two or more is replaced by the rounded centroid of the
/// group. Output order follows the raster order of each group's seed.
/// A non-positive threshold returns the input sorted, unmerged.
#[must_use = "returns the merged points"]
pub fn merge_close_points(points: &[Point], threshold: f64) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| p.raster_key());
    if threshold <= 0.0 || sorted.len() < 2 {
        return sorted;
    }

    let tree = RTree::bulk_load(
        sorted
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let (x, y) = p.to_f64();
                IndexedPoint::new([x, y], i)
            })
            .collect(),
    );
    let limit = threshold * threshold;

    let mut used = vec![false; sorted.len()];
    let mut merged = Vec::with_capacity(sorted.len());
    for (i, &seed) in sorted.iter().enumerate() {
        if used[i] {
            continue;
        }
        let (sx, sy) = seed.to_f64();
        let mut group: Vec<usize> = tree
            .locate_within_distance([sx, sy], limit)
            .filter(|item| seed.distance_squared(sorted[item.data]) < limit)
            .map(|item| item.data)
            .collect();
        group.sort_unstable();

        if group.len() > 1 {
            for &j in &group {
                used[j] = true;
            }
            merged.push(centroid(group.iter().map(|&j| sorted[j])));
        } else {
            used[i] = true;
            merged.push(seed);
        }
    }

    tracing::debug!(
        input = sorted.len(),
        output = merged.len(),
        threshold,
        "merged close points"
    );
    merged
}

/// Rounded arithmetic mean of a non-empty set of points.
fn centroid(points: impl Iterator<Item = Point>) -> Point {
    let (mut sx, mut sy, mut n) = (0.0, 0.0, 0.0);
    for p in points {
        let (x, y) = p.to_f64();
        sx += x;
        sy += y;
        n += 1.0;
    }
    if n == 0.0 {
        return Point::new(0, 0);
    }
    Point::from_f64(sx / n, sy / n)
}
