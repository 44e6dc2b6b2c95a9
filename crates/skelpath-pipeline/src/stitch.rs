//! Greedy stitching of path fragments whose ends nearly touch.
//!
//! Paths are visited in order. Each unmerged path grows by repeatedly
//! absorbing the lowest-indexed unmerged path that has an end within
//! the threshold of one of its own ends, until none is left. Candidate
//! ends are found through an R-tree over all path ends.

use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::types::{Path, Point};

/// A path end tagged with the index of its path.
type PathEnd = GeomWithData<[f64; 2], usize>;

/// How two paths are concatenated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Join {
    /// `a` then `b`.
    EndToStart,
    /// `a` then reversed `b`.
    EndToEnd,
    /// Reversed `a` then `b`.
    StartToStart,
    /// Reversed `a` then reversed `b`.
    StartToEnd,
}

/// Merge paths whose nearest ends are closer than `threshold` pixels.
///
/// Each input path ends up in exactly one output path. Output order
/// follows the index of each output path's first fragment.
#[must_use = "returns the stitched paths"]
pub fn stitch_paths(paths: &[Path], threshold: f64) -> Vec<Path> {
    let usable: Vec<&Path> = paths.iter().filter(|p| !p.is_empty()).collect();
    if usable.len() < 2 || threshold <= 0.0 {
        return usable.into_iter().cloned().collect();
    }

    let tree = RTree::bulk_load(
        usable
            .iter()
            .enumerate()
            .flat_map(|(i, path)| {
                [path.first(), path.last()]
                    .into_iter()
                    .flatten()
                    .map(move |p| {
                        let (x, y) = p.to_f64();
                        PathEnd::new([x, y], i)
                    })
            })
            .collect(),
    );

    let mut merged = vec![false; usable.len()];
    let mut out = Vec::new();
    let mut joins = 0_usize;
    for i in 0..usable.len() {
        if merged[i] {
            continue;
        }
        merged[i] = true;
        let mut current: Vec<Point> = usable[i].points().to_vec();

        while let Some(j) = next_candidate(&tree, &current, &merged, threshold) {
            merged[j] = true;
            current = concatenate(&current, usable[j].points());
            joins += 1;
        }
        out.push(Path::new(current));
    }

    tracing::debug!(
        input = usable.len(),
        output = out.len(),
        joins,
        "stitched paths"
    );
    out
}

/// Lowest-indexed unmerged path with an end strictly within
/// `threshold` of either end of `current`.
fn next_candidate(
    tree: &RTree<PathEnd>,
    current: &[Point],
    merged: &[bool],
    threshold: f64,
) -> Option<usize> {
    let limit = threshold * threshold;
    [current.first(), current.last()]
        .into_iter()
        .flatten()
        .flat_map(move |&end| {
            let (x, y) = end.to_f64();
            tree.locate_within_distance([x, y], limit)
                .filter(move |item| {
                    let [ix, iy] = *item.geom();
                    let (dx, dy) = (ix - x, iy - y);
                    dx.mul_add(dx, dy * dy) < limit
                })
                .map(|item| item.data)
        })
        .filter(|&j| !merged[j])
        .min()
}

/// Concatenate `a` and `b` in the orientation that brings their ends
/// closest. A duplicated joint point is dropped.
fn concatenate(a: &[Point], b: &[Point]) -> Vec<Point> {
    let (Some(&a0), Some(&a1), Some(&b0), Some(&b1)) = (a.first(), a.last(), b.first(), b.last())
    else {
        return a.iter().chain(b).copied().collect();
    };

    let options = [
        (a1.distance_squared(b0), Join::EndToStart),
        (a1.distance_squared(b1), Join::EndToEnd),
        (a0.distance_squared(b0), Join::StartToStart),
        (a0.distance_squared(b1), Join::StartToEnd),
    ];
    let mut join = Join::EndToStart;
    let mut best = f64::INFINITY;
    for (d, option) in options {
        if d < best {
            best = d;
            join = option;
        }
    }

    let mut out: Vec<Point> = Vec::with_capacity(a.len() + b.len());
    match join {
        Join::EndToStart | Join::EndToEnd => out.extend_from_slice(a),
        Join::StartToStart | Join::StartToEnd => out.extend(a.iter().rev()),
    }
    let tail: Vec<Point> = match join {
        Join::EndToStart | Join::StartToStart => b.to_vec(),
        Join::EndToEnd | Join::StartToEnd => b.iter().rev().copied().collect(),
    };
    let skip = usize::from(out.last() == tail.first());
    out.extend_from_slice(&tail[skip..]);
    out
}
