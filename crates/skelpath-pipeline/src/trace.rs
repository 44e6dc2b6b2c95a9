//! Skeleton graph walk: partition skeleton pixels into ordered paths.
//!
//! Walks start at special points (junctions, then endpoints) and follow
//! the skeleton one pixel at a time. At each step after the first the
//! walker steps onto an adjacent special point if there is one, and
//! otherwise prefers the neighbour that continues most straight ahead,
//! which keeps two strokes crossing at a junction on separate paths.
//! A walk ends when it steps onto a special point (which is appended,
//! so adjacent segments share it) or runs out of unvisited neighbours.
//!
//! Pixels left over after every seed is exhausted belong to closed
//! loops (or fragments cut off from any special point) and are walked
//! from their raster-first pixel.
//!
//! A walk that cuts a staircase corner diagonally strands the corner
//! pixel. Stranded pixels are spliced into a path they touch, so every
//! skeleton pixel with a neighbour ends up in exactly one path.
//!
//! The visited mask is a flat `Vec<bool>` owned by a single
//! [`trace_paths`] call and threaded through the walker by reference.

use image::GrayImage;

use crate::types::{FOREGROUND, Path, Point};

/// Neighbour enumeration order `(dx, dy)`. Ties in the continuation
/// heuristic resolve to the earliest entry.
const WALK_OFFSETS: [(i32, i32); 8] = [
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
];

/// Row-major boolean view of a skeleton with its special points.
struct Grid {
    width: u32,
    height: u32,
    foreground: Vec<bool>,
    special: Vec<bool>,
}

impl Grid {
    fn new(skeleton: &GrayImage) -> Self {
        let foreground: Vec<bool> = skeleton.pixels().map(|p| p.0[0] == FOREGROUND).collect();
        let special = vec![false; foreground.len()];
        Self {
            width: skeleton.width(),
            height: skeleton.height(),
            foreground,
            special,
        }
    }

    fn index(&self, p: Point) -> Option<usize> {
        if !p.in_bounds(self.width, self.height) {
            return None;
        }
        let x = usize::try_from(p.x).ok()?;
        let y = usize::try_from(p.y).ok()?;
        Some(y * self.width as usize + x)
    }

    fn point(&self, idx: usize) -> Point {
        let w = self.width as usize;
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        Point::new((idx % w) as i32, (idx / w) as i32)
    }

    fn is_special(&self, p: Point) -> bool {
        self.index(p).is_some_and(|i| self.special[i])
    }

    fn neighbors(p: Point) -> impl Iterator<Item = Point> {
        WALK_OFFSETS
            .iter()
            .map(move |&(dx, dy)| Point::new(p.x + dx, p.y + dy))
    }

    /// First unvisited foreground neighbour of `p` in enumeration order.
    fn first_unvisited_neighbor(&self, p: Point, visited: &[bool]) -> Option<Point> {
        Self::neighbors(p)
            .find(|&q| self.index(q).is_some_and(|i| self.foreground[i] && !visited[i]))
    }
}

/// Trace the skeleton into paths.
///
/// `endpoints` and `junctions` are the clustered special points. Points
/// that do not lie on a foreground skeleton pixel are ignored. Every
/// emitted path has at least two points.
#[must_use = "returns the traced paths"]
pub fn trace_paths(skeleton: &GrayImage, endpoints: &[Point], junctions: &[Point]) -> Vec<Path> {
    let mut grid = Grid::new(skeleton);
    let mut visited = vec![false; grid.foreground.len()];

    let mut sorted_junctions = junctions.to_vec();
    sorted_junctions.sort_by_key(|p| p.raster_key());
    let mut sorted_endpoints = endpoints.to_vec();
    sorted_endpoints.sort_by_key(|p| p.raster_key());

    let mut seeds = Vec::with_capacity(junctions.len() + endpoints.len());
    let mut skipped = 0_usize;
    for p in sorted_junctions.into_iter().chain(sorted_endpoints) {
        match grid.index(p) {
            Some(i) if grid.foreground[i] => {
                grid.special[i] = true;
                seeds.push(p);
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(skipped, "special points off the skeleton were not used as seeds");
    }

    let mut paths = Vec::new();
    for &seed in &seeds {
        let Some(idx) = grid.index(seed) else {
            continue;
        };
        visited[idx] = true;
        while let Some(first) = grid.first_unvisited_neighbor(seed, &visited) {
            let path = walk(&grid, &mut visited, seed, first);
            if path.len() >= 2 {
                paths.push(path);
            }
        }
    }
    let seeded = paths.len();

    for idx in 0..visited.len() {
        if !grid.foreground[idx] || visited[idx] {
            continue;
        }
        let start = grid.point(idx);
        visited[idx] = true;
        let mut path = match grid.first_unvisited_neighbor(start, &visited) {
            Some(first) => walk(&grid, &mut visited, start, first),
            None => continue_from(&grid, start),
        };
        if let (Some(&first), Some(&last)) = (path.first(), path.last())
            && path.len() >= 3
            && !grid.is_special(last)
            && last.is_adjacent(first)
        {
            path.push(first);
        }
        if path.len() >= 2 {
            paths.push(path);
        }
    }
    let looped = paths.len() - seeded;

    let spliced = splice_stranded(&grid, &mut paths);

    tracing::debug!(
        seeds = seeds.len(),
        seeded_paths = seeded,
        loop_paths = looped,
        spliced,
        "traced skeleton"
    );
    paths.into_iter().map(Path::new).collect()
}

/// Attach foreground pixels that no path covers. Returns how many were
/// placed; isolated pixels stay out.
fn splice_stranded(grid: &Grid, paths: &mut Vec<Vec<Point>>) -> usize {
    let mut covered = vec![false; grid.foreground.len()];
    for &p in paths.iter().flatten() {
        if let Some(i) = grid.index(p) {
            covered[i] = true;
        }
    }
    let mut stranded: Vec<Point> = (0..covered.len())
        .filter(|&i| grid.foreground[i] && !covered[i])
        .map(|i| grid.point(i))
        .collect();

    let mut placed = 0;
    // A stranded pixel may only touch other stranded pixels until one
    // of them is placed.
    loop {
        let before = stranded.len();
        stranded.retain(|&s| !place_stranded(grid, paths, s));
        placed += before - stranded.len();
        if stranded.is_empty() || stranded.len() == before {
            return placed;
        }
    }
}

/// Place `s` next to a path it touches, in order of preference:
/// between two consecutive points, past a plain open end, on a new
/// two-point path from an adjacent special end, or as a detour
/// `a -> s -> a` off any adjacent point.
fn place_stranded(grid: &Grid, paths: &mut Vec<Vec<Point>>, s: Point) -> bool {
    for path in paths.iter_mut() {
        if let Some(k) = path
            .windows(2)
            .position(|w| w[0].is_adjacent(s) && w[1].is_adjacent(s))
        {
            path.insert(k + 1, s);
            return true;
        }
    }
    for path in paths.iter_mut() {
        let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
            continue;
        };
        if first == last {
            continue;
        }
        if last.is_adjacent(s) && !grid.is_special(last) {
            path.push(s);
            return true;
        }
        if first.is_adjacent(s) && !grid.is_special(first) {
            path.insert(0, s);
            return true;
        }
    }
    let special_end = paths
        .iter()
        .filter_map(|path| Some([*path.first()?, *path.last()?]))
        .flatten()
        .find(|&q| grid.is_special(q) && q.is_adjacent(s));
    if let Some(q) = special_end {
        paths.push(vec![q, s]);
        return true;
    }
    for path in paths.iter_mut() {
        if let Some(k) = path.iter().position(|&q| q.is_adjacent(s)) {
            let anchor = path[k];
            path.insert(k + 1, anchor);
            path.insert(k + 1, s);
            return true;
        }
    }
    false
}

/// Walk from `start` through `first` until a special point or a dead end.
fn walk(grid: &Grid, visited: &mut [bool], start: Point, first: Point) -> Vec<Point> {
    let mut path = vec![start];
    let mut current = first;
    loop {
        if let Some(i) = grid.index(current) {
            visited[i] = true;
        }
        path.push(current);
        if grid.is_special(current) {
            return path;
        }
        match next_step(grid, visited, &path) {
            Some(next) => current = next,
            None => return path,
        }
    }
}

/// Extend a single-pixel walk that has no unvisited neighbour: it can
/// still end on an adjacent special point.
fn continue_from(grid: &Grid, start: Point) -> Vec<Point> {
    let mut path = vec![start];
    if let Some(special) = Grid::neighbors(start).find(|&q| grid.is_special(q)) {
        path.push(special);
    }
    path
}

/// The best admissible continuation of `path`, if any.
///
/// Admissible: unvisited foreground pixels, or visited special points
/// other than the pixel just left. The path's own start is admissible
/// only once the path has at least three points. Special points win
/// over plain pixels; within each group the smallest turn wins.
/// A clustered junction beside a stroke's straight line must still end
/// up in some path.
fn next_step(grid: &Grid, visited: &[bool], path: &[Point]) -> Option<Point> {
    let (&current, rest) = path.split_last()?;
    let &previous = rest.last()?;
    let start = path[0];
    let heading = (
        f64::from(current.x - previous.x),
        f64::from(current.y - previous.y),
    );

    let mut best: Option<((bool, f64), Point)> = None;
    for candidate in Grid::neighbors(current) {
        let Some(i) = grid.index(candidate) else {
            continue;
        };
        if !grid.foreground[i] || candidate == previous {
            continue;
        }
        let admissible = if visited[i] {
            grid.special[i] && (candidate != start || path.len() >= 3)
        } else {
            true
        };
        if !admissible {
            continue;
        }
        let step = (
            f64::from(candidate.x - current.x),
            f64::from(candidate.y - current.y),
        );
        let rank = (!grid.special[i], turn_angle(heading, step));
        if best.is_none_or(|(best_rank, _)| rank < best_rank) {
            best = Some((rank, candidate));
        }
    }
    best.map(|(_, p)| p)
}

/// Absolute signed angle between two direction vectors, in radians.
fn turn_angle(from: (f64, f64), to: (f64, f64)) -> f64 {
    let cross = from.0.mul_add(to.1, -(from.1 * to.0));
    let dot = from.0.mul_add(to.0, from.1 * to.1);
    cross.atan2(dot).abs()
}
