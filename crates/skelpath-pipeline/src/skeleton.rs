//! Two-sub-pass topological thinning (Zhang-Suen).
//!
//! Each foreground pixel is examined through its 8 neighbours in the
//! cyclic order N, NE, E, SE, S, SW, W, NW. A pixel is deleted when
//!
//! - it has between 2 and 6 foreground neighbours (`B`),
//! - walking the cyclic sequence crosses background→foreground exactly
//!   once (`A == 1`),
//! - and two corner-preserving products vanish: `N·E·S` and `E·S·W` in
//!   the first sub-pass, `N·E·W` and `N·S·W` in the second.
//!
//! Candidates of a sub-pass are collected first and removed together,
//! so the result within a sub-pass does not depend on scan order.
//! Pixels on the image border are never deleted.

use image::{GrayImage, Luma};

use crate::types::{BACKGROUND, FOREGROUND, PipelineError};

/// Stage name used in [`PipelineError::ComputeBounded`] reports.
pub const STAGE: &str = "thinning";

/// Output of [`skeletonize`].
#[derive(Debug, Clone)]
pub struct Thinned {
    /// The thinned mask.
    pub skeleton: GrayImage,
    /// Full iterations (sub-pass 1 + sub-pass 2) performed.
    pub iterations: usize,
    /// Whether the last iteration deleted nothing.
    pub converged: bool,
}

impl Thinned {
    /// The [`PipelineError::ComputeBounded`] report for a run that hit
    /// its iteration cap, or `None` if it converged.
    #[must_use]
    pub fn bounded(&self) -> Option<PipelineError> {
        (!self.converged).then(|| PipelineError::ComputeBounded {
            stage: STAGE.to_string(),
            iterations: self.iterations,
        })
    }
}

/// Thin every foreground blob of `mask` to a roughly 1-pixel-wide
/// skeleton.
///
/// Iterates until a full iteration deletes nothing or
/// `max_iterations` is reached. The cap bounds runtime on pathological
/// inputs; a capped result is still returned, with
/// [`Thinned::converged`] set to `false`.
#[must_use = "returns the thinned mask"]
pub fn skeletonize(mask: &GrayImage, max_iterations: usize) -> Thinned {
    let (width, height) = mask.dimensions();
    let w = width as usize;
    let h = height as usize;
    let mut grid: Vec<u8> = mask
        .pixels()
        .map(|p| u8::from(p.0[0] == FOREGROUND))
        .collect();

    let mut iterations = 0;
    let mut converged = false;
    let mut marked = Vec::new();

    while iterations < max_iterations {
        iterations += 1;
        let mut deleted = 0;
        for first_pass in [true, false] {
            collect_candidates(&grid, w, h, first_pass, &mut marked);
            deleted += marked.len();
            for &idx in &marked {
                grid[idx] = 0;
            }
        }
        if deleted == 0 {
            converged = true;
            break;
        }
    }

    if !converged {
        tracing::warn!(
            iterations,
            "thinning hit its iteration cap; skeleton may be more than 1px wide"
        );
    }

    let skeleton = GrayImage::from_fn(width, height, |x, y| {
        if grid[y as usize * w + x as usize] == 1 {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    });
    Thinned {
        skeleton,
        iterations,
        converged,
    }
}

/// Gather deletion candidates for one sub-pass into `out`.
fn collect_candidates(grid: &[u8], w: usize, h: usize, first_pass: bool, out: &mut Vec<usize>) {
    out.clear();
    if w < 3 || h < 3 {
        return;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let idx = y * w + x;
            if grid[idx] == 0 {
                continue;
            }
            let p = neighbors(grid, w, x, y);
            if is_deletable(&p, first_pass) {
                out.push(idx);
            }
        }
    }
}

/// The 8 neighbours of an interior pixel in the order N, NE, E, SE, S,
/// SW, W, NW.
fn neighbors(grid: &[u8], w: usize, x: usize, y: usize) -> [u8; 8] {
    let up = (y - 1) * w;
    let mid = y * w;
    let down = (y + 1) * w;
    [
        grid[up + x],
        grid[up + x + 1],
        grid[mid + x + 1],
        grid[down + x + 1],
        grid[down + x],
        grid[down + x - 1],
        grid[mid + x - 1],
        grid[up + x - 1],
    ]
}

/// Number of 0→1 transitions walking the neighbours cyclically.
fn transitions(p: &[u8; 8]) -> usize {
    (0..8).filter(|&i| p[i] == 0 && p[(i + 1) % 8] == 1).count()
}

fn is_deletable(p: &[u8; 8], first_pass: bool) -> bool {
    let b: u8 = p.iter().sum();
    if !(2..=6).contains(&b) || transitions(p) != 1 {
        return false;
    }
    let [n, _, e, _, s, _, w, _] = *p;
    if first_pass {
        n * e * s == 0 && e * s * w == 0
    } else {
        n * e * w == 0 && n * s * w == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if f(x, y) {
                Luma([FOREGROUND])
            } else {
                Luma([BACKGROUND])
            }
        })
    }

    fn foreground(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p.0[0] == FOREGROUND).count()
    }

    #[test]
    fn single_pixel_line_is_unchanged() {
        let mask = mask_from(60, 21, |x, y| y == 10 && (5..55).contains(&x));
        let thinned = skeletonize(&mask, 100);
        assert_eq!(thinned.skeleton, mask);
        assert!(thinned.converged);
        assert_eq!(thinned.iterations, 1);
    }

    #[test]
    fn thick_bar_thins_to_single_row() {
        // 5-pixel-tall horizontal bar.
        let mask = mask_from(40, 15, |x, y| (5..35).contains(&x) && (5..10).contains(&y));
        let thinned = skeletonize(&mask, 100);
        assert!(thinned.converged);
        // Every interior column keeps exactly one pixel.
        for x in 10..30 {
            let column = (0..15)
                .filter(|&y| thinned.skeleton.get_pixel(x, y).0[0] == FOREGROUND)
                .count();
            assert_eq!(column, 1, "column {x} should be 1px wide");
        }
    }

    #[test]
    fn skeletonize_is_idempotent() {
        let mask = mask_from(30, 30, |x, y| {
            let bar = (4..26).contains(&x) && (12..17).contains(&y);
            let post = (12..17).contains(&x) && (4..26).contains(&y);
            bar || post
        });
        let once = skeletonize(&mask, 100);
        assert!(once.converged);
        let twice = skeletonize(&once.skeleton, 100);
        assert_eq!(once.skeleton, twice.skeleton);
        assert!(foreground(&once.skeleton) > 0);
    }

    #[test]
    fn empty_mask_converges_immediately() {
        let mask = GrayImage::new(10, 10);
        let thinned = skeletonize(&mask, 100);
        assert!(thinned.converged);
        assert_eq!(foreground(&thinned.skeleton), 0);
        assert!(thinned.bounded().is_none());
    }

    #[test]
    fn cap_reports_compute_bounded() {
        let mask = mask_from(40, 40, |x, y| (5..35).contains(&x) && (5..35).contains(&y));
        let thinned = skeletonize(&mask, 1);
        assert!(!thinned.converged);
        assert_eq!(thinned.iterations, 1);
        assert!(matches!(
            thinned.bounded(),
            Some(PipelineError::ComputeBounded { iterations: 1, .. })
        ));
    }

    #[test]
    fn border_pixels_are_never_deleted() {
        let mask = mask_from(5, 5, |_, _| true);
        let thinned = skeletonize(&mask, 100);
        for x in 0..5 {
            assert_eq!(thinned.skeleton.get_pixel(x, 0).0[0], FOREGROUND);
            assert_eq!(thinned.skeleton.get_pixel(x, 4).0[0], FOREGROUND);
        }
    }

    #[test]
    fn transition_count() {
        assert_eq!(transitions(&[0, 0, 1, 0, 0, 1, 1, 1]), 2);
        assert_eq!(transitions(&[1, 1, 0, 0, 0, 0, 0, 0]), 1);
        assert_eq!(transitions(&[0; 8]), 0);
    }
}
