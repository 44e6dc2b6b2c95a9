//! Endpoint and junction detection on a skeleton mask.
//!
//! A skeleton pixel is classified by how many of its 8 neighbours are
//! foreground: one neighbour makes it an endpoint (a stroke terminus),
//! more than two make it a junction (a branch point), exactly two make
//! it an ordinary path pixel. Neighbour positions outside the image
//! count as background.

use image::GrayImage;

use crate::types::{FOREGROUND, Point};

/// The 8 neighbour offsets `(dx, dy)` in row-major order.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Classified special points of a skeleton, in raster order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecialPoints {
    /// Pixels with exactly one foreground neighbour.
    pub endpoints: Vec<Point>,
    /// Pixels with more than two foreground neighbours.
    pub junctions: Vec<Point>,
}

/// Whether the pixel at `p` is foreground. Out-of-bounds is background.
#[must_use]
pub fn is_foreground(mask: &GrayImage, p: Point) -> bool {
    p.in_bounds(mask.width(), mask.height())
        && mask.get_pixel(p.x.unsigned_abs(), p.y.unsigned_abs()).0[0] == FOREGROUND
}

/// Count the foreground pixels among the 8 in-bounds neighbours of `p`.
#[must_use]
pub fn neighbor_count(mask: &GrayImage, p: Point) -> usize {
    NEIGHBOR_OFFSETS
        .iter()
        .filter(|&&(dx, dy)| is_foreground(mask, Point::new(p.x + dx, p.y + dy)))
        .count()
}

/// Classify every foreground pixel of `skeleton`.
#[must_use = "returns the detected endpoints and junctions"]
pub fn find_special_points(skeleton: &GrayImage) -> SpecialPoints {
    let mut special = SpecialPoints::default();
    for (x, y, pixel) in skeleton.enumerate_pixels() {
        if pixel.0[0] != FOREGROUND {
            continue;
        }
        let (Ok(x), Ok(y)) = (i32::try_from(x), i32::try_from(y)) else {
            continue;
        };
        let p = Point::new(x, y);
        match neighbor_count(skeleton, p) {
            1 => special.endpoints.push(p),
            n if n > 2 => special.junctions.push(p),
            _ => {}
        }
    }
    tracing::debug!(
        endpoints = special.endpoints.len(),
        junctions = special.junctions.len(),
        "classified skeleton pixels"
    );
    special
}
