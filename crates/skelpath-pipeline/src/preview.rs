//! Raster previews of traced and fitted paths.
//!
//! Paths are drawn on a black canvas the size of the source image, each
//! in a colour cycled from [`PALETTE`] with small dots at both ends.
//! Endpoints are overlaid as green discs and crosspoints as red discs,
//! both with a white ring.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};

use crate::types::{FittedPath, PathSet, Point};

/// Colours cycled across paths.
pub const PALETTE: [Rgb<u8>; 10] = [
    Rgb([255, 255, 255]),
    Rgb([0, 255, 255]),
    Rgb([255, 255, 0]),
    Rgb([255, 0, 255]),
    Rgb([0, 255, 128]),
    Rgb([128, 255, 0]),
    Rgb([255, 128, 128]),
    Rgb([128, 128, 255]),
    Rgb([255, 255, 128]),
    Rgb([255, 128, 255]),
];

const ENDPOINT: Rgb<u8> = Rgb([0, 255, 0]);
const CROSSPOINT: Rgb<u8> = Rgb([255, 0, 0]);
const RING: Rgb<u8> = Rgb([255, 255, 255]);

/// Bezier samples per fitted curve.
pub const DEFAULT_CURVE_SAMPLES: usize = 200;

/// Render the traced paths and special points of `set`.
#[must_use = "returns the rendered preview"]
pub fn render_paths(set: &PathSet) -> RgbImage {
    let mut canvas = RgbImage::new(set.image_size.width, set.image_size.height);
    for (i, path) in set.paths.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let pts: Vec<(f32, f32)> = path.points().iter().map(|&p| to_f32(p)).collect();
        draw_polyline(&mut canvas, &pts, color);
        for end in [path.first(), path.last()].into_iter().flatten() {
            draw_filled_circle_mut(&mut canvas, (end.x, end.y), 2, color);
        }
    }
    draw_special_points(&mut canvas, set);
    canvas
}

/// Render the fitted geometry of `set`, sampling each Bezier at
/// `samples` parameter values. Falls back to [`render_paths`] when the
/// set carries no fits.
#[must_use = "returns the rendered preview"]
pub fn render_fitted(set: &PathSet, samples: usize) -> RgbImage {
    let Some(fitted) = &set.fitted_paths else {
        return render_paths(set);
    };
    let mut canvas = RgbImage::new(set.image_size.width, set.image_size.height);
    for (i, fit) in fitted.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        #[allow(clippy::cast_possible_truncation)]
        let pts: Vec<(f32, f32)> = fit
            .sample(samples)
            .into_iter()
            .map(|(x, y)| (x as f32, y as f32))
            .collect();
        draw_polyline(&mut canvas, &pts, color);
        if let FittedPath::Bezier { p0, p3, .. } = fit {
            draw_filled_circle_mut(&mut canvas, (p0.x, p0.y), 2, color);
            draw_filled_circle_mut(&mut canvas, (p3.x, p3.y), 2, color);
        }
    }
    draw_special_points(&mut canvas, set);
    canvas
}

fn draw_special_points(canvas: &mut RgbImage, set: &PathSet) {
    for p in &set.endpoints {
        draw_filled_circle_mut(canvas, (p.x, p.y), 4, ENDPOINT);
        draw_hollow_circle_mut(canvas, (p.x, p.y), 5, RING);
    }
    for p in &set.junctions {
        draw_filled_circle_mut(canvas, (p.x, p.y), 3, CROSSPOINT);
        draw_hollow_circle_mut(canvas, (p.x, p.y), 4, RING);
    }
}

/// Two-pixel-wide polyline.
fn draw_polyline(canvas: &mut RgbImage, pts: &[(f32, f32)], color: Rgb<u8>) {
    for w in pts.windows(2) {
        let ((x0, y0), (x1, y1)) = (w[0], w[1]);
        for (ox, oy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            draw_line_segment_mut(canvas, (x0 + ox, y0 + oy), (x1 + ox, y1 + oy), color);
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_f32(p: Point) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}
