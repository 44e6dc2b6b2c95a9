//! End-to-end checks of the skeleton path pipeline on synthetic masks
//! and in-memory PNGs.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use image::{GrayImage, Luma};
use skelpath_pipeline::cluster::merge_close_points;
use skelpath_pipeline::fit::fit_path;
use skelpath_pipeline::skeleton::skeletonize;
use skelpath_pipeline::special::find_special_points;
use skelpath_pipeline::trace::trace_paths;
use skelpath_pipeline::types::FOREGROUND;
use skelpath_pipeline::{
    FitConfig, FitKind, Path, PipelineConfig, Point, process, process_staged,
};

/// Half-open rectangle `[x0, x1) x [y0, y1)`.
type Rect = (u32, u32, u32, u32);

fn mask_from_rects(width: u32, height: u32, fill: &[Rect], cut: &[Rect]) -> GrayImage {
    let inside = |rects: &[Rect], x: u32, y: u32| {
        rects
            .iter()
            .any(|&(x0, y0, x1, y1)| (x0..x1).contains(&x) && (y0..y1).contains(&y))
    };
    GrayImage::from_fn(width, height, |x, y| {
        if inside(fill, x, y) && !inside(cut, x, y) {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// Black strokes on white, as a scanned drawing would look.
fn ink_png(mask: &GrayImage) -> Vec<u8> {
    let ink = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([255 - mask.get_pixel(x, y).0[0]])
    });
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        ink.as_raw(),
        ink.width(),
        ink.height(),
        image::ExtendedColorType::L8,
    )
    .unwrap();
    buf
}

fn thick_plus() -> GrayImage {
    mask_from_rects(40, 40, &[(4, 18, 36, 23), (18, 4, 23, 36)], &[])
}

fn thick_tee() -> GrayImage {
    mask_from_rects(48, 40, &[(4, 4, 44, 9), (22, 4, 27, 36)], &[])
}

fn thick_frame() -> GrayImage {
    mask_from_rects(40, 40, &[(5, 5, 35, 35)], &[(10, 10, 30, 30)])
}

fn thick_e() -> GrayImage {
    mask_from_rects(
        50,
        40,
        &[(4, 4, 46, 8), (4, 4, 8, 36), (4, 32, 46, 36), (24, 8, 28, 32)],
        &[],
    )
}

/// Paint every pixel within `radius` of the segment `a`-`b`.
#[allow(clippy::suboptimal_flops)]
fn stroke(mask: &mut GrayImage, a: (i32, i32), b: (i32, i32), radius: f64) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    for (x, y, px) in mask.enumerate_pixels_mut() {
        let (x, y) = (x.cast_signed(), y.cast_signed());
        let t = if len2 == 0 {
            0.0
        } else {
            (f64::from((x - a.0) * dx + (y - a.1) * dy) / f64::from(len2)).clamp(0.0, 1.0)
        };
        let ex = f64::from(x) - (f64::from(a.0) + t * f64::from(dx));
        let ey = f64::from(y) - (f64::from(a.1) + t * f64::from(dy));
        if ex * ex + ey * ey <= radius * radius {
            *px = Luma([FOREGROUND]);
        }
    }
}

fn thick_slant() -> GrayImage {
    let mut mask = GrayImage::new(60, 40);
    stroke(&mut mask, (6, 30), (52, 4), 2.5);
    mask
}

fn thick_x() -> GrayImage {
    let mut mask = GrayImage::new(48, 48);
    stroke(&mut mask, (6, 6), (41, 41), 2.5);
    stroke(&mut mask, (41, 6), (6, 41), 2.5);
    mask
}

fn thick_ring() -> GrayImage {
    GrayImage::from_fn(48, 48, |x, y| {
        let d = (x.cast_signed() - 24).pow(2) + (y.cast_signed() - 24).pow(2);
        if (144..=256).contains(&d) {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

/// Three random thick strokes on a 60x60 canvas, from an xorshift stream.
fn scribble(seed: u64) -> GrayImage {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1);
    let mut coordinate = || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        i32::try_from(4 + state % 52).unwrap()
    };
    let mut mask = GrayImage::new(60, 60);
    for _ in 0..3 {
        let a = (coordinate(), coordinate());
        let b = (coordinate(), coordinate());
        stroke(&mut mask, a, b, 2.5);
    }
    mask
}

fn foreground(mask: &GrayImage) -> HashSet<Point> {
    mask.enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] == FOREGROUND)
        .map(|(x, y, _)| Point::new(x.cast_signed(), y.cast_signed()))
        .collect()
}

/// Paths cover the skeleton exactly, are 8-connected, and overlap only
/// at special points.
fn assert_partition(skeleton: &GrayImage, paths: &[Path], special: &[Point]) {
    let special: HashSet<Point> = special.iter().copied().collect();
    let mut seen = HashSet::new();
    for path in paths {
        assert!(path.len() >= 2);
        for w in path.points().windows(2) {
            assert!(w[0].is_adjacent(w[1]), "{:?} -> {:?}", w[0], w[1]);
        }
        let own: HashSet<Point> = path.points().iter().copied().collect();
        for p in own {
            if !seen.insert(p) {
                assert!(special.contains(&p), "{p:?} shared but not special");
            }
        }
    }
    assert_eq!(seen, foreground(skeleton));
}

#[test]
fn straight_line_mask_becomes_one_fitted_line() {
    let mask = mask_from_rects(60, 21, &[(5, 10, 55, 11)], &[]);
    let thinned = skeletonize(&mask, PipelineConfig::DEFAULT_MAX_THINNING_ITERATIONS);
    assert!(thinned.converged);
    assert_eq!(thinned.skeleton, mask);

    let special = find_special_points(&thinned.skeleton);
    assert_eq!(
        special.endpoints,
        vec![Point::new(5, 10), Point::new(54, 10)]
    );
    assert!(special.junctions.is_empty());

    let paths = trace_paths(&thinned.skeleton, &special.endpoints, &special.junctions);
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].len(), 50);
    assert_eq!(
        fit_path(&paths[0], &FitConfig::default()).unwrap().kind(),
        FitKind::Line
    );
}

#[test]
fn thin_cross_has_one_junction_and_four_arms() {
    let mask = mask_from_rects(21, 21, &[(2, 10, 19, 11), (10, 2, 11, 19)], &[]);
    let thinned = skeletonize(&mask, PipelineConfig::DEFAULT_MAX_THINNING_ITERATIONS);
    assert_eq!(thinned.skeleton, mask);

    let raw = find_special_points(&thinned.skeleton);
    let endpoints = merge_close_points(&raw.endpoints, PipelineConfig::DEFAULT_ENDPOINT_MERGE_DISTANCE);
    let junctions = merge_close_points(&raw.junctions, PipelineConfig::DEFAULT_JUNCTION_MERGE_DISTANCE);
    let center = Point::new(10, 10);
    assert_eq!(junctions, vec![center]);
    assert_eq!(
        endpoints,
        vec![
            Point::new(10, 2),
            Point::new(2, 10),
            Point::new(18, 10),
            Point::new(10, 18),
        ]
    );

    let paths = trace_paths(&thinned.skeleton, &endpoints, &junctions);
    assert_eq!(paths.len(), 4);
    for path in &paths {
        assert_eq!(path.first(), Some(center));
        assert!(path.last().is_some_and(|p| endpoints.contains(&p)));
    }
    let mut special = endpoints;
    special.push(center);
    assert_partition(&thinned.skeleton, &paths, &special);
}

#[test]
fn classification_follows_the_threshold() {
    let path = Path::new(vec![
        Point::new(0, 0),
        Point::new(25, 0),
        Point::new(50, 1),
        Point::new(75, 0),
        Point::new(100, 0),
    ]);
    assert!(path.straightness().unwrap() > 0.999);
    let loose = FitConfig::default();
    let strict = FitConfig {
        line_threshold: 1.5,
        ..FitConfig::default()
    };
    assert_eq!(fit_path(&path, &loose).unwrap().kind(), FitKind::Line);
    assert_eq!(fit_path(&path, &strict).unwrap().kind(), FitKind::Bezier);
}

#[test]
fn thinning_is_idempotent() {
    for mask in [thick_plus(), thick_tee(), thick_frame(), thick_e()] {
        let once = skeletonize(&mask, 100);
        let twice = skeletonize(&once.skeleton, 100);
        assert_eq!(twice.skeleton, once.skeleton);
        assert_eq!(twice.iterations, 1);
    }
}

#[test]
fn traced_paths_partition_the_skeleton() {
    let config = PipelineConfig::default();
    for mask in [thick_plus(), thick_tee(), thick_frame(), thick_e()] {
        let staged = process_staged(&ink_png(&mask), &config).unwrap();
        let mut special = staged.endpoints.clone();
        special.extend(&staged.junctions);
        assert_partition(&staged.skeleton, &staged.traced, &special);
    }
}

#[test]
fn diagonal_and_curved_strokes_partition_the_skeleton() {
    let config = PipelineConfig::default();
    for mask in [thick_slant(), thick_x(), thick_ring()] {
        let staged = process_staged(&ink_png(&mask), &config).unwrap();
        let mut special = staged.endpoints.clone();
        special.extend(&staged.junctions);
        assert_partition(&staged.skeleton, &staged.traced, &special);
    }
}

#[test]
fn scribbled_strokes_partition_the_skeleton() {
    let config = PipelineConfig::default();
    for seed in 0..40 {
        let staged = process_staged(&ink_png(&scribble(seed)), &config).unwrap();
        let mut special = staged.endpoints.clone();
        special.extend(&staged.junctions);
        assert_partition(&staged.skeleton, &staged.traced, &special);
    }
}

#[test]
fn thick_plus_from_png() {
    let set = process(&ink_png(&thick_plus()), &PipelineConfig::default()).unwrap();
    assert_eq!(set.junctions, vec![Point::new(20, 20)]);
    assert_eq!(set.endpoints.len(), 4);
    // Four arms meet at the junction and pair up into two strokes.
    assert_eq!(set.paths.len(), 2);
    assert_eq!(set.fitted_paths.as_ref().map(Vec::len), Some(2));
    set.validate().unwrap();
}

#[test]
fn thick_tee_from_png() {
    let staged = process_staged(&ink_png(&thick_tee()), &PipelineConfig::default()).unwrap();
    assert!(staged.thinning_converged);
    assert_eq!(staged.junctions, vec![Point::new(24, 6)]);
    assert_eq!(staged.endpoints.len(), 3);
    assert_eq!(staged.traced.len(), 3);
    assert_eq!(staged.stitched.len(), 2);
}
