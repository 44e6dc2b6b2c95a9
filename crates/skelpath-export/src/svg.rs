//! SVG export serializer.
//!
//! Converts a [`PathSet`] into an SVG string using the [`svg`] crate for
//! document construction, XML escaping, and path data formatting.
//!
//! When the set carries fits, each fitted path becomes one `<path>`:
//! `M`/`L` for lines, `M`/`C` for cubic Beziers, and an `M`/`L`
//! polyline for unfit passthrough paths. Otherwise each raw path is
//! drawn as a polyline. The `viewBox` is the source image pixel grid;
//! no scaling is applied.
//!
//! Optional [`SvgMetadata`] embeds `<title>` and `<desc>` elements for
//! accessibility and to help file managers identify exported files.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Circle, Description, Element, Group, Path as SvgPath, Title};
use svg::node::{Node, Text, Value};

use skelpath_pipeline::{FittedPath, Path, PathSet, Point};

/// Radius of endpoint and crosspoint markers in pixels.
const MARKER_RADIUS: f64 = 2.0;

/// Metadata to embed in the SVG document.
///
/// All fields are optional. When present, a `<title>` and/or `<desc>`
/// element is emitted immediately after the opening `<svg>` tag.
///
/// Text values are XML-escaped automatically by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the source image filename (without extension).
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized `PipelineConfig` JSON, emitted inside a `<metadata>`
    /// element wrapped in a namespaced `<skelpath:pipeline>` element so
    /// exported files carry their settings.
    pub config_json: Option<&'a str>,
}

/// Build an SVG path `d` attribute string from a traced path.
///
/// Uses `M` for the first point and `L` for subsequent points.
/// Returns an empty string for paths with fewer than 2 points.
///
/// # Examples
///
/// ```
/// use skelpath_pipeline::{Path, Point};
/// use skelpath_export::build_path_data;
///
/// let path = Path::new(vec![Point::new(10, 20), Point::new(30, 40)]);
/// assert_eq!(build_path_data(&path), "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(path: &Path) -> String {
    polyline_data(path.points()).map_or_else(String::new, |data| String::from(Value::from(data)))
}

/// Build an SVG path `d` attribute string from a fitted path.
///
/// Lines become `M p0 L p1`, Beziers `M p0 C p1 p2 p3`, and unfit
/// passthrough paths a polyline as in [`build_path_data`].
///
/// # Examples
///
/// ```
/// use skelpath_pipeline::{FittedPath, Point};
/// use skelpath_export::build_fitted_data;
///
/// let line = FittedPath::Line { p0: Point::new(1, 2), p1: Point::new(8, 2) };
/// assert_eq!(build_fitted_data(&line), "M1,2 L8,2");
/// ```
#[must_use]
pub fn build_fitted_data(fitted: &FittedPath) -> String {
    let data = match fitted {
        FittedPath::Line { p0, p1 } => Some(Data::new().move_to(xy(*p0)).line_to(xy(*p1))),
        FittedPath::Bezier { p0, p1, p2, p3 } => Some(
            Data::new()
                .move_to(xy(*p0))
                .cubic_curve_to((p1.x, p1.y, p2.x, p2.y, p3.x, p3.y)),
        ),
        FittedPath::Unfit(path) => polyline_data(path.points()),
    };
    data.map_or_else(String::new, |data| String::from(Value::from(data)))
}

fn polyline_data(points: &[Point]) -> Option<Data> {
    let (first, rest) = points.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let mut data = Data::new().move_to(xy(*first));
    for &p in rest {
        data = data.line_to(xy(p));
    }
    Some(data)
}

const fn xy(p: Point) -> (i32, i32) {
    (p.x, p.y)
}

/// Serialize a path set into an SVG document string.
///
/// Produces a complete SVG document with:
/// - `width`/`height` and `viewBox="0 0 {width} {height}"` from the
///   source image size
/// - Optional `<title>`, `<desc>` and `<metadata>` elements
/// - One `<path>` per fitted path, or per raw path when the set has no
///   fits
/// - When `markers` is set, endpoint (green) and crosspoint (red)
///   circles grouped under `<g id="endpoints">` and
///   `<g id="crosspoints">`
///
/// # Examples
///
/// ```
/// use skelpath_pipeline::{ImageSize, Path, PathSet, Point};
/// use skelpath_export::{SvgMetadata, to_svg};
///
/// let set = PathSet {
///     image_size: ImageSize { height: 60, width: 80, channels: 1 },
///     paths: vec![Path::new(vec![Point::new(10, 15), Point::new(12, 18)])],
///     endpoints: vec![],
///     junctions: vec![],
///     fitted_paths: None,
/// };
/// let metadata = SvgMetadata {
///     title: Some("sketch"),
///     ..SvgMetadata::default()
/// };
/// let svg = to_svg(&set, &metadata, false);
/// assert!(svg.contains("<title>sketch</title>"));
/// assert!(svg.contains("M10,15 L12,18"));
/// ```
#[must_use]
pub fn to_svg(set: &PathSet, metadata: &SvgMetadata<'_>, markers: bool) -> String {
    let w = set.image_size.width;
    let h = set.image_size.height;
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }
    if let Some(config_json) = metadata.config_json {
        let mut pipeline_el = Element::new("skelpath:pipeline");
        pipeline_el.assign("xmlns:skelpath", "https://skelpath.github.io/ns/1");
        pipeline_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(pipeline_el);
        doc = doc.add(metadata_el);
    }

    let data: Vec<String> = set.fitted_paths.as_ref().map_or_else(
        || set.paths.iter().map(build_path_data).collect(),
        |fitted| fitted.iter().map(build_fitted_data).collect(),
    );
    for d in data {
        if d.is_empty() {
            continue;
        }
        let path = SvgPath::new()
            .set("d", d)
            .set("fill", "none")
            .set("stroke", "black")
            .set("stroke-width", 1);
        doc = doc.add(path);
    }

    if markers {
        doc = doc
            .add(marker_group("endpoints", &set.endpoints, "green"))
            .add(marker_group("crosspoints", &set.junctions, "red"));
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

fn marker_group(id: &str, points: &[Point], fill: &str) -> Group {
    points.iter().fold(Group::new().set("id", id), |group, p| {
        group.add(
            Circle::new()
                .set("cx", p.x)
                .set("cy", p.y)
                .set("r", MARKER_RADIUS)
                .set("fill", fill),
        )
    })
}
