//! Primitive shape construction and stroking.

use super::CIRCLE_SEGMENTS;
use geo::algorithm::orient::{Direction, Orient};
use geo::{unary_union, Area, Buffer, ConvexHull, Coord, LineString, MultiPolygon, Polygon, Rect};
use std::f64::consts::{PI, TAU};

/// Regular `CIRCLE_SEGMENTS`-gon inscribed in the circle.
pub fn circle(center: Coord<f64>, radius: f64) -> Polygon<f64> {
    regular_polygon(center, radius, CIRCLE_SEGMENTS, 0.0)
}

/// Regular polygon with `vertices` corners on a circle of `radius`, first
/// vertex at `rotation` radians.
pub fn regular_polygon(
    center: Coord<f64>,
    radius: f64,
    vertices: usize,
    rotation: f64,
) -> Polygon<f64> {
    let n = vertices.max(3);
    let ring: Vec<Coord<f64>> = (0..n)
        .map(|i| {
            let angle = rotation + TAU * i as f64 / n as f64;
            Coord {
                x: center.x + radius * angle.cos(),
                y: center.y + radius * angle.sin(),
            }
        })
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}

/// Axis-aligned rectangle centred on `center`.
pub fn rectangle(center: Coord<f64>, width: f64, height: f64) -> Polygon<f64> {
    Rect::new(
        Coord {
            x: center.x - width / 2.0,
            y: center.y - height / 2.0,
        },
        Coord {
            x: center.x + width / 2.0,
            y: center.y + height / 2.0,
        },
    )
    .to_polygon()
    .orient(Direction::Default)
}

/// Stadium shape: a rectangle whose short sides are semicircles.
pub fn obround(center: Coord<f64>, width: f64, height: f64) -> Polygon<f64> {
    if (width - height).abs() <= f64::EPSILON {
        return circle(center, width / 2.0);
    }
    let radius = width.min(height) / 2.0;
    let half_arc = CIRCLE_SEGMENTS / 2;
    // Centres of the two end caps and the angle at which the first cap starts.
    let (a, b, start) = if width > height {
        let d = (width - height) / 2.0;
        (
            Coord { x: center.x + d, y: center.y },
            Coord { x: center.x - d, y: center.y },
            -PI / 2.0,
        )
    } else {
        let d = (height - width) / 2.0;
        (
            Coord { x: center.x, y: center.y + d },
            Coord { x: center.x, y: center.y - d },
            0.0,
        )
    };

    let mut ring = Vec::with_capacity(2 * (half_arc + 1));
    for (cap, offset) in [(a, start), (b, start + PI)] {
        for i in 0..=half_arc {
            let angle = offset + PI * i as f64 / half_arc as f64;
            ring.push(Coord {
                x: cap.x + radius * angle.cos(),
                y: cap.y + radius * angle.sin(),
            });
        }
    }
    Polygon::new(LineString::from(ring), vec![])
}

/// Area swept by a round pen of `width` along `path`.
pub fn round_stroke(path: &[Coord<f64>], width: f64) -> MultiPolygon<f64> {
    match path {
        [] => MultiPolygon(vec![]),
        [single] => MultiPolygon(vec![circle(*single, width / 2.0)]),
        _ => LineString::from(path.to_vec()).buffer(width / 2.0),
    }
}

/// Area swept by a convex `footprint` (centred on the origin) along `path`.
///
/// Each segment's sweep is the convex hull of the footprint placed at both
/// ends, which is exact for convex footprints.
pub fn footprint_stroke(path: &[Coord<f64>], footprint: &Polygon<f64>) -> MultiPolygon<f64> {
    let placed = |at: Coord<f64>| -> Vec<Coord<f64>> {
        footprint
            .exterior()
            .coords()
            .map(|c| Coord {
                x: c.x + at.x,
                y: c.y + at.y,
            })
            .collect()
    };

    if path.len() == 1 {
        return MultiPolygon(vec![Polygon::new(LineString::from(placed(path[0])), vec![])]);
    }

    let hulls: Vec<Polygon<f64>> = path
        .windows(2)
        .map(|pair| {
            let mut cloud = placed(pair[0]);
            cloud.extend(placed(pair[1]));
            LineString::from(cloud).convex_hull()
        })
        .filter(|hull| hull.unsigned_area() > 0.0)
        .collect();
    unary_union(hulls.iter())
}

/// Rectangle grown by `margin` on every side.
pub fn expand_rect(rect: Rect<f64>, margin: f64) -> Rect<f64> {
    Rect::new(
        Coord {
            x: rect.min().x - margin,
            y: rect.min().y - margin,
        },
        Coord {
            x: rect.max().x + margin,
            y: rect.max().y + margin,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{coord, BoundingRect};

    #[test]
    fn test_circle_area_close_to_exact() {
        let c = circle(coord! { x: 1.0, y: 1.0 }, 0.5);
        let exact = PI * 0.25;
        assert!((c.unsigned_area() - exact).abs() / exact < 0.01);
    }

    #[test]
    fn test_rectangle_bounds() {
        let r = rectangle(coord! { x: 0.0, y: 0.0 }, 2.0, 1.0);
        let b = r.bounding_rect().unwrap();
        assert_eq!(b.min(), coord! { x: -1.0, y: -0.5 });
        assert_eq!(b.max(), coord! { x: 1.0, y: 0.5 });
        assert!(r.signed_area() > 0.0);
    }

    #[test]
    fn test_obround_extent_both_orientations() {
        let wide = obround(coord! { x: 0.0, y: 0.0 }, 3.0, 1.0);
        let b = wide.bounding_rect().unwrap();
        assert_relative_eq!(b.max().x, 1.5, epsilon = 1e-9);
        assert_relative_eq!(b.max().y, 0.5, epsilon = 1e-9);

        let tall = obround(coord! { x: 0.0, y: 0.0 }, 1.0, 3.0);
        let b = tall.bounding_rect().unwrap();
        assert_relative_eq!(b.max().y, 1.5, epsilon = 1e-9);
        assert_relative_eq!(b.max().x, 0.5, epsilon = 1e-9);
        assert!(tall.signed_area() > 0.0);
    }

    #[test]
    fn test_footprint_stroke_of_square_pen() {
        let pen = rectangle(coord! { x: 0.0, y: 0.0 }, 1.0, 1.0);
        let path = [coord! { x: 0.0, y: 0.0 }, coord! { x: 4.0, y: 0.0 }];
        let swept = footprint_stroke(&path, &pen);
        assert_relative_eq!(swept.unsigned_area(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_round_stroke_single_point_is_dot() {
        let dot = round_stroke(&[coord! { x: 2.0, y: 2.0 }], 1.0);
        assert_eq!(dot.0.len(), 1);
    }
}
