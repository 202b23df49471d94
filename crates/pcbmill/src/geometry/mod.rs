use geo::{
    unary_union, Area, BooleanOps, BoundingRect, Buffer, Coord, LineString, MapCoordsInPlace,
    MultiPolygon, Point, Polygon, Rect,
};
use serde::{Deserialize, Serialize};

pub mod model;
pub mod offset;
pub mod shapes;

pub use model::GeometryModel;

/// Number of vertices used to approximate a full circle.
pub const CIRCLE_SEGMENTS: usize = 64;

/// Mirror axis for double-sided work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirrorAxis {
    /// Flip across the horizontal line through the reference point.
    X,
    /// Flip across the vertical line through the reference point.
    Y,
}

/// Canonical output of every document and planner stage.
///
/// All members share one unit system. `lines` holds open paths as well as
/// closed rings (first coordinate equal to the last).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolidGeometry {
    pub polygons: Vec<Polygon<f64>>,
    pub lines: Vec<LineString<f64>>,
    pub points: Vec<Point<f64>>,
}

impl SolidGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_polygons(polygons: MultiPolygon<f64>) -> Self {
        Self {
            polygons: polygons.0,
            ..Self::default()
        }
    }

    pub fn from_lines(lines: Vec<LineString<f64>>) -> Self {
        Self {
            lines,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty() && self.lines.is_empty() && self.points.is_empty()
    }

    /// Append every member of `other`.
    pub fn extend(&mut self, other: SolidGeometry) {
        self.polygons.extend(other.polygons);
        self.lines.extend(other.lines);
        self.points.extend(other.points);
    }

    /// Bounding rectangle of everything, `None` when empty.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        let polygon_bounds = self.polygons.iter().filter_map(|p| p.bounding_rect());
        let line_bounds = self.lines.iter().filter_map(|l| l.bounding_rect());
        let point_bounds = self.points.iter().map(|p| Rect::new(p.0, p.0));
        polygon_bounds
            .chain(line_bounds)
            .chain(point_bounds)
            .reduce(merge_rects)
    }

    /// Union of the polygon members.
    pub fn union(&self) -> MultiPolygon<f64> {
        unary_union(self.polygons.iter())
    }

    /// Minkowski buffer of the whole collection by `distance`.
    ///
    /// Polygons are unioned first so overlapping copper buffers as one shape;
    /// a negative distance only erodes the polygon members.
    pub fn buffer(&self, distance: f64) -> MultiPolygon<f64> {
        let mut result = self.union().buffer(distance);
        if distance > 0.0 {
            for line in &self.lines {
                result = result.union(&line.buffer(distance));
            }
            for point in &self.points {
                result = result.union(&point.buffer(distance));
            }
        }
        result
    }

    /// Every ring and line as a polyline: polygon exteriors, then their
    /// interiors, then the line members.
    pub fn rings(&self) -> Vec<LineString<f64>> {
        let mut rings = Vec::new();
        for polygon in &self.polygons {
            rings.push(polygon.exterior().clone());
            rings.extend(polygon.interiors().iter().cloned());
        }
        rings.extend(self.lines.iter().cloned());
        rings
    }

    pub fn area(&self) -> f64 {
        self.polygons.iter().map(|p| p.unsigned_area()).sum()
    }

    /// Scale about the origin.
    pub fn scale(&mut self, fx: f64, fy: f64) {
        self.map_coords_in_place(move |c| Coord {
            x: c.x * fx,
            y: c.y * fy,
        });
    }

    pub fn offset(&mut self, dx: f64, dy: f64) {
        self.map_coords_in_place(move |c| Coord {
            x: c.x + dx,
            y: c.y + dy,
        });
    }

    pub fn mirror(&mut self, axis: MirrorAxis, about: Coord<f64>) {
        match axis {
            MirrorAxis::X => self.map_coords_in_place(move |c| Coord {
                x: c.x,
                y: 2.0 * about.y - c.y,
            }),
            MirrorAxis::Y => self.map_coords_in_place(move |c| Coord {
                x: 2.0 * about.x - c.x,
                y: c.y,
            }),
        }
        // A reflection flips ring winding; restore exterior/interior orientation.
        for polygon in &mut self.polygons {
            polygon.exterior_mut(|ring| ring.0.reverse());
            polygon.interiors_mut(|rings| {
                for ring in rings {
                    ring.0.reverse();
                }
            });
        }
    }

    fn map_coords_in_place(&mut self, func: impl Fn(Coord<f64>) -> Coord<f64> + Copy) {
        for polygon in &mut self.polygons {
            polygon.map_coords_in_place(func);
        }
        for line in &mut self.lines {
            line.map_coords_in_place(func);
        }
        for point in &mut self.points {
            point.map_coords_in_place(func);
        }
    }
}

pub(crate) fn merge_rects(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{coord, polygon};

    fn unit_square() -> Polygon<f64> {
        polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)]
    }

    #[test]
    fn test_bounds_cover_all_members() {
        let mut geometry = SolidGeometry::new();
        geometry.polygons.push(unit_square());
        geometry
            .lines
            .push(LineString::from(vec![(2.0, 2.0), (3.0, 5.0)]));
        geometry.points.push(Point::new(-1.0, 0.5));

        let bounds = geometry.bounds().unwrap();
        assert_eq!(bounds.min(), coord! { x: -1.0, y: 0.0 });
        assert_eq!(bounds.max(), coord! { x: 3.0, y: 5.0 });
        assert!(SolidGeometry::new().bounds().is_none());
    }

    #[test]
    fn test_scale_and_offset() {
        let mut geometry = SolidGeometry::from_polygons(MultiPolygon(vec![unit_square()]));
        geometry.scale(2.0, 2.0);
        geometry.offset(1.0, -1.0);
        let bounds = geometry.bounds().unwrap();
        assert_eq!(bounds.min(), coord! { x: 1.0, y: -1.0 });
        assert_eq!(bounds.max(), coord! { x: 3.0, y: 1.0 });
        assert_relative_eq!(geometry.area(), 4.0);
    }

    #[test]
    fn test_mirror_keeps_area_and_orientation() {
        let mut geometry = SolidGeometry::from_polygons(MultiPolygon(vec![unit_square()]));
        let before = geometry.polygons[0].signed_area();
        geometry.mirror(MirrorAxis::Y, coord! { x: 2.0, y: 0.0 });
        let bounds = geometry.bounds().unwrap();
        assert_relative_eq!(bounds.min().x, 3.0);
        assert_relative_eq!(bounds.max().x, 4.0);
        assert_relative_eq!(geometry.polygons[0].signed_area(), before);
    }

    #[test]
    fn test_buffer_grows_square() {
        let geometry = SolidGeometry::from_polygons(MultiPolygon(vec![unit_square()]));
        let grown = geometry.buffer(0.5);
        let bounds = grown.bounding_rect().unwrap();
        assert_relative_eq!(bounds.min().x, -0.5, epsilon = 1e-6);
        assert_relative_eq!(bounds.max().y, 1.5, epsilon = 1e-6);
        assert!(grown.unsigned_area() > 3.0);
    }

    #[test]
    fn test_rings_include_interiors() {
        let outer = LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]);
        let hole = LineString::from(vec![(1.0, 1.0), (1.0, 2.0), (2.0, 2.0), (2.0, 1.0)]);
        let geometry = SolidGeometry::from_polygons(MultiPolygon(vec![Polygon::new(
            outer,
            vec![hole],
        )]));
        assert_eq!(geometry.rings().len(), 2);
    }
}
