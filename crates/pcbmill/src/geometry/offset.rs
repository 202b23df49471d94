use clipper2::{difference, inflate, EndType, JoinType, Path, PathType, Polygon, Polygons, Vertex};
use geo::{Area, Contains, Coord, LineString, MultiPolygon};

/// clipper2 works on fixed-precision coordinates; inch-scale copper needs to be
/// lifted before offsetting so small stepovers survive the rounding.
const CLIPPER_SCALE: f64 = 10_000.0;

/// Maximum distance between a round join and its true arc, in scaled units.
const ARC_TOLERANCE: f64 = 0.25;

/// Offset every polygon by `delta` (negative shrinks) with round joins.
///
/// Holes are honoured: each polygon is first expressed as its exterior minus
/// its interiors, and the offset result is re-nested into exteriors with holes.
pub fn offset_polygons(polygons: &MultiPolygon<f64>, delta: f64) -> MultiPolygon<f64> {
    let mut rings: Vec<LineString<f64>> = Vec::new();

    for polygon in &polygons.0 {
        let outer = Polygon::new(vec![to_path(polygon.exterior())], PathType::Subject);
        let mut shape = Polygons::new(vec![outer]);

        if !polygon.interiors().is_empty() {
            let holes: Vec<Polygon> = polygon
                .interiors()
                .iter()
                .map(|hole| Polygon::new(vec![to_path(hole)], PathType::Clip))
                .collect();
            shape = difference(shape, Polygons::new(holes));
        }

        let offset = inflate(
            shape,
            delta * CLIPPER_SCALE,
            JoinType::Round,
            EndType::ClosedPolygon,
            2.0,
            ARC_TOLERANCE,
        );

        for polygon in offset.polygons() {
            for path in polygon.paths() {
                let coords: Vec<Coord<f64>> = path
                    .vertices()
                    .iter()
                    .map(|v| Coord {
                        x: v.x() / CLIPPER_SCALE,
                        y: v.y() / CLIPPER_SCALE,
                    })
                    .collect();
                if coords.len() >= 3 {
                    rings.push(LineString::from(coords));
                }
            }
        }
    }

    nest_rings(rings)
}

fn to_path(ring: &LineString<f64>) -> Path {
    let mut coords: Vec<Coord<f64>> = ring.coords().copied().collect();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    let vertices: Vec<Vertex> = coords
        .iter()
        .map(|c| Vertex::new(c.x * CLIPPER_SCALE, c.y * CLIPPER_SCALE))
        .collect();
    Path::new(vertices, true)
}

/// Rebuild polygons from loose rings by containment depth: a ring inside an
/// even number of other rings is an exterior, inside an odd number a hole of
/// the smallest exterior that contains it. Winding of the input is ignored.
fn nest_rings(rings: Vec<LineString<f64>>) -> MultiPolygon<f64> {
    let mut rings: Vec<(f64, geo::Polygon<f64>)> = rings
        .into_iter()
        .map(|ring| {
            let shell = geo::Polygon::new(ring, vec![]);
            (shell.unsigned_area(), shell)
        })
        .filter(|(area, _)| *area > 0.0)
        .collect();
    rings.sort_by(|a, b| b.0.total_cmp(&a.0));

    let probe = |shell: &geo::Polygon<f64>| shell.exterior().0[0];
    let depth_of = |index: usize| {
        let point = probe(&rings[index].1);
        rings[..index]
            .iter()
            .filter(|(_, larger)| larger.contains(&point))
            .count()
    };

    let depths: Vec<usize> = (0..rings.len()).map(depth_of).collect();
    let mut exteriors: Vec<(usize, geo::Polygon<f64>)> = Vec::new();
    let mut holes: Vec<(usize, LineString<f64>)> = Vec::new();
    for (index, (_, shell)) in rings.iter().enumerate() {
        if depths[index] % 2 == 0 {
            exteriors.push((index, shell.clone()));
        } else {
            holes.push((index, shell.exterior().clone()));
        }
    }

    for (_, hole) in holes {
        let point = hole.0[0];
        // Exteriors are sorted by decreasing area, so the last match is the tightest.
        if let Some((_, owner)) = exteriors
            .iter_mut()
            .rev()
            .find(|(_, outer)| outer.contains(&point))
        {
            owner.interiors_push(hole);
        }
    }

    MultiPolygon(exteriors.into_iter().map(|(_, polygon)| polygon).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{polygon, BoundingRect};

    #[test]
    fn test_shrink_square() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)];
        let shrunk = offset_polygons(&MultiPolygon(vec![square]), -1.0);
        assert_eq!(shrunk.0.len(), 1);
        let bounds = shrunk.bounding_rect().unwrap();
        assert_relative_eq!(bounds.min().x, 1.0, epsilon = 1e-3);
        assert_relative_eq!(bounds.max().y, 9.0, epsilon = 1e-3);
    }

    #[test]
    fn test_shrink_to_nothing() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        let gone = offset_polygons(&MultiPolygon(vec![square]), -0.6);
        assert!(gone.0.is_empty());
    }

    #[test]
    fn test_hole_survives_inward_offset() {
        let outer = LineString::from(vec![(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 20.0)]);
        let hole = LineString::from(vec![(8.0, 8.0), (8.0, 12.0), (12.0, 12.0), (12.0, 8.0)]);
        let shape = geo::Polygon::new(outer, vec![hole]);
        let shrunk = offset_polygons(&MultiPolygon(vec![shape]), -1.0);
        assert_eq!(shrunk.0.len(), 1);
        assert_eq!(shrunk.0[0].interiors().len(), 1);
    }

    #[test]
    fn test_nesting_ignores_winding() {
        let cw_outer = LineString::from(vec![(0.0, 0.0), (0.0, 5.0), (5.0, 5.0), (5.0, 0.0)]);
        let ccw_inner = LineString::from(vec![(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0)]);
        let nested = nest_rings(vec![ccw_inner, cw_outer]);
        assert_eq!(nested.0.len(), 1);
        assert_eq!(nested.0[0].interiors().len(), 1);
    }
}
