use crate::error::{CamError, Result};
use crate::geometry::offset::offset_polygons;
use geo::{Area, LineString, MultiPolygon};

/// Upper bound on concentric passes; a pocket that still has area after this
/// many shrinks is reported as finished with a warning.
pub const MAX_PASSES: usize = 10_000;

/// Concentric clearing rings for `boundary`, outermost first.
///
/// The first ring runs `tool_diameter / 2` inside the boundary; each following
/// ring steps a further `tool_diameter * (1 - overlap)` inward until the
/// remaining area collapses. Islands (polygon holes) are kept clear.
pub fn paint_area(
    boundary: &MultiPolygon<f64>,
    tool_diameter: f64,
    overlap: f64,
) -> Result<Vec<LineString<f64>>> {
    if tool_diameter <= 0.0 || !tool_diameter.is_finite() {
        return Err(CamError::InvalidParameter(format!(
            "tool diameter must be positive, got {tool_diameter}"
        )));
    }
    if !(0.0..1.0).contains(&overlap) {
        return Err(CamError::InvalidParameter(format!(
            "overlap must be in [0, 1), got {overlap}"
        )));
    }

    let stepover = tool_diameter * (1.0 - overlap);
    let mut current = offset_polygons(boundary, -tool_diameter / 2.0);
    let mut rings = Vec::new();
    let mut passes = 0;

    while current.unsigned_area() > 0.0 {
        for polygon in &current.0 {
            rings.push(polygon.exterior().clone());
            rings.extend(polygon.interiors().iter().cloned());
        }

        passes += 1;
        if passes >= MAX_PASSES {
            log::warn!("pocket clearing stopped after {MAX_PASSES} passes");
            break;
        }
        current = offset_polygons(&current, -stepover);
    }

    log::debug!("pocket clearing: {passes} passes, {} rings", rings.len());
    Ok(rings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, BoundingRect, Contains, Coord, Polygon};

    fn square(size: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: size, y: 0.0),
            (x: size, y: size),
            (x: 0.0, y: size),
        ]])
    }

    #[test]
    fn test_first_ring_sits_one_tool_radius_inside() {
        let rings = paint_area(&square(10.0), 0.8, 0.4).unwrap();
        assert!(rings.len() > 1);

        let first = rings[0].bounding_rect().unwrap();
        assert!((first.min().x - 0.4).abs() < 1e-3);
        assert!((first.max().y - 9.6).abs() < 1e-3);
        assert!(rings.iter().all(|ring| ring.is_closed()));
    }

    #[test]
    fn test_rings_step_inward() {
        let rings = paint_area(&square(100.0), 6.0, 0.5).unwrap();
        let widths: Vec<f64> = rings
            .iter()
            .map(|r| r.bounding_rect().unwrap().width())
            .collect();
        assert!((widths[0] - widths[1] - 6.0).abs() < 1e-2);
        assert!(widths.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_clearing_stays_off_copper_island() {
        let outer = LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let pad = LineString::from(vec![(3.0, 3.0), (3.0, 7.0), (7.0, 7.0), (7.0, 3.0)]);
        let boundary = MultiPolygon(vec![Polygon::new(outer, vec![pad.clone()])]);

        let rings = paint_area(&boundary, 0.8, 0.4).unwrap();
        assert!(!rings.is_empty());

        let pad = Polygon::new(pad, vec![]);
        let entered = rings
            .iter()
            .flat_map(|ring| ring.coords())
            .any(|c| pad.contains(&Coord { x: c.x, y: c.y }));
        assert!(!entered, "clearing ring crosses the pad");
    }

    #[test]
    fn test_too_small_pocket_is_empty() {
        let rings = paint_area(&square(1.0), 2.0, 0.1).unwrap();
        assert!(rings.is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            paint_area(&square(10.0), 0.0, 0.1),
            Err(CamError::InvalidParameter(_))
        ));
        assert!(matches!(
            paint_area(&square(10.0), 1.0, 1.0),
            Err(CamError::InvalidParameter(_))
        ));
    }
}
