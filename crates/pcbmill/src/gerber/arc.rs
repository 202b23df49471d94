//! Circular interpolation (G02/G03) tessellation.

use crate::geometry::CIRCLE_SEGMENTS;
use geo::Coord;
use std::f64::consts::{FRAC_PI_2, TAU};

const POINT_EQUALITY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcDirection {
    /// G02.
    Clockwise,
    /// G03.
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuadrantMode {
    /// G74: `I`/`J` are unsigned and the arc spans at most 90 degrees.
    #[default]
    Single,
    /// G75: `I`/`J` are signed offsets from the start point to the centre.
    Multi,
}

/// Points along the arc from `from` to `to`, excluding `from` and ending
/// exactly at `to`. `None` for a degenerate arc.
pub fn interpolate(
    from: Coord<f64>,
    to: Coord<f64>,
    center_offset: Coord<f64>,
    direction: ArcDirection,
    mode: QuadrantMode,
) -> Option<Vec<Coord<f64>>> {
    let (center, sweep) = match mode {
        QuadrantMode::Multi => {
            let center = from + center_offset;
            let sweep = if same_point(from, to) {
                match direction {
                    ArcDirection::Clockwise => -TAU,
                    ArcDirection::CounterClockwise => TAU,
                }
            } else {
                sweep(center, from, to, direction)
            };
            (center, sweep)
        }
        QuadrantMode::Single => single_quadrant_center(from, to, center_offset, direction)?,
    };

    let radius = distance(from, center);
    if radius <= POINT_EQUALITY_EPSILON {
        return None;
    }

    let start = (from.y - center.y).atan2(from.x - center.x);
    let steps = ((sweep.abs() / TAU) * CIRCLE_SEGMENTS as f64).ceil().max(2.0) as usize;
    let mut points: Vec<Coord<f64>> = (1..steps)
        .map(|step| {
            let angle = start + sweep * step as f64 / steps as f64;
            Coord {
                x: center.x + radius * angle.cos(),
                y: center.y + radius * angle.sin(),
            }
        })
        .collect();
    points.push(to);
    Some(points)
}

/// Pick the centre among the four sign combinations of an unsigned offset:
/// the one equidistant from both ends whose sweep stays within a quadrant.
fn single_quadrant_center(
    from: Coord<f64>,
    to: Coord<f64>,
    offset: Coord<f64>,
    direction: ArcDirection,
) -> Option<(Coord<f64>, f64)> {
    let (i, j) = (offset.x.abs(), offset.y.abs());
    [(1.0, 1.0), (1.0, -1.0), (-1.0, 1.0), (-1.0, -1.0)]
        .into_iter()
        .map(|(sx, sy)| {
            let center = Coord {
                x: from.x + sx * i,
                y: from.y + sy * j,
            };
            let mismatch = (distance(from, center) - distance(to, center)).abs();
            (center, sweep(center, from, to, direction), mismatch)
        })
        .filter(|(_, sweep, _)| sweep.abs() <= FRAC_PI_2 + 1e-6)
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(center, sweep, _)| (center, sweep))
}

fn sweep(center: Coord<f64>, from: Coord<f64>, to: Coord<f64>, direction: ArcDirection) -> f64 {
    let start = (from.y - center.y).atan2(from.x - center.x);
    let end = (to.y - center.y).atan2(to.x - center.x);
    let delta = end - start;
    match direction {
        ArcDirection::Clockwise if delta >= 0.0 => delta - TAU,
        ArcDirection::CounterClockwise if delta <= 0.0 => delta + TAU,
        _ => delta,
    }
}

fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

fn same_point(a: Coord<f64>, b: Coord<f64>) -> bool {
    (a.x - b.x).abs() <= POINT_EQUALITY_EPSILON && (a.y - b.y).abs() <= POINT_EQUALITY_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::coord;

    #[test]
    fn test_multi_quadrant_half_circle() {
        let points = interpolate(
            coord! { x: 1.0, y: 0.0 },
            coord! { x: -1.0, y: 0.0 },
            coord! { x: -1.0, y: 0.0 },
            ArcDirection::CounterClockwise,
            QuadrantMode::Multi,
        )
        .unwrap();
        assert_eq!(*points.last().unwrap(), coord! { x: -1.0, y: 0.0 });
        // Counter-clockwise from +x passes through the top.
        assert!(points.iter().any(|p| p.y > 0.99));
        for p in &points {
            assert_relative_eq!(p.x.hypot(p.y), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_multi_quadrant_full_circle() {
        let start = coord! { x: 0.0, y: -1.0 };
        let points = interpolate(
            start,
            start,
            coord! { x: 0.0, y: 1.0 },
            ArcDirection::Clockwise,
            QuadrantMode::Multi,
        )
        .unwrap();
        assert!(points.len() >= CIRCLE_SEGMENTS - 1);
        assert_eq!(*points.last().unwrap(), start);
    }

    #[test]
    fn test_single_quadrant_picks_signed_center() {
        // Quarter circle around the origin from (1, 0) to (0, 1), written with
        // an unsigned offset of (1, 0).
        let points = interpolate(
            coord! { x: 1.0, y: 0.0 },
            coord! { x: 0.0, y: 1.0 },
            coord! { x: 1.0, y: 0.0 },
            ArcDirection::CounterClockwise,
            QuadrantMode::Single,
        )
        .unwrap();
        for p in &points {
            assert_relative_eq!(p.x.hypot(p.y), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_zero_radius_is_degenerate() {
        let p = coord! { x: 1.0, y: 1.0 };
        assert!(interpolate(
            p,
            coord! { x: 2.0, y: 2.0 },
            coord! { x: 0.0, y: 0.0 },
            ArcDirection::Clockwise,
            QuadrantMode::Multi
        )
        .is_none());
    }
}
