use approx::assert_relative_eq;
use geo::{Coord, LineString, MultiPolygon, Polygon};
use pcbmill::*;
use std::collections::{BTreeMap, HashSet};

#[test]
fn test_number_format_round_trip() {
    let samples = [0i64, 1, 7, 10, 250, 1000, 12345, 99999, -1, -500, -123456];
    for zeros in [ZeroSuppression::Leading, ZeroSuppression::Trailing] {
        for (digits, fraction) in [(2u8, 3u8), (2, 4), (3, 3), (3, 4)] {
            let format = NumberFormat::new(digits, fraction, zeros);
            let limit = 10i64.pow(format.width() as u32);
            for n in samples.iter().copied().filter(|n| n.abs() < limit) {
                let token = format.format(n);
                let value = format.parse(&token, 1).expect("Failed to parse formatted token");
                let expected = n as f64 / 10f64.powi(fraction as i32);
                assert_relative_eq!(value, expected, epsilon = 1e-12);
            }
        }
    }
}

fn sample_model() -> GeometryModel {
    let mut geometry = SolidGeometry::from_polygons(MultiPolygon(vec![shapes::rectangle(
        Coord { x: 1.0, y: 2.0 },
        0.5,
        0.25,
    )]));
    geometry
        .lines
        .push(LineString::from(vec![(0.0, 0.0), (3.0, 1.5), (4.0, -2.0)]));
    GeometryModel::new("sample", Units::Inch, geometry)
}

#[test]
fn test_convert_units_round_trip() {
    let original = sample_model();
    let mut model = original.clone();

    let there = model.convert_units(Units::Millimeter);
    let back = model.convert_units(Units::Inch);
    assert_relative_eq!(there * back, 1.0, epsilon = 1e-12);
    assert_eq!(model.units, Units::Inch);

    let before = original.solid_geometry.rings();
    let after = model.solid_geometry.rings();
    assert_eq!(before.len(), after.len());
    for (a, b) in before.iter().zip(&after) {
        for (p, q) in a.coords().zip(b.coords()) {
            assert_relative_eq!(p.x, q.x, epsilon = 1e-9);
            assert_relative_eq!(p.y, q.y, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_config_converts_with_geometry() {
    let mut config = CamConfig::default();
    let diameter = config.planner.isolation_tool_diameter;
    let factor = config.convert_units(Units::Millimeter);
    assert_relative_eq!(config.planner.isolation_tool_diameter, diameter * factor);
    assert_eq!(config.job.units, Units::Millimeter);
}

fn key(c: &Coord<f64>) -> (u64, u64) {
    (c.x.to_bits(), c.y.to_bits())
}

fn vertex_counts(chains: &[ToolpathChain]) -> BTreeMap<(u64, u64), usize> {
    let mut counts = BTreeMap::new();
    for c in chains.iter().flat_map(|chain| chain.coords.iter()) {
        *counts.entry(key(c)).or_insert(0) += 1;
    }
    counts
}

#[test]
fn test_path_connect_is_a_partition() {
    let lines = vec![
        LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]),
        LineString::from(vec![(2.0, 0.0), (1.0, 0.0)]),
        LineString::from(vec![(2.0, 0.0), (2.0, 1.0), (3.0, 1.0)]),
        // Revisits its own tail vertex before joining the next line there.
        LineString::from(vec![(5.0, 5.0), (6.0, 5.0), (6.0, 6.0), (6.0, 5.0)]),
        // A ring touching an open chain's endpoint.
        LineString::from(vec![(3.0, 1.0), (4.0, 1.0), (4.0, 2.0), (3.0, 1.0)]),
        LineString::from(vec![(6.0, 5.0), (7.0, 5.0)]),
    ];
    let input = ToolpathChain::from_lines(&lines);
    let output = path_connect(input.clone());

    let junctions = [(1.0, 0.0), (2.0, 0.0), (6.0, 5.0)];
    assert_eq!(input.len() - output.len(), junctions.len());

    let mut expected = vertex_counts(&input);
    for (x, y) in junctions {
        let count = expected
            .get_mut(&key(&Coord { x, y }))
            .expect("junction is an input vertex");
        *count -= 1;
    }
    assert_eq!(vertex_counts(&output), expected);

    let mut sources: Vec<usize> = output.iter().flat_map(|c| c.sources.clone()).collect();
    sources.sort_unstable();
    assert_eq!(sources, vec![0, 1, 2, 3, 4, 5]);

    let ring = output.iter().find(|c| c.sources == vec![4]).expect("ring kept apart");
    assert!(ring.closed);
    assert_eq!(ring.coords, input[4].coords);
    for chain in output.iter().filter(|c| c.sources.len() > 1) {
        assert!(!chain.sources.contains(&4));
    }
}

#[test]
fn test_paint_connect_bridges_stay_inside() {
    let outer = LineString::from(vec![(0.0, 0.0), (20.0, 0.0), (20.0, 20.0), (0.0, 20.0)]);
    let hole = LineString::from(vec![(9.8, 2.0), (10.2, 2.0), (10.2, 18.0), (9.8, 18.0)]);
    let boundary = MultiPolygon(vec![Polygon::new(outer, vec![hole])]);

    let mut lines = Vec::new();
    for row in 0..6 {
        let y = 3.0 + row as f64 * 2.5;
        lines.push(LineString::from(vec![(1.5, y), (9.0, y)]));
        lines.push(LineString::from(vec![(11.0, y), (18.5, y)]));
        lines.push(LineString::from(vec![(9.0, y), (9.0, y + 0.8)]));
    }
    let input = ToolpathChain::from_lines(&lines);

    let mut edges = HashSet::new();
    for chain in &input {
        for pair in chain.coords.windows(2) {
            edges.insert((key(&pair[0]), key(&pair[1])));
            edges.insert((key(&pair[1]), key(&pair[0])));
        }
    }

    let tool = 2.5;
    let output = paint_connect(input, &boundary, tool, 1e-6);
    assert!(output.len() >= 2, "the hole forces at least one lift");

    for chain in &output {
        for pair in chain.coords.windows(2) {
            if edges.contains(&(key(&pair[0]), key(&pair[1]))) {
                continue;
            }
            assert!(
                bridge_within(pair[0], pair[1], &boundary, tool, 1e-6),
                "bridge {:?} -> {:?} leaves the boundary",
                pair[0],
                pair[1]
            );
        }
    }
}

#[test]
fn test_isolation_offsets_monotonic() {
    let diameter = 0.2;
    for overlap in [0.0, 0.1, 0.5, 0.9] {
        let offsets: Vec<f64> = (0..6)
            .map(|i| ToolpathPlanner::isolation_offset(i, diameter, overlap))
            .collect();
        assert_relative_eq!(offsets[0], diameter / 2.0);
        for (i, offset) in offsets.iter().enumerate() {
            let i = i as f64;
            assert_relative_eq!(
                *offset,
                (2.0 * i + 1.0) / 2.0 * diameter - i * overlap * diameter,
                epsilon = 1e-12
            );
        }
        assert!(offsets.windows(2).all(|w| w[1] > w[0]));
    }
}
