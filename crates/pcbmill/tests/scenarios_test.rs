use approx::assert_relative_eq;
use geo::{coord, polygon, Area, LineString, MultiPolygon, Polygon};
use pcbmill::*;

#[test]
fn test_single_circular_flash() {
    let text = "%FSLAX23Y23*%\n%MOIN*%\n%ADD10C,0.01*%\nD10*\nX001000Y001000D03*\nM02*\n";
    let mut gerber = GerberDocument::parse(text).expect("Failed to parse Gerber");
    assert!(gerber.diagnostics.is_empty());

    let geometry = gerber.create_geometry();
    assert_eq!(geometry.polygons.len(), 1);

    let bounds = geometry.bounds().unwrap();
    assert_relative_eq!(bounds.center().x, 1.0, epsilon = 1e-9);
    assert_relative_eq!(bounds.center().y, 1.0, epsilon = 1e-9);
    assert_relative_eq!(bounds.width(), 0.01, epsilon = 1e-9);

    // A 64-gon falls slightly short of the true circle area.
    let circle = std::f64::consts::PI * 0.005 * 0.005;
    assert_relative_eq!(geometry.polygons[0].unsigned_area(), circle, max_relative = 0.01);
    assert_eq!(gerber.units, Units::Inch);
}

#[test]
fn test_excellon_inch_leading_zeros() {
    let text = "M48\nINCH,LZ\nT1C.02362\n%\nT1\nX9000Y11750\nM30\n";
    let drills = ExcellonDocument::parse(text).expect("Failed to parse Excellon");

    assert_eq!(drills.hits.len(), 1);
    let hit = drills.hits[0];
    assert_relative_eq!(hit.point.x, 0.9, epsilon = 1e-12);
    assert_relative_eq!(hit.point.y, 1.175, epsilon = 1e-12);
    assert_eq!(hit.tool, 1);
    assert_relative_eq!(drills.tools[&1].diameter, 0.02362);
}

#[test]
fn test_path_connect_two_segments() {
    let lines = [
        LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]),
        LineString::from(vec![(1.0, 1.0), (2.0, 1.0)]),
    ];
    let chains = path_connect(ToolpathChain::from_lines(&lines));

    assert_eq!(chains.len(), 1);
    assert_eq!(
        chains[0].coords,
        vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 1.0, y: 1.0 },
            coord! { x: 2.0, y: 1.0 },
        ]
    );
}

fn clearing_chains() -> Vec<ToolpathChain> {
    let lines = [
        LineString::from(vec![(1.0, 5.0), (4.0, 5.0)]),
        LineString::from(vec![(5.0, 5.0), (8.0, 5.0)]),
    ];
    ToolpathChain::from_lines(&lines)
}

#[test]
fn test_paint_connect_walks_inside_material() {
    let boundary = MultiPolygon(vec![polygon![
        (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)
    ]]);

    let chains = paint_connect(clearing_chains(), &boundary, 1.0, 1e-6);
    assert_eq!(chains.len(), 1, "endpoints one diameter apart should be walked");
    assert_eq!(chains[0].coords.len(), 4);
    assert_eq!(chains[0].sources, vec![0, 1]);
}

#[test]
fn test_paint_connect_flies_over_cutout() {
    let outer = LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
    let cutout = LineString::from(vec![(4.4, 3.0), (4.6, 3.0), (4.6, 7.0), (4.4, 7.0)]);
    let boundary = MultiPolygon(vec![Polygon::new(outer, vec![cutout])]);

    let chains = paint_connect(clearing_chains(), &boundary, 1.0, 1e-6);
    assert_eq!(chains.len(), 2, "the bridge crosses the cutout, the tool must lift");
}

#[test]
fn test_unit_square_gcode() {
    let config = JobConfig {
        z_cut: -0.1,
        z_move: 0.1,
        ..JobConfig::default()
    };
    let square = SolidGeometry::from_polygons(MultiPolygon(vec![polygon![
        (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)
    ]]));

    let gcode = CncJobGenerator::new(config)
        .generate_from_geometry(&square)
        .expect("Failed to generate G-code");
    let lines = &gcode.lines;

    assert_eq!(&lines[..3], &["G20", "G90", "G94"]);
    assert!(lines[3].starts_with('F'));
    assert_eq!(lines[4], "G00 Z0.1000");
    assert!(lines[5].starts_with("M03"));
    assert!(lines[6].starts_with("G04 P"));

    let body = &lines[7..lines.len() - 3];
    assert_eq!(body.len(), 6);
    assert_eq!(body[0], "G00 X0.0000 Y0.0000");
    assert_eq!(body[1], "G01 Z-0.1000");
    assert_eq!(body.iter().filter(|l| l.starts_with("G01 X")).count(), 3);
    assert_eq!(body[5], "G00 Z0.1000");

    assert_eq!(
        &lines[lines.len() - 3..],
        &["G00 Z0.1000", "G00 X0.0000 Y0.0000", "M05"]
    );
}
