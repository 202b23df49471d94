use super::{MirrorAxis, SolidGeometry};
use crate::units::Units;
use geo::{Coord, MultiPolygon, Rect};

/// Polygon/line/ring collection of one manufacturing object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryModel {
    pub name: String,
    pub units: Units,
    pub solid_geometry: SolidGeometry,
}

impl GeometryModel {
    pub fn new(name: impl Into<String>, units: Units, solid_geometry: SolidGeometry) -> Self {
        Self {
            name: name.into(),
            units,
            solid_geometry,
        }
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.solid_geometry.bounds()
    }

    pub fn scale(&mut self, factor: f64) {
        self.solid_geometry.scale(factor, factor);
    }

    pub fn offset(&mut self, dx: f64, dy: f64) {
        self.solid_geometry.offset(dx, dy);
    }

    pub fn mirror(&mut self, axis: MirrorAxis, about: Coord<f64>) {
        self.solid_geometry.mirror(axis, about);
    }

    /// Rescale to `target` units and return the factor applied.
    pub fn convert_units(&mut self, target: Units) -> f64 {
        let factor = self.units.factor_to(target);
        self.scale(factor);
        self.units = target;
        factor
    }

    /// The solid geometry grown by `offset`: the centre line of an isolation
    /// cut made with a tool of diameter `2 * offset`.
    pub fn isolation_geometry(&self, offset: f64) -> MultiPolygon<f64> {
        self.solid_geometry.buffer(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{coord, polygon};

    fn model() -> GeometryModel {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
        GeometryModel::new(
            "pad",
            Units::Inch,
            SolidGeometry::from_polygons(MultiPolygon(vec![square])),
        )
    }

    #[test]
    fn test_convert_units_round_trip() {
        let mut m = model();
        let original = m.clone();
        let to_mm = m.convert_units(Units::Millimeter);
        assert_relative_eq!(m.bounds().unwrap().max().x, 25.4, epsilon = 1e-12);
        let to_in = m.convert_units(Units::Inch);
        assert_relative_eq!(to_mm * to_in, 1.0, epsilon = 1e-12);

        let restored = m.bounds().unwrap();
        let expected = original.bounds().unwrap();
        assert_relative_eq!(restored.max().x, expected.max().x, epsilon = 1e-12);
        assert_relative_eq!(restored.max().y, expected.max().y, epsilon = 1e-12);
        assert_eq!(m.units, Units::Inch);
    }

    #[test]
    fn test_convert_to_same_units_is_identity() {
        let mut m = model();
        assert_eq!(m.convert_units(Units::Inch), 1.0);
        assert_eq!(m.bounds().unwrap().max(), coord! { x: 1.0, y: 1.0 });
    }

    #[test]
    fn test_isolation_geometry_grows_bounds() {
        let m = model();
        let iso = m.isolation_geometry(0.1);
        let b = geo::BoundingRect::bounding_rect(&iso).unwrap();
        assert_relative_eq!(b.min().x, -0.1, epsilon = 1e-9);
        assert_relative_eq!(b.max().x, 1.1, epsilon = 1e-9);
    }
}
