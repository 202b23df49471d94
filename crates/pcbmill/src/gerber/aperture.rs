use crate::error::{CamError, Result};
use crate::geometry::shapes;
use geo::{Coord, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ApertureShape {
    Circle { diameter: f64 },
    Rectangle { width: f64, height: f64 },
    Obround { width: f64, height: f64 },
    /// Regular polygon; `rotation` in degrees.
    Polygon {
        diameter: f64,
        vertices: u32,
        rotation: f64,
    },
}

/// A `%ADD` tool definition. Immutable once parsed except for unit scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aperture {
    /// Document-local code, e.g. `"10"` for `D10`.
    pub id: String,
    pub shape: ApertureShape,
}

/// Outcome of reading one `%ADD` body.
#[derive(Debug, Clone, PartialEq)]
pub enum ApertureDefinition {
    Supported(Aperture),
    /// A macro or otherwise unimplemented template; `kind` names it.
    Unsupported { id: String, kind: String },
}

impl Aperture {
    /// Read the body of an aperture definition (`ADD10C,0.01` without the
    /// `%` and `*` delimiters).
    pub fn parse_definition(body: &str, line: usize) -> Result<ApertureDefinition> {
        let rest = body
            .strip_prefix("AD")
            .and_then(|r| r.strip_prefix('D'))
            .ok_or_else(|| CamError::format(line, body, "not an aperture definition"))?;

        let id_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if id_len == 0 {
            return Err(CamError::format(line, body, "aperture code missing"));
        }
        let (id, rest) = rest.split_at(id_len);
        let id = id.trim_start_matches('0').to_string();
        let id = if id.is_empty() { "0".to_string() } else { id };

        let (template, params) = match rest.split_once(',') {
            Some((template, params)) => (template, params),
            None => (rest, ""),
        };
        let values: Vec<f64> = params
            .split('X')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| parse_decimal(p, line))
            .collect::<Result<_>>()?;

        let need = |count: usize| -> Result<()> {
            if values.len() < count {
                Err(CamError::format(
                    line,
                    body,
                    format!("aperture {template} needs {count} parameter(s)"),
                ))
            } else {
                Ok(())
            }
        };

        let shape = match template {
            "C" => {
                need(1)?;
                ApertureShape::Circle {
                    diameter: values[0],
                }
            }
            "R" => {
                need(2)?;
                ApertureShape::Rectangle {
                    width: values[0],
                    height: values[1],
                }
            }
            "O" => {
                need(2)?;
                ApertureShape::Obround {
                    width: values[0],
                    height: values[1],
                }
            }
            "P" => {
                need(2)?;
                ApertureShape::Polygon {
                    diameter: values[0],
                    vertices: values[1].round().max(3.0) as u32,
                    rotation: values.get(2).copied().unwrap_or(0.0),
                }
            }
            other => {
                return Ok(ApertureDefinition::Unsupported {
                    id,
                    kind: format!("aperture macro `{other}`"),
                })
            }
        };
        Ok(ApertureDefinition::Supported(Aperture { id, shape }))
    }

    /// Characteristic size: circle/polygon diameter or the rectangle width.
    pub fn size(&self) -> f64 {
        match self.shape {
            ApertureShape::Circle { diameter } | ApertureShape::Polygon { diameter, .. } => diameter,
            ApertureShape::Rectangle { width, .. } | ApertureShape::Obround { width, .. } => width,
        }
    }

    /// The aperture shape stamped at `at`.
    pub fn flash(&self, at: Coord<f64>) -> Polygon<f64> {
        match self.shape {
            ApertureShape::Circle { diameter } => shapes::circle(at, diameter / 2.0),
            ApertureShape::Rectangle { width, height } => shapes::rectangle(at, width, height),
            ApertureShape::Obround { width, height } => shapes::obround(at, width, height),
            ApertureShape::Polygon {
                diameter,
                vertices,
                rotation,
            } => shapes::regular_polygon(
                at,
                diameter / 2.0,
                vertices as usize,
                rotation.to_radians(),
            ),
        }
    }

    /// Area covered when the aperture is dragged along `path`.
    pub fn stroke(&self, path: &[Coord<f64>]) -> MultiPolygon<f64> {
        match self.shape {
            ApertureShape::Circle { diameter } => shapes::round_stroke(path, diameter),
            _ => shapes::footprint_stroke(path, &self.flash(Coord { x: 0.0, y: 0.0 })),
        }
    }

    pub fn scale(&mut self, factor: f64) {
        match &mut self.shape {
            ApertureShape::Circle { diameter } | ApertureShape::Polygon { diameter, .. } => {
                *diameter *= factor
            }
            ApertureShape::Rectangle { width, height } | ApertureShape::Obround { width, height } => {
                *width *= factor;
                *height *= factor;
            }
        }
    }
}

fn parse_decimal(token: &str, line: usize) -> Result<f64> {
    token
        .parse::<f64>()
        .map_err(|err| CamError::format(line, token, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{coord, Area, BoundingRect};

    fn supported(body: &str) -> Aperture {
        match Aperture::parse_definition(body, 1).unwrap() {
            ApertureDefinition::Supported(aperture) => aperture,
            other => panic!("expected supported aperture, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_circle() {
        let aperture = supported("ADD10C,0.01");
        assert_eq!(aperture.id, "10");
        assert_eq!(aperture.shape, ApertureShape::Circle { diameter: 0.01 });
        assert_relative_eq!(aperture.size(), 0.01);
    }

    #[test]
    fn test_parse_rectangle_and_obround() {
        let rect = supported("ADD11R,0.06X0.04");
        assert_eq!(
            rect.shape,
            ApertureShape::Rectangle {
                width: 0.06,
                height: 0.04
            }
        );
        let oval = supported("ADD012O,.1X.05");
        assert_eq!(oval.id, "12");
        assert!(matches!(oval.shape, ApertureShape::Obround { .. }));
    }

    #[test]
    fn test_parse_polygon() {
        let hex = supported("ADD13P,.05X6X30");
        assert_eq!(
            hex.shape,
            ApertureShape::Polygon {
                diameter: 0.05,
                vertices: 6,
                rotation: 30.0
            }
        );
        assert_eq!(hex.flash(coord! { x: 0.0, y: 0.0 }).exterior().0.len(), 7);
    }

    #[test]
    fn test_macro_is_unsupported() {
        let def = Aperture::parse_definition("ADD20OC8,0.05", 3).unwrap();
        assert!(matches!(def, ApertureDefinition::Unsupported { ref id, .. } if id == "20"));
    }

    #[test]
    fn test_malformed_parameter_is_format_error() {
        let err = Aperture::parse_definition("ADD10C,0.0.1", 9).unwrap_err();
        assert!(matches!(err, CamError::Format { line: 9, .. }));
    }

    #[test]
    fn test_rectangle_stroke_is_exact() {
        let pen = supported("ADD11R,0.2X0.2");
        let swept = pen.stroke(&[coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 0.0 }]);
        assert_relative_eq!(swept.unsigned_area(), 0.2 * 1.2, epsilon = 1e-9);
        let bounds = swept.bounding_rect().unwrap();
        assert_relative_eq!(bounds.max().x, 1.1, epsilon = 1e-12);
    }

    #[test]
    fn test_scale_all_dimensions() {
        let mut rect = supported("ADD11R,1X2");
        rect.scale(25.4);
        assert_eq!(
            rect.shape,
            ApertureShape::Rectangle {
                width: 25.4,
                height: 50.8
            }
        );
    }
}
