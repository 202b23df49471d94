//! Excellon drill file reader.

use crate::error::{self, CamError, Diagnostic, Result};
use crate::geometry::{shapes, MirrorAxis, SolidGeometry};
use crate::number_format::{NumberFormat, ZeroSuppression};
use crate::units::Units;
use geo::{Coord, MultiPolygon, Rect};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Header directives that carry nothing the geometry needs.
const IGNORED_HEADER: [&str; 10] = [
    "FMAT", "VER", "DETECT", "ATC", "ICI", "OSTOP", "BLKD", "TCST", "RUNTIME", "G90",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: u32,
    pub diameter: f64,
    pub feed: Option<f64>,
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrillHit {
    pub point: Coord<f64>,
    pub tool: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ExcellonDocument {
    pub units: Units,
    pub format: NumberFormat,
    pub tools: BTreeMap<u32, Tool>,
    pub hits: Vec<DrillHit>,
    pub diagnostics: Vec<Diagnostic>,
    solid_geometry: Option<SolidGeometry>,
}

#[derive(Default)]
struct ParserState {
    document: ExcellonDocument,
    in_header: bool,
    explicit_format: bool,
    current_tool: Option<u32>,
    position: Coord<f64>,
}

fn tool_regex() -> &'static Regex {
    static TOOL: OnceLock<Regex> = OnceLock::new();
    TOOL.get_or_init(|| Regex::new(r"^T(\d+)(.*)$").expect("invalid regex pattern"))
}

/// Leading run of tool parameters, in any order. Whatever follows is ignored.
fn tool_params_regex() -> &'static Regex {
    static PARAMS: OnceLock<Regex> = OnceLock::new();
    PARAMS.get_or_init(|| {
        Regex::new(r"^\s*((?:[CFSBHZ][+-]?[\d.]+)+)(.*)$").expect("invalid regex pattern")
    })
}

fn tool_param_regex() -> &'static Regex {
    static PARAM: OnceLock<Regex> = OnceLock::new();
    PARAM.get_or_init(|| Regex::new(r"([CFSBHZ])([+-]?[\d.]+)").expect("invalid regex pattern"))
}

fn bare_diameter_regex() -> &'static Regex {
    static BARE: OnceLock<Regex> = OnceLock::new();
    BARE.get_or_init(|| {
        Regex::new(r"^\s+([\d.]+)\s*(IN|MM)?\b").expect("invalid regex pattern")
    })
}

fn hit_regex() -> &'static Regex {
    static HIT: OnceLock<Regex> = OnceLock::new();
    HIT.get_or_init(|| Regex::new(r"^(?:X([^XY]+))?(?:Y([^XY]+))?$").expect("invalid regex pattern"))
}

impl ExcellonDocument {
    pub fn parse(text: &str) -> Result<Self> {
        let mut state = ParserState::default();

        for (index, raw_line) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = match raw_line.split_once(';') {
                Some((code, _)) => code,
                None => raw_line,
            }
            .trim()
            .to_ascii_uppercase();
            if line.is_empty() {
                continue;
            }

            match line.as_str() {
                "M48" => state.in_header = true,
                "%" | "M95" => state.in_header = false,
                "M30" | "M00" => break,
                "M71" => state.set_units(Units::Millimeter, None),
                "M72" => state.set_units(Units::Inch, None),
                _ => state.directive(&line, line_no)?,
            }
        }

        let document = state.document;
        log::info!(
            "excellon: {} tools, {} hits ({})",
            document.tools.len(),
            document.hits.len(),
            document.units
        );
        Ok(document)
    }

    /// One circle of `diameter / 2` per drill hit.
    pub fn create_geometry(&mut self) -> &SolidGeometry {
        let geometry = match self.solid_geometry.take() {
            Some(geometry) => geometry,
            None => self.build_geometry(),
        };
        self.solid_geometry.insert(geometry)
    }

    fn build_geometry(&self) -> SolidGeometry {
        let circles = self
            .hits
            .iter()
            .filter_map(|hit| {
                let tool = self.tools.get(&hit.tool)?;
                Some(shapes::circle(hit.point, tool.diameter / 2.0))
            })
            .collect();
        SolidGeometry::from_polygons(MultiPolygon(circles))
    }

    pub fn hits_for_tool(&self, tool: u32) -> impl Iterator<Item = &DrillHit> + '_ {
        self.hits.iter().filter(move |hit| hit.tool == tool)
    }

    pub fn hit_counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for hit in &self.hits {
            *counts.entry(hit.tool).or_insert(0) += 1;
        }
        counts
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        match &self.solid_geometry {
            Some(geometry) => geometry.bounds(),
            None => self.build_geometry().bounds(),
        }
    }

    pub fn convert_units(&mut self, target: Units) -> f64 {
        let factor = self.units.factor_to(target);
        self.scale(factor);
        self.units = target;
        factor
    }

    /// Scales hit positions and tool diameters.
    pub fn scale(&mut self, factor: f64) {
        for tool in self.tools.values_mut() {
            tool.diameter *= factor;
        }
        self.map_points(|c| Coord {
            x: c.x * factor,
            y: c.y * factor,
        });
    }

    pub fn offset(&mut self, dx: f64, dy: f64) {
        self.map_points(|c| Coord {
            x: c.x + dx,
            y: c.y + dy,
        });
    }

    pub fn mirror(&mut self, axis: MirrorAxis, about: Coord<f64>) {
        self.map_points(|c| match axis {
            MirrorAxis::X => Coord {
                x: c.x,
                y: 2.0 * about.y - c.y,
            },
            MirrorAxis::Y => Coord {
                x: 2.0 * about.x - c.x,
                y: c.y,
            },
        });
    }

    fn map_points(&mut self, func: impl Fn(Coord<f64>) -> Coord<f64>) {
        for hit in &mut self.hits {
            hit.point = func(hit.point);
        }
        self.solid_geometry = None;
    }
}

impl ParserState {
    fn directive(&mut self, line: &str, line_no: usize) -> Result<()> {
        if let Some(rest) = line.strip_prefix("METRIC") {
            self.units_directive(Units::Millimeter, rest, line_no);
            return Ok(());
        }
        if let Some(rest) = line.strip_prefix("INCH") {
            self.units_directive(Units::Inch, rest, line_no);
            return Ok(());
        }
        if let Some(caps) = tool_regex().captures(line) {
            return self.tool(&caps, line, line_no);
        }
        if line.starts_with('X') || line.starts_with('Y') {
            return self.hit(line, line_no);
        }
        if self.in_header && IGNORED_HEADER.iter().any(|d| line.starts_with(d)) {
            log::debug!("line {line_no}: header directive `{line}` ignored");
            return Ok(());
        }
        if ["G05", "G90", "G81"].contains(&line) {
            log::debug!("line {line_no}: `{line}` ignored");
            return Ok(());
        }
        error::record(
            &mut self.document.diagnostics,
            Diagnostic::UnknownDirective {
                line: line_no,
                text: line.to_string(),
            },
        );
        Ok(())
    }

    /// `METRIC`/`INCH` with optional `,LZ`/`,TZ` and an explicit
    /// `000.000`-style coordinate template.
    fn units_directive(&mut self, units: Units, rest: &str, line_no: usize) {
        let mut zeros = None;
        let mut template = None;
        for part in rest.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part {
                "LZ" => zeros = Some(ZeroSuppression::Leading),
                "TZ" => zeros = Some(ZeroSuppression::Trailing),
                _ if part.contains('.') && part.chars().all(|c| c == '0' || c == '.') => {
                    template = part.split_once('.').map(|(int, frac)| (int.len(), frac.len()));
                }
                _ => log::debug!("line {line_no}: unit option `{part}` ignored"),
            }
        }
        self.set_units(units, zeros);
        if let Some((digits, fraction)) = template {
            self.document.format.digits = digits as u8;
            self.document.format.fraction = fraction as u8;
            self.explicit_format = true;
        }
    }

    fn set_units(&mut self, units: Units, zeros: Option<ZeroSuppression>) {
        self.document.units = units;
        if !self.explicit_format {
            let (digits, fraction) = match units {
                Units::Inch => (2, 4),
                Units::Millimeter => (3, 3),
            };
            self.document.format.digits = digits;
            self.document.format.fraction = fraction;
        }
        if let Some(zeros) = zeros {
            self.document.format.zeros = zeros;
        }
    }

    fn tool(&mut self, caps: &regex::Captures, line: &str, line_no: usize) -> Result<()> {
        let id: u32 = caps[1]
            .parse()
            .map_err(|_| CamError::format(line_no, &caps[1], "bad tool number"))?;
        let rest = &caps[2];

        let mut tool = Tool {
            id,
            diameter: 0.0,
            feed: None,
            speed: None,
        };
        let mut defined = false;

        if let Some(params) = tool_params_regex().captures(rest) {
            for param in tool_param_regex().captures_iter(&params[1]) {
                let value = parse_decimal(&param[2], line_no)?;
                match &param[1] {
                    "C" => {
                        tool.diameter = value;
                        defined = true;
                    }
                    "F" => tool.feed = Some(value),
                    "S" => tool.speed = Some(value),
                    _ => {}
                }
            }
            if !params[2].trim().is_empty() {
                log::debug!("line {line_no}: trailing text after tool in `{line}` ignored");
            }
        } else if let Some(bare) = bare_diameter_regex().captures(rest) {
            tool.diameter = parse_decimal(&bare[1], line_no)?;
            if let Some(unit) = bare.get(2) {
                let declared: Units = unit.as_str().parse().unwrap_or(self.document.units);
                tool.diameter *= declared.factor_to(self.document.units);
            }
            defined = true;
        } else if !rest.trim().is_empty() {
            log::debug!("line {line_no}: trailing text after tool in `{line}` ignored");
        }

        if defined {
            self.document.tools.insert(id, tool);
            if self.in_header {
                return Ok(());
            }
        }

        self.current_tool = match id {
            0 => None,
            _ => Some(id),
        };
        Ok(())
    }

    fn hit(&mut self, line: &str, line_no: usize) -> Result<()> {
        let Some(caps) = hit_regex().captures(line) else {
            error::record(
                &mut self.document.diagnostics,
                Diagnostic::UnknownDirective {
                    line: line_no,
                    text: line.to_string(),
                },
            );
            return Ok(());
        };

        let format = self.document.format;
        if let Some(x) = caps.get(1) {
            self.position.x = format.parse(x.as_str(), line_no)?;
        }
        if let Some(y) = caps.get(2) {
            self.position.y = format.parse(y.as_str(), line_no)?;
        }

        match self.current_tool {
            Some(tool) if self.document.tools.contains_key(&tool) => {
                self.document.hits.push(DrillHit {
                    point: self.position,
                    tool,
                });
            }
            selected => error::record(
                &mut self.document.diagnostics,
                Diagnostic::MissingTool {
                    line: line_no,
                    tool: selected.unwrap_or(0),
                },
            ),
        }
        Ok(())
    }
}

fn parse_decimal(token: &str, line: usize) -> Result<f64> {
    token
        .parse::<f64>()
        .map_err(|err| CamError::format(line, token, err.to_string()))
}
