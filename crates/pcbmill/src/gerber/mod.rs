//! RS-274X photoplotter reader.
//!
//! The file is split into `*`-terminated blocks; `%`-delimited extended
//! blocks carry the header (format, units, aperture definitions). Drawing
//! state is modal: current point, current aperture, interpolation mode and the
//! last operation code all carry over between blocks.

pub mod aperture;
pub mod arc;

use crate::error::{self, CamError, Diagnostic, Result};
use crate::geometry::{merge_rects, MirrorAxis, SolidGeometry};
use crate::number_format::{NumberFormat, ZeroSuppression};
use crate::units::Units;
use aperture::{Aperture, ApertureDefinition};
use arc::{ArcDirection, QuadrantMode};
use geo::algorithm::orient::{Direction, Orient};
use geo::{unary_union, Area, BoundingRect, Coord, LineString, MultiPolygon, Polygon, Rect};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Pen-down stroke: the points visited while the aperture was down.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub points: Vec<Coord<f64>>,
    pub aperture: String,
}

/// One closed contour of a `G36`/`G37` region.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub points: Vec<Coord<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flash {
    pub point: Coord<f64>,
    pub aperture: String,
}

#[derive(Debug, Clone, Default)]
pub struct GerberDocument {
    pub units: Units,
    pub format: NumberFormat,
    pub apertures: BTreeMap<String, Aperture>,
    /// Names of `%AM` macros seen in the header.
    pub macros: Vec<String>,
    pub paths: Vec<PathSegment>,
    pub regions: Vec<Region>,
    pub flashes: Vec<Flash>,
    pub diagnostics: Vec<Diagnostic>,
    solid_geometry: Option<SolidGeometry>,
}

impl GerberDocument {
    pub fn parse(text: &str) -> Result<Self> {
        let mut parser = GerberParser::default();
        for block in blocks(text) {
            if !parser.feed(&block)? {
                break;
            }
        }
        let document = parser.finish();
        log::info!(
            "gerber: {} apertures, {} paths, {} regions, {} flashes",
            document.apertures.len(),
            document.paths.len(),
            document.regions.len(),
            document.flashes.len()
        );
        Ok(document)
    }

    /// Merged solid geometry, computed once and cached until a transform
    /// invalidates it.
    pub fn create_geometry(&mut self) -> &SolidGeometry {
        let geometry = match self.solid_geometry.take() {
            Some(geometry) => geometry,
            None => {
                let (pieces, repairs) = self.pieces();
                for repair in repairs {
                    error::record(&mut self.diagnostics, repair);
                }
                SolidGeometry::from_polygons(unary_union(pieces.iter()))
            }
        };
        self.solid_geometry.insert(geometry)
    }

    /// Stroked paths, repaired regions and flashes kept as separate polygons.
    pub fn unmerged_geometry(&self) -> SolidGeometry {
        let (pieces, _) = self.pieces();
        SolidGeometry::from_polygons(MultiPolygon(pieces))
    }

    /// Centre lines of every stroked path, without aperture width.
    pub fn follow_geometry(&self) -> SolidGeometry {
        SolidGeometry::from_lines(
            self.paths
                .iter()
                .map(|path| LineString::from(path.points.clone()))
                .collect(),
        )
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        match &self.solid_geometry {
            Some(geometry) => geometry.bounds(),
            None => self
                .pieces()
                .0
                .iter()
                .filter_map(|p| p.bounding_rect())
                .reduce(merge_rects),
        }
    }

    /// Rescale every coordinate and aperture to `target`; returns the factor.
    pub fn convert_units(&mut self, target: Units) -> f64 {
        let factor = self.units.factor_to(target);
        self.scale(factor);
        self.units = target;
        factor
    }

    pub fn scale(&mut self, factor: f64) {
        for aperture in self.apertures.values_mut() {
            aperture.scale(factor);
        }
        self.map_coords(|c| Coord {
            x: c.x * factor,
            y: c.y * factor,
        });
    }

    pub fn offset(&mut self, dx: f64, dy: f64) {
        self.map_coords(|c| Coord {
            x: c.x + dx,
            y: c.y + dy,
        });
    }

    pub fn mirror(&mut self, axis: MirrorAxis, about: Coord<f64>) {
        for aperture in self.apertures.values_mut() {
            if let aperture::ApertureShape::Polygon { rotation, .. } = &mut aperture.shape {
                *rotation = match axis {
                    MirrorAxis::X => -*rotation,
                    MirrorAxis::Y => 180.0 - *rotation,
                };
            }
        }
        self.map_coords(|c| match axis {
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

    fn map_coords(&mut self, func: impl Fn(Coord<f64>) -> Coord<f64>) {
        for path in &mut self.paths {
            path.points.iter_mut().for_each(|c| *c = func(*c));
        }
        for region in &mut self.regions {
            region.points.iter_mut().for_each(|c| *c = func(*c));
        }
        for flash in &mut self.flashes {
            flash.point = func(flash.point);
        }
        self.solid_geometry = None;
    }

    /// Every primitive as polygons, plus repair diagnostics for regions.
    fn pieces(&self) -> (Vec<Polygon<f64>>, Vec<Diagnostic>) {
        let mut pieces = Vec::new();
        let mut repairs = Vec::new();

        for path in &self.paths {
            if let Some(aperture) = self.apertures.get(&path.aperture) {
                pieces.extend(aperture.stroke(&path.points).0);
            }
        }
        for (index, region) in self.regions.iter().enumerate() {
            let (repaired, changed) = repair_region(region);
            if changed {
                repairs.push(Diagnostic::GeometryRepair { region: index });
            }
            pieces.extend(repaired.0);
        }
        for flash in &self.flashes {
            if let Some(aperture) = self.apertures.get(&flash.aperture) {
                pieces.push(aperture.flash(flash.point));
            }
        }
        (pieces, repairs)
    }
}

/// Regularize a region contour by self-union. Reports whether the repair
/// changed the shape.
fn repair_region(region: &Region) -> (MultiPolygon<f64>, bool) {
    let contour = Polygon::new(LineString::from(region.points.clone()), vec![]);
    let original_area = contour.unsigned_area();
    let oriented = contour.orient(Direction::Default);
    let repaired = unary_union(std::iter::once(&oriented));
    let changed = repaired.0.len() != 1
        || (repaired.unsigned_area() - original_area).abs() > 1e-9 * original_area.max(1e-12);
    (repaired, changed)
}

#[derive(Debug, Clone, PartialEq)]
struct Block {
    line: usize,
    text: String,
    /// Index of the enclosing `%...%` section, `None` for word blocks.
    section: Option<usize>,
}

fn blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut buffer = String::new();
    let mut line = 1;
    let mut block_line = 1;
    let mut sections = 0;
    let mut section: Option<usize> = None;

    for ch in text.chars() {
        match ch {
            '\n' => line += 1,
            '\r' => {}
            '%' => {
                if !buffer.trim().is_empty() {
                    blocks.push(Block {
                        line: block_line,
                        text: buffer.trim().to_string(),
                        section,
                    });
                }
                buffer.clear();
                section = match section {
                    Some(_) => None,
                    None => {
                        sections += 1;
                        Some(sections)
                    }
                };
            }
            '*' => {
                let trimmed = buffer.trim();
                if !trimmed.is_empty() {
                    blocks.push(Block {
                        line: block_line,
                        text: trimmed.to_string(),
                        section,
                    });
                }
                buffer.clear();
            }
            c if c.is_whitespace() && buffer.is_empty() => {}
            c => {
                if buffer.is_empty() {
                    block_line = line;
                }
                buffer.push(c);
            }
        }
    }
    blocks
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Interpolation {
    Linear,
    Circular(ArcDirection),
}

struct GerberParser {
    document: GerberDocument,
    y_format: NumberFormat,
    unsupported: BTreeMap<String, String>,
    current: Coord<f64>,
    aperture: Option<String>,
    interpolation: Interpolation,
    quadrant: QuadrantMode,
    operation: Option<u8>,
    in_region: bool,
    path: Vec<Coord<f64>>,
    path_aperture: Option<String>,
    contour: Vec<Coord<f64>>,
    macro_section: Option<usize>,
    line: usize,
}

impl Default for GerberParser {
    fn default() -> Self {
        Self {
            document: GerberDocument::default(),
            y_format: NumberFormat::default(),
            unsupported: BTreeMap::new(),
            current: Coord { x: 0.0, y: 0.0 },
            aperture: None,
            interpolation: Interpolation::Linear,
            quadrant: QuadrantMode::default(),
            operation: None,
            in_region: false,
            path: Vec::new(),
            path_aperture: None,
            contour: Vec::new(),
            macro_section: None,
            line: 0,
        }
    }
}

fn format_regex() -> &'static Regex {
    static FORMAT: OnceLock<Regex> = OnceLock::new();
    FORMAT.get_or_init(|| {
        Regex::new(r"^FS([LTD]?)([AI]?).*X(\d)(\d)Y(\d)(\d)").expect("invalid regex pattern")
    })
}

fn select_regex() -> &'static Regex {
    static SELECT: OnceLock<Regex> = OnceLock::new();
    SELECT.get_or_init(|| Regex::new(r"^(?:G5[45])?D(\d+)$").expect("invalid regex pattern"))
}

fn operation_regex() -> &'static Regex {
    static OPERATION: OnceLock<Regex> = OnceLock::new();
    OPERATION.get_or_init(|| {
        Regex::new(r"^(?:G0?([123]))?((?:[XYIJ][^XYIJD]+)*)(?:D0?([123]))?$")
            .expect("invalid regex pattern")
    })
}

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"([XYIJ])([^XYIJ]+)").expect("invalid regex pattern"))
}

impl GerberParser {
    /// Consume one block. Returns `false` once the end-of-file code is seen.
    fn feed(&mut self, block: &Block) -> Result<bool> {
        self.line = block.line;
        let text = block.text.as_str();

        if let Some(section) = block.section {
            if self.macro_section == Some(section) {
                // Primitives of an aperture macro body.
                return Ok(true);
            }
            self.extended(text, section)?;
            return Ok(true);
        }

        match text {
            "G36" => {
                self.flush_path();
                self.in_region = true;
            }
            "G37" => {
                self.close_contour();
                self.in_region = false;
            }
            "G70" => self.document.units = Units::Inch,
            "G71" => self.document.units = Units::Millimeter,
            "G74" => self.quadrant = QuadrantMode::Single,
            "G75" => self.quadrant = QuadrantMode::Multi,
            "G90" | "G91" => log::debug!("line {}: `{text}` ignored", block.line),
            "M00" | "M02" => return Ok(false),
            "M01" => {}
            _ if text.starts_with("G04") || text.starts_with("G4 ") => {}
            _ => {
                if let Some(caps) = select_regex().captures(text) {
                    let code = &caps[1];
                    if code.parse::<u32>().is_ok_and(|n| n >= 10) {
                        self.select(code.trim_start_matches('0'));
                        return Ok(true);
                    }
                }
                match operation_regex().captures(text) {
                    Some(caps) => self.operation(&caps)?,
                    None => self.unknown(text),
                }
            }
        }
        Ok(true)
    }

    fn extended(&mut self, text: &str, section: usize) -> Result<()> {
        if text.starts_with("FS") {
            let caps = format_regex()
                .captures(text)
                .ok_or_else(|| CamError::format(self.line, text, "bad format statement"))?;
            let zeros = match &caps[1] {
                "T" => ZeroSuppression::Trailing,
                _ => ZeroSuppression::Leading,
            };
            if &caps[2] == "I" {
                self.unknown(text);
            }
            let digit = |i: usize| caps[i].parse::<u8>().unwrap_or(0);
            self.document.format = NumberFormat::new(digit(3), digit(4), zeros);
            self.y_format = NumberFormat::new(digit(5), digit(6), zeros);
        } else if text.starts_with("MO") {
            match text[2..].parse::<Units>() {
                Ok(units) => self.document.units = units,
                Err(_) => self.unknown(text),
            }
        } else if text.starts_with("AD") {
            match Aperture::parse_definition(text, self.line)? {
                ApertureDefinition::Supported(aperture) => {
                    self.unsupported.remove(&aperture.id);
                    self.document.apertures.insert(aperture.id.clone(), aperture);
                }
                ApertureDefinition::Unsupported { id, kind } => {
                    self.unsupported.insert(id, kind);
                }
            }
        } else if let Some(name) = text.strip_prefix("AM") {
            self.document.macros.push(name.to_string());
            self.macro_section = Some(section);
        } else if ["TF", "TA", "TO", "TD", "IN", "LN", "IP"]
            .iter()
            .any(|prefix| text.starts_with(prefix))
        {
            log::debug!("line {}: attribute `{text}` ignored", self.line);
        } else {
            self.unknown(text);
        }
        Ok(())
    }

    fn select(&mut self, code: &str) {
        if self.aperture.as_deref() != Some(code) {
            self.flush_path();
        }
        self.aperture = Some(code.to_string());
    }

    fn operation(&mut self, caps: &regex::Captures) -> Result<()> {
        if let Some(g) = caps.get(1) {
            self.interpolation = match g.as_str() {
                "2" => Interpolation::Circular(ArcDirection::Clockwise),
                "3" => Interpolation::Circular(ArcDirection::CounterClockwise),
                _ => Interpolation::Linear,
            };
        }

        let mut target = self.current;
        let mut center_offset = Coord { x: 0.0, y: 0.0 };
        let words = caps.get(2).map_or("", |m| m.as_str());
        for word in word_regex().captures_iter(words) {
            let token = &word[2];
            match &word[1] {
                "X" => target.x = self.document.format.parse(token, self.line)?,
                "Y" => target.y = self.y_format.parse(token, self.line)?,
                "I" => center_offset.x = self.document.format.parse(token, self.line)?,
                _ => center_offset.y = self.y_format.parse(token, self.line)?,
            }
        }

        let code = match caps.get(3) {
            Some(d) => d.as_str().parse::<u8>().ok(),
            None if words.is_empty() => return Ok(()),
            None => self.operation,
        };
        let Some(code) = code else {
            self.current = target;
            return Ok(());
        };
        self.operation = Some(code);

        match code {
            1 => self.draw(target, center_offset),
            2 => {
                if self.in_region {
                    self.close_contour();
                } else {
                    self.flush_path();
                }
            }
            _ => {
                self.flush_path();
                if let Some(aperture) = self.usable_aperture(self.aperture.clone()) {
                    self.document.flashes.push(Flash {
                        point: target,
                        aperture,
                    });
                }
            }
        }
        self.current = target;
        Ok(())
    }

    fn draw(&mut self, target: Coord<f64>, center_offset: Coord<f64>) {
        let points = match self.interpolation {
            Interpolation::Linear => vec![target],
            Interpolation::Circular(direction) => arc::interpolate(
                self.current,
                target,
                center_offset,
                direction,
                self.quadrant,
            )
            .unwrap_or_else(|| vec![target]),
        };

        if self.in_region {
            if self.contour.is_empty() {
                self.contour.push(self.current);
            }
            self.contour.extend(points);
        } else {
            if self.path.is_empty() {
                self.path.push(self.current);
                self.path_aperture = self.aperture.clone();
            }
            self.path.extend(points);
        }
    }

    /// Aperture id if it is defined and supported; records why otherwise.
    fn usable_aperture(&mut self, aperture: Option<String>) -> Option<String> {
        let id = aperture.unwrap_or_default();
        if self.document.apertures.contains_key(&id) {
            return Some(id);
        }
        let diagnostic = match self.unsupported.get(&id) {
            Some(kind) => Diagnostic::UnsupportedAperture {
                line: self.line,
                aperture: id,
                kind: kind.clone(),
            },
            None => Diagnostic::UndefinedAperture {
                line: self.line,
                aperture: id,
            },
        };
        error::record(&mut self.document.diagnostics, diagnostic);
        None
    }

    fn flush_path(&mut self) {
        let points = std::mem::take(&mut self.path);
        let aperture = self.path_aperture.take();
        if points.len() < 2 {
            return;
        }
        if let Some(aperture) = self.usable_aperture(aperture) {
            self.document.paths.push(PathSegment { points, aperture });
        }
    }

    fn close_contour(&mut self) {
        let points = std::mem::take(&mut self.contour);
        if points.len() >= 3 {
            self.document.regions.push(Region { points });
        }
    }

    fn unknown(&mut self, text: &str) {
        error::record(
            &mut self.document.diagnostics,
            Diagnostic::UnknownDirective {
                line: self.line,
                text: text.to_string(),
            },
        );
    }

    fn finish(mut self) -> GerberDocument {
        self.flush_path();
        self.close_contour();
        self.document
    }
}
