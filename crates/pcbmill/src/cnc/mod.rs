//! G-code emission and re-parsing.

pub mod generator;
pub mod parser;

pub use generator::{CncJobGenerator, ToolSelection};
pub use parser::{gcode_parse, parse_instruction, GCodeInstruction, ParsedGCode, ToolpathSegment};

use crate::config::JobConfig;
use crate::error::{Diagnostic, Result};
use crate::geometry::{merge_rects, MirrorAxis, SolidGeometry};
use crate::units::Units;
use geo::{Coord, LineString, Rect};
use regex::{Captures, Regex};
use std::fmt;
use std::sync::OnceLock;

/// Program text, one block per line without terminators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GCode {
    pub lines: Vec<String>,
}

impl GCode {
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

impl From<&str> for GCode {
    fn from(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }
}

/// A G-code program together with the motion recovered from it.
#[derive(Debug, Clone)]
pub struct CncJob {
    pub name: String,
    pub config: JobConfig,
    pub gcode: GCode,
    pub segments: Vec<ToolpathSegment>,
    pub diagnostics: Vec<Diagnostic>,
    solid_geometry: Option<SolidGeometry>,
}

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| {
        Regex::new(r"(?i)([GXYZIJF])\s*([+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+))").expect("invalid regex pattern")
    })
}

impl CncJob {
    /// Wrap emitted code; the program is re-parsed to recover its segments.
    pub fn from_gcode(name: impl Into<String>, mut config: JobConfig, gcode: GCode) -> Result<Self> {
        let parsed = gcode_parse(&gcode.text())?;
        if let Some(units) = parsed.units {
            config.units = units;
        }
        Ok(Self {
            name: name.into(),
            config,
            gcode,
            segments: parsed.segments,
            diagnostics: parsed.diagnostics,
            solid_geometry: None,
        })
    }

    /// Load an existing program; units come from its `G20`/`G21` word.
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self> {
        Self::from_gcode(name, JobConfig::default(), GCode::from(text))
    }

    pub fn units(&self) -> Units {
        self.config.units
    }

    /// Cutting moves as polylines; consecutive connected moves share one line.
    pub fn create_geometry(&mut self) -> &SolidGeometry {
        let geometry = match self.solid_geometry.take() {
            Some(geometry) => geometry,
            None => SolidGeometry::from_lines(polylines(self.segments.iter().filter(|s| !s.travel))),
        };
        self.solid_geometry.insert(geometry)
    }

    /// Moves made with the tool lifted.
    pub fn travel_geometry(&self) -> SolidGeometry {
        SolidGeometry::from_lines(polylines(self.segments.iter().filter(|s| s.travel)))
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.segments
            .iter()
            .filter(|s| !s.travel)
            .map(|s| Rect::new(s.from, s.to))
            .reduce(merge_rects)
    }

    /// Rescale every length word and option to `target`; returns the factor.
    pub fn convert_units(&mut self, target: Units) -> f64 {
        let factor = self.units().factor_to(target);
        let code = match target {
            Units::Inch => 20.0,
            Units::Millimeter => 21.0,
        };
        self.rewrite_words(|letter, value| match letter {
            'G' if value == 20.0 || value == 21.0 => Some(code),
            'X' | 'Y' | 'Z' | 'I' | 'J' | 'F' => Some(value * factor),
            _ => None,
        });
        self.map_segments(|c| Coord {
            x: c.x * factor,
            y: c.y * factor,
        });
        self.config.convert_units(factor);
        self.config.units = target;
        factor
    }

    /// Scale the XY plane about the origin.
    pub fn scale(&mut self, factor: f64) {
        self.rewrite_words(|letter, value| match letter {
            'X' | 'Y' | 'I' | 'J' => Some(value * factor),
            _ => None,
        });
        self.map_segments(|c| Coord {
            x: c.x * factor,
            y: c.y * factor,
        });
    }

    pub fn offset(&mut self, dx: f64, dy: f64) {
        self.rewrite_words(|letter, value| match letter {
            'X' => Some(value + dx),
            'Y' => Some(value + dy),
            _ => None,
        });
        self.map_segments(|c| Coord {
            x: c.x + dx,
            y: c.y + dy,
        });
    }

    /// Reflect the program; arc directions are swapped to keep arcs on the
    /// same side.
    pub fn mirror(&mut self, axis: MirrorAxis, about: Coord<f64>) {
        self.rewrite_words(|letter, value| match (axis, letter) {
            (_, 'G') if value == 2.0 || value == 3.0 => Some(5.0 - value),
            (MirrorAxis::X, 'Y') => Some(2.0 * about.y - value),
            (MirrorAxis::X, 'J') | (MirrorAxis::Y, 'I') => Some(-value),
            (MirrorAxis::Y, 'X') => Some(2.0 * about.x - value),
            _ => None,
        });
        self.map_segments(|c| match axis {
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

    fn map_segments(&mut self, func: impl Fn(Coord<f64>) -> Coord<f64>) {
        for segment in &mut self.segments {
            segment.from = func(segment.from);
            segment.to = func(segment.to);
        }
        self.solid_geometry = None;
    }

    /// Replace each word for which `map` yields a new value; comments are kept
    /// verbatim.
    fn rewrite_words(&mut self, map: impl Fn(char, f64) -> Option<f64>) {
        let decimals = self.config.coordinate_decimals;
        for line in &mut self.gcode.lines {
            let updated = {
                let split = line.find(['(', ';']).unwrap_or(line.len());
                let (code, comment) = line.split_at(split);
                let rewritten = word_regex().replace_all(code, |caps: &Captures| {
                    let letter = caps[1].to_ascii_uppercase();
                    let mapped = letter
                        .chars()
                        .next()
                        .zip(caps[2].parse::<f64>().ok())
                        .and_then(|(l, value)| map(l, value));
                    match mapped {
                        Some(value) if letter == "G" => format!("G{:02}", value.round() as i64),
                        Some(value) => {
                            let value = if value == 0.0 { 0.0 } else { value };
                            format!("{letter}{value:.decimals$}")
                        }
                        None => caps[0].to_string(),
                    }
                });
                format!("{rewritten}{comment}")
            };
            *line = updated;
        }
    }
}

fn polylines<'a>(segments: impl Iterator<Item = &'a ToolpathSegment>) -> Vec<LineString<f64>> {
    let mut lines: Vec<Vec<Coord<f64>>> = Vec::new();
    for segment in segments {
        match lines.last_mut() {
            Some(line) if line.last() == Some(&segment.from) => line.push(segment.to),
            _ => lines.push(vec![segment.from, segment.to]),
        }
    }
    lines.into_iter().map(LineString::new).collect()
}
