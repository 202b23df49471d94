use crate::error::{self, CamError, Diagnostic, Result};
use crate::units::Units;
use geo::Coord;
use regex::Regex;
use std::sync::OnceLock;

/// Words kept from one G-code line; `None` means "unchanged".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GCodeInstruction {
    pub n: Option<f64>,
    pub m: Option<f64>,
    /// Every G word on the line, in order.
    pub g: Vec<f64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub i: Option<f64>,
    pub j: Option<f64>,
    pub f: Option<f64>,
    pub p: Option<f64>,
}

impl GCodeInstruction {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One XY move recovered from a program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolpathSegment {
    pub from: Coord<f64>,
    pub to: Coord<f64>,
    /// Tool above the work (`Z > 0`) during the move.
    pub travel: bool,
    /// Rapid (`G00`) motion.
    pub fast: bool,
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedGCode {
    pub instructions: Vec<GCodeInstruction>,
    pub segments: Vec<ToolpathSegment>,
    /// Last `G20`/`G21` seen.
    pub units: Option<Units>,
    pub diagnostics: Vec<Diagnostic>,
}

fn comment_regex() -> &'static Regex {
    static COMMENT: OnceLock<Regex> = OnceLock::new();
    COMMENT.get_or_init(|| Regex::new(r"\([^)]*\)|;.*").expect("invalid regex pattern"))
}

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"([A-Z])\s*([+-]?[0-9.]*)").expect("invalid regex pattern"))
}

/// Tokenize a single line (comments already removed).
pub fn parse_instruction(line: &str, line_no: usize) -> Result<GCodeInstruction> {
    let mut instruction = GCodeInstruction::default();
    for word in word_regex().captures_iter(line) {
        let value = || {
            word[2]
                .parse::<f64>()
                .map_err(|err| CamError::format(line_no, &word[0], err.to_string()))
        };
        let slot = match &word[1] {
            "G" => {
                instruction.g.push(value()?);
                continue;
            }
            "N" => &mut instruction.n,
            "M" => &mut instruction.m,
            "X" => &mut instruction.x,
            "Y" => &mut instruction.y,
            "Z" => &mut instruction.z,
            "I" => &mut instruction.i,
            "J" => &mut instruction.j,
            "F" => &mut instruction.f,
            "P" => &mut instruction.p,
            _ => continue,
        };
        *slot = Some(value()?);
    }
    Ok(instruction)
}

/// Replay a program through a modal machine state and recover every XY move.
///
/// The machine starts at the origin with `Z = 0` in rapid mode. Moves that
/// change Z together with X/Y are kept but reported as non-orthogonal.
pub fn gcode_parse(text: &str) -> Result<ParsedGCode> {
    let mut parsed = ParsedGCode::default();
    let mut position = Coord { x: 0.0, y: 0.0 };
    let mut z = 0.0;
    let mut motion = 0.0;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let upper = raw.to_ascii_uppercase();
        let cleaned = comment_regex().replace_all(&upper, "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() || cleaned == "%" {
            continue;
        }

        let instruction = parse_instruction(cleaned, line_no)?;
        if instruction.is_empty() {
            continue;
        }

        for &g in &instruction.g {
            match g as i64 {
                0..=3 => motion = g,
                20 => parsed.units = Some(Units::Inch),
                21 => parsed.units = Some(Units::Millimeter),
                _ => {}
            }
        }

        let next = Coord {
            x: instruction.x.unwrap_or(position.x),
            y: instruction.y.unwrap_or(position.y),
        };
        let next_z = instruction.z.unwrap_or(z);

        if next != position {
            if next_z != z {
                error::record(
                    &mut parsed.diagnostics,
                    Diagnostic::NonOrthogonalMotion { line: line_no },
                );
            }
            parsed.segments.push(ToolpathSegment {
                from: position,
                to: next,
                travel: next_z > 0.0,
                fast: motion == 0.0,
                line: line_no,
            });
        }

        position = next;
        z = next_z;
        parsed.instructions.push(instruction);
    }

    log::info!(
        "gcode: {} instructions, {} segments",
        parsed.instructions.len(),
        parsed.segments.len()
    );
    Ok(parsed)
}
