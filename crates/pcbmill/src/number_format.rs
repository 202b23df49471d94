//! Fixed-point coordinate decoding shared by the Gerber and Excellon readers.
//!
//! Photoplotter and drill files write coordinates as bare integers whose
//! implied decimal point is fixed by a `(digits, fraction)` pair, with either
//! the leading or the trailing zeros left out.

use crate::error::{CamError, Result};
use serde::{Deserialize, Serialize};

/// Which zeros the exporter dropped from fixed-point tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZeroSuppression {
    /// Leading zeros omitted: the token is right-aligned.
    #[default]
    Leading,
    /// Trailing zeros omitted: the token is left-aligned to the full width.
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberFormat {
    /// Integer digits.
    pub digits: u8,
    /// Fractional digits.
    pub fraction: u8,
    pub zeros: ZeroSuppression,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::new(2, 4, ZeroSuppression::Leading)
    }
}

impl NumberFormat {
    pub fn new(digits: u8, fraction: u8, zeros: ZeroSuppression) -> Self {
        Self {
            digits,
            fraction,
            zeros,
        }
    }

    /// Total significant positions of a token.
    pub fn width(&self) -> usize {
        self.digits as usize + self.fraction as usize
    }

    /// Decode `token`, reporting `line` on failure.
    ///
    /// Tokens carrying a literal decimal point are read as plain decimals and
    /// ignore the configured format.
    pub fn parse(&self, token: &str, line: usize) -> Result<f64> {
        let token = token.trim();
        let (negative, body) = match token.as_bytes().first() {
            Some(b'-') => (true, &token[1..]),
            Some(b'+') => (false, &token[1..]),
            _ => (false, token),
        };

        if body.is_empty() {
            return Err(CamError::format(line, token, "empty number"));
        }
        if let Some(bad) = body.chars().find(|c| !c.is_ascii_digit() && *c != '.') {
            return Err(CamError::format(
                line,
                token,
                format!("unexpected character `{bad}`"),
            ));
        }

        let magnitude = match body.matches('.').count() {
            0 => {
                let aligned = match self.zeros {
                    ZeroSuppression::Leading => body.to_string(),
                    ZeroSuppression::Trailing => format!("{body:0<width$}", width = self.width()),
                };
                let raw: u64 = aligned
                    .parse()
                    .map_err(|err| CamError::format(line, token, format!("{err}")))?;
                raw as f64 / 10f64.powi(self.fraction as i32)
            }
            1 => {
                if body == "." {
                    return Err(CamError::format(line, token, "no digits"));
                }
                body.parse::<f64>()
                    .map_err(|err| CamError::format(line, token, format!("{err}")))?
            }
            _ => {
                return Err(CamError::format(
                    line,
                    token,
                    "more than one decimal point",
                ))
            }
        };

        Ok(if negative { -magnitude } else { magnitude })
    }

    /// Encode `value` (in units of `10^-fraction`) the way an exporter using
    /// this format writes it. `|value|` must fit in `width()` digits.
    pub fn format(&self, value: i64) -> String {
        let padded = format!("{:0width$}", value.unsigned_abs(), width = self.width());
        let trimmed = match self.zeros {
            ZeroSuppression::Leading => padded.trim_start_matches('0'),
            ZeroSuppression::Trailing => padded.trim_end_matches('0'),
        };
        let digits = if trimmed.is_empty() { "0" } else { trimmed };
        if value < 0 {
            format!("-{digits}")
        } else {
            digits.to_string()
        }
    }
}
