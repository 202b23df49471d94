use thiserror::Error;

/// Fatal errors surfaced by the engine.
#[derive(Error, Debug)]
pub enum CamError {
    /// A numeric token could not be decoded. Aborts parsing of the document.
    #[error("line {line}: malformed number `{token}`: {reason}")]
    Format {
        line: usize,
        token: String,
        reason: String,
    },

    #[error("tool T{0} is not defined")]
    UnknownTool(u32),

    #[error("{0} produced no geometry")]
    EmptyGeometry(&'static str),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("background task failed: {0}")]
    Background(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CamError {
    pub(crate) fn format(line: usize, token: &str, reason: impl Into<String>) -> Self {
        CamError::Format {
            line,
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = CamError> = std::result::Result<T, E>;

/// Recoverable irregularities. Parsing continues and the best-effort output
/// is kept; every diagnostic is also logged when it is recorded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Diagnostic {
    #[error("line {line}: aperture D{aperture} uses unsupported {kind}, skipped")]
    UnsupportedAperture {
        line: usize,
        aperture: String,
        kind: String,
    },

    #[error("line {line}: aperture D{aperture} is not defined, skipped")]
    UndefinedAperture { line: usize, aperture: String },

    #[error("region {region} was self-intersecting and has been regularized")]
    GeometryRepair { region: usize },

    #[error("line {line}: Z changes together with X/Y (non-orthogonal motion)")]
    NonOrthogonalMotion { line: usize },

    #[error("line {line}: unknown directive `{text}` ignored")]
    UnknownDirective { line: usize, text: String },

    #[error("line {line}: drill hit without a defined tool (T{tool})")]
    MissingTool { line: usize, tool: u32 },
}

/// Append `diagnostic` to `sink` and log it at warning level.
pub(crate) fn record(sink: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    log::warn!("{diagnostic}");
    sink.push(diagnostic);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_mentions_line_and_token() {
        let err = CamError::format(12, "X1.2.3", "more than one decimal point");
        let msg = err.to_string();
        assert!(msg.contains("line 12"), "{msg}");
        assert!(msg.contains("X1.2.3"), "{msg}");
    }

    #[test]
    fn test_record_keeps_order() {
        let mut sink = Vec::new();
        record(&mut sink, Diagnostic::GeometryRepair { region: 0 });
        record(&mut sink, Diagnostic::NonOrthogonalMotion { line: 4 });
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[1], Diagnostic::NonOrthogonalMotion { line: 4 });
    }
}
