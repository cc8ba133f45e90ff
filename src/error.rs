// 🧯 Fatal pipeline errors
// Anything here aborts the run. Row, match and conflict problems are
// not errors: they become diagnostics (see diagnostics.rs).

use std::fmt;

#[derive(Debug)]
pub enum PipelineError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty path, half-mapped visitation layout, ...).
    ConfigValidation(String),
    /// A mapped column is not present in the source file header.
    MissingColumn { source: String, column: String },
    /// Source file missing or unreadable at the file level.
    Io { path: String, message: String },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { source, column } => {
                write!(f, "source '{source}': missing column '{column}'")
            }
            Self::Io { path, message } => write!(f, "cannot read '{path}': {message}"),
        }
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_message() {
        let err = PipelineError::MissingColumn {
            source: "acreage".to_string(),
            column: "Gross Area Acres".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "source 'acreage': missing column 'Gross Area Acres'"
        );
    }

    #[test]
    fn test_error_converts_into_anyhow() {
        let err: anyhow::Error = PipelineError::ConfigValidation("bad".to_string()).into();
        assert!(err.downcast_ref::<PipelineError>().is_some());
        assert!(err.to_string().contains("bad"));
    }
}
