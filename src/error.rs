use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while producing a report.
///
/// Only a failure to load the primary input stops a run; every other
/// variant is recorded against a single unit of work (a column, a chart)
/// and the run carries on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurveyError {
    #[error("file '{}' was not found", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("could not read '{}': {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("could not convert column '{column}' to '{target}': {message}")]
    MalformedValue {
        column: String,
        target: String,
        message: String,
    },

    #[error("column '{column}' declares unknown type '{dtype}'")]
    UnknownType { column: String, dtype: String },

    #[error("column '{column}' not found in the table")]
    MissingColumn { column: String },

    #[error("brand color file '{}' not found, using default colors", path.display())]
    StylingAbsent { path: PathBuf },

    #[error("failed to render chart '{chart}': {message}")]
    Render { chart: String, message: String },

    #[error("i/o error on '{}': {message}", path.display())]
    Io { path: PathBuf, message: String },
}

impl SurveyError {
    pub fn read(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        SurveyError::Read {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn missing_column(column: impl Into<String>) -> Self {
        SurveyError::MissingColumn {
            column: column.into(),
        }
    }

    pub fn malformed(
        column: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        SurveyError::MalformedValue {
            column: column.into(),
            target: target.into(),
            message: message.into(),
        }
    }
}
