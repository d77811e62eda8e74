use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure aborts the `read_task` call that produced it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("no identifier file (*.txt) in {}", dir.display())]
    NoIdentifierFile { dir: PathBuf },

    #[error(
        "insufficient rows in {}: expected {expected}, found {found} usable lines",
        path.display()
    )]
    InsufficientRows {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error(
        "inconsistent structure in {}: identifiers {matched:?} have subfolders while {missing:?} do not",
        dir.display()
    )]
    InconsistentStructure {
        dir: PathBuf,
        matched: Vec<String>,
        missing: Vec<String>,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid separator pattern '{pattern}': {source}")]
    InvalidSeparator {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("no branch for identifier '{label}'")]
    MissingBranch { label: String },

    #[error("subject {subject} out of range: level has {rows} rows")]
    SubjectOutOfRange { subject: usize, rows: usize },

    #[error("add_condition called before add_row")]
    NoOpenRow,

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error("failed to parse {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid experiment config: {0}")]
    Config(String),
}

impl Error {
    /// Stable snake_case code, used by the CLI's JSON error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotADirectory { .. } => "not_a_directory",
            Self::NoIdentifierFile { .. } => "no_identifier_file",
            Self::InsufficientRows { .. } => "insufficient_rows",
            Self::InconsistentStructure { .. } => "inconsistent_structure",
            Self::Io { .. } | Self::Walk(_) => "io_fault",
            Self::InvalidSeparator { .. } => "invalid_separator",
            Self::MissingBranch { .. } => "missing_branch",
            Self::SubjectOutOfRange { .. } => "subject_out_of_range",
            Self::NoOpenRow => "no_open_row",
            Self::Yaml { .. } | Self::Config(_) => "invalid_config",
        }
    }
}
