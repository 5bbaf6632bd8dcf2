use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot open input file {}: {source}", path.display())]
    InputOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record in partition {partition} near byte {offset}: {message}")]
    MalformedRecord {
        partition: usize,
        offset: usize,
        message: String,
    },

    #[error("Invalid measurement '{literal}' near byte {offset} (expected -?d{{1,2}}.d)")]
    Parse { literal: String, offset: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ProcessingError {
    /// Short name of the failure kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessingError::Io(_) | ProcessingError::InputOpen { .. } => "IOError",
            ProcessingError::MalformedRecord { .. } => "MalformedRecordError",
            ProcessingError::Parse { .. } => "ParseError",
            ProcessingError::Config(_)
            | ProcessingError::Settings(_)
            | ProcessingError::Validation(_) => "ConfigError",
            ProcessingError::ThreadPool(_) | ProcessingError::TaskJoin(_) => "InternalError",
        }
    }

    /// Process exit status for this failure (sysexits.h values).
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            "IOError" => 74,
            "MalformedRecordError" | "ParseError" => 65,
            "ConfigError" => 78,
            _ => 70,
        }
    }

    pub(crate) fn malformed(partition: usize, offset: usize, message: impl Into<String>) -> Self {
        ProcessingError::MalformedRecord {
            partition,
            offset,
            message: message.into(),
        }
    }
}
