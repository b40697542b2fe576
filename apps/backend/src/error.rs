use thiserror::Error;

/// Process-level errors surfaced by the binary.
///
/// Channel and battle failures never reach this type: they are absorbed at
/// the connection or match that produced them.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {detail}")]
    Config { detail: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn config(detail: String) -> Self {
        Self::Config { detail }
    }
}
