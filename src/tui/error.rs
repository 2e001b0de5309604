use std::io;

use thiserror::Error;

/// TUI-specific errors
#[derive(Error, Debug)]
pub enum TuiError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("no widget at index {0}")]
    UnknownWidget(usize),
}

/// Result type for TUI operations
pub type TuiResult<T> = Result<T, TuiError>;
