use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong during a scan.
///
/// `Read` and `Seek` are per-block and never abort the scan; they are
/// collected in the report. The rest are structural.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("cannot open device {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("{block} block: {source}")]
    Read { block: u64, source: io::Error },

    #[error("not seeking past block {block}: {source}")]
    Seek { block: u64, source: io::Error },

    #[error("unable to close device: {source}")]
    Close { source: io::Error },

    #[error("status output failed: {0}")]
    Output(#[from] io::Error),
}

impl ScanError {
    /// The platform error behind this failure, if any.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            ScanError::Configuration(_) => None,
            ScanError::Open { source, .. }
            | ScanError::Read { source, .. }
            | ScanError::Seek { source, .. }
            | ScanError::Close { source } => Some(source),
            ScanError::Output(e) => Some(e),
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, ScanError::Read { .. })
    }

    pub fn is_seek(&self) -> bool {
        matches!(self, ScanError::Seek { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
