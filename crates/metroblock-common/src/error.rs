use crate::types::RegionPos;
use std::error::Error;
use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum ConvertError {
    /// A target column fell outside the configured world limits
    OutOfBounds { x: i64, z: i64, limit: i64 },
    /// A feature instance carried unusable data
    MalformedFeature { id: u64, reason: String },
    /// A region was finalized while chunk slots were still pending
    IncompleteRegion { region: RegionPos, pending: usize },
    SourceRead(String),
    DestinationWrite(String),
    RegionTimeout { region: RegionPos, after: Duration },
    Cancelled,
    Config(String),
    /// An internal pipeline invariant was violated (duplicate column, unknown chunk, ...)
    Pipeline(String),
    IoError(std::io::Error),
}

impl ConvertError {
    /// Whether the error must stop the whole conversion run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConvertError::OutOfBounds { .. }
                | ConvertError::SourceRead(_)
                | ConvertError::DestinationWrite(_)
                | ConvertError::Config(_)
                | ConvertError::IoError(_)
        )
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::OutOfBounds { x, z, limit } => write!(
                f,
                "Out of bounds: column ({}, {}) lies outside the world limit of {}",
                x, z, limit
            ),
            ConvertError::MalformedFeature { id, reason } => {
                write!(f, "Malformed feature #{}: {}", id, reason)
            }
            ConvertError::IncompleteRegion { region, pending } => write!(
                f,
                "Incomplete region {}: {} chunk slots still pending",
                region, pending
            ),
            ConvertError::SourceRead(msg) => write!(f, "Source read error: {}", msg),
            ConvertError::DestinationWrite(msg) => write!(f, "Destination write error: {}", msg),
            ConvertError::RegionTimeout { region, after } => write!(
                f,
                "Region {} timed out after {:.1}s",
                region,
                after.as_secs_f64()
            ),
            ConvertError::Cancelled => write!(f, "Conversion cancelled"),
            ConvertError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ConvertError::Pipeline(msg) => write!(f, "Pipeline error: {}", msg),
            ConvertError::IoError(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl Error for ConvertError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConvertError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        ConvertError::IoError(err)
    }
}
