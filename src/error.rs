//! Error types for the response builder.
//!
//! All errors are strongly typed using thiserror. Classification ambiguity is
//! never an error: the classifier predicates return `false` instead, and only
//! the conditions below ever reach a caller.

use std::path::PathBuf;

use thiserror::Error;

use crate::reconstruction::SiteId;

/// Invalid run settings. Always fatal at initialization.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid energy window: minimum {min} keV must be positive and below maximum {max} keV")]
    InvalidEnergyWindow {
        min: f64,
        max: f64,
    },

    #[error("Maximum number of interactions must be at least 2, got {value}")]
    TooFewInteractions {
        value: usize,
    },

    #[error("Invalid setting '{field}': {reason}")]
    InvalidValue {
        field: String,
        reason: String,
    },

    #[error("Unknown option '{key}' in option string")]
    UnknownOption {
        key: String,
    },

    #[error("Malformed option '{fragment}': expected key=value")]
    MalformedOption {
        fragment: String,
    },

    #[error("Failed to read configuration file {path}: {message}")]
    Unreadable {
        path: PathBuf,
        message: String,
    },
}

/// Failures reading one of the two event oracles.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to open event source {path}: {message}")]
    Open {
        path: PathBuf,
        message: String,
    },

    #[error("I/O error on line {line} of event source: {message}")]
    Io {
        line: usize,
        message: String,
    },

    #[error("Malformed record on line {line}: {message}")]
    Parse {
        line: usize,
        message: String,
    },

    #[error("Inconsistent simulated event {event_id}: {reason}")]
    InvalidEvent {
        event_id: u64,
        reason: String,
    },
}

/// Failures persisting or loading response matrices.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Axis layout mismatch merging '{name}': {reason}")]
    LayoutMismatch {
        name: String,
        reason: String,
    },

    #[error("Matrix '{name}' has {expected} axes but {actual} coordinates were given")]
    DimensionMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid axis '{name}': {reason}")]
    InvalidAxis {
        name: String,
        reason: String,
    },
}

/// Internal consistency violations while flattening candidate sites.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProvenanceError {
    #[error("Site {site} has kind {found} where a leaf was required")]
    UnexpectedSiteKind {
        site: SiteId,
        found: &'static str,
    },

    #[error("Site {site} references hit {hit} but the event only has {available} hits")]
    HitOutOfRange {
        site: SiteId,
        hit: usize,
        available: usize,
    },
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl From<ProvenanceError> for ResponseError {
    fn from(err: ProvenanceError) -> Self {
        Self::internal(err.to_string())
    }
}

impl ResponseError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a source error.
    #[must_use]
    pub const fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if the batch cannot continue after this error.
    ///
    /// A malformed simulated event only loses that event; everything else
    /// aborts the run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Source(e) => !matches!(e, SourceError::InvalidEvent { .. }),
            Self::Config(_) | Self::Storage(_) | Self::Internal { .. } => true,
        }
    }
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for response builder operations.
pub type ResponseResult<T> = Result<T, ResponseError>;
