//! Error type definitions for the GeoIP API service
//!
//! This module defines the error taxonomy used throughout the application.
//! Refresh failures are recoverable while a previously installed database
//! keeps serving; lookup failures are isolated to the request that hit them.

use thiserror::Error;

/// Errors produced by the record cache
#[derive(Error, Debug)]
pub enum CacheError {
    /// The configured capacity cannot hold a single record
    #[error("invalid cache capacity {0}: must be at least 1")]
    InvalidCapacity(u64),
}

/// Errors produced by the record decoder for a single lookup
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The database contents could not be decoded
    #[error("corrupt database: {message}")]
    Corrupt { message: String },

    /// Reading the database failed at the I/O level
    #[error("database read failed: {message}")]
    Read { message: String },
}

impl From<maxminddb::MaxMindDBError> for DecodeError {
    fn from(err: maxminddb::MaxMindDBError) -> Self {
        match err {
            maxminddb::MaxMindDBError::IoError(message) => Self::Read { message },
            other => Self::Corrupt {
                message: other.to_string(),
            },
        }
    }
}

/// Errors surfaced to lookup callers
#[derive(Error, Debug)]
pub enum LookupError {
    /// No database has been installed yet
    #[error("geoip database not open")]
    NotReady,

    /// The decoder failed for this address
    #[error("lookup failed: {0}")]
    Decode(#[from] DecodeError),
}

/// Errors produced while refreshing the database
///
/// Every variant leaves the previously installed database file, sidecar and
/// open handle untouched; a refresh is best-effort and non-destructive on
/// failure.
#[derive(Error, Debug)]
pub enum RefreshError {
    /// The downloaded archive does not match the checksum the server advertises
    #[error("database archive checksum mismatch: computed {computed}, expected {expected}")]
    ChecksumMismatch { computed: String, expected: String },

    /// The archive does not contain the expected database file
    #[error("database file '{entry}' not found in downloaded archive")]
    EntryNotFound { entry: String },

    /// Downloading the archive or checksum failed
    #[error("transfer failed: {0}")]
    Transfer(#[from] reqwest::Error),

    /// Filesystem or archive-unpacking failure
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    /// The freshly installed database file could not be opened
    #[error("failed to open database: {0}")]
    Open(#[from] maxminddb::MaxMindDBError),

    /// A fresh cache could not be constructed for the new database
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The configured download endpoint is not a valid URL
    #[error("invalid download endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}
