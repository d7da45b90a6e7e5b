//! Error handling for the GeoIP API service

pub mod types;

pub use types::{CacheError, DecodeError, LookupError, RefreshError};
