//! Bounded record cache sitting in front of the database decoder
//!
//! The cache maps a normalized IP address to the record the decoder produced
//! for it, including empty "no data for this address" records. It is safe to
//! share across tasks without external locking; eviction follows moka's
//! adaptive frequency/recency policy.

use moka::sync::Cache;
use std::net::IpAddr;
use std::sync::Arc;

use crate::errors::CacheError;
use crate::models::GeoRecord;

pub struct RecordCache {
    inner: Cache<IpAddr, Arc<GeoRecord>>,
}

impl RecordCache {
    /// Create a cache holding at most `capacity` records
    ///
    /// Fails instead of panicking when the capacity is zero, so a bad
    /// configuration value surfaces as an error at construction time.
    pub fn new(capacity: u64) -> Result<Self, CacheError> {
        Self::validate_capacity(capacity)?;
        Ok(Self {
            inner: Cache::new(capacity),
        })
    }

    pub(crate) fn validate_capacity(capacity: u64) -> Result<(), CacheError> {
        if capacity == 0 {
            return Err(CacheError::InvalidCapacity(capacity));
        }
        Ok(())
    }

    pub fn get(&self, addr: &IpAddr) -> Option<Arc<GeoRecord>> {
        self.inner.get(addr)
    }

    pub fn insert(&self, addr: IpAddr, record: Arc<GeoRecord>) {
        self.inner.insert(addr, record);
    }
}
