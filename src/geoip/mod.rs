//! Database manager: the current decoder handle and its cache as one unit
//!
//! Lookups and installs share a single snapshot pointer. A snapshot bundles
//! one open decoder handle with the cache built for exactly that database
//! version, so swapping the pointer replaces both at once and no stale cache
//! entry can outlive a data-version change.
//!
//! Readers hold the lock only long enough to clone the snapshot `Arc`; the
//! whole download/verify/extract pipeline and the decoder open run outside
//! it. The write lock is held for nothing but the pointer swap, so a slow
//! refresh never blocks lookups. A replaced snapshot is dropped, and its
//! handle closed, only after the last in-flight lookup releases its clone.

use anyhow::Result;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::cache::RecordCache;
use crate::config::GeoipConfig;
use crate::errors::{CacheError, LookupError, RefreshError};
use crate::models::GeoRecord;
use crate::updater::{DatabaseUpdater, FetchOutcome};

pub mod decoder;

pub use decoder::{GeoDecoder, MmdbDecoder};

/// Result of a completed refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new database handle was opened and installed
    Installed,
    /// The installed database is already current
    NoChangeNeeded,
}

struct DbSnapshot {
    decoder: Box<dyn GeoDecoder>,
    cache: RecordCache,
}

pub struct GeoIpService {
    updater: DatabaseUpdater,
    snapshot: RwLock<Option<Arc<DbSnapshot>>>,
    refresh_lock: Mutex<()>,
    cache_capacity: u64,
}

impl GeoIpService {
    pub fn new(config: &GeoipConfig) -> Result<Self> {
        RecordCache::validate_capacity(config.cache_size)?;
        Ok(Self {
            updater: DatabaseUpdater::new(config)?,
            snapshot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            cache_capacity: config.cache_size,
        })
    }

    /// Look up a record for `addr`
    ///
    /// Consults the cache first; on a miss the decoder runs against the
    /// current handle and the result, including an empty "no data" record,
    /// is cached on the way out. Decode failures are surfaced verbatim and
    /// never cached.
    pub async fn lookup(&self, addr: IpAddr) -> Result<Arc<GeoRecord>, LookupError> {
        let snapshot = self
            .snapshot
            .read()
            .await
            .clone()
            .ok_or(LookupError::NotReady)?;

        if let Some(record) = snapshot.cache.get(&addr) {
            return Ok(record);
        }

        let record = Arc::new(snapshot.decoder.lookup(addr)?);
        snapshot.cache.insert(addr, record.clone());
        Ok(record)
    }

    /// Bring the database up to date and make sure a handle is installed
    ///
    /// Runs the update pipeline without holding any lock the lookup path
    /// uses. When the pipeline reports the local files current and a handle
    /// is already open, the handle and cache are left completely untouched.
    /// Every failure leaves the previously installed handle serving.
    pub async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        // One refresh at a time; lookups never contend on this lock.
        let _guard = self.refresh_lock.lock().await;

        match self.updater.ensure_current().await? {
            FetchOutcome::UpToDate => {
                if self.snapshot.read().await.is_some() {
                    return Ok(RefreshOutcome::NoChangeNeeded);
                }
                debug!("local database is current but no handle is open yet");
            }
            FetchOutcome::Downloaded => {}
        }

        let path = self.updater.database_path();
        let decoder = tokio::task::spawn_blocking(move || MmdbDecoder::open(&path))
            .await
            .map_err(|err| RefreshError::Io(io::Error::new(io::ErrorKind::Other, err)))??;

        self.install(Box::new(decoder)).await?;
        info!("database set up");
        Ok(RefreshOutcome::Installed)
    }

    /// Swap in a new decoder handle together with a fresh cache
    ///
    /// The write lock is held only for the pointer swap. The previous
    /// snapshot keeps serving any lookup that already cloned it and its
    /// handle closes once the last such clone is dropped.
    pub(crate) async fn install(&self, decoder: Box<dyn GeoDecoder>) -> Result<(), CacheError> {
        let cache = RecordCache::new(self.cache_capacity)?;
        let fresh = Arc::new(DbSnapshot { decoder, cache });

        let mut current = self.snapshot.write().await;
        *current = Some(fresh);
        Ok(())
    }

    /// Whether at least one database handle has been installed
    pub async fn is_ready(&self) -> bool {
        self.snapshot.read().await.is_some()
    }

    /// Tear down the current handle; subsequent lookups report `NotReady`
    pub async fn close(&self) {
        self.snapshot.write().await.take();
    }
}
