//! Database update pipeline
//!
//! Decides whether a fresh database must be fetched, downloads and
//! integrity-checks the archive, and atomically installs the extracted
//! database file together with its checksum sidecar. The pipeline only
//! touches the filesystem and the network; it never holds any lock the
//! lookup path contends on, so readers are unaffected by a slow download.
//!
//! Failure at any step before the final renames discards the temporary
//! artifacts and leaves the previously installed pair untouched.

use flate2::read::GzDecoder;
use futures::StreamExt;
use reqwest::Client;
use std::ffi::OsStr;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::GeoipConfig;
use crate::errors::RefreshError;

/// What the pipeline did with the local database pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A new archive was downloaded, verified and renamed into place
    Downloaded,
    /// The remote checksum matches the local sidecar; nothing was touched
    UpToDate,
}

pub struct DatabaseUpdater {
    client: Client,
    data_dir: PathBuf,
    edition: String,
    archive_url: Url,
    checksum_url: Url,
}

impl DatabaseUpdater {
    pub fn new(config: &GeoipConfig) -> Result<Self, RefreshError> {
        // Archive downloads can take a while on slow links; the checksum
        // probe shares the client and finishes well inside the same limit.
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("geoip-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            data_dir: config.data_dir.clone(),
            edition: config.edition.clone(),
            archive_url: Self::endpoint(config, "tar.gz")?,
            checksum_url: Self::endpoint(config, "tar.gz.md5")?,
        })
    }

    fn endpoint(config: &GeoipConfig, suffix: &str) -> Result<Url, RefreshError> {
        let mut url = Url::parse(&config.download_url)?;
        url.query_pairs_mut()
            .append_pair("edition_id", &config.edition)
            .append_pair("license_key", &config.license_key)
            .append_pair("suffix", suffix);
        Ok(url)
    }

    /// Path of the currently installed database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.mmdb", self.edition))
    }

    /// Path of the sidecar recording the checksum of the archive that
    /// produced the installed database file
    pub fn checksum_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.mmdb.md5", self.edition))
    }

    /// Ensure the local database pair matches what the server offers
    ///
    /// When the data file and its sidecar are both present, a cheap checksum
    /// probe decides whether the full archive download can be skipped. A
    /// missing file on either side forces a download since staleness cannot
    /// be inferred safely.
    pub async fn ensure_current(&self) -> Result<FetchOutcome, RefreshError> {
        let database_path = self.database_path();
        let checksum_path = self.checksum_path();

        let mut expected = None;
        if database_path.exists() && checksum_path.exists() {
            info!("checking for database updates");
            let local = tokio::fs::read_to_string(&checksum_path).await?;
            let remote = self.fetch_remote_checksum().await?;
            if remote == local.trim().to_ascii_lowercase() {
                info!("no update found");
                return Ok(FetchOutcome::UpToDate);
            }
            info!("update available");
            expected = Some(remote);
        } else {
            info!("database or checksum sidecar missing, downloading a fresh copy");
        }

        self.download_and_install(expected).await?;
        Ok(FetchOutcome::Downloaded)
    }

    async fn fetch_remote_checksum(&self) -> Result<String, RefreshError> {
        let body = self
            .client
            .get(self.checksum_url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body.trim().to_ascii_lowercase())
    }

    /// Stream the archive to a temporary file, verify it, then extract and
    /// rename the database pair into place
    async fn download_and_install(
        &self,
        known_checksum: Option<String>,
    ) -> Result<(), RefreshError> {
        tokio::fs::create_dir_all(&self.data_dir).await?;

        info!("downloading new database archive");
        let response = self
            .client
            .get(self.archive_url.clone())
            .send()
            .await?
            .error_for_status()?;

        let mut archive = NamedTempFile::new_in(&self.data_dir)?;
        let mut hasher = md5::Context::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.consume(&chunk);
            archive.write_all(&chunk)?;
        }
        archive.flush()?;
        let computed = format!("{:x}", hasher.compute());

        let expected = match known_checksum {
            Some(checksum) => checksum,
            None => self.fetch_remote_checksum().await?,
        };
        if computed != expected {
            warn!("discarding downloaded archive: checksum {computed} does not match {expected}");
            return Err(RefreshError::ChecksumMismatch { computed, expected });
        }
        debug!("archive checksum verified");

        let entry_name = format!("{}.mmdb", self.edition);
        let data_dir = self.data_dir.clone();
        let database_path = self.database_path();
        let checksum_path = self.checksum_path();
        tokio::task::spawn_blocking(move || {
            extract_and_install(
                archive,
                &entry_name,
                &expected,
                &data_dir,
                &database_path,
                &checksum_path,
            )
        })
        .await
        .map_err(|err| RefreshError::Io(io::Error::new(io::ErrorKind::Other, err)))??;

        info!("database downloaded");
        Ok(())
    }
}

/// Extract the database entry from the verified archive and atomically
/// replace the live (data file, sidecar) pair
fn extract_and_install(
    archive: NamedTempFile,
    entry_name: &str,
    checksum: &str,
    data_dir: &Path,
    database_path: &Path,
    checksum_path: &Path,
) -> Result<(), RefreshError> {
    let mut entries = tar::Archive::new(GzDecoder::new(archive.reopen()?));

    // Temporaries live beside the live pair so the renames stay on one
    // filesystem.
    let mut payload = NamedTempFile::new_in(data_dir)?;
    let mut found = false;
    for entry in entries.entries()? {
        let mut entry = entry?;
        let is_database = {
            let path = entry.path()?;
            path.file_name() == Some(OsStr::new(entry_name))
        };
        if !is_database {
            continue;
        }
        io::copy(&mut entry, &mut payload)?;
        found = true;
        break;
    }
    if !found {
        return Err(RefreshError::EntryNotFound {
            entry: entry_name.to_string(),
        });
    }
    payload.flush()?;

    let mut sidecar = NamedTempFile::new_in(data_dir)?;
    sidecar.write_all(checksum.as_bytes())?;
    sidecar.flush()?;

    // Data file first: a crash before the sidecar rename leaves a stale
    // sidecar behind, which only costs a harmless re-download next run.
    payload
        .persist(database_path)
        .map_err(|err| RefreshError::Io(err.error))?;
    sidecar
        .persist(checksum_path)
        .map_err(|err| RefreshError::Io(err.error))?;
    Ok(())
}
