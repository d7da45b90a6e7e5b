//! Integration tests for the database update pipeline
//!
//! These drive `DatabaseUpdater` against a local mock of the download
//! endpoint and verify the on-disk (data file, sidecar) pair is only ever
//! replaced as a consistent unit.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::Path;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use geoip_api::config::GeoipConfig;
use geoip_api::errors::RefreshError;
use geoip_api::updater::{DatabaseUpdater, FetchOutcome};

fn test_config(data_dir: &Path, download_url: &str) -> GeoipConfig {
    GeoipConfig {
        data_dir: data_dir.to_path_buf(),
        edition: "GeoLite2-Country".to_string(),
        license_key: "test-key".to_string(),
        cache_size: 64,
        refresh_interval_hours: 168,
        download_url: download_url.to_string(),
    }
}

fn gzipped_tar(entry_name: &str, payload: &[u8]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut header = tar::Header::new_gnu();
    header.set_size(payload.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(
            &mut header,
            format!("GeoLite2-Country_20260101/{entry_name}"),
            payload,
        )
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

async fn mount_archive(server: &MockServer, archive: &[u8], expected_downloads: u64) {
    Mock::given(method("GET"))
        .and(path("/geoip"))
        .and(query_param("suffix", "tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive.to_vec()))
        .expect(expected_downloads)
        .mount(server)
        .await;
}

async fn mount_checksum(server: &MockServer, checksum: &str) {
    Mock::given(method("GET"))
        .and(path("/geoip"))
        .and(query_param("suffix", "tar.gz.md5"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!("{checksum}\n")))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fresh_download_installs_a_consistent_pair() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    let archive = gzipped_tar("GeoLite2-Country.mmdb", b"binary database payload");
    let checksum = format!("{:x}", md5::compute(&archive));

    mount_archive(&server, &archive, 1).await;
    mount_checksum(&server, &checksum).await;

    let updater = DatabaseUpdater::new(&test_config(dir.path(), &format!("{}/geoip", server.uri())))
        .unwrap();
    assert_eq!(updater.ensure_current().await.unwrap(), FetchOutcome::Downloaded);

    assert_eq!(
        std::fs::read(updater.database_path()).unwrap(),
        b"binary database payload"
    );
    assert_eq!(
        std::fs::read_to_string(updater.checksum_path()).unwrap(),
        checksum
    );
}

#[tokio::test]
async fn matching_checksum_probe_skips_the_download() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    let archive = gzipped_tar("GeoLite2-Country.mmdb", b"binary database payload");
    let checksum = format!("{:x}", md5::compute(&archive));

    // One download for the first run; the second run must stop at the probe.
    mount_archive(&server, &archive, 1).await;
    mount_checksum(&server, &checksum).await;

    let updater = DatabaseUpdater::new(&test_config(dir.path(), &format!("{}/geoip", server.uri())))
        .unwrap();
    assert_eq!(updater.ensure_current().await.unwrap(), FetchOutcome::Downloaded);
    assert_eq!(updater.ensure_current().await.unwrap(), FetchOutcome::UpToDate);
    assert_eq!(updater.ensure_current().await.unwrap(), FetchOutcome::UpToDate);
}

#[tokio::test]
async fn checksum_mismatch_preserves_the_existing_pair() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("GeoLite2-Country.mmdb"), b"old payload").unwrap();
    std::fs::write(dir.path().join("GeoLite2-Country.mmdb.md5"), "11112222").unwrap();

    let server = MockServer::start().await;
    let archive = gzipped_tar("GeoLite2-Country.mmdb", b"new payload");
    // Advertised checksum differs from the local sidecar (so a download is
    // attempted) and from the archive's actual checksum (so it must fail).
    mount_archive(&server, &archive, 1).await;
    mount_checksum(&server, "33334444").await;

    let updater = DatabaseUpdater::new(&test_config(dir.path(), &format!("{}/geoip", server.uri())))
        .unwrap();
    let err = updater.ensure_current().await.unwrap_err();
    assert!(matches!(err, RefreshError::ChecksumMismatch { .. }));

    assert_eq!(
        std::fs::read(updater.database_path()).unwrap(),
        b"old payload"
    );
    assert_eq!(
        std::fs::read_to_string(updater.checksum_path()).unwrap(),
        "11112222"
    );
}

#[tokio::test]
async fn archive_without_the_database_entry_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    let archive = gzipped_tar("COPYRIGHT.txt", b"no database here");
    let checksum = format!("{:x}", md5::compute(&archive));

    mount_archive(&server, &archive, 1).await;
    mount_checksum(&server, &checksum).await;

    let updater = DatabaseUpdater::new(&test_config(dir.path(), &format!("{}/geoip", server.uri())))
        .unwrap();
    let err = updater.ensure_current().await.unwrap_err();
    assert!(matches!(err, RefreshError::EntryNotFound { .. }));

    assert!(!updater.database_path().exists());
    assert!(!updater.checksum_path().exists());
}

#[tokio::test]
async fn missing_sidecar_forces_a_download() {
    let dir = tempfile::tempdir().unwrap();
    // Data file present but no sidecar: staleness cannot be inferred.
    std::fs::write(dir.path().join("GeoLite2-Country.mmdb"), b"old payload").unwrap();

    let server = MockServer::start().await;
    let archive = gzipped_tar("GeoLite2-Country.mmdb", b"new payload");
    let checksum = format!("{:x}", md5::compute(&archive));
    mount_archive(&server, &archive, 1).await;
    mount_checksum(&server, &checksum).await;

    let updater = DatabaseUpdater::new(&test_config(dir.path(), &format!("{}/geoip", server.uri())))
        .unwrap();
    assert_eq!(updater.ensure_current().await.unwrap(), FetchOutcome::Downloaded);
    assert_eq!(
        std::fs::read(updater.database_path()).unwrap(),
        b"new payload"
    );
}

/// Full pipeline against the real MaxMind endpoint; needs credentials.
///
/// Run with: MAXMIND_LICENSE_KEY=... cargo test -- --ignored
#[tokio::test]
#[ignore = "requires network access and a MaxMind license key"]
async fn live_refresh_and_lookup() {
    use geoip_api::geoip::{GeoIpService, RefreshOutcome};
    use std::sync::Arc;

    let license_key = match std::env::var("MAXMIND_LICENSE_KEY") {
        Ok(key) => key,
        Err(_) => return,
    };

    let dir = tempfile::tempdir().unwrap();
    let config = GeoipConfig {
        data_dir: dir.path().to_path_buf(),
        edition: "GeoLite2-Country".to_string(),
        license_key,
        cache_size: 64,
        refresh_interval_hours: 168,
        download_url: "https://download.maxmind.com/app/geoip_download".to_string(),
    };

    let service = Arc::new(GeoIpService::new(&config).unwrap());
    assert_eq!(service.refresh().await.unwrap(), RefreshOutcome::Installed);

    let record = service.lookup("195.50.209.246".parse().unwrap()).await.unwrap();
    assert_eq!(
        record.country.as_ref().unwrap().iso_code.as_deref(),
        Some("EE")
    );
}
