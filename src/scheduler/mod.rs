//! Background database refresh scheduling
//!
//! A single repeating timer task drives `GeoIpService::refresh` outside the
//! request path. Refresh failures are logged and never terminate the task;
//! the last good database keeps serving. The task is stoppable so shutdown
//! does not race an in-flight refresh indefinitely.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::geoip::{GeoIpService, RefreshOutcome};

const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

pub struct RefreshScheduler {
    service: Arc<GeoIpService>,
    period: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

/// Owner handle for a running scheduler task
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Start the periodic refresh task
    pub fn spawn(service: Arc<GeoIpService>, period: Duration) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = Self {
            service,
            period,
            shutdown_rx,
        };
        let task = tokio::spawn(scheduler.run());
        SchedulerHandle { shutdown_tx, task }
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; startup has already
        // refreshed, so consume it before entering the loop.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    info!("checking for geoip database updates");
                    match self.service.refresh().await {
                        Ok(RefreshOutcome::Installed) => {
                            info!("scheduled refresh installed a new database")
                        }
                        Ok(RefreshOutcome::NoChangeNeeded) => {
                            debug!("scheduled refresh found no update")
                        }
                        Err(err) => error!("scheduled refresh failed: {err}"),
                    }
                }
                _ = self.shutdown_rx.changed() => {
                    debug!("refresh scheduler stopping");
                    break;
                }
            }
        }
    }
}

impl SchedulerHandle {
    /// Stop scheduling new refreshes and wait briefly for the task to finish
    ///
    /// An in-flight refresh may run to completion or to its own error; the
    /// shutdown sequence waits at most the grace period and then proceeds
    /// regardless.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if tokio::time::timeout(STOP_GRACE_PERIOD, self.task)
            .await
            .is_err()
        {
            warn!(
                "refresh scheduler still busy after {:?}; proceeding with shutdown",
                STOP_GRACE_PERIOD
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeoipConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_service(data_dir: &std::path::Path, download_url: &str) -> Arc<GeoIpService> {
        let config = GeoipConfig {
            data_dir: data_dir.to_path_buf(),
            edition: "GeoLite2-Country".to_string(),
            license_key: "test-key".to_string(),
            cache_size: 64,
            refresh_interval_hours: 168,
            download_url: download_url.to_string(),
        };
        Arc::new(GeoIpService::new(&config).unwrap())
    }

    #[tokio::test]
    async fn stop_returns_promptly_while_the_timer_is_idle() {
        let dir = tempfile::tempdir().unwrap();
        let service = test_service(dir.path(), "http://localhost:1/geoip");

        let handle = RefreshScheduler::spawn(service, Duration::from_secs(3600));
        tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop must not wait for the next tick");
    }

    #[tokio::test]
    async fn ticks_keep_probing_and_survive_refresh_failures() {
        let dir = tempfile::tempdir().unwrap();
        // Local pair is current, so each tick is a single checksum probe;
        // the handle-open that follows fails (the payload is garbage) and
        // must not kill the task.
        std::fs::write(dir.path().join("GeoLite2-Country.mmdb"), b"payload").unwrap();
        std::fs::write(dir.path().join("GeoLite2-Country.mmdb.md5"), "feedface").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geoip"))
            .and(query_param("suffix", "tar.gz.md5"))
            .respond_with(ResponseTemplate::new(200).set_body_string("feedface"))
            .expect(2..)
            .mount(&server)
            .await;

        let service = test_service(dir.path(), &format!("{}/geoip", server.uri()));
        let handle = RefreshScheduler::spawn(service, Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(400)).await;
        handle.stop().await;
    }
}
