//! The fetch → render → emit → sleep loop.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local};
use tracing::{debug, error, info};

use crate::board::{Board, Report};
use crate::bus::BusSource;
use crate::config::Config;
use crate::display::DisplaySink;
use crate::fetch::HttpClient;
use crate::train::TrainSource;

/// Source of the "now" each cycle is computed against.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The local wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Always returns the same instant.
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

pub struct Ticker<C, S, K = SystemClock> {
    bus: BusSource<C>,
    train: TrainSource<C>,
    board: Board,
    interval: Duration,
    sink: S,
    clock: K,
}

impl<C, S, K> Ticker<C, S, K>
where
    C: HttpClient + Clone,
    S: DisplaySink,
    K: Clock,
{
    pub fn new(config: &Config, client: C, sink: S, clock: K) -> Self {
        Self {
            bus: BusSource::new(client.clone(), config.bus.clone()),
            train: TrainSource::new(client, config.train.clone()),
            board: config.board.clone(),
            interval: config.refresh_interval,
            sink,
            clock,
        }
    }

    /// One cycle against a fixed `now`: fetch both sources, render, log the
    /// report and hand it to the sink.
    ///
    /// Source failures only shrink the report. A sink failure is returned
    /// after the report has been logged.
    #[tracing::instrument(skip(self, now), fields(now = %now))]
    pub async fn run_cycle(&self, now: DateTime<FixedOffset>) -> Result<Report> {
        let (buses, trains) = tokio::join!(self.bus.fetch(&now), self.train.fetch(&now));
        debug!(buses = buses.len(), trains = trains.len(), "Arrivals normalized");

        let report = self.board.render(buses, trains);
        let text = report.to_string();
        info!(lines = report.len(), "Report:\n{text}");
        info!("END TRANSMISSION");

        self.sink
            .show(&text)
            .await
            .context("report was not delivered to the display")?;

        Ok(report)
    }

    /// Runs `cycles` cycles, or forever when `cycles` is 0.
    ///
    /// A failed cycle is logged and the loop carries on. The loop sleeps for
    /// the refresh interval after every cycle except the last.
    pub async fn run(&self, cycles: usize) {
        if cycles == 0 {
            info!(interval_secs = self.interval.as_secs(), "Ticking until stopped");
        } else {
            info!(cycles, interval_secs = self.interval.as_secs(), "Starting ticker");
        }

        let mut count = 0;
        loop {
            if cycles > 0 && count >= cycles {
                break;
            }
            count += 1;

            let now = self.clock.now();
            match self.run_cycle(now).await {
                Ok(report) => debug!(cycle = count, lines = report.len(), "Cycle complete"),
                Err(e) => error!(cycle = count, error = %format!("{e:#}"), "Cycle failed"),
            }

            if cycles == 0 || count < cycles {
                debug!(interval_ms = self.interval.as_millis() as u64, "Waiting for next cycle");
                tokio::time::sleep(self.interval).await;
            }
        }

        info!(cycles = count, "Ticker finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::MemoryDisplay;
    use crate::error::DisplayError;
    use crate::fetch::testing::StubClient;
    use crate::gtfs_rt::trip_update::{StopTimeEvent, StopTimeUpdate};
    use crate::gtfs_rt::{FeedEntity, FeedMessage, TripUpdate};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use prost::Message;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(4 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 4, 10, 0, 0)
            .unwrap()
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.bus.api_url = "http://bus.example/stop-monitoring.json".to_string();
        config.bus.api_key = "k".to_string();
        config.bus.line_refs = vec!["MTA NYCT_M15".to_string()];
        config.train.feed_url = "http://rt.example/gtfs-nqrw".to_string();
        config
    }

    fn bus_body(arrivals: &[(&str, &str)]) -> Vec<u8> {
        let visits: Vec<_> = arrivals
            .iter()
            .map(|(line, at)| {
                serde_json::json!({
                    "MonitoredVehicleJourney": {
                        "PublishedLineName": line,
                        "MonitoredCall": { "ExpectedArrivalTime": at }
                    }
                })
            })
            .collect();
        serde_json::to_vec(&serde_json::json!({
            "Siri": { "ServiceDelivery": { "StopMonitoringDelivery": [
                { "MonitoredStopVisit": visits }
            ] } }
        }))
        .unwrap()
    }

    fn train_body(stop_id: &str, times: &[i64]) -> Vec<u8> {
        FeedMessage {
            entity: times
                .iter()
                .enumerate()
                .map(|(i, t)| FeedEntity {
                    id: i.to_string(),
                    trip_update: Some(TripUpdate {
                        stop_time_update: vec![StopTimeUpdate {
                            stop_id: Some(stop_id.to_string()),
                            arrival: Some(StopTimeEvent {
                                time: Some(*t),
                                ..Default::default()
                            }),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
        .encode_to_vec()
    }

    fn stub() -> StubClient {
        StubClient::new()
            .route(
                "stop-monitoring",
                200,
                bus_body(&[
                    ("M15", "2024-06-04T10:07:00.000-04:00"),
                    ("M15-SBS", "2024-06-04T10:02:20.000-04:00"),
                ]),
            )
            .route(
                "gtfs-nqrw",
                200,
                train_body("Q03S", &[now().timestamp() + 61]),
            )
    }

    struct UnpluggedDisplay {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl DisplaySink for UnpluggedDisplay {
        async fn show(&self, _text: &str) -> Result<(), DisplayError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(DisplayError::Write(std::io::Error::other("unplugged")))
        }
    }

    #[tokio::test]
    async fn test_cycle_renders_buses_then_trains() {
        let stub = stub();
        let display = Arc::new(MemoryDisplay::new());
        let ticker = Ticker::new(&config(), &stub, display.clone(), FixedClock(now()));

        let report = ticker.run_cycle(now()).await.unwrap();

        assert_eq!(
            report.lines(),
            &[
                "M15-SBS   2m 20s".to_string(),
                "M15       7m  0s".to_string(),
                "Next Q  1m  1s".to_string(),
            ]
        );
        assert_eq!(display.shown(), vec![report.to_string()]);
    }

    #[tokio::test]
    async fn test_cycle_with_both_sources_down_shows_empty_report() {
        let stub = StubClient::new();
        let display = Arc::new(MemoryDisplay::new());
        let ticker = Ticker::new(&config(), &stub, display.clone(), FixedClock(now()));

        let report = ticker.run_cycle(now()).await.unwrap();

        assert!(report.is_empty());
        assert_eq!(display.shown(), vec![String::new()]);
    }

    #[tokio::test]
    async fn test_cycle_surfaces_display_failure() {
        let stub = stub();
        let display = UnpluggedDisplay {
            attempts: AtomicUsize::new(0),
        };
        let ticker = Ticker::new(&config(), &stub, display, FixedClock(now()));

        let err = ticker.run_cycle(now()).await.unwrap_err();

        assert!(format!("{err:#}").contains("unplugged"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_continues_after_failed_cycles() {
        let stub = stub();
        let display = Arc::new(UnpluggedDisplay {
            attempts: AtomicUsize::new(0),
        });
        let ticker = Ticker::new(&config(), &stub, display.clone(), FixedClock(now()));

        ticker.run(3).await;

        assert_eq!(display.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sleeps_interval_between_cycles_only() {
        let stub = stub();
        let display = Arc::new(MemoryDisplay::new());
        let ticker = Ticker::new(&config(), &stub, display.clone(), FixedClock(now()));

        let start = tokio::time::Instant::now();
        ticker.run(3).await;

        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert_eq!(display.shown().len(), 3);
    }
}
