//! Subway arrivals from a GTFS-Realtime trip update feed.

use chrono::{DateTime, FixedOffset};
use tracing::{debug, warn};

use crate::board::ArrivalRecord;
use crate::config::TrainConfig;
use crate::fetch::{HttpClient, fetch_bytes};
use crate::gtfs_rt::FeedMessage;
use crate::offset::{Rounding, until_epoch};
use crate::parser::parse_feed_or_default;

/// A predicted arrival at the monitored stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainArrival {
    pub route_id: Option<String>,
    /// Epoch seconds.
    pub arrival: i64,
}

impl TrainArrival {
    /// Normalizes against `now`; `None` once the train is due in the past.
    pub fn to_record(
        &self,
        label: &str,
        now: &DateTime<FixedOffset>,
        rounding: Rounding,
    ) -> Option<ArrivalRecord> {
        until_epoch(self.arrival, now, rounding).map(|offset| ArrivalRecord::new(offset, label))
    }
}

/// Every stop-time update in `feed` whose stop id is exactly `stop_id`.
///
/// Updates without an arrival time are skipped. Trips and routes are not
/// filtered.
pub fn arrivals_at(feed: &FeedMessage, stop_id: &str) -> Vec<TrainArrival> {
    feed.entity
        .iter()
        .filter_map(|entity| entity.trip_update.as_ref())
        .flat_map(move |update| {
            update
                .stop_time_update
                .iter()
                .filter(move |stu| stu.stop_id.as_deref() == Some(stop_id))
                .filter_map(move |stu| {
                    let arrival = stu.arrival.as_ref()?.time?;
                    Some(TrainArrival {
                        route_id: update.trip.route_id.clone(),
                        arrival,
                    })
                })
        })
        .collect()
}

pub struct TrainSource<C> {
    client: C,
    config: TrainConfig,
}

impl<C: HttpClient> TrainSource<C> {
    pub fn new(client: C, config: TrainConfig) -> Self {
        Self { client, config }
    }

    /// Downloads and decodes the feed. Failures are logged and yield an
    /// empty feed.
    #[tracing::instrument(skip(self), fields(url = %self.config.feed_url))]
    pub async fn fetch_feed(&self) -> FeedMessage {
        match fetch_bytes(&self.client, &self.config.feed_url).await {
            Ok(bytes) => {
                debug!(bytes = bytes.len(), "Train feed bytes received");
                let feed = parse_feed_or_default(&bytes);
                debug!(entity_count = feed.entity.len(), "Train feed parsed");
                feed
            }
            Err(e) => {
                warn!(error = %e, "Train feed unavailable, showing no trains");
                FeedMessage::default()
            }
        }
    }

    /// Upcoming trains at the configured stop, normalized against `now`.
    pub async fn fetch(&self, now: &DateTime<FixedOffset>) -> Vec<ArrivalRecord> {
        let feed = self.fetch_feed().await;
        let arrivals = arrivals_at(&feed, &self.config.stop_id);
        debug!(stop = %self.config.stop_id, matched = arrivals.len(), "Train arrivals extracted");

        arrivals
            .iter()
            .filter_map(|a| {
                let record = a.to_record(&self.config.route_label, now, self.config.rounding);
                debug!(
                    route = a.route_id.as_deref().unwrap_or("?"),
                    arrival = a.arrival,
                    shown = record.is_some(),
                    "Train arrival"
                );
                record
            })
            .collect()
    }
}
