//! Bus arrivals from the MTA Bus Time SIRI StopMonitoring API.
//!
//! One request is made per configured line ref. A failing line ref is logged
//! and contributes nothing; the others still count.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::board::ArrivalRecord;
use crate::config::BusConfig;
use crate::error::SourceError;
use crate::fetch::auth::UrlParam;
use crate::fetch::{HttpClient, fetch_with_query};
use crate::offset::{Rounding, parse_time_of_day, until_time_of_day};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StopMonitoringResponse {
    siri: Siri,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Siri {
    service_delivery: ServiceDelivery,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceDelivery {
    #[serde(default)]
    stop_monitoring_delivery: Vec<StopMonitoringDelivery>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StopMonitoringDelivery {
    #[serde(default)]
    monitored_stop_visit: Vec<MonitoredStopVisit>,
    error_condition: Option<ErrorCondition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorCondition {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MonitoredStopVisit {
    monitored_vehicle_journey: MonitoredVehicleJourney,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MonitoredVehicleJourney {
    published_line_name: Option<LineName>,
    monitored_call: Option<MonitoredCall>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MonitoredCall {
    expected_arrival_time: Option<String>,
}

/// SIRI 1.3 JSON sends a bare string, SIRI 2.0 an array of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LineName {
    One(String),
    Many(Vec<String>),
}

impl LineName {
    fn into_first(self) -> Option<String> {
        match self {
            LineName::One(name) => Some(name),
            LineName::Many(names) => names.into_iter().next(),
        }
    }
}

/// A monitored vehicle with a predicted arrival, as reported by Bus Time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusArrival {
    /// ISO-8601 timestamp, e.g. `2015-06-04T10:46:08.361-04:00`.
    pub expected_arrival: String,
    pub line: String,
}

impl BusArrival {
    /// Normalizes against `now`. `None` when the arrival time is unreadable.
    pub fn to_record(
        &self,
        now: &DateTime<FixedOffset>,
        rounding: Rounding,
    ) -> Option<ArrivalRecord> {
        let Some(time_of_day) = parse_time_of_day(&self.expected_arrival) else {
            warn!(
                line = %self.line,
                expected_arrival = %self.expected_arrival,
                "Unreadable ExpectedArrivalTime, skipping bus"
            );
            return None;
        };
        let offset = until_time_of_day(time_of_day, now, rounding);
        Some(ArrivalRecord::new(offset, self.line.clone()))
    }
}

/// Extracts arrivals from a StopMonitoring JSON body.
///
/// Visits without an `ExpectedArrivalTime` are skipped.
pub fn parse_stop_monitoring(body: &[u8]) -> Result<Vec<BusArrival>, SourceError> {
    let response: StopMonitoringResponse = serde_json::from_slice(body)?;
    let delivery = response
        .siri
        .service_delivery
        .stop_monitoring_delivery
        .into_iter()
        .next()
        .ok_or(SourceError::MissingDelivery)?;

    if let Some(condition) = delivery.error_condition {
        return Err(SourceError::Upstream(
            condition
                .description
                .unwrap_or_else(|| "unspecified error condition".to_string()),
        ));
    }

    let arrivals = delivery
        .monitored_stop_visit
        .into_iter()
        .filter_map(|visit| {
            let journey = visit.monitored_vehicle_journey;
            let expected_arrival = journey.monitored_call?.expected_arrival_time?;
            let line = journey
                .published_line_name
                .and_then(LineName::into_first)
                .unwrap_or_default();
            Some(BusArrival {
                expected_arrival,
                line,
            })
        })
        .collect();

    Ok(arrivals)
}

pub struct BusSource<C> {
    client: UrlParam<C>,
    config: BusConfig,
}

impl<C: HttpClient> BusSource<C> {
    /// The API key from `config` is attached to every request as `key`.
    pub fn new(client: C, config: BusConfig) -> Self {
        Self {
            client: UrlParam::new(client, "key", config.api_key.clone()),
            config,
        }
    }

    /// Fetches one stop monitoring page, optionally filtered to `line_ref`.
    pub async fn fetch_line(&self, line_ref: Option<&str>) -> Result<Vec<BusArrival>, SourceError> {
        let mut params = vec![("MonitoringRef", self.config.stop_id.as_str())];
        if let Some(line_ref) = line_ref {
            params.push(("LineRef", line_ref));
        }

        let body = fetch_with_query(&self.client, &self.config.api_url, &params).await?;
        parse_stop_monitoring(&body)
    }

    /// Arrivals for every configured line ref, in line-ref order.
    ///
    /// A line ref that fails is logged and skipped.
    #[tracing::instrument(skip(self), fields(stop = %self.config.stop_id))]
    pub async fn fetch_arrivals(&self) -> Vec<BusArrival> {
        let line_refs: Vec<Option<&str>> = if self.config.line_refs.is_empty() {
            vec![None]
        } else {
            self.config.line_refs.iter().map(|l| Some(l.as_str())).collect()
        };

        let mut all = Vec::new();
        for line_ref in line_refs {
            match self.fetch_line(line_ref).await {
                Ok(arrivals) => {
                    debug!(line_ref, count = arrivals.len(), "Bus arrivals received");
                    all.extend(arrivals);
                }
                Err(e) => {
                    warn!(line_ref, error = %e, "Bus line ref failed, skipping");
                }
            }
        }
        all
    }

    /// Upcoming buses normalized against `now`.
    pub async fn fetch(&self, now: &DateTime<FixedOffset>) -> Vec<ArrivalRecord> {
        self.fetch_arrivals()
            .await
            .iter()
            .filter_map(|a| a.to_record(now, self.config.rounding))
            .collect()
    }
}
