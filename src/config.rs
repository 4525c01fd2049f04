//! Runtime configuration, built once at startup and read-only afterwards.

use std::time::Duration;

use anyhow::{Result, bail};

use crate::board::Board;
use crate::offset::Rounding;

pub const DEFAULT_BUS_API_URL: &str = "http://bustime.mta.info/api/siri/stop-monitoring.json";
pub const DEFAULT_TRAIN_FEED_URL: &str =
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-nqrw";

/// MTA Bus Time stop monitoring settings.
#[derive(Debug, Clone, PartialEq)]
pub struct BusConfig {
    pub api_url: String,
    pub api_key: String,
    pub stop_id: String,
    /// One request is made per line ref. Empty means a single unfiltered request.
    pub line_refs: Vec<String>,
    pub rounding: Rounding,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BUS_API_URL.to_string(),
            api_key: String::new(),
            stop_id: "MTA_401756".to_string(),
            line_refs: vec!["MTA NYCT_M15".to_string(), "MTA NYCT_M15+".to_string()],
            rounding: Rounding::Nearest,
        }
    }
}

/// GTFS-RT subway feed settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub feed_url: String,
    pub stop_id: String,
    /// Shown after "Next " on every train line.
    pub route_label: String,
    pub rounding: Rounding,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_TRAIN_FEED_URL.to_string(),
            stop_id: "Q03S".to_string(),
            route_label: "Q".to_string(),
            rounding: Rounding::Floor,
        }
    }
}

/// Serial link to the display.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Pause between opening the port and writing; the board resets on open.
    pub settle_delay: Duration,
    pub timeout: Duration,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 9600,
            settle_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bus: BusConfig,
    pub train: TrainConfig,
    pub display: DisplayConfig,
    pub board: Board,
    pub refresh_interval: Duration,
    pub http_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            train: TrainConfig::default(),
            display: DisplayConfig::default(),
            board: Board::default(),
            refresh_interval: Duration::from_secs(10),
            http_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Rejects settings the ticker cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.bus.api_key.trim().is_empty() {
            bail!("a Bus Time API key is required (set MTA_BUS_API_KEY)");
        }
        if self.bus.stop_id.trim().is_empty() || self.train.stop_id.trim().is_empty() {
            bail!("bus and subway stop ids must not be empty");
        }
        if self.board.bus_limit == 0 && self.board.train_limit == 0 {
            bail!("at least one of the bus and train limits must be non-zero");
        }
        if self.board.layout.label_width == 0 {
            bail!("label width must be at least 1");
        }
        if self.refresh_interval.is_zero() {
            bail!("refresh interval must be non-zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_key() -> Config {
        let mut config = Config::default();
        config.bus.api_key = "abc123".to_string();
        config
    }

    #[test]
    fn test_defaults_match_the_m15_and_q_at_86th_street() {
        let config = Config::default();
        assert_eq!(config.bus.stop_id, "MTA_401756");
        assert_eq!(config.bus.line_refs, vec!["MTA NYCT_M15", "MTA NYCT_M15+"]);
        assert_eq!(config.train.stop_id, "Q03S");
        assert_eq!(config.display.baud_rate, 9600);
        assert_eq!(config.refresh_interval, Duration::from_secs(10));
        assert_eq!(config.board.bus_limit, 2);
        assert_eq!(config.board.train_limit, 2);
        assert_eq!(config.board.layout.label_width, 8);
    }

    #[test]
    fn test_validate_accepts_defaults_with_key() {
        assert!(with_key().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_api_key() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("MTA_BUS_API_KEY"));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = with_key();
        config.refresh_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_label_width() {
        let mut config = with_key();
        config.board.layout.label_width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_allows_one_source_disabled() {
        let mut config = with_key();
        config.board.bus_limit = 0;
        assert!(config.validate().is_ok());
        config.board.train_limit = 0;
        assert!(config.validate().is_err());
    }
}
