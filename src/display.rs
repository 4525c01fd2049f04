//! Output sinks for the rendered report.
//!
//! [`SerialDisplay`] drives the real board. [`StdoutDisplay`] and
//! [`MemoryDisplay`] stand in for it when no hardware is attached.

use std::io::{Stdout, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::config::DisplayConfig;
use crate::error::DisplayError;

/// Anything that can show a report.
#[async_trait]
pub trait DisplaySink: Send + Sync {
    async fn show(&self, text: &str) -> Result<(), DisplayError>;
}

/// Writes each report to a serial device.
///
/// The port is opened, left to settle, written and closed within a single
/// call, so nothing is held between cycles.
pub struct SerialDisplay {
    config: DisplayConfig,
}

impl SerialDisplay {
    pub fn new(config: DisplayConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DisplaySink for SerialDisplay {
    async fn show(&self, text: &str) -> Result<(), DisplayError> {
        let config = self.config.clone();
        let payload = text.as_bytes().to_vec();
        tokio::task::spawn_blocking(move || write_serial(&config, &payload)).await?
    }
}

fn write_serial(config: &DisplayConfig, payload: &[u8]) -> Result<(), DisplayError> {
    let mut port = serialport::new(&config.port, config.baud_rate)
        .timeout(config.timeout)
        .open()
        .map_err(|source| DisplayError::Open {
            port: config.port.clone(),
            source,
        })?;

    // Opening the port resets most Arduino boards.
    std::thread::sleep(config.settle_delay);

    port.write_all(payload)?;
    port.flush()?;
    debug!(port = %config.port, bytes = payload.len(), "Report written to serial port");
    Ok(())
}

/// Names of the serial ports the OS reports.
pub fn available_ports() -> Result<Vec<String>, serialport::Error> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|p| p.port_name)
        .collect())
}

/// Prints each report, one per line, to stdout or another writer.
pub struct StdoutDisplay<W = Stdout> {
    out: Mutex<W>,
}

impl StdoutDisplay {
    pub fn new() -> Self {
        Self::with_writer(std::io::stdout())
    }
}

impl Default for StdoutDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> StdoutDisplay<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl<W: Write + Send> DisplaySink for StdoutDisplay<W> {
    async fn show(&self, text: &str) -> Result<(), DisplayError> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{text}")?;
        out.flush()?;
        Ok(())
    }
}

/// Keeps every report in memory.
#[derive(Default)]
pub struct MemoryDisplay {
    shown: Mutex<Vec<String>>,
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports shown so far, oldest first.
    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl DisplaySink for MemoryDisplay {
    async fn show(&self, text: &str) -> Result<(), DisplayError> {
        self.shown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
        Ok(())
    }
}

#[async_trait]
impl<S: DisplaySink + ?Sized> DisplaySink for std::sync::Arc<S> {
    async fn show(&self, text: &str) -> Result<(), DisplayError> {
        (**self).show(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_memory_display_records_in_order() {
        let display = MemoryDisplay::new();
        display.show("first").await.unwrap();
        display.show("second").await.unwrap();
        assert_eq!(display.shown(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_serial_display_reports_missing_port() {
        let display = SerialDisplay::new(DisplayConfig {
            port: "/dev/next-transit-no-such-port".to_string(),
            settle_delay: Duration::ZERO,
            ..DisplayConfig::default()
        });

        let err = display.show("M15  1m  5s").await.unwrap_err();

        assert!(matches!(err, DisplayError::Open { ref port, .. } if port.ends_with("no-such-port")));
    }

    #[tokio::test]
    async fn test_stdout_display_writes_one_report_per_line() {
        let display = StdoutDisplay::with_writer(Vec::new());
        display.show("M15       2m  5s").await.unwrap();
        display.show("Next Q  4m  2s").await.unwrap();

        let written = String::from_utf8(display.into_inner()).unwrap();
        assert_eq!(written, "M15       2m  5s\nNext Q  4m  2s\n");
    }
}
