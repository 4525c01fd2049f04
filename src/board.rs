//! Ranking and fixed-width rendering of arrivals for the display.

use std::fmt;

use crate::offset::Offset;

/// One upcoming bus or train, normalized against the cycle's "now".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivalRecord {
    pub offset: Offset,
    pub label: String,
}

impl ArrivalRecord {
    pub fn new(offset: Offset, label: impl Into<String>) -> Self {
        Self {
            offset,
            label: label.into(),
        }
    }
}

/// Column widths of a rendered line.
///
/// Widths are minimums: a countdown wider than its column (e.g. 100+
/// minutes) pushes the rest of the line right instead of being cut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub label_width: usize,
    pub minutes_width: usize,
    pub seconds_width: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            label_width: 8,
            minutes_width: 2,
            seconds_width: 2,
        }
    }
}

impl Layout {
    /// Pads `label` to `label_width`, or cuts it to `label_width` characters
    /// followed by `..` when it is longer.
    pub fn label_field(&self, label: &str) -> String {
        let width = self.label_width;
        if label.chars().count() > width {
            let cut: String = label.chars().take(width).collect();
            format!("{cut}..")
        } else {
            format!("{label:<width$}")
        }
    }

    /// `" 3m 10s"` style countdown, without the leading space.
    pub fn countdown(&self, offset: Offset) -> String {
        format!(
            "{:>mw$}m {:>sw$}s",
            offset.minutes,
            offset.seconds,
            mw = self.minutes_width,
            sw = self.seconds_width,
        )
    }

    pub fn bus_line(&self, record: &ArrivalRecord) -> String {
        format!(
            "{} {}",
            self.label_field(&record.label),
            self.countdown(record.offset)
        )
    }

    pub fn train_line(&self, record: &ArrivalRecord) -> String {
        format!("Next {} {}", record.label, self.countdown(record.offset))
    }
}

/// Drops past arrivals, sorts by offset and keeps the `limit` soonest.
///
/// The sort is stable, so ties keep their fetch order.
pub fn rank<I>(records: I, limit: usize) -> Vec<ArrivalRecord>
where
    I: IntoIterator<Item = ArrivalRecord>,
{
    let mut ranked: Vec<_> = records
        .into_iter()
        .filter(|r| !r.offset.is_past())
        .collect();
    ranked.sort_by_key(|r| r.offset);
    ranked.truncate(limit);
    ranked
}

/// Per-source limits plus the line layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub bus_limit: usize,
    pub train_limit: usize,
    pub layout: Layout,
}

impl Default for Board {
    fn default() -> Self {
        Self {
            bus_limit: 2,
            train_limit: 2,
            layout: Layout::default(),
        }
    }
}

impl Board {
    /// Ranks each source on its own and renders bus lines ahead of train
    /// lines, whichever source is sooner.
    pub fn render(&self, buses: Vec<ArrivalRecord>, trains: Vec<ArrivalRecord>) -> Report {
        let bus_lines = rank(buses, self.bus_limit)
            .into_iter()
            .map(|r| self.layout.bus_line(&r));
        let train_lines = rank(trains, self.train_limit)
            .into_iter()
            .map(|r| self.layout.train_line(&r));

        Report {
            lines: bus_lines.chain(train_lines).collect(),
        }
    }
}

/// The text pushed to the display in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    lines: Vec<String>,
}

impl Report {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}
