//! Next-arrival board for one bus stop and one subway platform.
//!
//! Each cycle pulls MTA Bus Time SIRI stop monitoring and a GTFS-Realtime
//! subway feed, ranks the soonest arrivals from each and writes a few
//! fixed-width lines to a serial display.

pub mod board;
pub mod bus;
pub mod config;
pub mod display;
pub mod error;
pub mod fetch;
pub mod offset;
pub mod parser;
pub mod ticker;
pub mod train;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
