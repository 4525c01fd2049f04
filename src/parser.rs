//! Protobuf parser for GTFS Realtime feeds.

use prost::Message;
use tracing::warn;

use crate::error::SourceError;
use crate::gtfs_rt::FeedMessage;

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid protobuf for a `FeedMessage`.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage, SourceError> {
    Ok(FeedMessage::decode(bytes)?)
}

/// Like [`parse_feed`], but logs a decode failure and returns an empty feed.
pub fn parse_feed_or_default(bytes: &[u8]) -> FeedMessage {
    parse_feed(bytes).unwrap_or_else(|e| {
        warn!(error = %e, bytes = bytes.len(), "Feed decode failed, using empty feed");
        FeedMessage::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::{FeedEntity, FeedHeader, TripDescriptor, TripUpdate};

    #[test]
    fn test_parse_empty_bytes_returns_default_feed() {
        // Zero bytes are a valid encoding of a message with every field unset.
        let feed = parse_feed(&[]).unwrap();
        assert_eq!(feed.header.gtfs_realtime_version, "");
        assert!(feed.entity.is_empty());
    }

    #[test]
    fn test_parse_invalid_bytes() {
        let result = parse_feed(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(SourceError::Decode(_))));
    }

    #[test]
    fn test_parse_or_default_swallows_garbage() {
        let feed = parse_feed_or_default(b"<html>502 Bad Gateway</html>");
        assert!(feed.entity.is_empty());
    }

    #[test]
    fn test_parse_feed_with_trip_update() {
        let feed = FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "1.0".to_string(),
                timestamp: Some(1_717_500_000),
                ..Default::default()
            },
            entity: vec![FeedEntity {
                id: "000001Q".to_string(),
                trip_update: Some(TripUpdate {
                    trip: TripDescriptor {
                        route_id: Some("Q".to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                }),
                ..Default::default()
            }],
        };

        let parsed = parse_feed(&feed.encode_to_vec()).unwrap();

        assert_eq!(parsed.header.timestamp, Some(1_717_500_000));
        assert_eq!(parsed.entity.len(), 1);
        let trip = &parsed.entity[0].trip_update.as_ref().unwrap().trip;
        assert_eq!(trip.route_id.as_deref(), Some("Q"));
    }
}
