use uuid::Uuid;

use crate::model::AuctionId;

pub const GLOBAL_NOTIFICATIONS_CHANNEL: &str = "global:notifications";

pub fn auction_bids_channel(auction_id: AuctionId) -> String {
    format!("auction:{auction_id}:bids")
}

pub fn auction_events_channel(auction_id: AuctionId) -> String {
    format!("auction:{auction_id}:events")
}

pub fn bid_result_channel(correlation_id: Uuid) -> String {
    format!("bid:result:{correlation_id}")
}

/// Parses an `auction:{id}:{suffix}` channel name back into its auction id
/// and suffix, for the Gateway's single demultiplexing subscriber.
pub fn parse_auction_channel(channel: &str) -> Option<(AuctionId, &str)> {
    let rest = channel.strip_prefix("auction:")?;
    let (id, suffix) = rest.split_once(':')?;
    let auction_id = Uuid::parse_str(id).ok()?;
    Some((auction_id, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bids_and_events_channels_round_trip_through_parse() {
        let id = Uuid::new_v4();
        assert_eq!(parse_auction_channel(&auction_bids_channel(id)), Some((id, "bids")));
        assert_eq!(parse_auction_channel(&auction_events_channel(id)), Some((id, "events")));
    }

    #[test]
    fn parse_rejects_non_auction_channels() {
        assert_eq!(parse_auction_channel(GLOBAL_NOTIFICATIONS_CHANNEL), None);
        assert_eq!(parse_auction_channel("auction:not-a-uuid:bids"), None);
        assert_eq!(parse_auction_channel("auction:missing-suffix"), None);
    }

    #[test]
    fn bid_result_channel_is_keyed_by_correlation_id() {
        let correlation_id = Uuid::new_v4();
        assert_eq!(bid_result_channel(correlation_id), format!("bid:result:{correlation_id}"));
    }
}
