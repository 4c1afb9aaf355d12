use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::RejectReason;
use crate::model::{Amount, AuctionId, Bid, BidId, UserId};

/// Published by the Processor on `auction:{id}:bids`. The Gateway
/// demultiplexes this channel by auction id and relays each variant to the
/// room's sockets as the matching `ServerEvent`. `Outbid` is broadcast to
/// the whole room rather than targeted at a specific excluded socket;
/// clients ignore it when `new_bid_user` is their own identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BidChannelMessage {
    BidUpdate {
        auction_id: AuctionId,
        bid_id: BidId,
        user_id: UserId,
        amount: Amount,
        timestamp: DateTime<Utc>,
        username: String,
    },
    Outbid {
        auction_id: AuctionId,
        new_bid_amount: Amount,
        new_bid_user: UserId,
    },
}

/// Published on `auction:{id}:events` by the Processor's lifecycle ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AuctionEventMessage {
    AuctionEnd {
        auction_id: AuctionId,
        winning_bid: Option<Amount>,
        winner_id: Option<UserId>,
    },
}

/// Published on `global:notifications`, fanned through every Gateway
/// instance and delivered only to the sockets of the named identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum GlobalNotification {
    BidSuccess {
        user_id: UserId,
        auction_id: AuctionId,
        bid_id: BidId,
        amount: Amount,
    },
    BidFailed {
        user_id: UserId,
        auction_id: AuctionId,
        reason: RejectReason,
    },
    AuctionWon {
        user_id: UserId,
        auction_id: AuctionId,
        winning_bid: Amount,
    },
}

/// Published once per `BidEnvelope.correlation_id` on
/// `bid:result:{correlation_id}`, consumed only by the HTTP fallback path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome")]
pub enum BidResultMessage {
    Accepted { bid: Bid },
    Rejected { reason: RejectReason },
}

/// Client -> Gateway intents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientIntent {
    JoinAuction { auction_id: AuctionId },
    LeaveAuction { auction_id: AuctionId },
    PlaceBid { auction_id: AuctionId, bid_amount: Amount },
}

/// Gateway -> client events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    Connected {
        message: String,
        user_id: UserId,
        username: String,
    },
    AuctionUpdate {
        auction_id: AuctionId,
        current_highest_bid: Amount,
        bid_count: i32,
        status: String,
    },
    BidReceived {
        message: String,
    },
    BidUpdate {
        auction_id: AuctionId,
        bid_id: BidId,
        user_id: UserId,
        bid_amount: Amount,
        timestamp: DateTime<Utc>,
        user: String,
    },
    Outbid {
        auction_id: AuctionId,
        new_bid_amount: Amount,
        new_bid_user: UserId,
        message: String,
    },
    AuctionEnd {
        auction_id: AuctionId,
        winning_bid: Option<Amount>,
        winner_id: Option<UserId>,
        message: String,
    },
    AuctionWon {
        auction_id: AuctionId,
        winning_bid: Amount,
        message: String,
    },
    UserJoined {
        user_id: UserId,
        username: String,
    },
    UserLeft {
        user_id: UserId,
        username: String,
    },
    Error {
        message: String,
    },
}

/// Best-effort audit record published on the `audit` exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub auction_id: AuctionId,
    pub user_id: UserId,
    pub amount: Amount,
    pub success: bool,
    pub reason: Option<RejectReason>,
    pub created_at: DateTime<Utc>,
}

/// Durable record published on the `notifications` exchange for
/// out-of-scope downstream consumers (email/push), distinct from the
/// real-time `global:notifications` cache channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum QueuedNotification {
    BidSuccess {
        user_id: UserId,
        auction_id: AuctionId,
        bid_id: BidId,
        amount: Amount,
    },
    BidFailed {
        user_id: UserId,
        auction_id: AuctionId,
        reason: RejectReason,
    },
    Outbid {
        previous_winner_id: UserId,
        auction_id: AuctionId,
        new_amount: Amount,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bid_channel_message_tags_on_kind() {
        let msg = BidChannelMessage::Outbid {
            auction_id: Uuid::new_v4(),
            new_bid_amount: 500,
            new_bid_user: Uuid::new_v4(),
        };
        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["kind"], "Outbid");
        let round_tripped: BidChannelMessage = serde_json::from_value(value).unwrap();
        matches!(round_tripped, BidChannelMessage::Outbid { .. });
    }

    #[test]
    fn client_intent_uses_camel_case_type_tag() {
        let intent = ClientIntent::PlaceBid { auction_id: Uuid::new_v4(), bid_amount: 1000 };
        let value: serde_json::Value = serde_json::to_value(&intent).unwrap();
        assert_eq!(value["type"], "placeBid");
        assert_eq!(value["bidAmount"], 1000);
    }

    #[test]
    fn bid_result_message_tags_on_outcome() {
        let msg = BidResultMessage::Rejected { reason: RejectReason::Ended };
        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["outcome"], "Rejected");
        assert_eq!(value["reason"], "ended");
    }

    #[test]
    fn server_event_round_trips_through_json() {
        let event = ServerEvent::BidReceived { message: "ok".into() };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: ServerEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerEvent::BidReceived { message } => assert_eq!(message, "ok"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
