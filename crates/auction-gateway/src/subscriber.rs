use std::sync::Arc;

use auction_cache::CacheClient;
use auction_core::channels::{parse_auction_channel, GLOBAL_NOTIFICATIONS_CHANNEL};
use auction_core::events::{AuctionEventMessage, BidChannelMessage, GlobalNotification, ServerEvent};
use log::{error, warn};

use crate::session::Sessions;

/// The instance's single demultiplexing subscriber: one Redis connection,
/// fed into every auction room and every connected user by channel name,
/// instead of one subscriber task per auction.
pub async fn run(cache: CacheClient, sessions: Arc<Sessions>) {
    let mut subscriber = match cache.new_subscriber().await {
        Ok(subscriber) => subscriber,
        Err(err) => {
            error!("gateway subscriber could not connect: {err}");
            return;
        }
    };

    if let Err(err) = subscriber.psubscribe("auction:*:bids").await {
        error!("failed to psubscribe to auction bid channels: {err}");
        return;
    }
    if let Err(err) = subscriber.psubscribe("auction:*:events").await {
        error!("failed to psubscribe to auction event channels: {err}");
        return;
    }
    if let Err(err) = subscriber.subscribe(GLOBAL_NOTIFICATIONS_CHANNEL).await {
        error!("failed to subscribe to {GLOBAL_NOTIFICATIONS_CHANNEL}: {err}");
        return;
    }

    subscriber
        .run(move |channel, payload| dispatch(&sessions, &channel, &payload))
        .await;
}

fn dispatch(sessions: &Sessions, channel: &str, payload: &str) {
    if channel == GLOBAL_NOTIFICATIONS_CHANNEL {
        match serde_json::from_str::<GlobalNotification>(payload) {
            Ok(notification) => dispatch_global(sessions, notification),
            Err(err) => warn!("undecodable global notification: {err}"),
        }
        return;
    }

    let Some((auction_id, suffix)) = parse_auction_channel(channel) else {
        warn!("unrecognized pub/sub channel: {channel}");
        return;
    };

    match suffix {
        "bids" => match serde_json::from_str::<BidChannelMessage>(payload) {
            Ok(message) => dispatch_bid(sessions, auction_id, message),
            Err(err) => warn!("undecodable bid channel message on {channel}: {err}"),
        },
        "events" => match serde_json::from_str::<AuctionEventMessage>(payload) {
            Ok(message) => dispatch_event(sessions, auction_id, message),
            Err(err) => warn!("undecodable auction event message on {channel}: {err}"),
        },
        other => warn!("unrecognized auction channel suffix: {other}"),
    }
}

fn dispatch_bid(sessions: &Sessions, auction_id: auction_core::model::AuctionId, message: BidChannelMessage) {
    let event = match message {
        BidChannelMessage::BidUpdate {
            auction_id,
            bid_id,
            user_id,
            amount,
            timestamp,
            username,
        } => ServerEvent::BidUpdate {
            auction_id,
            bid_id,
            user_id,
            bid_amount: amount,
            timestamp,
            user: username,
        },
        BidChannelMessage::Outbid {
            auction_id,
            new_bid_amount,
            new_bid_user,
        } => ServerEvent::Outbid {
            auction_id,
            new_bid_amount,
            new_bid_user,
            message: "a higher bid has been placed".to_string(),
        },
    };
    sessions.broadcast_room(auction_id, &event);
}

fn dispatch_event(sessions: &Sessions, auction_id: auction_core::model::AuctionId, message: AuctionEventMessage) {
    let event = match message {
        AuctionEventMessage::AuctionEnd {
            auction_id,
            winning_bid,
            winner_id,
        } => ServerEvent::AuctionEnd {
            auction_id,
            winning_bid,
            winner_id,
            message: "auction has ended".to_string(),
        },
    };
    sessions.broadcast_room(auction_id, &event);
}

fn dispatch_global(sessions: &Sessions, notification: GlobalNotification) {
    match notification {
        GlobalNotification::BidSuccess { user_id, .. } => {
            sessions.send_to_user(
                user_id,
                &ServerEvent::BidReceived {
                    message: "your bid was accepted".to_string(),
                },
            );
        }
        GlobalNotification::BidFailed { user_id, reason, .. } => {
            sessions.send_to_user(
                user_id,
                &ServerEvent::Error {
                    message: reason.message(),
                },
            );
        }
        GlobalNotification::AuctionWon {
            user_id,
            auction_id,
            winning_bid,
        } => {
            sessions.send_to_user(
                user_id,
                &ServerEvent::AuctionWon {
                    auction_id,
                    winning_bid,
                    message: "you won the auction".to_string(),
                },
            );
        }
    }
}
