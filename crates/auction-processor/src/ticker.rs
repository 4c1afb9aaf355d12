use std::sync::Arc;
use std::time::Duration;

use auction_cache::CacheClient;
use auction_core::channels::{auction_events_channel, GLOBAL_NOTIFICATIONS_CHANNEL};
use auction_core::events::{AuctionEventMessage, GlobalNotification};
use auction_core::model::Auction;
use auction_store::{AuctionStore, StorePool};
use chrono::Utc;
use log::{info, warn};

/// Drives auction status transitions: PENDING -> ACTIVE once `start_time`
/// passes, ACTIVE -> ENDED once `end_time` passes. The auction-ending
/// collaborator that decides *whether* an auction should end is out of
/// scope here; this only executes the transition and announces it once an
/// end time has already been reached.
pub struct LifecycleTicker {
    pub store: Arc<StorePool>,
    pub cache: CacheClient,
    pub interval: Duration,
}

impl LifecycleTicker {
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    async fn tick(&self) {
        let now = Utc::now();

        match self.store.activate_pending_auctions(now).await {
            Ok(activated) => {
                for auction in activated {
                    info!("auction {} moved to ACTIVE", auction.id);
                }
            }
            Err(err) => warn!("failed to activate pending auctions: {err}"),
        }

        match self.store.transition_expired_auctions(now).await {
            Ok(ended) => {
                for auction in ended {
                    info!("auction {} moved to ENDED", auction.id);
                    self.publish_auction_end(&auction).await;
                }
            }
            Err(err) => warn!("failed to transition expired auctions: {err}"),
        }
    }

    async fn publish_auction_end(&self, auction: &Auction) {
        let message = AuctionEventMessage::AuctionEnd {
            auction_id: auction.id,
            winning_bid: if auction.bid_count > 0 { Some(auction.current_highest_bid) } else { None },
            winner_id: auction.winner_id,
        };

        if let Ok(payload) = serde_json::to_string(&message) {
            if let Err(err) = self.cache.publish(&auction_events_channel(auction.id), &payload).await {
                warn!("failed to publish auction end event for {}: {err}", auction.id);
            }
        }

        if let Some(winner_id) = auction.winner_id {
            let notification = GlobalNotification::AuctionWon {
                user_id: winner_id,
                auction_id: auction.id,
                winning_bid: auction.current_highest_bid,
            };
            if let Ok(payload) = serde_json::to_string(&notification) {
                let _ = self.cache.publish(GLOBAL_NOTIFICATIONS_CHANNEL, &payload).await;
            }
        }
    }
}
