use std::sync::Arc;
use std::time::Duration;

use auction_cache::CacheClient;
use auction_core::channels::{auction_bids_channel, bid_result_channel, GLOBAL_NOTIFICATIONS_CHANNEL};
use auction_core::envelope::BidEnvelope;
use auction_core::errors::RejectReason;
use auction_core::events::{AuditLog, BidChannelMessage, BidResultMessage, GlobalNotification, QueuedNotification};
use auction_core::model::{Amount, Bid};
use auction_queue::QueueClient;
use auction_store::errors::StoreError;
use auction_store::models::BidRow;
use auction_store::{AuctionStore, StorePool};
use chrono::Utc;
use log::warn;
use uuid::Uuid;

const LOCK_ACQUIRE_ATTEMPTS: u32 = 5;
const LOCK_ACQUIRE_RETRY_DELAY: Duration = Duration::from_millis(50);
const DEDUPLICATION_WINDOW_SECONDS: u64 = 5;

pub struct Pipeline {
    pub store: Arc<StorePool>,
    pub cache: CacheClient,
    pub queue: QueueClient,
    pub minimum_increment: Amount,
    pub lock_ttl_ms: u64,
}

impl Pipeline {
    /// Runs one bid envelope end to end: acquire the per-auction lock, apply
    /// the acceptance rules, and publish every side effect, always releasing
    /// the lock on the way out regardless of outcome.
    pub async fn process(&self, envelope: BidEnvelope) {
        let started = std::time::Instant::now();
        let outcome = self.with_lock(&envelope).await;

        let outcome_label = if outcome.is_ok() { "accepted" } else { "rejected" };
        auction_metrics::BID_PROCESSING_SECONDS
            .with_label_values(&[outcome_label])
            .observe(started.elapsed().as_secs_f64());

        match &outcome {
            Ok(_) => auction_metrics::metrics_update!(inc BIDS_ACCEPTED_TOTAL, &[&envelope.auction_id.to_string()]),
            Err(reason) => auction_metrics::metrics_update!(inc BIDS_REJECTED_TOTAL, &[reason.as_label()]),
        }

        self.publish_outcome(&envelope, outcome).await;
    }

    async fn with_lock(&self, envelope: &BidEnvelope) -> Result<Bid, RejectReason> {
        let lock_key = format!("lock:auction:{}", envelope.auction_id);
        let holder = Uuid::new_v4().to_string();
        let lock = self.cache.lock(lock_key, holder);

        let mut acquired = false;
        for attempt in 0..LOCK_ACQUIRE_ATTEMPTS {
            match lock.try_acquire(self.lock_ttl_ms).await {
                Ok(true) => {
                    acquired = true;
                    break;
                }
                Ok(false) => {
                    if attempt + 1 < LOCK_ACQUIRE_ATTEMPTS {
                        tokio::time::sleep(LOCK_ACQUIRE_RETRY_DELAY).await;
                    }
                }
                Err(err) => {
                    warn!("lock acquire error for auction {}: {err}", envelope.auction_id);
                    return Err(RejectReason::Infrastructure(err.to_string()));
                }
            }
        }

        if !acquired {
            auction_metrics::metrics_update!(inc LOCK_ACQUIRE_FAILURES_TOTAL, &[&envelope.auction_id.to_string()]);
            return Err(RejectReason::LockTimeout);
        }

        let result = self.accept(envelope).await;

        if let Err(err) = lock.release().await {
            warn!("failed to release auction lock for {}: {err}", envelope.auction_id);
        }

        result
    }

    async fn accept(&self, envelope: &BidEnvelope) -> Result<Bid, RejectReason> {
        self.reject_if_duplicate(envelope).await?;

        let auction = self
            .store
            .find_auction(envelope.auction_id)
            .await
            .map_err(Self::store_to_reject)?
            .ok_or(RejectReason::AuctionNotFound)?;

        let now = Utc::now();
        if !auction.is_open_at(now) {
            return Err(if now < auction.start_time {
                RejectReason::NotStarted
            } else {
                RejectReason::Ended
            });
        }

        let minimum_accepted = auction.current_highest_bid + self.minimum_increment;
        if envelope.amount < minimum_accepted {
            return Err(RejectReason::BelowCurrentHighest);
        }

        let user = self.store.find_user(envelope.user_id).await.map_err(Self::store_to_reject)?;
        if user.is_none() {
            return Err(RejectReason::UserNotFound);
        }

        // The conditional write is the actual race arbiter: the lock keeps
        // instances from stepping on each other, but a crashed or slow
        // instance past its lock TTL must not be able to corrupt state, so
        // the update is guarded by the highest bid it observed.
        self.store
            .conditional_update_highest_bid(envelope.auction_id, auction.current_highest_bid, envelope.amount, envelope.user_id)
            .await
            .map_err(|err| match err {
                StoreError::Conflict(_) => RejectReason::BelowCurrentHighest,
                other => Self::store_to_reject(other),
            })?;

        let bid_id = Uuid::new_v4();
        let bid = self
            .store
            .insert_bid(bid_id, envelope.user_id, envelope.auction_id, envelope.amount, now)
            .await
            .map_err(Self::store_to_reject)?;

        let previous_winner = self
            .store
            .mark_previous_winner_outbid(envelope.auction_id, bid_id)
            .await
            .map_err(Self::store_to_reject)?;

        self.publish_acceptance(envelope, &bid, previous_winner).await;
        self.publish_audit(envelope, true, None).await;

        Ok(bid)
    }

    /// A client-supplied `submission_id` is the authoritative idempotency
    /// key; absent that, the same `(user, auction, amount)` within the
    /// window is treated as a retry rather than a second bid.
    async fn reject_if_duplicate(&self, envelope: &BidEnvelope) -> Result<(), RejectReason> {
        let key = match &envelope.submission_id {
            Some(submission_id) => format!("dedup:submission:{submission_id}"),
            None => format!("dedup:fallback:{}:{}:{}", envelope.auction_id, envelope.user_id, envelope.amount),
        };

        let first_seen = self
            .cache
            .set_if_absent(&key, &envelope.correlation_id.to_string(), DEDUPLICATION_WINDOW_SECONDS)
            .await
            .map_err(|err| RejectReason::Infrastructure(err.to_string()))?;

        if first_seen {
            Ok(())
        } else {
            Err(RejectReason::Duplicate)
        }
    }

    fn store_to_reject(err: StoreError) -> RejectReason {
        match err {
            StoreError::AuctionNotFound(_) => RejectReason::AuctionNotFound,
            StoreError::UserNotFound(_) => RejectReason::UserNotFound,
            StoreError::Conflict(_) => RejectReason::BelowCurrentHighest,
            other => RejectReason::Infrastructure(other.to_string()),
        }
    }

    async fn publish_acceptance(&self, envelope: &BidEnvelope, bid: &Bid, previous_winner: Option<BidRow>) {
        let channel = auction_bids_channel(envelope.auction_id);

        self.publish_cache(
            &channel,
            &BidChannelMessage::BidUpdate {
                auction_id: envelope.auction_id,
                bid_id: bid.id,
                user_id: bid.user_id,
                amount: bid.amount,
                timestamp: bid.timestamp,
                username: envelope.username.clone(),
            },
        )
        .await;

        if let Some(previous) = &previous_winner {
            self.publish_cache(
                &channel,
                &BidChannelMessage::Outbid {
                    auction_id: envelope.auction_id,
                    new_bid_amount: bid.amount,
                    new_bid_user: bid.user_id,
                },
            )
            .await;

            if let Err(err) = self
                .queue
                .publish_notification(&QueuedNotification::Outbid {
                    previous_winner_id: previous.user_id,
                    auction_id: envelope.auction_id,
                    new_amount: bid.amount,
                })
                .await
            {
                warn!("failed to enqueue outbid notification for auction {}: {err}", envelope.auction_id);
            }
        }

        self.publish_cache(
            GLOBAL_NOTIFICATIONS_CHANNEL,
            &GlobalNotification::BidSuccess {
                user_id: envelope.user_id,
                auction_id: envelope.auction_id,
                bid_id: bid.id,
                amount: bid.amount,
            },
        )
        .await;

        if let Err(err) = self
            .queue
            .publish_notification(&QueuedNotification::BidSuccess {
                user_id: envelope.user_id,
                auction_id: envelope.auction_id,
                bid_id: bid.id,
                amount: bid.amount,
            })
            .await
        {
            warn!("failed to enqueue bid success notification for auction {}: {err}", envelope.auction_id);
        }
    }

    async fn publish_outcome(&self, envelope: &BidEnvelope, outcome: Result<Bid, RejectReason>) {
        let message = match &outcome {
            Ok(bid) => BidResultMessage::Accepted { bid: bid.clone() },
            Err(reason) => BidResultMessage::Rejected { reason: *reason },
        };
        self.publish_cache(&bid_result_channel(envelope.correlation_id), &message).await;

        if let Err(reason) = outcome {
            self.publish_cache(
                GLOBAL_NOTIFICATIONS_CHANNEL,
                &GlobalNotification::BidFailed {
                    user_id: envelope.user_id,
                    auction_id: envelope.auction_id,
                    reason,
                },
            )
            .await;

            if let Err(err) = self
                .queue
                .publish_notification(&QueuedNotification::BidFailed {
                    user_id: envelope.user_id,
                    auction_id: envelope.auction_id,
                    reason,
                })
                .await
            {
                warn!("failed to enqueue bid failure notification for auction {}: {err}", envelope.auction_id);
            }

            self.publish_audit(envelope, false, Some(reason)).await;
        }
    }

    async fn publish_audit(&self, envelope: &BidEnvelope, success: bool, reason: Option<RejectReason>) {
        if let Err(err) = self
            .store
            .insert_audit_log(envelope.auction_id, envelope.user_id, envelope.amount, success, reason.map(|r| r.message()))
            .await
        {
            warn!("failed to write audit log row for auction {}: {err}", envelope.auction_id);
        }

        let log = AuditLog {
            id: Uuid::new_v4(),
            auction_id: envelope.auction_id,
            user_id: envelope.user_id,
            amount: envelope.amount,
            success,
            reason,
            created_at: Utc::now(),
        };

        if let Err(err) = self.queue.publish_audit(&log).await {
            warn!("failed to enqueue audit entry for auction {}: {err}", envelope.auction_id);
        }
    }

    async fn publish_cache<T: serde::Serialize>(&self, channel: &str, message: &T) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("failed to encode payload for {channel}: {err}");
                return;
            }
        };
        if let Err(err) = self.cache.publish(channel, &payload).await {
            warn!("failed to publish on {channel}: {err}");
        }
    }
}
