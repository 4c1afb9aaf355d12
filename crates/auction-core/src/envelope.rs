use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Amount, AuctionId, UserId};

/// The message the Gateway places on the bid-placed queue. `correlation_id`
/// is always set so the Processor can publish a terminal outcome on
/// `bid:result:{correlation_id}` regardless of which front door (websocket
/// or HTTP fallback) produced the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidEnvelope {
    pub correlation_id: Uuid,
    pub auction_id: AuctionId,
    pub user_id: UserId,
    pub amount: Amount,
    pub username: String,
    pub socket_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
    /// Client-supplied idempotency key, if any. When absent the Processor
    /// falls back to `(user_id, auction_id, amount)` deduplication within a
    /// short window.
    pub submission_id: Option<String>,
}
