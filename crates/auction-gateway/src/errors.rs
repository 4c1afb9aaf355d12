use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid or expired token: {0}")]
    Auth(#[from] jsonwebtoken::errors::Error),

    #[error("cache error: {0}")]
    Cache(#[from] auction_cache::errors::CacheError),

    #[error("queue error: {0}")]
    Queue(#[from] auction_queue::errors::QueueError),

    #[error("auction {0} not found")]
    AuctionNotFound(uuid::Uuid),

    #[error("timed out waiting for bid outcome")]
    ResultTimeout,
}
