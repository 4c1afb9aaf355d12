use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to PostgreSQL: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("failed to obtain a pooled connection: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("migrations failed: {0}")]
    Migration(String),

    #[error("auction {0} not found")]
    AuctionNotFound(uuid::Uuid),

    #[error("user {0} not found")]
    UserNotFound(uuid::Uuid),

    /// The conditional update lost the race: `current_highest_bid` had
    /// already advanced past the value observed earlier in the pipeline.
    #[error("auction {0} was updated concurrently")]
    Conflict(uuid::Uuid),
}
