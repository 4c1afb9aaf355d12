use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("queue is disabled")]
    Disabled,
}
