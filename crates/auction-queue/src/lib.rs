pub mod errors;
mod topology;

use std::sync::Arc;

use auction_core::events::{AuditLog, QueuedNotification};
use auction_core::envelope::BidEnvelope;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use log::{info, warn};

use errors::QueueError;

const BID_PLACED_EXCHANGE: &str = "auction.bid_placed";
const NOTIFICATIONS_EXCHANGE: &str = "auction.notifications";
const AUDIT_EXCHANGE: &str = "auction.audit";
const DEAD_LETTER_EXCHANGE: &str = "auction.dlx";

const BID_PLACED_QUEUE: &str = "bid_placed";
const NOTIFICATIONS_QUEUE: &str = "notifications";
const AUDIT_QUEUE: &str = "audit";
const DEAD_LETTER_QUEUE: &str = "dead_letter";

const MESSAGE_TTL_MS: i32 = 5 * 60 * 1000;

pub const DEFAULT_PREFETCH_COUNT: u16 = 10;

struct ConnectedQueue {
    _connection: Arc<Connection>,
    channel: Channel,
}

/// The Gateway and Processor both hold one of these. When the broker is
/// unreachable at startup it degrades to `Disabled` rather than failing the
/// whole process: bid acceptance still works end to end through the cache
/// pub/sub fallback, it just loses queue-backed notifications and audit
/// durability until the broker comes back.
#[derive(Clone)]
pub enum QueueClient {
    Connected(Arc<ConnectedQueue>),
    Disabled,
}

impl QueueClient {
    pub async fn connect(addr: &str) -> Result<Self, QueueError> {
        let connection = Connection::connect(addr, ConnectionProperties::default()).await?;
        info!("connection to the broker established");

        let channel = connection.create_channel().await?;
        channel
            .basic_qos(DEFAULT_PREFETCH_COUNT, Default::default())
            .await?;

        topology::declare(&channel).await?;
        info!("queue topology declared");

        Ok(Self::Connected(Arc::new(ConnectedQueue {
            _connection: Arc::new(connection),
            channel,
        })))
    }

    /// Same as `connect`, but swallows the error into `Disabled` with a
    /// warning instead of propagating it, for callers that must start up
    /// even if the broker is down.
    pub async fn connect_or_degrade(addr: &str) -> Self {
        match Self::connect(addr).await {
            Ok(client) => client,
            Err(err) => {
                warn!("queue unreachable, starting in disabled state: {err}");
                Self::Disabled
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    fn channel(&self) -> Result<&Channel, QueueError> {
        match self {
            Self::Connected(inner) => Ok(&inner.channel),
            Self::Disabled => Err(QueueError::Disabled),
        }
    }

    async fn publish(&self, exchange: &str, payload: &[u8]) -> Result<(), QueueError> {
        let channel = self.channel()?;
        channel
            .basic_publish(
                exchange,
                "",
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await?
            .await?;
        Ok(())
    }

    pub async fn publish_bid_placed(&self, envelope: &BidEnvelope) -> Result<(), QueueError> {
        self.publish(BID_PLACED_EXCHANGE, &serde_json::to_vec(envelope)?).await
    }

    pub async fn publish_notification(&self, notification: &QueuedNotification) -> Result<(), QueueError> {
        self.publish(NOTIFICATIONS_EXCHANGE, &serde_json::to_vec(notification)?).await
    }

    pub async fn publish_audit(&self, log: &AuditLog) -> Result<(), QueueError> {
        self.publish(AUDIT_EXCHANGE, &serde_json::to_vec(log)?).await
    }

    async fn consume(&self, queue: &str, tag: &str) -> Result<Consumer, QueueError> {
        let channel = self.channel()?;
        let consumer = channel
            .basic_consume(queue, tag, BasicConsumeOptions::default(), FieldTable::default())
            .await?;
        Ok(consumer)
    }

    pub async fn consume_bid_placed(&self, tag: &str) -> Result<Consumer, QueueError> {
        self.consume(BID_PLACED_QUEUE, tag).await
    }

    pub async fn consume_notifications(&self, tag: &str) -> Result<Consumer, QueueError> {
        self.consume(NOTIFICATIONS_QUEUE, tag).await
    }

    pub async fn consume_audit(&self, tag: &str) -> Result<Consumer, QueueError> {
        self.consume(AUDIT_QUEUE, tag).await
    }

    pub async fn consume_dead_letters(&self, tag: &str) -> Result<Consumer, QueueError> {
        self.consume(DEAD_LETTER_QUEUE, tag).await
    }
}

pub async fn ack(delivery: &Delivery) -> Result<(), QueueError> {
    delivery.ack(BasicAckOptions::default()).await?;
    Ok(())
}

/// Nacks without requeue: a second delivery attempt of a malformed or
/// permanently-failing message only burns another worker slot, so it is
/// routed straight to the dead-letter queue instead.
pub async fn nack_no_requeue(delivery: &Delivery) -> Result<(), QueueError> {
    delivery
        .nack(BasicNackOptions {
            requeue: false,
            ..Default::default()
        })
        .await?;
    Ok(())
}

pub fn decode<T: serde::de::DeserializeOwned>(delivery: &Delivery) -> Result<T, QueueError> {
    Ok(serde_json::from_slice(&delivery.data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_core::model::{AuctionId, UserId};
    use chrono::Utc;
    use uuid::Uuid;

    fn envelope() -> BidEnvelope {
        BidEnvelope {
            correlation_id: Uuid::new_v4(),
            auction_id: AuctionId::new_v4(),
            user_id: UserId::new_v4(),
            amount: 1000,
            username: "alice".into(),
            socket_id: None,
            submitted_at: Utc::now(),
            submission_id: None,
        }
    }

    #[tokio::test]
    async fn disabled_client_reports_not_enabled() {
        let queue = QueueClient::Disabled;
        assert!(!queue.is_enabled());
    }

    #[tokio::test]
    async fn disabled_client_refuses_to_publish() {
        let queue = QueueClient::Disabled;
        let err = queue.publish_bid_placed(&envelope()).await.unwrap_err();
        assert!(matches!(err, QueueError::Disabled));
    }

    #[tokio::test]
    async fn disabled_client_refuses_to_consume() {
        let queue = QueueClient::Disabled;
        let err = queue.consume_bid_placed("tag").await.unwrap_err();
        assert!(matches!(err, QueueError::Disabled));
    }

    #[test]
    fn queue_and_dead_letter_names_are_distinct() {
        let names = [BID_PLACED_QUEUE, NOTIFICATIONS_QUEUE, AUDIT_QUEUE, DEAD_LETTER_QUEUE];
        for (i, a) in names.iter().enumerate() {
            for (j, b) in names.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }
}
