use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, ExchangeKind};

use crate::errors::QueueError;
use crate::{
    AUDIT_EXCHANGE, AUDIT_QUEUE, BID_PLACED_EXCHANGE, BID_PLACED_QUEUE, DEAD_LETTER_EXCHANGE,
    DEAD_LETTER_QUEUE, MESSAGE_TTL_MS, NOTIFICATIONS_EXCHANGE, NOTIFICATIONS_QUEUE,
};

/// Declares the fixed topology: one fanout exchange per message kind, a
/// matching main queue bound to it with a five-minute TTL and a dead-letter
/// route, and a single shared dead-letter exchange/queue everything routes
/// into once it expires or is nacked without requeue.
pub async fn declare(channel: &Channel) -> Result<(), QueueError> {
    channel
        .exchange_declare(
            DEAD_LETTER_EXCHANGE,
            ExchangeKind::Fanout,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_declare(
            DEAD_LETTER_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_bind(
            DEAD_LETTER_QUEUE,
            DEAD_LETTER_EXCHANGE,
            "",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    for (exchange, queue) in [
        (BID_PLACED_EXCHANGE, BID_PLACED_QUEUE),
        (NOTIFICATIONS_EXCHANGE, NOTIFICATIONS_QUEUE),
        (AUDIT_EXCHANGE, AUDIT_QUEUE),
    ] {
        declare_main_queue(channel, exchange, queue).await?;
    }

    Ok(())
}

async fn declare_main_queue(channel: &Channel, exchange: &str, queue: &str) -> Result<(), QueueError> {
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Fanout,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    let mut args = FieldTable::default();
    args.insert("x-message-ttl".into(), MESSAGE_TTL_MS.into());
    args.insert("x-dead-letter-exchange".into(), DEAD_LETTER_EXCHANGE.into());

    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            args,
        )
        .await?;

    channel
        .queue_bind(
            queue,
            exchange,
            "",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    Ok(())
}
