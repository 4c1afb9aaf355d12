use futures::StreamExt;
use log::{info, warn};
use redis::aio::PubSub;

use crate::errors::CacheError;

/// A single long-lived subscriber connection whose incoming messages are
/// dispatched by channel name. The Gateway owns one of these per instance
/// and demultiplexes `(channel, payload)` pairs itself rather than
/// registering a closure per auction.
pub struct Subscriber {
    pubsub: PubSub,
}

impl Subscriber {
    pub async fn connect(client: &redis::Client) -> Result<Self, CacheError> {
        let conn = client.get_async_connection().await?;
        Ok(Self {
            pubsub: conn.into_pubsub(),
        })
    }

    pub async fn subscribe(&mut self, channel: &str) -> Result<(), CacheError> {
        self.pubsub.subscribe(channel).await?;
        info!("subscribed to {channel}");
        Ok(())
    }

    pub async fn psubscribe(&mut self, pattern: &str) -> Result<(), CacheError> {
        self.pubsub.psubscribe(pattern).await?;
        info!("psubscribed to {pattern}");
        Ok(())
    }

    /// Drains the connection, calling `on_message(channel, payload)` for
    /// every delivery until the connection is dropped.
    pub async fn run<F>(mut self, mut on_message: F)
    where
        F: FnMut(String, String),
    {
        let mut stream = self.pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let channel = msg.get_channel_name().to_string();
            match msg.get_payload::<String>() {
                Ok(payload) => on_message(channel, payload),
                Err(err) => warn!("dropping undecodable pub/sub payload on {channel}: {err}"),
            }
        }
    }
}
