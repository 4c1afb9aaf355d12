use std::sync::Arc;

use auction_queue::QueueClient;
use futures_lite::StreamExt;
use log::{error, warn};

use crate::pipeline::Pipeline;

/// Consumes the bid-placed queue and feeds each envelope through the
/// pipeline. A malformed delivery is nacked without requeue (it will only
/// ever fail to decode the same way again) and routed to the dead-letter
/// queue; everything else is acked only once its outcome has been published.
pub async fn run(queue: QueueClient, pipeline: Arc<Pipeline>) {
    if !queue.is_enabled() {
        warn!("queue disabled at startup, bid consumer will not run");
        return;
    }

    let mut consumer = match queue.consume_bid_placed("auction-processor").await {
        Ok(consumer) => consumer,
        Err(err) => {
            error!("failed to start bid-placed consumer: {err}");
            return;
        }
    };

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(err) => {
                error!("error receiving delivery from bid-placed queue: {err}");
                continue;
            }
        };

        match auction_queue::decode(&delivery) {
            Ok(envelope) => {
                pipeline.process(envelope).await;
                if let Err(err) = auction_queue::ack(&delivery).await {
                    warn!("failed to ack bid-placed delivery: {err}");
                }
            }
            Err(err) => {
                warn!("dropping undecodable bid envelope: {err}");
                if let Err(err) = auction_queue::nack_no_requeue(&delivery).await {
                    warn!("failed to nack bid-placed delivery: {err}");
                }
            }
        }
    }
}
