//! Fulfillment runner that drives one consumer per broker partition.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing;

use claimgate_broker::BrokerManager;
use claimgate_core::config::worker::WorkerConfig;
use claimgate_core::traits::broker::{Delivery, IntentBroker};

use crate::fulfillment::{FulfillmentError, FulfillmentHandler};

/// Consumes queued claim intents until the cancel signal is received
#[derive(Debug)]
pub struct FulfillmentRunner {
    /// Broker the consumers read from
    broker: BrokerManager,
    /// Handler invoked for each consumed intent
    handler: Arc<FulfillmentHandler>,
    /// Worker configuration
    config: WorkerConfig,
}

impl FulfillmentRunner {
    /// Create a new fulfillment runner
    pub fn new(
        broker: BrokerManager,
        handler: Arc<FulfillmentHandler>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            broker,
            handler,
            config,
        }
    }

    /// Start the partition consumers and run until the cancel signal flips,
    /// then give in-flight intents the shutdown grace period to finish
    pub async fn run(&self, cancel: watch::Receiver<bool>) {
        let partitions = self.broker.partitions();
        tracing::info!(
            "Fulfillment worker started with {} partition consumer(s), max_attempts={}, consume_wait={}s",
            partitions,
            self.config.max_attempts,
            self.config.consume_wait_seconds
        );

        let consume_wait = Duration::from_secs(self.config.consume_wait_seconds);
        let mut consumers = Vec::with_capacity(partitions as usize);
        for partition in 0..partitions {
            let broker = self.broker.clone();
            let handler = Arc::clone(&self.handler);
            let cancel = cancel.clone();
            let max_attempts = self.config.max_attempts;
            consumers.push(tokio::spawn(async move {
                consume_partition(broker, handler, partition, consume_wait, max_attempts, cancel)
                    .await;
            }));
        }

        // Wait for the stop signal. A closed channel counts as a stop.
        let mut shutdown = cancel.clone();
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }

        tracing::info!("Fulfillment worker waiting for in-flight intents to complete...");

        let deadline =
            time::Instant::now() + Duration::from_secs(self.config.shutdown_grace_seconds);
        for consumer in consumers {
            match time::timeout_at(deadline, consumer).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!("Shutdown grace period expired with consumers still running");
                    break;
                }
            }
        }

        tracing::info!("Fulfillment worker shut down");
    }
}

/// Sequentially drain one partition. A single consumer per partition keeps
/// per-resource delivery order intact.
async fn consume_partition(
    broker: BrokerManager,
    handler: Arc<FulfillmentHandler>,
    partition: u32,
    consume_wait: Duration,
    max_attempts: u32,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        if *cancel.borrow() {
            break;
        }

        tokio::select! {
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    break;
                }
            }
            consumed = broker.consume(partition, consume_wait) => {
                match consumed {
                    Ok(Some(delivery)) => {
                        settle(&broker, &handler, &delivery, max_attempts).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!("Partition {} consume failed: {}", partition, e);
                        time::sleep(consume_wait).await;
                    }
                }
            }
        }
    }

    tracing::debug!("Partition {} consumer stopped", partition);
}

/// Fulfill one delivery and settle it with the broker
async fn settle(
    broker: &BrokerManager,
    handler: &FulfillmentHandler,
    delivery: &Delivery,
    max_attempts: u32,
) {
    match handler.fulfill(&delivery.payload).await {
        Ok(()) => {
            if let Err(e) = broker.ack(delivery).await {
                tracing::error!("Failed to ack fulfilled intent: {}", e);
            }
        }
        Err(FulfillmentError::Transient(msg)) => {
            if delivery.attempts + 1 < max_attempts {
                match broker.requeue(delivery).await {
                    Ok(attempts) => {
                        tracing::warn!(
                            "Intent fulfillment failed (attempt {}/{}), requeued: {}",
                            attempts,
                            max_attempts,
                            msg
                        );
                    }
                    Err(e) => {
                        tracing::error!("Failed to requeue intent: {}", e);
                    }
                }
            } else {
                tracing::error!(
                    "Intent used up its {} delivery attempts, dead-lettering: {}",
                    max_attempts,
                    msg
                );
                if let Err(e) = broker.dead_letter(delivery, &msg).await {
                    tracing::error!("Failed to dead-letter intent: {}", e);
                }
            }
        }
        Err(FulfillmentError::Permanent(msg)) => {
            tracing::error!("Intent failed permanently, dead-lettering: {}", msg);
            if let Err(e) = broker.dead_letter(delivery, &msg).await {
                tracing::error!("Failed to dead-letter intent: {}", e);
            }
        }
    }
}
