use crate::config::RelayConfig;
use crate::producer::MSG_TYPE_ID;
use common::wait_for_resource_until;
use ringbuffer::{BackoffIdleStrategy, IdleStrategy, Message, MessageHandler, Reader, Region};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerSummary {
    /// Counter messages received, poison excluded
    pub received: u64,
    /// Value carried by the poison message, if one arrived
    pub poison_value: Option<i64>,
    /// Messages whose value did not follow the previous one
    pub out_of_order: u64,
}

struct CountingHandler {
    summary: ConsumerSummary,
    progress_interval: u64,
}

impl MessageHandler for CountingHandler {
    fn on_message(&mut self, message: Message<'_>) {
        if message.is_poison() {
            self.summary.poison_value = message.read_i64();
            return;
        }

        if message.type_id != MSG_TYPE_ID {
            tracing::warn!(type_id = message.type_id, "Ignoring unexpected message type");
            return;
        }

        if message.read_i64() != Some(self.summary.received as i64) {
            self.summary.out_of_order += 1;
            tracing::warn!(
                expected = self.summary.received,
                got = ?message.read_i64(),
                "Message out of order"
            );
        }

        self.summary.received += 1;
        if self.summary.received % self.progress_interval == 0 {
            tracing::info!(received = self.summary.received, "Consumer progress");
        }
    }
}

/// Drains the ring until poison arrives.
pub struct Consumer {
    reader: Reader,
    config: RelayConfig,
}

impl Consumer {
    /// Wait for the producer to create the ring file and map it.
    ///
    /// Returns `None` if `shutdown` is raised first.
    pub fn connect(config: RelayConfig, shutdown: &AtomicBool) -> Option<Self> {
        let region = wait_for_resource_until(
            || Region::open(&config.ring_path),
            config.poll_interval_ms,
            "Ring buffer",
            shutdown,
        )?;

        // SAFETY: the relay runs a single consumer per ring file.
        let reader = unsafe { Reader::from_region(region) };

        Some(Self { reader, config })
    }

    pub fn run(mut self, shutdown: &AtomicBool) -> ConsumerSummary {
        tracing::info!(capacity = self.reader.capacity(), "Consumer starting");

        let mut handler = CountingHandler {
            summary: ConsumerSummary::default(),
            progress_interval: self.config.progress_interval.max(1),
        };
        let mut idle = BackoffIdleStrategy::default();

        while !self.reader.has_received_poison() {
            if shutdown.load(Ordering::Relaxed) {
                tracing::info!(
                    received = handler.summary.received,
                    "Shutdown requested, consumer stopping early"
                );
                break;
            }

            let count = self.reader.read_with(&mut handler);
            self.reader.set_consumer_heartbeat_time(now_millis());
            idle.idle_work(count);
        }

        tracing::info!(
            received = handler.summary.received,
            poison_value = ?handler.summary.poison_value,
            out_of_order = handler.summary.out_of_order,
            "Consumer finished"
        );
        handler.summary
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
