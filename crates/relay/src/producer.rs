use crate::config::RelayConfig;
use anyhow::Context;
use ringbuffer::{BackoffIdleStrategy, IdleStrategy, Region, Writer};
use std::sync::atomic::{AtomicBool, Ordering};

/// Type id of the counter messages the relay exchanges.
pub const MSG_TYPE_ID: i32 = 1;

/// Writes `messages_to_produce` counter values, then poison carrying the count.
pub struct Producer {
    writer: Writer,
    config: RelayConfig,
}

impl Producer {
    /// Create (and zero) the ring file the consumer will map.
    pub fn build(config: RelayConfig) -> anyhow::Result<Self> {
        let region = Region::create(&config.ring_path, config.ring_capacity).with_context(|| {
            format!(
                "Failed to create ring buffer at {} (capacity {})",
                config.ring_path.display(),
                config.ring_capacity
            )
        })?;

        // SAFETY: the relay runs a single producer per ring file.
        let writer = unsafe { Writer::from_region(region) };

        Ok(Self { writer, config })
    }

    /// Returns the number of messages published before poison, or before
    /// `shutdown` was raised.
    pub fn run(mut self, shutdown: &AtomicBool) -> anyhow::Result<u64> {
        tracing::info!(
            messages = self.config.messages_to_produce,
            capacity = self.writer.capacity(),
            "Producer starting"
        );

        let progress_interval = self.config.progress_interval.max(1);
        let mut idle = BackoffIdleStrategy::default();
        let mut sent = 0u64;

        while sent < self.config.messages_to_produce {
            if shutdown.load(Ordering::Relaxed) {
                tracing::info!(sent, "Shutdown requested, producer stopping early");
                return Ok(sent);
            }

            if self.writer.try_write(MSG_TYPE_ID, &(sent as i64).to_le_bytes())? {
                sent += 1;
                idle.reset();
                if sent % progress_interval == 0 {
                    tracing::info!(sent, "Producer progress");
                }
            } else {
                idle.idle();
            }
        }

        while !self.writer.send_poison(sent as i64)? {
            if shutdown.load(Ordering::Relaxed) {
                tracing::warn!(sent, "Shutdown requested before poison could be published");
                return Ok(sent);
            }
            idle.idle();
        }

        tracing::info!(
            sent,
            position = self.writer.producer_position(),
            "Producer finished, poison published"
        );
        Ok(sent)
    }
}
