use anyhow::Context;
use relay::{Consumer, Producer, RelayConfig, Role, logging::setup_logging};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag,
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

fn main() -> anyhow::Result<()> {
    let config = RelayConfig::from_env()?;
    setup_logging(&config);
    let shutdown = Arc::new(AtomicBool::new(false));

    flag::register(SIGTERM, Arc::clone(&shutdown))?;
    flag::register(SIGINT, Arc::clone(&shutdown))?;

    tracing::info!("Signal handlers registered (SIGTERM, SIGINT)");
    tracing::info!(
        role = config.role.as_str(),
        config = ?config,
        "Loaded configuration"
    );

    match config.role {
        Role::Producer => {
            let producer = Producer::build(config)
                .context("Failed to initialize producer - check that the ring path is writable")?;
            let sent = producer.run(&shutdown)?;
            tracing::info!(sent, "Producer stopped");
        }
        Role::Consumer => {
            let Some(consumer) = Consumer::connect(config, &shutdown) else {
                tracing::info!("Consumer stopped before the ring buffer appeared");
                return Ok(());
            };
            let summary = consumer.run(&shutdown);
            if summary.out_of_order > 0 {
                anyhow::bail!(
                    "Consumer saw {} out-of-order messages out of {}",
                    summary.out_of_order,
                    summary.received
                );
            }
            tracing::info!(received = summary.received, "Consumer stopped");
        }
    }

    Ok(())
}
