use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Poll `connect` until it succeeds, sleeping `poll_interval_ms` between
/// attempts. Gives up with `None` once `shutdown` is set.
pub fn wait_for_resource_until<F, T, E>(
    mut connect: F,
    poll_interval_ms: u64,
    resource_name: &str,
    shutdown: &AtomicBool,
) -> Option<T>
where
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    while !shutdown.load(Ordering::Relaxed) {
        match connect() {
            Ok(resource) => {
                tracing::info!("{} connected", resource_name);
                return Some(resource);
            }
            Err(e) => {
                tracing::debug!("Waiting for {} ({})", resource_name, e);
                std::thread::sleep(Duration::from_millis(poll_interval_ms));
            }
        }
    }
    tracing::info!("Stopped waiting for {}", resource_name);
    None
}
