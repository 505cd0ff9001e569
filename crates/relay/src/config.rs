use std::env;
use std::path::PathBuf;

pub use common::Environment;
use ringbuffer::paths::{DEFAULT_RING_CAPACITY, DEFAULT_RING_PATH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Producer => "producer",
            Role::Consumer => "consumer",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub environment: Environment,
    pub role: Role,
    pub ring_path: PathBuf,
    pub ring_capacity: usize,
    pub messages_to_produce: u64,
    pub poll_interval_ms: u64,
    /// Log progress every this many messages
    pub progress_interval: u64,
}

impl RelayConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();

        let role = match env::var("RELAY_ROLE")
            .unwrap_or_else(|_| "consumer".to_string())
            .to_lowercase()
            .as_str()
        {
            "producer" => Role::Producer,
            "consumer" => Role::Consumer,
            other => anyhow::bail!("Unknown RELAY_ROLE '{}', expected producer or consumer", other),
        };

        let ring_path = env::var("RING_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_RING_PATH));

        let ring_capacity = env::var("RING_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RING_CAPACITY);

        let messages_to_produce = env::var("MESSAGES_TO_PRODUCE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1_000_000);

        let poll_interval_ms = env::var("POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        let progress_interval = env::var("PROGRESS_INTERVAL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(messages_to_produce / 10)
            .max(1);

        Ok(Self {
            environment,
            role,
            ring_path,
            ring_capacity,
            messages_to_produce,
            poll_interval_ms,
            progress_interval,
        })
    }

    /// Create default configuration for testing
    pub fn test_default(ring_path: PathBuf) -> Self {
        Self {
            environment: Environment::Development,
            role: Role::Consumer,
            ring_path,
            ring_capacity: 1024,
            messages_to_produce: 1000,
            poll_interval_ms: 1,
            progress_interval: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 7] = [
        "ENVIRONMENT",
        "RELAY_ROLE",
        "RING_PATH",
        "RING_CAPACITY",
        "MESSAGES_TO_PRODUCE",
        "POLL_INTERVAL_MS",
        "PROGRESS_INTERVAL",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = RelayConfig::from_env().unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.role, Role::Consumer);
        assert_eq!(config.ring_path, PathBuf::from("/dev/shm/spsc_ring"));
        assert_eq!(config.ring_capacity, 65536);
        assert_eq!(config.messages_to_produce, 1_000_000);
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.progress_interval, 100_000);
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        unsafe {
            env::set_var("ENVIRONMENT", "prod");
            env::set_var("RELAY_ROLE", "Producer");
            env::set_var("RING_PATH", "/tmp/ring");
            env::set_var("RING_CAPACITY", "4096");
            env::set_var("MESSAGES_TO_PRODUCE", "50");
            env::set_var("POLL_INTERVAL_MS", "5");
        }
        let config = RelayConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.role, Role::Producer);
        assert_eq!(config.ring_path, PathBuf::from("/tmp/ring"));
        assert_eq!(config.ring_capacity, 4096);
        assert_eq!(config.messages_to_produce, 50);
        assert_eq!(config.poll_interval_ms, 5);
        assert_eq!(config.progress_interval, 5);
    }

    #[test]
    #[serial]
    fn test_unparseable_numbers_fall_back() {
        clear_env();
        unsafe { env::set_var("RING_CAPACITY", "lots") };
        let config = RelayConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.ring_capacity, DEFAULT_RING_CAPACITY);
    }

    #[test]
    #[serial]
    fn test_unknown_role_rejected() {
        clear_env();
        unsafe { env::set_var("RELAY_ROLE", "broker") };
        let result = RelayConfig::from_env();
        clear_env();

        assert!(result.is_err());
    }
}
