pub mod config;
pub mod logging;
pub mod wait;

pub use config::Environment;
pub use logging::setup_logging;
pub use wait::wait_for_resource_until;
