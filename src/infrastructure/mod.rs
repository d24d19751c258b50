pub mod config;
pub mod container;
pub mod external_services;
pub mod file_system;
pub mod logging;

pub use config::{AppConfig, ConfigError};
pub use container::{AppContainer, ContainerError};
pub use file_system::LocalIndexStore;
pub use logging::init_logging;
