pub mod broker_config;
#[cfg(feature = "cli")]
pub mod cli;

pub use broker_config::BrokerConfig;
#[cfg(feature = "cli")]
pub use cli::CliConfig;
