pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::http::HttpProviderClient;
pub use config::BrokerConfig;
pub use crate::core::{broker::DcsBroker, catalog::StaticCatalog};
pub use crate::core::parameters::{Patch, ProvisionParameters, UpdateParameters};
pub use domain::ports::{Catalog, NetworkDefaults, ProviderClient, ServiceBroker};
pub use utils::error::{BrokerError, Result};
