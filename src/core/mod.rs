pub mod broker;
pub mod catalog;
pub mod credentials;
pub mod defaults;
pub mod parameters;

pub use crate::domain::ports::{Catalog, NetworkDefaults, ProviderClient, ServiceBroker};
pub use crate::utils::error::Result;
