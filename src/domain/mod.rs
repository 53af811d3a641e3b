// Domain layer: broker contract, provider-facing models and ports (interfaces).

pub mod contract;
pub mod model;
pub mod ports;
