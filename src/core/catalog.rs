use crate::config::broker_config::ServiceDefinition;
use crate::core::Catalog;
use crate::domain::model::{Engine, ServicePlan};
use crate::utils::error::{BrokerError, Result};

/// Cache-engine family a catalog service belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceFamily {
    KeyValueStore,
    MemoryObjectCache,
    InMemoryDataGrid,
}

impl ServiceFamily {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "redis" | "dcs-redis" | "key-value-store" => Some(ServiceFamily::KeyValueStore),
            "memcached" | "dcs-memcached" | "memory-object-cache" => {
                Some(ServiceFamily::MemoryObjectCache)
            }
            "imdg" | "dcs-imdg" | "in-memory-data-grid" => Some(ServiceFamily::InMemoryDataGrid),
            _ => None,
        }
    }

    pub fn engine(&self) -> Engine {
        match self {
            ServiceFamily::KeyValueStore => Engine::Redis,
            ServiceFamily::MemoryObjectCache => Engine::Memcached,
            ServiceFamily::InMemoryDataGrid => Engine::Imdg,
        }
    }
}

/// Catalog loaded once at start-up and never mutated.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    services: Vec<ServiceDefinition>,
}

impl StaticCatalog {
    pub fn new(services: Vec<ServiceDefinition>) -> Self {
        Self { services }
    }

    /// Every `(service_id, plan_id)` pair, in catalog order.
    pub fn plan_ids(&self) -> Vec<(String, String)> {
        self.services
            .iter()
            .flat_map(|service| {
                service
                    .plans
                    .iter()
                    .map(move |plan| (service.id.clone(), plan.id.clone()))
            })
            .collect()
    }
}

impl Catalog for StaticCatalog {
    fn find_plan(&self, service_id: &str, plan_id: &str) -> Result<ServicePlan> {
        let not_found = || BrokerError::PlanNotFound {
            service_id: service_id.to_string(),
            plan_id: plan_id.to_string(),
        };

        let service = self
            .services
            .iter()
            .find(|service| service.id == service_id)
            .ok_or_else(not_found)?;
        let plan = service
            .plans
            .iter()
            .find(|plan| plan.id == plan_id)
            .ok_or_else(not_found)?;

        let family = service.family.as_deref().unwrap_or(&service.name);
        let family = ServiceFamily::parse(family).ok_or_else(|| {
            BrokerError::UnknownServiceFamily {
                service_id: service.id.clone(),
                family: family.to_string(),
            }
        })?;

        Ok(ServicePlan {
            service_id: service.id.clone(),
            plan_id: plan.id.clone(),
            service_name: service.name.clone(),
            plan_name: plan.name.clone(),
            engine: family.engine(),
            metadata: plan.parameters.clone(),
        })
    }
}
