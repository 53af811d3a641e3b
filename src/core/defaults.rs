//! Fills the fields a provision request left out, from the catalog plan,
//! the environment's network defaults and live provider inventory.

use crate::core::parameters::ProvisionParameters;
use crate::domain::model::{AvailabilityZone, ProductTier, ServicePlan};
use crate::domain::ports::{NetworkDefaults, NetworkSelector, ProviderClient};
use crate::utils::error::{BrokerError, Result};

pub struct DefaultingResolver<'a> {
    provider: &'a dyn ProviderClient,
    network: &'a dyn NetworkDefaults,
    region: &'a str,
}

impl<'a> DefaultingResolver<'a> {
    pub fn new(
        provider: &'a dyn ProviderClient,
        network: &'a dyn NetworkDefaults,
        region: &'a str,
    ) -> Self {
        Self {
            provider,
            network,
            region,
        }
    }

    /// Completes `params` in place. Inventory is only queried for fields
    /// that are still empty after the plan and network defaults.
    pub async fn apply(
        &self,
        params: &mut ProvisionParameters,
        plan: &ServicePlan,
        instance_id: &str,
    ) -> Result<()> {
        if params.name.is_empty() {
            params.name = instance_id.to_string();
        }

        // The catalog decides the engine, whatever the request said.
        if !params.engine.is_empty() && params.engine != plan.engine.as_str() {
            tracing::debug!(
                "Ignoring requested engine '{}', plan {} uses {}",
                params.engine,
                plan.plan_id,
                plan.engine
            );
        }
        params.engine = plan.engine.as_str().to_string();

        apply_plan_metadata(params, plan);
        apply_network_defaults(params, self.network)?;

        if params.availability_zones.is_empty() {
            let zones = self.provider.list_availability_zones(self.region).await?;
            let zone = pick_availability_zone(&zones)?;
            tracing::debug!("Defaulting availability zone to {}", zone);
            params.availability_zones = vec![zone];
        }

        if params.product_id.is_empty() {
            let tiers = self.provider.list_product_tiers().await?;
            let product = pick_product_tier(
                &tiers,
                plan.metadata.spec_code.as_deref(),
                plan.metadata.charging_type.as_deref(),
            )?;
            tracing::debug!("Defaulting product to {}", product);
            params.product_id = product;
        }

        Ok(())
    }
}

/// Copies plan-level defaults into fields the request left empty.
pub fn apply_plan_metadata(params: &mut ProvisionParameters, plan: &ServicePlan) {
    let metadata = &plan.metadata;
    let fill = |target: &mut String, source: &Option<String>| {
        if target.is_empty() {
            if let Some(value) = source {
                target.clone_from(value);
            }
        }
    };

    fill(&mut params.engine_version, &metadata.engine_version);
    fill(&mut params.product_id, &metadata.product_id);
    fill(&mut params.vpc_id, &metadata.vpc_id);
    fill(&mut params.subnet_id, &metadata.subnet_id);
    fill(&mut params.security_group_id, &metadata.security_group_id);

    if params.capacity.is_none() {
        params.capacity = metadata.capacity;
    }
    if params.availability_zones.is_empty() {
        params.availability_zones.clone_from(&metadata.availability_zones);
    }
}

pub fn apply_network_defaults(
    params: &mut ProvisionParameters,
    network: &dyn NetworkDefaults,
) -> Result<()> {
    let selectors = [
        (NetworkSelector::Vpc, &mut params.vpc_id),
        (NetworkSelector::Subnet, &mut params.subnet_id),
        (NetworkSelector::SecurityGroup, &mut params.security_group_id),
    ];

    for (selector, target) in selectors {
        if !target.is_empty() {
            continue;
        }
        *target = network
            .default_for(selector)
            .ok_or_else(|| BrokerError::ConfigurationGap {
                field: selector.field_name().to_string(),
            })?;
    }
    Ok(())
}

/// First zone, in inventory order, that still has capacity.
pub fn pick_availability_zone(zones: &[AvailabilityZone]) -> Result<String> {
    zones
        .iter()
        .find(|zone| zone.resource_available && !zone.id.is_empty())
        .map(|zone| zone.id.clone())
        .ok_or_else(|| BrokerError::ResourceExhausted {
            resource: "availability zone".to_string(),
        })
}

/// First product with an id, in listing order, optionally restricted to a
/// spec code and a charging type (compared case-insensitively).
pub fn pick_product_tier(
    tiers: &[ProductTier],
    spec_code: Option<&str>,
    charging_type: Option<&str>,
) -> Result<String> {
    tiers
        .iter()
        .filter(|tier| !tier.id.is_empty())
        .filter(|tier| spec_code.map_or(true, |code| tier.spec_code == code))
        .find(|tier| {
            charging_type.map_or(true, |charging| tier.charging_type.eq_ignore_ascii_case(charging))
        })
        .map(|tier| tier.id.clone())
        .ok_or_else(|| {
            let mut resource = "product tier".to_string();
            if let Some(code) = spec_code {
                resource.push_str(&format!(" with spec code {}", code));
            }
            if let Some(charging) = charging_type {
                resource.push_str(&format!(" charged {}", charging));
            }
            BrokerError::ResourceExhausted { resource }
        })
}
