use crate::domain::contract::{
    BindDetails, Binding, DeprovisionDetails, DeprovisionResult, LastOperation, OperationDetails,
    PlanSchemas, ProvisionDetails, ProvisionResult, UnbindDetails, UpdateDetails, UpdateResult,
};
use crate::domain::model::{
    AvailabilityZone, CreateInstanceOpts, CreatedInstance, Instance, PasswordChange, ProductTier,
    ServicePlan, UpdateInstanceOpts,
};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Resource-management API of the cloud provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn list_availability_zones(&self, region: &str) -> Result<Vec<AvailabilityZone>>;
    async fn list_product_tiers(&self) -> Result<Vec<ProductTier>>;
    async fn create_instance(&self, opts: &CreateInstanceOpts) -> Result<CreatedInstance>;
    async fn get_instance(&self, instance_id: &str) -> Result<Instance>;
    async fn update_instance(&self, instance_id: &str, opts: &UpdateInstanceOpts) -> Result<()>;
    async fn extend_instance(&self, instance_id: &str, new_capacity: u32) -> Result<()>;
    async fn update_password(&self, instance_id: &str, change: &PasswordChange) -> Result<()>;
    async fn delete_instance(&self, instance_id: &str) -> Result<()>;
}

pub trait Catalog: Send + Sync {
    fn find_plan(&self, service_id: &str, plan_id: &str) -> Result<ServicePlan>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkSelector {
    Vpc,
    Subnet,
    SecurityGroup,
}

impl NetworkSelector {
    pub fn field_name(&self) -> &'static str {
        match self {
            NetworkSelector::Vpc => "vpc_id",
            NetworkSelector::Subnet => "subnet_id",
            NetworkSelector::SecurityGroup => "security_group_id",
        }
    }
}

/// Environment-level network defaults used when a request names none.
pub trait NetworkDefaults: Send + Sync {
    fn default_for(&self, selector: NetworkSelector) -> Option<String>;
}

/// Operations offered to the broker-protocol layer.
#[async_trait]
pub trait ServiceBroker: Send + Sync {
    async fn provision(
        &self,
        instance_id: &str,
        details: ProvisionDetails,
        async_allowed: bool,
    ) -> Result<ProvisionResult>;

    async fn deprovision(
        &self,
        instance_id: &str,
        details: DeprovisionDetails,
        async_allowed: bool,
    ) -> Result<DeprovisionResult>;

    async fn bind(
        &self,
        instance_id: &str,
        binding_id: &str,
        details: BindDetails,
    ) -> Result<Binding>;

    async fn unbind(
        &self,
        instance_id: &str,
        binding_id: &str,
        details: UnbindDetails,
    ) -> Result<()>;

    async fn update(
        &self,
        instance_id: &str,
        details: UpdateDetails,
        async_allowed: bool,
    ) -> Result<UpdateResult>;

    async fn last_operation(
        &self,
        instance_id: &str,
        operation: OperationDetails,
    ) -> Result<LastOperation>;

    fn plan_schemas(&self, service_id: &str, plan_id: &str) -> Result<PlanSchemas>;
}
