use crate::core::credentials::extract_credentials;
use crate::core::defaults::DefaultingResolver;
use crate::core::parameters::{
    ProvisionParameters, UpdateParameters, AVAILABILITY_ZONES, BACKUP_AT, PROVISION_FIELDS,
    UPDATE_FIELDS,
};
use crate::core::{Catalog, NetworkDefaults, ProviderClient, ServiceBroker};
use crate::domain::contract::{
    BindDetails, Binding, DeprovisionDetails, DeprovisionResult, InstanceSchemas, LastOperation,
    LastOperationState, OperationDetails, OperationType, PlanSchemas, ProvisionDetails,
    ProvisionResult, SchemaParameters, UnbindDetails, UpdateDetails, UpdateResult,
};
use crate::domain::model::{instance_status, CreateInstanceOpts, Instance};
use crate::utils::error::{BrokerError, Result};
use crate::utils::validation::Validate;
use serde_json::{json, Map, Value};

/// Broker for the provider's distributed cache service.
///
/// Every operation is one synchronous call chain; nothing is shared
/// between requests beyond the immutable collaborators held here.
pub struct DcsBroker<P: ProviderClient, C: Catalog, N: NetworkDefaults> {
    provider: P,
    catalog: C,
    network: N,
    region: String,
}

impl<P: ProviderClient, C: Catalog, N: NetworkDefaults> DcsBroker<P, C, N> {
    pub fn new(provider: P, catalog: C, network: N, region: impl Into<String>) -> Self {
        Self {
            provider,
            catalog,
            network,
            region: region.into(),
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    async fn fetch_instance(&self, instance_id: &str) -> Result<Instance> {
        self.provider
            .get_instance(instance_id)
            .await
            .map_err(|e| e.at_stage("get dcs instance"))
    }
}

fn stage(name: &'static str) -> impl Fn(BrokerError) -> BrokerError {
    move |e| e.at_stage(name)
}

fn decode_provision(raw: Option<Value>) -> Result<ProvisionParameters> {
    raw.map_or_else(|| Ok(ProvisionParameters::default()), ProvisionParameters::from_value)
}

fn decode_update(raw: Option<Value>) -> Result<UpdateParameters> {
    raw.map_or_else(|| Ok(UpdateParameters::default()), UpdateParameters::from_value)
}

#[async_trait::async_trait]
impl<P: ProviderClient, C: Catalog, N: NetworkDefaults> ServiceBroker for DcsBroker<P, C, N> {
    async fn provision(
        &self,
        instance_id: &str,
        details: ProvisionDetails,
        async_allowed: bool,
    ) -> Result<ProvisionResult> {
        tracing::info!(
            "Provisioning dcs instance {} (plan {}, async allowed: {})",
            instance_id,
            details.plan_id,
            async_allowed
        );

        let mut params =
            decode_provision(details.raw_parameters).map_err(stage("decode provision parameters"))?;

        let plan = self
            .catalog
            .find_plan(&details.service_id, &details.plan_id)
            .map_err(stage("find service plan"))?;

        params
            .validate()
            .map_err(stage("validate provision parameters"))?;

        DefaultingResolver::new(&self.provider, &self.network, &self.region)
            .apply(&mut params, &plan, instance_id)
            .await
            .map_err(stage("apply provision defaults"))?;

        let opts = CreateInstanceOpts::try_from(params).map_err(stage("check resolved request"))?;
        tracing::debug!("provision dcs instance opts: {:?}", opts);

        let created = self
            .provider
            .create_instance(&opts)
            .await
            .map_err(stage("provision dcs instance"))?;
        tracing::debug!("provision dcs instance result: {:?}", created);

        tracing::info!(
            "Provisioned dcs instance {} as provider instance {}",
            instance_id,
            created.instance_id
        );
        Ok(ProvisionResult {
            is_async: false,
            dashboard_url: String::new(),
            operation_data: String::new(),
        })
    }

    async fn deprovision(
        &self,
        instance_id: &str,
        details: DeprovisionDetails,
        _async_allowed: bool,
    ) -> Result<DeprovisionResult> {
        tracing::info!("Deprovisioning dcs instance {}", instance_id);

        self.catalog
            .find_plan(&details.service_id, &details.plan_id)
            .map_err(stage("find service plan"))?;

        self.provider
            .delete_instance(instance_id)
            .await
            .map_err(stage("deprovision dcs instance"))?;

        Ok(DeprovisionResult {
            is_async: false,
            operation_data: String::new(),
        })
    }

    async fn bind(
        &self,
        instance_id: &str,
        binding_id: &str,
        details: BindDetails,
    ) -> Result<Binding> {
        tracing::info!("Binding {} to dcs instance {}", binding_id, instance_id);

        let plan = self
            .catalog
            .find_plan(&details.service_id, &details.plan_id)
            .map_err(stage("find service plan"))?;

        let instance = self.fetch_instance(instance_id).await?;
        tracing::debug!("bind dcs instance: {:?}", instance);

        let requested = match &details.raw_parameters {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };

        let credentials = extract_credentials(
            &instance,
            &plan,
            &details.additional_parameters,
            &requested,
        )
        .map_err(stage("extract binding credentials"))?;

        Ok(Binding { credentials })
    }

    async fn unbind(
        &self,
        instance_id: &str,
        binding_id: &str,
        details: UnbindDetails,
    ) -> Result<()> {
        tracing::info!("Unbinding {} from dcs instance {}", binding_id, instance_id);

        self.catalog
            .find_plan(&details.service_id, &details.plan_id)
            .map_err(stage("find service plan"))?;

        // Bindings hold no provider-side state; only the instance must exist.
        self.fetch_instance(instance_id).await?;
        Ok(())
    }

    async fn update(
        &self,
        instance_id: &str,
        details: UpdateDetails,
        _async_allowed: bool,
    ) -> Result<UpdateResult> {
        tracing::info!("Updating dcs instance {}", instance_id);

        let params =
            decode_update(details.raw_parameters).map_err(stage("decode update parameters"))?;

        self.catalog
            .find_plan(&details.service_id, &details.plan_id)
            .map_err(stage("find service plan"))?;

        let previous_plan = &details.previous_values.plan_id;
        if !previous_plan.is_empty() && previous_plan != &details.plan_id {
            return Err(BrokerError::ValidationError {
                field: "plan_id".to_string(),
                message: format!(
                    "changing plan from {} to {} is not supported",
                    previous_plan, details.plan_id
                ),
            }
            .at_stage("validate update parameters"));
        }

        params
            .validate()
            .map_err(stage("validate update parameters"))?;
        tracing::debug!("update dcs instance params: {:?}", params);

        if !params.unknown_fields.is_empty() {
            tracing::warn!(
                "Ignoring unsupported update fields: {:?}",
                params.unknown_fields.keys().collect::<Vec<_>>()
            );
        }

        let opts = params.to_update_opts();
        if !opts.is_empty() {
            self.provider
                .update_instance(instance_id, &opts)
                .await
                .map_err(stage("update dcs instance"))?;
        }

        if let Some(new_capacity) = params.new_capacity() {
            self.provider
                .extend_instance(instance_id, new_capacity)
                .await
                .map_err(stage("extend dcs instance"))?;
        }

        if let Some(change) = params.password_change() {
            self.provider
                .update_password(instance_id, &change)
                .await
                .map_err(stage("update dcs instance password"))?;
        }

        Ok(UpdateResult {
            is_async: false,
            operation_data: String::new(),
        })
    }

    async fn last_operation(
        &self,
        instance_id: &str,
        operation: OperationDetails,
    ) -> Result<LastOperation> {
        let instance = match self.provider.get_instance(instance_id).await {
            Ok(instance) => instance,
            Err(e) if e.is_not_found() && operation.operation_type == OperationType::Deprovision => {
                return Ok(LastOperation {
                    state: LastOperationState::Succeeded,
                    description: format!("dcs instance {} deleted", instance_id),
                });
            }
            Err(e) => return Err(e.at_stage("get dcs instance")),
        };

        if operation.operation_type == OperationType::Deprovision {
            return Ok(LastOperation {
                state: LastOperationState::InProgress,
                description: format!("dcs instance {} is being deleted", instance_id),
            });
        }

        let state = match instance.status.as_str() {
            instance_status::RUNNING => LastOperationState::Succeeded,
            instance_status::ERROR | instance_status::CREATE_FAILED => LastOperationState::Failed,
            instance_status::CREATING
            | instance_status::RESTARTING
            | instance_status::EXTENDING
            | instance_status::FLUSHING => LastOperationState::InProgress,
            other => {
                tracing::debug!("Unrecognized dcs instance status {}", other);
                LastOperationState::InProgress
            }
        };

        Ok(LastOperation {
            state,
            description: format!("dcs instance {} status: {}", instance_id, instance.status),
        })
    }

    fn plan_schemas(&self, service_id: &str, plan_id: &str) -> Result<PlanSchemas> {
        self.catalog
            .find_plan(service_id, plan_id)
            .map_err(stage("find service plan"))?;

        // The catalog owns the engine, so it is not offered to callers.
        let create = object_schema(
            PROVISION_FIELDS
                .iter()
                .filter(|(name, _)| *name != "engine"),
        );
        let update = object_schema(UPDATE_FIELDS.iter());

        Ok(PlanSchemas {
            service_instance: InstanceSchemas {
                create: SchemaParameters { parameters: create },
                update: SchemaParameters { parameters: update },
            },
        })
    }
}

fn object_schema<'a>(fields: impl Iterator<Item = &'a (&'a str, &'a str)>) -> Value {
    let properties: Map<String, Value> = fields
        .map(|(name, kind)| {
            let schema = match (*name, *kind) {
                (AVAILABILITY_ZONES, _) => json!({ "type": "array", "items": { "type": "string" } }),
                (BACKUP_AT, _) => json!({ "type": "array", "items": { "type": "integer" } }),
                (_, kind) => json!({ "type": kind }),
            };
            (name.to_string(), schema)
        })
        .collect();

    json!({
        "$schema": "http://json-schema.org/draft-04/schema#",
        "type": "object",
        "properties": properties,
    })
}
