use async_trait::async_trait;
use dcs_broker::config::broker_config::{NetworkConfig, PlanDefinition, ServiceDefinition};
use dcs_broker::domain::contract::{
    BindDetails, DeprovisionDetails, LastOperationState, OperationDetails, OperationType,
    PreviousValues, ProvisionDetails, UnbindDetails, UpdateDetails,
};
use dcs_broker::domain::model::{
    AvailabilityZone, CreateInstanceOpts, CreatedInstance, Engine, Instance, PasswordChange,
    PlanParameters, ProductTier, UpdateInstanceOpts,
};
use dcs_broker::utils::error::ErrorCategory;
use dcs_broker::{BrokerError, DcsBroker, ProviderClient, Result, ServiceBroker, StaticCatalog};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Create(CreateInstanceOpts),
    Update(String, UpdateInstanceOpts),
    Extend(String, u32),
    Password(String, PasswordChange),
    Delete(String),
}

#[derive(Clone, Default)]
struct MockProvider {
    zones: Vec<AvailabilityZone>,
    tiers: Vec<ProductTier>,
    instance: Option<Instance>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl MockProvider {
    fn with_inventory() -> Self {
        Self {
            zones: vec![zone("az-a", false), zone("az-b", true)],
            tiers: vec![tier("", "redis.empty"), tier("prod-1", "redis.ha.xu1.large.r2.2")],
            ..Default::default()
        }
    }

    fn with_instance(instance: Instance) -> Self {
        Self {
            instance: Some(instance),
            ..Self::with_inventory()
        }
    }

    async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }
}

fn not_found(operation: &str) -> BrokerError {
    BrokerError::ProviderError {
        operation: operation.to_string(),
        status: Some(404),
        message: "DCS.4010: instance does not exist".to_string(),
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn list_availability_zones(&self, _region: &str) -> Result<Vec<AvailabilityZone>> {
        Ok(self.zones.clone())
    }

    async fn list_product_tiers(&self) -> Result<Vec<ProductTier>> {
        Ok(self.tiers.clone())
    }

    async fn create_instance(&self, opts: &CreateInstanceOpts) -> Result<CreatedInstance> {
        self.calls.lock().await.push(Call::Create(opts.clone()));
        Ok(CreatedInstance {
            instance_id: "dcs-0001".to_string(),
            instance_name: opts.name.clone(),
        })
    }

    async fn get_instance(&self, _instance_id: &str) -> Result<Instance> {
        self.instance
            .clone()
            .ok_or_else(|| not_found("get dcs instance"))
    }

    async fn update_instance(&self, instance_id: &str, opts: &UpdateInstanceOpts) -> Result<()> {
        self.calls
            .lock()
            .await
            .push(Call::Update(instance_id.to_string(), opts.clone()));
        Ok(())
    }

    async fn extend_instance(&self, instance_id: &str, new_capacity: u32) -> Result<()> {
        self.calls
            .lock()
            .await
            .push(Call::Extend(instance_id.to_string(), new_capacity));
        Ok(())
    }

    async fn update_password(&self, instance_id: &str, change: &PasswordChange) -> Result<()> {
        self.calls
            .lock()
            .await
            .push(Call::Password(instance_id.to_string(), change.clone()));
        Ok(())
    }

    async fn delete_instance(&self, instance_id: &str) -> Result<()> {
        self.calls
            .lock()
            .await
            .push(Call::Delete(instance_id.to_string()));
        Ok(())
    }
}

fn zone(id: &str, available: bool) -> AvailabilityZone {
    AvailabilityZone {
        id: id.to_string(),
        code: format!("cn-north-1-{}", id),
        name: id.to_uppercase(),
        resource_available: available,
    }
}

fn tier(id: &str, spec_code: &str) -> ProductTier {
    ProductTier {
        id: id.to_string(),
        spec_code: spec_code.to_string(),
        engine: "redis".to_string(),
        engine_version: "3.0".to_string(),
        charging_type: "Hourly".to_string(),
        attributes: Map::new(),
    }
}

fn services() -> Vec<ServiceDefinition> {
    vec![
        ServiceDefinition {
            id: "svc-redis".to_string(),
            name: "dcs-redis".to_string(),
            description: String::new(),
            family: None,
            plans: vec![PlanDefinition {
                id: "plan-redis".to_string(),
                name: "redis-2g".to_string(),
                description: String::new(),
                parameters: PlanParameters {
                    engine_version: Some("3.0".to_string()),
                    capacity: Some(2),
                    ..Default::default()
                },
            }],
        },
        ServiceDefinition {
            id: "svc-memcached".to_string(),
            name: "caching".to_string(),
            description: String::new(),
            family: Some("memcached".to_string()),
            plans: vec![PlanDefinition {
                id: "plan-memcached".to_string(),
                name: "memcached-2g".to_string(),
                description: String::new(),
                parameters: PlanParameters::default(),
            }],
        },
    ]
}

fn network() -> NetworkConfig {
    NetworkConfig {
        vpc_id: Some("vpc-default".to_string()),
        subnet_id: Some("subnet-default".to_string()),
        security_group_id: Some("sg-default".to_string()),
    }
}

fn broker(provider: MockProvider) -> DcsBroker<MockProvider, StaticCatalog, NetworkConfig> {
    DcsBroker::new(provider, StaticCatalog::new(services()), network(), "cn-north-1")
}

fn provision_details(plan_id: &str, parameters: Value) -> ProvisionDetails {
    let service_id = if plan_id == "plan-memcached" {
        "svc-memcached"
    } else {
        "svc-redis"
    };
    ProvisionDetails {
        service_id: service_id.to_string(),
        plan_id: plan_id.to_string(),
        raw_parameters: Some(parameters),
        ..Default::default()
    }
}

fn running_instance() -> Instance {
    Instance {
        instance_id: "dcs-0001".to_string(),
        name: "orders-cache".to_string(),
        engine: "Redis".to_string(),
        ip: "192.168.0.10".to_string(),
        port: 6379,
        status: "RUNNING".to_string(),
        ..Default::default()
    }
}

fn update_details(parameters: Value) -> UpdateDetails {
    UpdateDetails {
        service_id: "svc-redis".to_string(),
        plan_id: "plan-redis".to_string(),
        raw_parameters: Some(parameters),
        previous_values: PreviousValues {
            service_id: "svc-redis".to_string(),
            plan_id: "plan-redis".to_string(),
        },
    }
}

async fn created_opts(provider: &MockProvider) -> CreateInstanceOpts {
    match provider.calls().await.as_slice() {
        [Call::Create(opts)] => opts.clone(),
        other => panic!("expected exactly one create call, got {:?}", other),
    }
}

#[tokio::test]
async fn test_provision_fills_defaults_from_plan_network_and_inventory() {
    let provider = MockProvider::with_inventory();
    let broker = broker(provider.clone());

    let result = broker
        .provision("instance-1", provision_details("plan-redis", json!({})), true)
        .await
        .unwrap();
    assert!(!result.is_async);

    let opts = created_opts(&provider).await;
    assert_eq!(opts.name, "instance-1");
    assert_eq!(opts.engine, Engine::Redis);
    assert_eq!(opts.engine_version, "3.0");
    assert_eq!(opts.capacity, Some(2));
    assert_eq!(opts.vpc_id, "vpc-default");
    assert_eq!(opts.subnet_id, "subnet-default");
    assert_eq!(opts.security_group_id, "sg-default");
    assert_eq!(opts.available_zones, vec!["az-b".to_string()]);
    assert_eq!(opts.product_id, "prod-1");
}

#[tokio::test]
async fn test_provision_keeps_caller_values_over_defaults() {
    let provider = MockProvider::with_inventory();
    let broker = broker(provider.clone());

    let params = json!({
        "name": "orders-cache",
        "capacity": 4,
        "vpc_id": "vpc-custom",
        "availability_zones": "[\"az-x\", az-y]",
        "product_id": "prod-custom",
        "password": "Secret#123",
        "backup_strategy_savedays": 3,
        "backup_strategy_backup_type": "auto",
        "backup_strategy_backup_at": "[1,3,5]",
        "backup_strategy_begin_at": "00:00-01:00",
        "backup_strategy_period_type": "weekly",
        "shard_count": 3
    });
    broker
        .provision("instance-1", provision_details("plan-redis", params), false)
        .await
        .unwrap();

    let opts = created_opts(&provider).await;
    assert_eq!(opts.name, "orders-cache");
    assert_eq!(opts.capacity, Some(4));
    assert_eq!(opts.vpc_id, "vpc-custom");
    assert_eq!(opts.subnet_id, "subnet-default");
    assert_eq!(opts.available_zones, vec!["az-x", "az-y"]);
    assert_eq!(opts.product_id, "prod-custom");
    assert_eq!(opts.password, "Secret#123");
    assert_eq!(opts.extra.get("shard_count"), Some(&json!(3)));

    let policy = opts.instance_backup_policy.expect("backup policy");
    assert_eq!(policy.save_days, Some(3));
    assert_eq!(policy.periodical_backup_plan.backup_at, vec![1, 3, 5]);
    assert_eq!(policy.periodical_backup_plan.begin_at, "00:00-01:00");
}

#[tokio::test]
async fn test_provision_engine_comes_from_catalog() {
    let provider = MockProvider::with_inventory();
    let broker = broker(provider.clone());

    broker
        .provision(
            "instance-1",
            provision_details("plan-memcached", json!({ "engine": "Redis" })),
            false,
        )
        .await
        .unwrap();

    assert_eq!(created_opts(&provider).await.engine, Engine::Memcached);
}

#[tokio::test]
async fn test_provision_without_available_zone_creates_nothing() {
    let provider = MockProvider {
        zones: vec![zone("az-a", false), zone("az-b", false)],
        ..MockProvider::with_inventory()
    };
    let broker = broker(provider.clone());

    let err = broker
        .provision("instance-1", provision_details("plan-redis", json!({})), false)
        .await
        .unwrap_err();

    assert!(matches!(err.root(), BrokerError::ResourceExhausted { .. }));
    assert_eq!(err.stage(), Some("apply provision defaults"));
    assert_eq!(err.category(), ErrorCategory::Provider);
    assert!(provider.calls().await.is_empty());
}

#[tokio::test]
async fn test_provision_reports_missing_network_default() {
    let provider = MockProvider::with_inventory();
    let broker = DcsBroker::new(
        provider.clone(),
        StaticCatalog::new(services()),
        NetworkConfig {
            vpc_id: Some("vpc-default".to_string()),
            ..Default::default()
        },
        "cn-north-1",
    );

    let err = broker
        .provision("instance-1", provision_details("plan-redis", json!({})), false)
        .await
        .unwrap_err();

    match err.root() {
        BrokerError::ConfigurationGap { field } => assert_eq!(field, "subnet_id"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(provider.calls().await.is_empty());
}

#[tokio::test]
async fn test_provision_rejects_malformed_parameters() {
    let provider = MockProvider::with_inventory();
    let broker = broker(provider.clone());

    let err = broker
        .provision(
            "instance-1",
            provision_details("plan-redis", json!({ "backup_strategy_backup_at": "[1,x]" })),
            false,
        )
        .await
        .unwrap_err();

    assert!(matches!(err.root(), BrokerError::FieldFormatError { .. }));
    assert_eq!(err.stage(), Some("decode provision parameters"));
    assert_eq!(err.category(), ErrorCategory::Request);
    assert!(provider.calls().await.is_empty());
}

#[tokio::test]
async fn test_provision_refuses_pass_through_key_shadowing_zones() {
    let provider = MockProvider::with_inventory();
    let broker = broker(provider.clone());

    let err = broker
        .provision(
            "instance-1",
            provision_details("plan-redis", json!({ "available_zones": [] })),
            false,
        )
        .await
        .unwrap_err();

    match err.root() {
        BrokerError::FieldFormatError { field, .. } => assert_eq!(field, "available_zones"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.stage(), Some("check resolved request"));
    assert!(provider.calls().await.is_empty());
}

#[tokio::test]
async fn test_provision_unknown_plan() {
    let broker = broker(MockProvider::with_inventory());

    let err = broker
        .provision("instance-1", provision_details("plan-missing", json!({})), false)
        .await
        .unwrap_err();

    assert!(matches!(err.root(), BrokerError::PlanNotFound { .. }));
}

#[tokio::test]
async fn test_update_issues_modify_extend_and_password_calls() {
    let provider = MockProvider::with_inventory();
    let broker = broker(provider.clone());

    let params = json!({
        "name": "renamed",
        "maintain_begin": "02:00:00",
        "maintain_end": "06:00:00",
        "new_capacity": 8,
        "old_password": "Old#1234",
        "new_password": "New#5678"
    });
    broker
        .update("instance-1", update_details(params), false)
        .await
        .unwrap();

    let calls = provider.calls().await;
    assert_eq!(calls.len(), 3);
    match &calls[0] {
        Call::Update(id, opts) => {
            assert_eq!(id, "instance-1");
            assert_eq!(opts.name.as_deref(), Some("renamed"));
            assert_eq!(opts.description, None);
            assert_eq!(opts.maintain_begin.as_deref(), Some("02:00:00"));
        }
        other => panic!("unexpected call: {other:?}"),
    }
    assert_eq!(calls[1], Call::Extend("instance-1".to_string(), 8));
    match &calls[2] {
        Call::Password(_, change) => {
            assert_eq!(change.old_password, "Old#1234");
            assert_eq!(change.new_password, "New#5678");
        }
        other => panic!("unexpected call: {other:?}"),
    }
}

#[tokio::test]
async fn test_update_null_description_clears_it() {
    let provider = MockProvider::with_inventory();
    let broker = broker(provider.clone());

    broker
        .update("instance-1", update_details(json!({ "description": null })), false)
        .await
        .unwrap();

    match provider.calls().await.as_slice() {
        [Call::Update(_, opts)] => assert_eq!(opts.description.as_deref(), Some("")),
        other => panic!("unexpected calls: {other:?}"),
    }
}

#[tokio::test]
async fn test_update_rejects_null_capacity() {
    let provider = MockProvider::with_inventory();
    let broker = broker(provider.clone());

    let err = broker
        .update(
            "instance-1",
            update_details(json!({ "name": "renamed", "new_capacity": null })),
            false,
        )
        .await
        .unwrap_err();

    match err.root() {
        BrokerError::ValidationError { field, .. } => assert_eq!(field, "new_capacity"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(provider.calls().await.is_empty());
}

#[tokio::test]
async fn test_update_with_nothing_to_change_calls_nothing() {
    let provider = MockProvider::with_inventory();
    let broker = broker(provider.clone());

    broker
        .update("instance-1", update_details(json!({ "unsupported": true })), false)
        .await
        .unwrap();

    assert!(provider.calls().await.is_empty());
}

#[tokio::test]
async fn test_update_rejects_plan_change() {
    let provider = MockProvider::with_inventory();
    let broker = broker(provider.clone());

    let mut details = update_details(json!({ "name": "renamed" }));
    details.previous_values.plan_id = "plan-other".to_string();

    let err = broker.update("instance-1", details, false).await.unwrap_err();
    assert!(matches!(err.root(), BrokerError::ValidationError { .. }));
    assert!(provider.calls().await.is_empty());
}

#[tokio::test]
async fn test_bind_returns_credentials_of_running_instance() {
    let broker = broker(MockProvider::with_instance(running_instance()));

    let mut stored = Map::new();
    stored.insert("password".to_string(), json!("Secret#123"));
    let details = BindDetails {
        service_id: "svc-redis".to_string(),
        plan_id: "plan-redis".to_string(),
        additional_parameters: stored,
        ..Default::default()
    };

    let binding = broker.bind("instance-1", "binding-1", details).await.unwrap();
    let credentials = binding.credentials;
    assert_eq!(credentials.host, "192.168.0.10");
    assert_eq!(credentials.port, Some(6379));
    assert_eq!(credentials.password, "Secret#123");
    assert_eq!(credentials.name, "orders-cache");
    assert_eq!(credentials.resource_type, "redis");
}

#[tokio::test]
async fn test_bind_refuses_instance_that_is_not_running() {
    let instance = Instance {
        status: "CREATING".to_string(),
        ..running_instance()
    };
    let broker = broker(MockProvider::with_instance(instance));

    let details = BindDetails {
        service_id: "svc-redis".to_string(),
        plan_id: "plan-redis".to_string(),
        ..Default::default()
    };
    let err = broker
        .bind("instance-1", "binding-1", details)
        .await
        .unwrap_err();

    assert!(matches!(err.root(), BrokerError::InstanceNotReady { .. }));
}

#[tokio::test]
async fn test_unbind_requires_existing_instance() {
    let details = UnbindDetails {
        service_id: "svc-redis".to_string(),
        plan_id: "plan-redis".to_string(),
    };

    let present = broker(MockProvider::with_instance(running_instance()));
    assert!(present
        .unbind("instance-1", "binding-1", details.clone())
        .await
        .is_ok());

    let missing = broker(MockProvider::with_inventory());
    let err = missing
        .unbind("instance-1", "binding-1", details)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_deprovision_deletes_instance() {
    let provider = MockProvider::with_instance(running_instance());
    let broker = broker(provider.clone());

    let details = DeprovisionDetails {
        service_id: "svc-redis".to_string(),
        plan_id: "plan-redis".to_string(),
    };
    let result = broker
        .deprovision("instance-1", details, true)
        .await
        .unwrap();

    assert!(!result.is_async);
    assert_eq!(
        provider.calls().await,
        vec![Call::Delete("instance-1".to_string())]
    );
}

fn operation(operation_type: OperationType) -> OperationDetails {
    OperationDetails {
        operation_type,
        service_id: "svc-redis".to_string(),
        plan_id: "plan-redis".to_string(),
    }
}

#[tokio::test]
async fn test_last_operation_maps_instance_status() {
    let cases = [
        ("RUNNING", LastOperationState::Succeeded),
        ("CREATING", LastOperationState::InProgress),
        ("EXTENDING", LastOperationState::InProgress),
        ("CREATEFAILED", LastOperationState::Failed),
        ("ERROR", LastOperationState::Failed),
        ("FROZEN", LastOperationState::InProgress),
    ];

    for (status, expected) in cases {
        let instance = Instance {
            status: status.to_string(),
            ..running_instance()
        };
        let broker = broker(MockProvider::with_instance(instance));
        let last = broker
            .last_operation("instance-1", operation(OperationType::Provision))
            .await
            .unwrap();
        assert_eq!(last.state, expected, "status {}", status);
    }
}

#[tokio::test]
async fn test_last_operation_deprovision_succeeds_once_instance_is_gone() {
    let gone = broker(MockProvider::with_inventory());
    let last = gone
        .last_operation("instance-1", operation(OperationType::Deprovision))
        .await
        .unwrap();
    assert_eq!(last.state, LastOperationState::Succeeded);

    let still_there = broker(MockProvider::with_instance(running_instance()));
    let last = still_there
        .last_operation("instance-1", operation(OperationType::Deprovision))
        .await
        .unwrap();
    assert_eq!(last.state, LastOperationState::InProgress);

    let err = gone
        .last_operation("instance-1", operation(OperationType::Provision))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_plan_schemas_describe_create_and_update_parameters() {
    let broker = broker(MockProvider::default());

    let schemas = broker.plan_schemas("svc-redis", "plan-redis").unwrap();
    let create = &schemas.service_instance.create.parameters;
    let update = &schemas.service_instance.update.parameters;

    assert_eq!(create["type"], "object");
    assert_eq!(create["properties"]["capacity"]["type"], "integer");
    assert_eq!(create["properties"]["availability_zones"]["type"], "array");
    assert!(create["properties"].get("engine").is_none());
    assert_eq!(update["properties"]["new_capacity"]["type"], "integer");
    assert!(update["properties"].get("vpc_id").is_none());

    assert!(broker.plan_schemas("svc-redis", "plan-missing").is_err());
}
