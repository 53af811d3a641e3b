// Request and result shapes exchanged with the broker-protocol layer.

use crate::domain::model::BindingCredential;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionDetails {
    pub service_id: String,
    pub plan_id: String,
    pub organization_guid: String,
    pub space_guid: String,
    #[serde(rename = "parameters", skip_serializing_if = "Option::is_none")]
    pub raw_parameters: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviousValues {
    pub service_id: String,
    pub plan_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateDetails {
    pub service_id: String,
    pub plan_id: String,
    #[serde(rename = "parameters", skip_serializing_if = "Option::is_none")]
    pub raw_parameters: Option<Value>,
    pub previous_values: PreviousValues,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeprovisionDetails {
    pub service_id: String,
    pub plan_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BindDetails {
    pub service_id: String,
    pub plan_id: String,
    pub app_guid: String,
    #[serde(rename = "parameters", skip_serializing_if = "Option::is_none")]
    pub raw_parameters: Option<Value>,
    /// Values the operation store recorded for the instance at provision time.
    pub additional_parameters: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnbindDetails {
    pub service_id: String,
    pub plan_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvisionResult {
    pub is_async: bool,
    pub dashboard_url: String,
    pub operation_data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeprovisionResult {
    pub is_async: bool,
    pub operation_data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub is_async: bool,
    pub operation_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub credentials: BindingCredential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastOperationState {
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastOperation {
    pub state: LastOperationState,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Provision,
    Update,
    Deprovision,
}

/// What the operation store remembers about the operation being polled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDetails {
    pub operation_type: OperationType,
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub plan_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaParameters {
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSchemas {
    pub create: SchemaParameters,
    pub update: SchemaParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSchemas {
    pub service_instance: InstanceSchemas,
}
