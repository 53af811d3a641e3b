use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Cache engine an instance runs, as the provider names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Engine {
    Redis,
    Memcached,
    #[serde(rename = "IMDG")]
    Imdg,
}

impl Engine {
    /// Case-insensitive lookup by provider engine name.
    pub fn parse(name: &str) -> Option<Engine> {
        match name.trim().to_ascii_lowercase().as_str() {
            "redis" => Some(Engine::Redis),
            "memcached" => Some(Engine::Memcached),
            "imdg" => Some(Engine::Imdg),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Redis => "Redis",
            Engine::Memcached => "Memcached",
            Engine::Imdg => "IMDG",
        }
    }

    /// Lowercase name handed to applications in binding credentials.
    pub fn resource_type(&self) -> &'static str {
        match self {
            Engine::Redis => "redis",
            Engine::Memcached => "memcached",
            Engine::Imdg => "imdg",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog-level defaults a plan may declare for the instances created from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanParameters {
    pub engine_version: Option<String>,
    pub spec_code: Option<String>,
    pub charging_type: Option<String>,
    pub capacity: Option<u32>,
    pub product_id: Option<String>,
    pub vpc_id: Option<String>,
    pub subnet_id: Option<String>,
    pub security_group_id: Option<String>,
    #[serde(default)]
    pub availability_zones: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServicePlan {
    pub service_id: String,
    pub plan_id: String,
    pub service_name: String,
    pub plan_name: String,
    pub engine: Engine,
    pub metadata: PlanParameters,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityZone {
    pub id: String,
    pub code: String,
    pub name: String,
    pub resource_available: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductTier {
    pub id: String,
    pub spec_code: String,
    pub engine: String,
    pub engine_version: String,
    pub charging_type: String,
    pub attributes: Map<String, Value>,
}

/// Instance as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub engine: String,
    #[serde(default)]
    pub engine_version: String,
    #[serde(default)]
    pub capacity: u32,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub access_user: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub vpc_id: String,
    #[serde(default)]
    pub subnet_id: String,
    #[serde(default)]
    pub security_group_id: String,
    #[serde(default)]
    pub available_zones: Vec<String>,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub maintain_begin: String,
    #[serde(default)]
    pub maintain_end: String,
}

/// Provider lifecycle states the broker reacts to.
pub mod instance_status {
    pub const RUNNING: &str = "RUNNING";
    pub const CREATING: &str = "CREATING";
    pub const RESTARTING: &str = "RESTARTING";
    pub const EXTENDING: &str = "EXTENDING";
    pub const FLUSHING: &str = "FLUSHING";
    pub const ERROR: &str = "ERROR";
    pub const CREATE_FAILED: &str = "CREATEFAILED";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodicalBackupPlan {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub begin_at: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub period_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub backup_at: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_days: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub backup_type: String,
    #[serde(default)]
    pub periodical_backup_plan: PeriodicalBackupPlan,
}

impl BackupPolicy {
    pub fn is_empty(&self) -> bool {
        self == &BackupPolicy::default()
    }
}

/// Keys `CreateInstanceOpts` writes itself; pass-through fields may not reuse them.
pub const CREATE_WIRE_FIELDS: &[&str] = &[
    "name",
    "description",
    "engine",
    "engine_version",
    "capacity",
    "access_user",
    "password",
    "vpc_id",
    "subnet_id",
    "security_group_id",
    "available_zones",
    "product_id",
    "instance_backup_policy",
    "maintain_begin",
    "maintain_end",
];

/// Complete body of a provider create call. Only obtainable from a
/// resolved `ProvisionParameters`, so every required field is populated.
#[derive(Clone, PartialEq, Serialize)]
pub struct CreateInstanceOpts {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub engine: Engine,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub engine_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_user: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub security_group_id: String,
    pub available_zones: Vec<String>,
    pub product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_backup_policy: Option<BackupPolicy>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub maintain_begin: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub maintain_end: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for CreateInstanceOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateInstanceOpts")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("engine", &self.engine)
            .field("engine_version", &self.engine_version)
            .field("capacity", &self.capacity)
            .field("access_user", &self.access_user)
            .field("password", &redacted(&self.password))
            .field("vpc_id", &self.vpc_id)
            .field("subnet_id", &self.subnet_id)
            .field("security_group_id", &self.security_group_id)
            .field("available_zones", &self.available_zones)
            .field("product_id", &self.product_id)
            .field("instance_backup_policy", &self.instance_backup_policy)
            .field("maintain_begin", &self.maintain_begin)
            .field("maintain_end", &self.maintain_end)
            .field("extra", &self.extra)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedInstance {
    pub instance_id: String,
    #[serde(default)]
    pub instance_name: String,
}

/// Body of a provider modify call; empty fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateInstanceOpts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_backup_policy: Option<BackupPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintain_begin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintain_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,
}

impl UpdateInstanceOpts {
    pub fn is_empty(&self) -> bool {
        self == &UpdateInstanceOpts::default()
    }
}

#[derive(Clone, PartialEq, Serialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

impl fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordChange")
            .field("old_password", &redacted(&self.old_password))
            .field("new_password", &redacted(&self.new_password))
            .finish()
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingCredential {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub resource_type: String,
}

impl fmt::Debug for BindingCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingCredential")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("name", &self.name)
            .field("type", &self.resource_type)
            .finish()
    }
}

pub(crate) fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}
