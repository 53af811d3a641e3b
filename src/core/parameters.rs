//! Request-body models for provision and update calls.
//!
//! Bodies are decoded leniently: list fields may arrive either as a JSON
//! array or as one delimited string, and keys we do not know about are kept
//! in an ordered bag that is written back out on encode.

use crate::domain::model::{
    redacted, BackupPolicy, CreateInstanceOpts, Engine, PasswordChange, PeriodicalBackupPlan,
    UpdateInstanceOpts, CREATE_WIRE_FIELDS,
};
use crate::utils::error::{BrokerError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_time_of_day, Validate,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

pub const AVAILABILITY_ZONES: &str = "availability_zones";
pub const BACKUP_AT: &str = "backup_strategy_backup_at";

/// Declared provision keys and their JSON types.
pub const PROVISION_FIELDS: &[(&str, &str)] = &[
    ("capacity", "integer"),
    ("vpc_id", "string"),
    ("subnet_id", "string"),
    ("security_group_id", "string"),
    (AVAILABILITY_ZONES, "array"),
    ("username", "string"),
    ("password", "string"),
    ("name", "string"),
    ("description", "string"),
    ("engine", "string"),
    ("engine_version", "string"),
    ("product_id", "string"),
    ("backup_strategy_savedays", "integer"),
    ("backup_strategy_backup_type", "string"),
    (BACKUP_AT, "array"),
    ("backup_strategy_begin_at", "string"),
    ("backup_strategy_period_type", "string"),
    ("maintain_begin", "string"),
    ("maintain_end", "string"),
];

/// Declared update keys and their JSON types.
pub const UPDATE_FIELDS: &[(&str, &str)] = &[
    ("name", "string"),
    ("description", "string"),
    ("backup_strategy_savedays", "integer"),
    ("backup_strategy_backup_type", "string"),
    (BACKUP_AT, "array"),
    ("backup_strategy_begin_at", "string"),
    ("backup_strategy_period_type", "string"),
    ("maintain_begin", "string"),
    ("maintain_end", "string"),
    ("security_group_id", "string"),
    ("new_capacity", "integer"),
    ("old_password", "string"),
    ("new_password", "string"),
];

/// Strips whitespace, double quotes and one pair of surrounding brackets
/// from a list written as a single string, then splits on commas.
///
/// A string with nothing between the brackets is an empty list. Otherwise
/// every segment is kept, empty ones included, so callers decide whether
/// `"a,,b"` is acceptable.
pub fn split_list_string(raw: &str) -> Vec<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '"')
        .collect();
    let inner = cleaned.strip_prefix('[').unwrap_or(&cleaned);
    let inner = inner.strip_suffix(']').unwrap_or(inner);

    if inner.is_empty() {
        return Vec::new();
    }
    inner.split(',').map(str::to_string).collect()
}

/// Either branch of a list-valued field, as items. `None` for JSON null.
fn list_items(field: &str, value: Value) -> Result<Option<Vec<Value>>> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => Ok(Some(items)),
        Value::String(raw) => Ok(Some(
            split_list_string(&raw).into_iter().map(Value::String).collect(),
        )),
        other => Err(BrokerError::FieldFormatError {
            field: field.to_string(),
            message: format!(
                "expected an array or a comma separated string, got {}",
                json_kind(&other)
            ),
        }),
    }
}

fn normalize_string_list(field: &str, value: Value) -> Result<Value> {
    let Some(items) = list_items(field, value)? else {
        return Ok(Value::Null);
    };

    items
        .into_iter()
        .filter(|item| item.as_str() != Some(""))
        .map(|item| match item {
            Value::String(s) => Ok(Value::String(s)),
            other => Err(BrokerError::FieldFormatError {
                field: field.to_string(),
                message: format!("expected string items, got {}", json_kind(&other)),
            }),
        })
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

fn normalize_integer_list(field: &str, value: Value) -> Result<Value> {
    let Some(items) = list_items(field, value)? else {
        return Ok(Value::Null);
    };

    items
        .into_iter()
        .map(|item| {
            let parsed = match &item {
                Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
                Value::String(s) => s.trim().parse::<i32>().ok(),
                _ => None,
            };
            parsed.map(Value::from).ok_or_else(|| BrokerError::FieldFormatError {
                field: field.to_string(),
                message: format!("'{}' is not an integer", display_item(&item)),
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

/// Rewrites one key of `fields` in place with the given normalizer.
fn normalize_field(
    fields: &mut Map<String, Value>,
    field: &str,
    normalize: fn(&str, Value) -> Result<Value>,
) -> Result<()> {
    if let Some(value) = fields.get_mut(field) {
        let raw = value.take();
        *value = normalize(field, raw)?;
    }
    Ok(())
}

fn into_object(value: Value) -> Result<Option<Map<String, Value>>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(BrokerError::FieldFormatError {
            field: "parameters".to_string(),
            message: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
    }
}

fn parse_body(raw: &[u8]) -> Result<Value> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(raw)?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn display_item(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Presence-tracking value for update requests.
///
/// `Unset` means the key was absent (leave unchanged), `Null` means the key
/// was sent as JSON null, `Set` carries the value that was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Unset,
    Null,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unset
    }
}

impl<T> Patch<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Patch::Unset)
    }

    pub fn is_present(&self) -> bool {
        !self.is_unset()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Patch::Null)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Patch::Set(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: Clone + Default> Patch<T> {
    /// Value to send to the provider: `Null` clears to the empty value,
    /// `Unset` sends nothing.
    pub fn to_update(&self) -> Option<T> {
        match self {
            Patch::Unset => None,
            Patch::Null => Some(T::default()),
            Patch::Set(value) => Some(value.clone()),
        }
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Patch::Set(value) => value.serialize(serializer),
            Patch::Unset | Patch::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(|value| value.map_or(Patch::Null, Patch::Set))
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvisionParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vpc_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subnet_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub security_group_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub availability_zones: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub engine: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub engine_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_strategy_savedays: Option<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub backup_strategy_backup_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backup_strategy_backup_at: Vec<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub backup_strategy_begin_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub backup_strategy_period_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub maintain_begin: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub maintain_end: String,
    #[serde(flatten)]
    pub unknown_fields: Map<String, Value>,
}

impl ProvisionParameters {
    /// Decodes a raw request body. An empty body yields empty parameters.
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        Self::from_value(parse_body(raw)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Some(mut fields) = into_object(value)? else {
            return Ok(Self::default());
        };

        normalize_field(&mut fields, AVAILABILITY_ZONES, normalize_string_list)?;
        normalize_field(&mut fields, BACKUP_AT, normalize_integer_list)?;

        // A declared key sent as null is the same as an absent one.
        for (name, _) in PROVISION_FIELDS {
            if fields.get(*name).is_some_and(Value::is_null) {
                fields.remove(*name);
            }
        }

        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    /// Flat JSON object of the declared fields followed by the unknown ones.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn backup_policy(&self) -> Option<BackupPolicy> {
        let policy = BackupPolicy {
            save_days: self.backup_strategy_savedays,
            backup_type: self.backup_strategy_backup_type.clone(),
            periodical_backup_plan: PeriodicalBackupPlan {
                begin_at: self.backup_strategy_begin_at.clone(),
                period_type: self.backup_strategy_period_type.clone(),
                backup_at: self.backup_strategy_backup_at.clone(),
            },
        };
        (!policy.is_empty()).then_some(policy)
    }
}

impl fmt::Debug for ProvisionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionParameters")
            .field("name", &self.name)
            .field("engine", &self.engine)
            .field("engine_version", &self.engine_version)
            .field("capacity", &self.capacity)
            .field("product_id", &self.product_id)
            .field("availability_zones", &self.availability_zones)
            .field("vpc_id", &self.vpc_id)
            .field("subnet_id", &self.subnet_id)
            .field("security_group_id", &self.security_group_id)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("unknown_fields", &self.unknown_fields)
            .finish_non_exhaustive()
    }
}

impl Validate for ProvisionParameters {
    fn validate(&self) -> Result<()> {
        if let Some(capacity) = self.capacity {
            validate_positive_number("capacity", capacity as usize, 1)?;
        }
        validate_maintenance_window(
            (!self.maintain_begin.is_empty()).then_some(self.maintain_begin.as_str()),
            (!self.maintain_end.is_empty()).then_some(self.maintain_end.as_str()),
        )?;
        if !self.backup_strategy_begin_at.is_empty() {
            validate_backup_window(&self.backup_strategy_begin_at)?;
        }
        Ok(())
    }
}

fn validate_maintenance_window(begin: Option<&str>, end: Option<&str>) -> Result<()> {
    match (begin, end) {
        (None, None) => Ok(()),
        (Some(begin), Some(end)) => {
            validate_time_of_day("maintain_begin", begin)?;
            validate_time_of_day("maintain_end", end)
        }
        (Some(_), None) | (None, Some(_)) => Err(BrokerError::ValidationError {
            field: "maintain_begin".to_string(),
            message: "maintain_begin and maintain_end must be set together".to_string(),
        }),
    }
}

/// `HH:MM-HH:MM` window the provider starts backups in.
fn validate_backup_window(window: &str) -> Result<()> {
    let Some((from, to)) = window.split_once('-') else {
        return Err(BrokerError::ValidationError {
            field: "backup_strategy_begin_at".to_string(),
            message: format!("'{}' is not a HH:MM-HH:MM window", window),
        });
    };
    validate_time_of_day("backup_strategy_begin_at", from)?;
    validate_time_of_day("backup_strategy_begin_at", to)
}

impl TryFrom<ProvisionParameters> for CreateInstanceOpts {
    type Error = BrokerError;

    fn try_from(params: ProvisionParameters) -> Result<Self> {
        let required = |field: &str, value: &str| validate_non_empty_string(field, value);

        required("name", &params.name)?;
        required("product_id", &params.product_id)?;
        required("vpc_id", &params.vpc_id)?;
        required("subnet_id", &params.subnet_id)?;
        required("security_group_id", &params.security_group_id)?;

        let engine = Engine::parse(&params.engine).ok_or_else(|| BrokerError::ValidationError {
            field: "engine".to_string(),
            message: format!("'{}' is not a recognized engine", params.engine),
        })?;

        if params.availability_zones.is_empty() {
            return Err(BrokerError::ValidationError {
                field: AVAILABILITY_ZONES.to_string(),
                message: "at least one availability zone is required".to_string(),
            });
        }

        // Flattened next to the declared fields, so a colliding key would go
        // out twice and could override a resolved value.
        if let Some(key) = params
            .unknown_fields
            .keys()
            .find(|key| CREATE_WIRE_FIELDS.contains(&key.as_str()))
        {
            return Err(BrokerError::FieldFormatError {
                field: key.clone(),
                message: "reserved for the broker; use the declared parameter instead".to_string(),
            });
        }

        let instance_backup_policy = params.backup_policy();

        Ok(CreateInstanceOpts {
            name: params.name,
            description: params.description,
            engine,
            engine_version: params.engine_version,
            capacity: params.capacity,
            access_user: params.username,
            password: params.password,
            vpc_id: params.vpc_id,
            subnet_id: params.subnet_id,
            security_group_id: params.security_group_id,
            available_zones: params.availability_zones,
            product_id: params.product_id,
            instance_backup_policy,
            maintain_begin: params.maintain_begin,
            maintain_end: params.maintain_end,
            extra: params.unknown_fields,
        })
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateParameters {
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub name: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub description: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub backup_strategy_savedays: Patch<u32>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub backup_strategy_backup_type: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub backup_strategy_backup_at: Patch<Vec<i32>>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub backup_strategy_begin_at: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub backup_strategy_period_type: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub maintain_begin: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub maintain_end: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub security_group_id: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub new_capacity: Patch<u32>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub old_password: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub new_password: Patch<String>,
    #[serde(flatten)]
    pub unknown_fields: Map<String, Value>,
}

impl UpdateParameters {
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        Self::from_value(parse_body(raw)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Some(mut fields) = into_object(value)? else {
            return Ok(Self::default());
        };

        normalize_field(&mut fields, BACKUP_AT, normalize_integer_list)?;

        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn backup_policy(&self) -> Option<BackupPolicy> {
        let touched = self.backup_strategy_savedays.is_present()
            || self.backup_strategy_backup_type.is_present()
            || self.backup_strategy_backup_at.is_present()
            || self.backup_strategy_begin_at.is_present()
            || self.backup_strategy_period_type.is_present();
        if !touched {
            return None;
        }

        Some(BackupPolicy {
            save_days: self.backup_strategy_savedays.as_set().copied(),
            backup_type: self.backup_strategy_backup_type.to_update().unwrap_or_default(),
            periodical_backup_plan: PeriodicalBackupPlan {
                begin_at: self.backup_strategy_begin_at.to_update().unwrap_or_default(),
                period_type: self.backup_strategy_period_type.to_update().unwrap_or_default(),
                backup_at: self.backup_strategy_backup_at.to_update().unwrap_or_default(),
            },
        })
    }

    /// Fields handled by the provider's modify call.
    pub fn to_update_opts(&self) -> UpdateInstanceOpts {
        UpdateInstanceOpts {
            name: self.name.as_set().cloned(),
            description: self.description.to_update(),
            instance_backup_policy: self.backup_policy(),
            maintain_begin: self.maintain_begin.as_set().cloned(),
            maintain_end: self.maintain_end.as_set().cloned(),
            security_group_id: self.security_group_id.as_set().cloned(),
        }
    }

    pub fn password_change(&self) -> Option<PasswordChange> {
        match (&self.old_password, &self.new_password) {
            (Patch::Set(old), Patch::Set(new)) => Some(PasswordChange {
                old_password: old.clone(),
                new_password: new.clone(),
            }),
            _ => None,
        }
    }

    pub fn new_capacity(&self) -> Option<u32> {
        self.new_capacity.as_set().copied()
    }
}

impl fmt::Debug for UpdateParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret = |patch: &Patch<String>| match patch {
            Patch::Set(value) => Patch::Set(redacted(value)),
            Patch::Null => Patch::Null,
            Patch::Unset => Patch::Unset,
        };
        f.debug_struct("UpdateParameters")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("maintain_begin", &self.maintain_begin)
            .field("maintain_end", &self.maintain_end)
            .field("security_group_id", &self.security_group_id)
            .field("new_capacity", &self.new_capacity)
            .field("old_password", &secret(&self.old_password))
            .field("new_password", &secret(&self.new_password))
            .field("unknown_fields", &self.unknown_fields)
            .finish_non_exhaustive()
    }
}

impl Validate for UpdateParameters {
    fn validate(&self) -> Result<()> {
        match &self.name {
            Patch::Unset => {}
            Patch::Set(name) => validate_non_empty_string("name", name)?,
            Patch::Null => {
                return Err(BrokerError::ValidationError {
                    field: "name".to_string(),
                    message: "name cannot be cleared".to_string(),
                })
            }
        }

        // The provider has no "clear" for these, so null cannot mean anything.
        let not_clearable = [
            ("maintain_begin", self.maintain_begin.is_null()),
            ("maintain_end", self.maintain_end.is_null()),
            ("security_group_id", self.security_group_id.is_null()),
            ("new_capacity", self.new_capacity.is_null()),
            ("old_password", self.old_password.is_null()),
            ("new_password", self.new_password.is_null()),
        ];
        if let Some((field, _)) = not_clearable.iter().find(|(_, is_null)| *is_null) {
            return Err(BrokerError::ValidationError {
                field: field.to_string(),
                message: format!("{} cannot be cleared", field),
            });
        }

        if let Patch::Set(capacity) = self.new_capacity {
            validate_positive_number("new_capacity", capacity as usize, 1)?;
        }

        let password_fields = (
            self.old_password.as_set().is_some(),
            self.new_password.as_set().is_some(),
        );
        if password_fields.0 != password_fields.1 {
            return Err(BrokerError::ValidationError {
                field: "new_password".to_string(),
                message: "old_password and new_password must be set together".to_string(),
            });
        }

        validate_maintenance_window(
            self.maintain_begin.as_set().map(String::as_str),
            self.maintain_end.as_set().map(String::as_str),
        )?;

        if let Patch::Set(window) = &self.backup_strategy_begin_at {
            validate_backup_window(window)?;
        }
        Ok(())
    }
}
