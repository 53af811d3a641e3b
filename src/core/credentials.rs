use crate::domain::model::{instance_status, BindingCredential, Instance, ServicePlan};
use crate::utils::error::{BrokerError, Result};
use serde_json::{Map, Value};

/// Keys under which the operation store keeps provision-time secrets.
pub const ADDITIONAL_PARAM_USERNAME: &str = "username";
pub const ADDITIONAL_PARAM_PASSWORD: &str = "password";

/// Builds connection credentials from a live instance.
///
/// The provider never returns passwords, so the password (and a username
/// when the instance has no access user) comes from `stored`, then from
/// `requested`.
pub fn extract_credentials(
    instance: &Instance,
    plan: &ServicePlan,
    stored: &Map<String, Value>,
    requested: &Map<String, Value>,
) -> Result<BindingCredential> {
    if instance.status != instance_status::RUNNING {
        return Err(BrokerError::InstanceNotReady {
            instance_id: instance.instance_id.clone(),
            status: instance.status.clone(),
        });
    }

    let lookup = |key: &str| {
        [stored, requested]
            .into_iter()
            .find_map(|params| {
                params
                    .get(key)
                    .and_then(Value::as_str)
                    .filter(|value| !value.is_empty())
            })
            .map(str::to_string)
    };

    let username = if instance.access_user.is_empty() {
        lookup(ADDITIONAL_PARAM_USERNAME).unwrap_or_default()
    } else {
        instance.access_user.clone()
    };

    Ok(BindingCredential {
        host: instance.ip.clone(),
        port: (instance.port != 0).then_some(instance.port),
        username,
        password: lookup(ADDITIONAL_PARAM_PASSWORD).unwrap_or_default(),
        name: instance.name.clone(),
        resource_type: plan.engine.resource_type().to_string(),
    })
}
