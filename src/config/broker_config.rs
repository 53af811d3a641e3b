use crate::domain::model::PlanParameters;
use crate::domain::ports::{NetworkDefaults, NetworkSelector};
use crate::utils::error::{BrokerError, Result};
use crate::utils::validation::{validate_range, validate_required_config, validate_url, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub broker: BrokerInfo,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerInfo {
    pub name: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub project_id: String,
    #[serde(default)]
    pub auth_token: String,
    pub timeout_seconds: Option<u64>,
}

/// Environment-level network defaults for instances created without
/// explicit selectors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub vpc_id: Option<String>,
    pub subnet_id: Option<String>,
    pub security_group_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Engine family; the service name is used when absent.
    pub family: Option<String>,
    #[serde(default)]
    pub plans: Vec<PlanDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: PlanParameters,
}

impl BrokerConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BrokerError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| BrokerError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DCS_AUTH_TOKEN})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| BrokerError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_required_config("broker.region", &self.broker.region)?;
        validate_url("provider.endpoint", &self.provider.endpoint)?;
        validate_required_config("provider.project_id", &self.provider.project_id)?;
        if let Some(timeout) = self.provider.timeout_seconds {
            validate_range("provider.timeout_seconds", timeout, 1, 300)?;
        }

        let mut service_ids = HashSet::new();
        for service in &self.services {
            if !service_ids.insert(service.id.as_str()) {
                return Err(BrokerError::ConfigError {
                    message: format!("duplicate service id '{}'", service.id),
                });
            }

            let mut plan_ids = HashSet::new();
            for plan in &service.plans {
                if !plan_ids.insert(plan.id.as_str()) {
                    return Err(BrokerError::ConfigError {
                        message: format!(
                            "duplicate plan id '{}' in service '{}'",
                            plan.id, service.id
                        ),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn region(&self) -> &str {
        &self.broker.region
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.provider
                .timeout_seconds
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        )
    }
}

impl Validate for BrokerConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

impl NetworkDefaults for NetworkConfig {
    fn default_for(&self, selector: NetworkSelector) -> Option<String> {
        let value = match selector {
            NetworkSelector::Vpc => &self.vpc_id,
            NetworkSelector::Subnet => &self.subnet_id,
            NetworkSelector::SecurityGroup => &self.security_group_id,
        };
        value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[broker]
name = "dcs-broker"
region = "cn-north-1"

[provider]
endpoint = "https://dcs.cn-north-1.example.com"
project_id = "project-1"
auth_token = "token"

[network]
vpc_id = "vpc-default"

[[services]]
id = "svc-redis"
name = "dcs-redis"

[[services.plans]]
id = "plan-redis-2g"
name = "redis-2g"

[services.plans.parameters]
engine_version = "3.0"
capacity = 2
availability_zones = ["az1"]
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = BrokerConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.region(), "cn-north-1");
        assert_eq!(config.services.len(), 1);
        let plan = &config.services[0].plans[0];
        assert_eq!(plan.parameters.capacity, Some(2));
        assert_eq!(plan.parameters.availability_zones, vec!["az1"]);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_network_defaults_skip_blank_values() {
        let mut config = BrokerConfig::from_toml_str(BASIC).unwrap();
        config.network.subnet_id = Some("  ".to_string());

        assert_eq!(
            config.network.default_for(NetworkSelector::Vpc).as_deref(),
            Some("vpc-default")
        );
        assert_eq!(config.network.default_for(NetworkSelector::Subnet), None);
        assert_eq!(config.network.default_for(NetworkSelector::SecurityGroup), None);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_DCS_AUTH_TOKEN", "from-env");

        let content = BASIC.replace("auth_token = \"token\"", "auth_token = \"${TEST_DCS_AUTH_TOKEN}\"");
        let config = BrokerConfig::from_toml_str(&content).unwrap();
        assert_eq!(config.provider.auth_token, "from-env");

        std::env::remove_var("TEST_DCS_AUTH_TOKEN");
    }

    #[test]
    fn test_config_validation() {
        let content = BASIC.replace("https://dcs.cn-north-1.example.com", "invalid-url");
        let config = BrokerConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());

        let mut config = BrokerConfig::from_toml_str(BASIC).unwrap();
        let duplicate = config.services[0].clone();
        config.services.push(duplicate);
        assert!(matches!(
            config.validate(),
            Err(BrokerError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = BrokerConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.broker.name, "dcs-broker");
    }
}
