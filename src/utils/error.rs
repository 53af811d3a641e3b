use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Malformed request parameters: {0}")]
    DecodeError(#[from] serde_json::Error),

    #[error("Invalid format for field '{field}': {message}")]
    FieldFormatError { field: String, message: String },

    #[error("Service plan not found: service '{service_id}', plan '{plan_id}'")]
    PlanNotFound { service_id: String, plan_id: String },

    #[error("Unknown service family '{family}' for service '{service_id}'")]
    UnknownServiceFamily { service_id: String, family: String },

    #[error("No available {resource} found in inventory")]
    ResourceExhausted { resource: String },

    #[error("Provider call '{operation}' failed{}: {message}", status_suffix(.status))]
    ProviderError {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    #[error("API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("No value for '{field}' in the request and no default is configured")]
    ConfigurationGap { field: String },

    #[error("Validation error on '{field}': {message}")]
    ValidationError { field: String, message: String },

    #[error("Instance '{instance_id}' is not ready (status: {status})")]
    InstanceNotReady { instance_id: String, status: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<BrokerError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller sent something we cannot use.
    Request,
    /// The catalog or environment is missing something.
    Configuration,
    /// The provider refused or has nothing left to hand out.
    Provider,
    Internal,
}

impl BrokerError {
    /// Wraps `self` with the name of the orchestration stage it came from.
    pub fn at_stage(self, stage: &'static str) -> Self {
        BrokerError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Innermost error, with every stage wrapper removed.
    pub fn root(&self) -> &BrokerError {
        match self {
            BrokerError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Outermost stage name, if the error has been wrapped.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            BrokerError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.root() {
            BrokerError::DecodeError(_)
            | BrokerError::FieldFormatError { .. }
            | BrokerError::PlanNotFound { .. }
            | BrokerError::ValidationError { .. } => ErrorCategory::Request,
            BrokerError::UnknownServiceFamily { .. }
            | BrokerError::ConfigurationGap { .. }
            | BrokerError::ConfigError { .. }
            | BrokerError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            BrokerError::ResourceExhausted { .. }
            | BrokerError::ProviderError { .. }
            | BrokerError::HttpError(_)
            | BrokerError::InstanceNotReady { .. } => ErrorCategory::Provider,
            BrokerError::IoError(_) | BrokerError::Stage { .. } => ErrorCategory::Internal,
        }
    }

    /// Status code the broker-protocol layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self.root() {
            BrokerError::DecodeError(_)
            | BrokerError::FieldFormatError { .. }
            | BrokerError::PlanNotFound { .. }
            | BrokerError::ValidationError { .. } => 400,
            BrokerError::ProviderError {
                status: Some(404), ..
            } => 404,
            BrokerError::InstanceNotReady { .. } => 409,
            BrokerError::ResourceExhausted { .. } => 422,
            BrokerError::ProviderError { .. } | BrokerError::HttpError(_) => 502,
            _ => 500,
        }
    }

    /// True when the provider reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            BrokerError::ProviderError {
                status: Some(404),
                ..
            }
        )
    }

    pub fn recovery_suggestion(&self) -> String {
        match self.root() {
            BrokerError::DecodeError(_) | BrokerError::FieldFormatError { .. } => {
                "Check the request parameters: list fields accept a JSON array or a comma separated string".to_string()
            }
            BrokerError::PlanNotFound { .. } => {
                "Make sure the service and plan ids exist in the broker catalog".to_string()
            }
            BrokerError::UnknownServiceFamily { .. } => {
                "Set the service family to one of: redis, memcached, imdg".to_string()
            }
            BrokerError::ResourceExhausted { resource } => {
                format!("Pass an explicit {} in the request or try another region", resource)
            }
            BrokerError::ConfigurationGap { field } => {
                format!("Pass '{}' in the request or configure it under [network]", field)
            }
            BrokerError::InstanceNotReady { .. } => {
                "Wait for the instance to reach RUNNING and retry".to_string()
            }
            BrokerError::ProviderError { .. } | BrokerError::HttpError(_) => {
                "Check provider endpoint, project id and auth token".to_string()
            }
            _ => "Check the broker configuration and logs".to_string(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|s| format!(" with status {}", s))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, BrokerError>;
