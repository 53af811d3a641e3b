use crate::config::broker_config::BrokerConfig;
use crate::core::ProviderClient;
use crate::domain::model::{
    AvailabilityZone, CreateInstanceOpts, CreatedInstance, Instance, PasswordChange, ProductTier,
    UpdateInstanceOpts,
};
use crate::utils::error::{BrokerError, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};
use std::time::Duration;

const AUTH_HEADER: &str = "X-Auth-Token";

/// DCS v1 REST client.
pub struct HttpProviderClient {
    client: Client,
    endpoint: String,
    project_id: String,
    auth_token: String,
    timeout: Duration,
}

impl HttpProviderClient {
    pub fn new(
        endpoint: impl Into<String>,
        project_id: impl Into<String>,
        auth_token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            auth_token: auth_token.into(),
            timeout,
        }
    }

    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::new(
            config.provider.endpoint.clone(),
            config.provider.project_id.clone(),
            config.provider.auth_token.clone(),
            config.request_timeout(),
        )
    }

    fn instances_url(&self) -> String {
        format!("{}/v1.0/{}/instances", self.endpoint, self.project_id)
    }

    fn instance_url(&self, instance_id: &str) -> String {
        format!("{}/{}", self.instances_url(), instance_id)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut request = self.client.request(method, url).timeout(self.timeout);
        if !self.auth_token.is_empty() {
            request = request.header(AUTH_HEADER, &self.auth_token);
        }
        request
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("{} response status: {}", operation, status);

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BrokerError::ProviderError {
            operation: operation.to_string(),
            status: Some(status.as_u16()),
            message: provider_message(&body),
        })
    }
}

/// `error_code: error_msg` from a provider error body, or the raw body.
fn provider_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        error_code: String,
        #[serde(default)]
        error_msg: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) if !err.error_msg.is_empty() => {
            if err.error_code.is_empty() {
                err.error_msg
            } else {
                format!("{}: {}", err.error_code, err.error_msg)
            }
        }
        _ if body.trim().is_empty() => "empty response body".to_string(),
        _ => body.trim().to_string(),
    }
}

/// The provider reports availability as either a boolean or "true"/"false".
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Text(String),
    }

    Ok(match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(value) => value,
        BoolOrString::Text(text) => text.trim().eq_ignore_ascii_case("true"),
    })
}

#[derive(Deserialize)]
struct AvailableZonesResponse {
    #[serde(default)]
    region_id: String,
    #[serde(default)]
    available_zones: Vec<WireZone>,
}

#[derive(Deserialize)]
struct WireZone {
    id: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    name: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    resource_availability: bool,
}

#[derive(Deserialize)]
struct ProductsResponse {
    #[serde(default)]
    products: Vec<WireProduct>,
}

#[derive(Deserialize)]
struct WireProduct {
    #[serde(default)]
    product_id: String,
    #[serde(default)]
    spec_code: String,
    #[serde(default)]
    engine: String,
    #[serde(default)]
    engine_version: String,
    #[serde(default)]
    charging_type: String,
    #[serde(flatten)]
    attributes: Map<String, Value>,
}

#[derive(Deserialize)]
struct PasswordResponse {
    #[serde(default)]
    result: String,
    #[serde(default)]
    message: String,
}

#[async_trait::async_trait]
impl ProviderClient for HttpProviderClient {
    async fn list_availability_zones(&self, region: &str) -> Result<Vec<AvailabilityZone>> {
        let url = format!("{}/v1.0/availableZones", self.endpoint);
        tracing::debug!("Listing dcs availability zones in {} from {}", region, url);

        let response = self
            .send(
                "list dcs availability zones",
                self.request(Method::GET, &url),
            )
            .await?;
        let body: AvailableZonesResponse = response.json().await?;

        if !body.region_id.is_empty() && body.region_id != region {
            tracing::warn!(
                "Availability zones are for region {}, broker is configured for {}",
                body.region_id,
                region
            );
        }

        Ok(body
            .available_zones
            .into_iter()
            .map(|zone| AvailabilityZone {
                id: zone.id,
                code: zone.code,
                name: zone.name,
                resource_available: zone.resource_availability,
            })
            .collect())
    }

    async fn list_product_tiers(&self) -> Result<Vec<ProductTier>> {
        let url = format!("{}/v1.0/products", self.endpoint);
        let response = self
            .send("list dcs products", self.request(Method::GET, &url))
            .await?;
        let body: ProductsResponse = response.json().await?;

        Ok(body
            .products
            .into_iter()
            .map(|product| ProductTier {
                id: product.product_id,
                spec_code: product.spec_code,
                engine: product.engine,
                engine_version: product.engine_version,
                charging_type: product.charging_type,
                attributes: product.attributes,
            })
            .collect())
    }

    async fn create_instance(&self, opts: &CreateInstanceOpts) -> Result<CreatedInstance> {
        let url = self.instances_url();
        let response = self
            .send(
                "create dcs instance",
                self.request(Method::POST, &url).json(opts),
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn get_instance(&self, instance_id: &str) -> Result<Instance> {
        let url = self.instance_url(instance_id);
        let response = self
            .send("get dcs instance", self.request(Method::GET, &url))
            .await?;
        Ok(response.json().await?)
    }

    async fn update_instance(&self, instance_id: &str, opts: &UpdateInstanceOpts) -> Result<()> {
        let url = self.instance_url(instance_id);
        self.send(
            "update dcs instance",
            self.request(Method::PUT, &url).json(opts),
        )
        .await?;
        Ok(())
    }

    async fn extend_instance(&self, instance_id: &str, new_capacity: u32) -> Result<()> {
        let url = format!("{}/extend", self.instance_url(instance_id));
        self.send(
            "extend dcs instance",
            self.request(Method::POST, &url)
                .json(&json!({ "new_capacity": new_capacity })),
        )
        .await?;
        Ok(())
    }

    async fn update_password(&self, instance_id: &str, change: &PasswordChange) -> Result<()> {
        let url = format!("{}/password", self.instance_url(instance_id));
        let response = self
            .send(
                "update dcs instance password",
                self.request(Method::PUT, &url).json(change),
            )
            .await?;

        let text = response.text().await?;
        if let Ok(body) = serde_json::from_str::<PasswordResponse>(&text) {
            if !body.result.is_empty() && !body.result.eq_ignore_ascii_case("success") {
                return Err(BrokerError::ProviderError {
                    operation: "update dcs instance password".to_string(),
                    status: None,
                    message: format!("{}: {}", body.result, body.message),
                });
            }
        }
        Ok(())
    }

    async fn delete_instance(&self, instance_id: &str) -> Result<()> {
        let url = self.instance_url(instance_id);
        self.send("delete dcs instance", self.request(Method::DELETE, &url))
            .await?;
        Ok(())
    }
}
