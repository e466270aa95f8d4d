//! Azure Resource Manager integration: REST client, credentials, and
//! long-running operation polling.

pub mod credential;
mod error;
pub mod lro;
mod models;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;

pub use error::ArmError;

use crate::{
    arm::{
        credential::TokenCredential,
        lro::{wait_until_done, OperationKind, PollSettings},
        models::{
            DeploymentBody, DeploymentResponse, ErrorEnvelope, ResourceGroupBody,
            ResourceGroupResponse, SubscriptionList,
        },
    },
    domain::{
        deployment::DeploymentRequest,
        resource::{DeploymentRecord, Location, ResourceGroup, ResourceId, SubscriptionId},
    },
    infra::{config::AppConfig, error::AppError, secrets::sanitize_response_body},
    usecases::contracts::ResourceManager,
};

const RESOURCES_API_VERSION: &str = "2021-04-01";
const SUBSCRIPTIONS_API_VERSION: &str = "2022-12-01";
const CONNECT_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Returns the arm module name for smoke checks.
pub fn module_name() -> &'static str {
    "arm"
}

pub fn http_client() -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(concat!("armdeploy/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(AppError::ClientInit)
}

/// Connection to the management API, optionally pinned to one subscription.
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    credential: Arc<dyn TokenCredential>,
    subscription_id: Option<SubscriptionId>,
    poll: PollSettings,
}

impl std::fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmClient")
            .field("endpoint", &self.endpoint)
            .field("credential", &self.credential.name())
            .field("subscription_id", &self.subscription_id)
            .field("poll", &self.poll)
            .finish()
    }
}

impl ArmClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        credential: Arc<dyn TokenCredential>,
        subscription_id: Option<SubscriptionId>,
        poll: PollSettings,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            credential,
            subscription_id,
            poll,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        http: reqwest::Client,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        let poll = PollSettings {
            interval: Duration::from_millis(config.lro.poll_interval_ms),
            timeout: config.lro.timeout_secs.map(Duration::from_secs),
        };

        Self::new(
            http,
            &config.azure.resource_manager_endpoint,
            credential,
            config.azure.subscription_id.clone().map(SubscriptionId::new),
            poll,
        )
    }

    pub(crate) fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    fn scope(&self) -> String {
        format!("{}/.default", self.endpoint)
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{path}?api-version={api_version}", self.endpoint)
    }

    async fn authorized(&self, method: Method, url: &str) -> Result<RequestBuilder, ArmError> {
        let token = self.credential.get_token(&self.scope()).await?;
        Ok(self.http.request(method, url).bearer_auth(token.secret))
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<Response, ArmError> {
        tracing::debug!(%method, %url, "resource manager request");
        let mut request = self.authorized(method, url).await?;
        if let Some(body) = body {
            request = request.json(body);
        }
        check_status(request.send().await?).await
    }

    pub(crate) async fn get_absolute(&self, url: &str) -> Result<Response, ArmError> {
        self.send::<()>(Method::GET, url, None).await
    }

    async fn default_subscription(&self) -> Result<SubscriptionId, ArmError> {
        let url = self.url("/subscriptions", SUBSCRIPTIONS_API_VERSION);
        let list: SubscriptionList = self.get_absolute(&url).await?.json().await?;

        let chosen = list
            .value
            .iter()
            .find(|entry| {
                entry
                    .state
                    .as_deref()
                    .is_some_and(|state| state.eq_ignore_ascii_case("enabled"))
            })
            .or_else(|| list.value.first())
            .ok_or_else(|| {
                ArmError::InvalidResponse("no subscription is visible to this identity".to_owned())
            })?;

        Ok(SubscriptionId::new(chosen.subscription_id.clone()))
    }
}

#[async_trait]
impl ResourceManager for ArmClient {
    async fn resolve_subscription(&self) -> Result<SubscriptionId, ArmError> {
        match &self.subscription_id {
            Some(subscription) => Ok(subscription.clone()),
            None => {
                let subscription = self.default_subscription().await?;
                tracing::info!(%subscription, "using default subscription");
                Ok(subscription)
            }
        }
    }

    async fn create_resource_group(
        &self,
        subscription: &SubscriptionId,
        name: &str,
        location: &Location,
    ) -> Result<ResourceGroup, ArmError> {
        let id = ResourceId::for_resource_group(subscription, name);
        let url = self.url(id.as_str(), RESOURCES_API_VERSION);
        let body = ResourceGroupBody {
            location: location.as_str(),
        };

        let response = self.send(Method::PUT, &url, Some(&body)).await?;
        let resource = wait_until_done(self, response, &url, OperationKind::CreateOrUpdate)
            .await?
            .ok_or_else(|| ArmError::InvalidResponse("resource group body missing".to_owned()))?;

        let group: ResourceGroupResponse = serde_json::from_value(resource).map_err(|error| {
            ArmError::InvalidResponse(format!("malformed resource group: {error}"))
        })?;
        Ok(group.into())
    }

    async fn create_deployment(
        &self,
        resource_group: &ResourceId,
        request: &DeploymentRequest,
    ) -> Result<DeploymentRecord, ArmError> {
        let path = format!(
            "{resource_group}/providers/Microsoft.Resources/deployments/{}",
            request.name()
        );
        let url = self.url(&path, RESOURCES_API_VERSION);
        let body = DeploymentBody::from(request);

        let response = self.send(Method::PUT, &url, Some(&body)).await?;
        let resource = wait_until_done(self, response, &url, OperationKind::CreateOrUpdate)
            .await?
            .ok_or_else(|| ArmError::InvalidResponse("deployment body missing".to_owned()))?;

        let deployment: DeploymentResponse = serde_json::from_value(resource).map_err(|error| {
            ArmError::InvalidResponse(format!("malformed deployment: {error}"))
        })?;
        Ok(deployment.into())
    }

    async fn delete_resource_group(&self, resource_group: &ResourceId) -> Result<(), ArmError> {
        let url = self.url(resource_group.as_str(), RESOURCES_API_VERSION);

        let response = self.send::<()>(Method::DELETE, &url, None).await?;
        wait_until_done(self, response, &url, OperationKind::Delete).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, ArmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => (envelope.error.code_or_unknown(), envelope.error.describe()),
        Err(_) => (
            status
                .canonical_reason()
                .unwrap_or("Unknown")
                .replace(' ', ""),
            sanitize_response_body(&body),
        ),
    };

    tracing::warn!(status = status.as_u16(), %code, "resource manager rejected request");
    Err(ArmError::Service {
        status: status.as_u16(),
        code,
        message,
    })
}
