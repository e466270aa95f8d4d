//! Request and response bodies of the resource manager REST API.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{value::RawValue, Value};

use crate::domain::{
    deployment::{DeploymentMode, DeploymentRequest},
    resource::{DeploymentRecord, Location, ResourceGroup, ResourceId},
};

#[derive(Debug, Serialize)]
pub(crate) struct ResourceGroupBody<'a> {
    pub location: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProvisioningProperties {
    #[serde(rename = "provisioningState")]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceGroupResponse {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub properties: ProvisioningProperties,
}

impl From<ResourceGroupResponse> for ResourceGroup {
    fn from(response: ResourceGroupResponse) -> Self {
        Self {
            id: ResourceId::new(response.id),
            name: response.name,
            location: Location::new(response.location),
            provisioning_state: response.properties.provisioning_state,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DeploymentBody<'a> {
    pub properties: DeploymentPropertiesBody<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeploymentPropertiesBody<'a> {
    pub mode: DeploymentMode,
    #[serde(serialize_with = "embed_template")]
    pub template: &'a str,
    pub parameters: &'a Value,
}

/// Writes the template text into the body as a JSON object without parsing
/// it into a `Value` first.
fn embed_template<S: Serializer>(text: &&str, serializer: S) -> Result<S::Ok, S::Error> {
    let raw: &RawValue = serde_json::from_str(text).map_err(serde::ser::Error::custom)?;
    raw.serialize(serializer)
}

impl<'a> From<&'a DeploymentRequest> for DeploymentBody<'a> {
    fn from(request: &'a DeploymentRequest) -> Self {
        Self {
            properties: DeploymentPropertiesBody {
                mode: request.mode(),
                template: request.template(),
                parameters: request.parameters(),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeploymentResponseProperties {
    #[serde(rename = "provisioningState")]
    pub provisioning_state: Option<String>,
    pub outputs: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeploymentResponse {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: DeploymentResponseProperties,
}

impl From<DeploymentResponse> for DeploymentRecord {
    fn from(response: DeploymentResponse) -> Self {
        Self {
            id: ResourceId::new(response.id),
            name: response.name,
            provisioning_state: response.properties.provisioning_state,
            outputs: response.properties.outputs,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OperationStatus {
    pub status: String,
    pub error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorDetail {
    pub code: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub details: Vec<ErrorDetail>,
}

impl ErrorDetail {
    pub fn code_or_unknown(&self) -> String {
        self.code.clone().unwrap_or_else(|| "Unknown".to_owned())
    }

    /// Top-level message followed by the nested detail messages, which is
    /// where template deployments put the actual cause.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        self.collect_messages(&mut parts);
        if parts.is_empty() {
            "no error message provided".to_owned()
        } else {
            parts.join("; ")
        }
    }

    fn collect_messages(&self, parts: &mut Vec<String>) {
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            match self.code.as_deref() {
                Some(code) if !parts.is_empty() => parts.push(format!("{code}: {message}")),
                _ => parts.push(message.to_owned()),
            }
        }
        for detail in &self.details {
            detail.collect_messages(parts);
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscriptionList {
    #[serde(default)]
    pub value: Vec<SubscriptionEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscriptionEntry {
    #[serde(rename = "subscriptionId")]
    pub subscription_id: String,
    pub state: Option<String>,
}

pub(crate) fn provisioning_state_of(body: &Value) -> Option<&str> {
    body.get("properties")?
        .get("provisioningState")?
        .as_str()
}
