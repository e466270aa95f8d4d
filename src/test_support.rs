use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::{
    arm::ArmError,
    domain::{
        deployment::DeploymentRequest,
        resource::{DeploymentRecord, Location, ResourceGroup, ResourceId, SubscriptionId},
    },
    usecases::contracts::ResourceManager,
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Subscription,
    ResourceGroup,
    Deployment,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedDeployment {
    pub resource_group: String,
    pub name: String,
    pub template: String,
    pub parameters: serde_json::Value,
}

/// Resource manager that completes every operation immediately, except the
/// ones it was told to fail.
#[derive(Debug, Default)]
pub struct StubResourceManager {
    failures: Vec<Failure>,
    calls: Mutex<Vec<String>>,
    submitted: Mutex<Option<SubmittedDeployment>>,
}

impl StubResourceManager {
    pub fn failing(failure: Failure) -> Self {
        Self::failing_many(&[failure])
    }

    pub fn failing_many(failures: &[Failure]) -> Self {
        Self {
            failures: failures.to_vec(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn delete_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.as_str() == "delete_resource_group")
            .count()
    }

    pub fn submitted(&self) -> Option<SubmittedDeployment> {
        self.submitted.lock().expect("submitted lock").clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().expect("calls lock").push(call.to_owned());
    }

    fn fails(&self, failure: Failure) -> bool {
        self.failures.contains(&failure)
    }
}

#[async_trait]
impl ResourceManager for StubResourceManager {
    async fn resolve_subscription(&self) -> Result<SubscriptionId, ArmError> {
        self.record("resolve_subscription");
        if self.fails(Failure::Subscription) {
            return Err(ArmError::CredentialUnavailable(
                "EnvironmentCredential: not configured".to_owned(),
            ));
        }
        Ok(SubscriptionId::new("sub-1"))
    }

    async fn create_resource_group(
        &self,
        subscription: &SubscriptionId,
        name: &str,
        location: &Location,
    ) -> Result<ResourceGroup, ArmError> {
        self.record("create_resource_group");
        if self.fails(Failure::ResourceGroup) {
            return Err(ArmError::Service {
                status: 403,
                code: "AuthorizationFailed".to_owned(),
                message: "caller cannot write resource groups".to_owned(),
            });
        }
        Ok(ResourceGroup {
            id: ResourceId::for_resource_group(subscription, name),
            name: name.to_owned(),
            location: location.clone(),
            provisioning_state: Some("Succeeded".to_owned()),
        })
    }

    async fn create_deployment(
        &self,
        resource_group: &ResourceId,
        request: &DeploymentRequest,
    ) -> Result<DeploymentRecord, ArmError> {
        self.record("create_deployment");
        *self.submitted.lock().expect("submitted lock") = Some(SubmittedDeployment {
            resource_group: resource_group.to_string(),
            name: request.name().to_owned(),
            template: request.template().to_owned(),
            parameters: request.parameters().clone(),
        });

        if self.fails(Failure::Deployment) {
            return Err(ArmError::Service {
                status: 400,
                code: "InvalidTemplateDeployment".to_owned(),
                message: "The template deployment failed validation.".to_owned(),
            });
        }
        Ok(DeploymentRecord {
            id: ResourceId::new(format!(
                "{resource_group}/providers/Microsoft.Resources/deployments/{}",
                request.name()
            )),
            name: request.name().to_owned(),
            provisioning_state: Some("Succeeded".to_owned()),
            outputs: None,
        })
    }

    async fn delete_resource_group(&self, _resource_group: &ResourceId) -> Result<(), ArmError> {
        self.record("delete_resource_group");
        if self.fails(Failure::Delete) {
            return Err(ArmError::OperationFailed {
                status: "Failed".to_owned(),
                code: "ResourceGroupDeletionBlocked".to_owned(),
                message: "a lock prevents deleting the resource group".to_owned(),
            });
        }
        Ok(())
    }
}
