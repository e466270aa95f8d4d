use async_trait::async_trait;

use crate::{
    arm::ArmError,
    domain::{
        deployment::DeploymentRequest,
        resource::{DeploymentRecord, Location, ResourceGroup, ResourceId, SubscriptionId},
    },
};

/// Management operations the deployment driver needs. Every mutating call
/// returns only once the service reports a terminal state.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    async fn resolve_subscription(&self) -> Result<SubscriptionId, ArmError>;

    async fn create_resource_group(
        &self,
        subscription: &SubscriptionId,
        name: &str,
        location: &Location,
    ) -> Result<ResourceGroup, ArmError>;

    async fn create_deployment(
        &self,
        resource_group: &ResourceId,
        request: &DeploymentRequest,
    ) -> Result<DeploymentRecord, ArmError>;

    async fn delete_resource_group(&self, resource_group: &ResourceId) -> Result<(), ArmError>;
}
