//! Deploys the App Service template into a fresh resource group and always
//! tears the group down again.
//!
//! The run is strictly sequential: subscription, resource group, template
//! deployment, then cleanup. A failure in any provisioning step skips the
//! remaining ones and is returned to the caller once cleanup has been
//! attempted. Cleanup failures are logged and never replace that error.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{
    arm::ArmError,
    domain::{
        deployment::{DeploymentRequest, InvalidTemplate, SampleParameters},
        lifecycle::{InvalidTransition, LifecyclePhase, LifecycleTracker},
        resource::{DeploymentRecord, Location, ResourceId},
    },
    infra::{config::SampleConfig, console::Console},
    usecases::{
        contracts::ResourceManager,
        template::{load_template, template_path},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSettings {
    pub resource_group_name: String,
    pub deployment_name: String,
    pub location: Location,
    pub parameters: SampleParameters,
}

impl Default for SampleSettings {
    fn default() -> Self {
        Self::from(&SampleConfig::default())
    }
}

impl From<&SampleConfig> for SampleSettings {
    fn from(config: &SampleConfig) -> Self {
        Self {
            resource_group_name: config.resource_group_name.clone(),
            deployment_name: config.deployment_name.clone(),
            location: Location::new(&config.location),
            parameters: SampleParameters {
                hosting_plan_name: config.hosting_plan_name.clone(),
                web_site_name: config.web_site_name.clone(),
                sku_name: config.sku_name.clone(),
                sku_capacity: config.sku_capacity,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("failed to resolve target subscription: {0}")]
    Subscription(#[source] ArmError),
    #[error("failed to create resource group {name}: {source}")]
    ResourceGroup {
        name: String,
        #[source]
        source: ArmError,
    },
    #[error("failed to read template at {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("template at {path} was rejected: {source}")]
    TemplateInvalid {
        path: PathBuf,
        #[source]
        source: InvalidTemplate,
    },
    #[error("deployment {name} failed: {source}")]
    Deployment {
        name: String,
        #[source]
        source: ArmError,
    },
    #[error("illegal lifecycle transition {from:?} -> {to:?}")]
    Lifecycle {
        from: LifecyclePhase,
        to: LifecyclePhase,
    },
}

impl From<InvalidTransition> for DeploymentError {
    fn from(transition: InvalidTransition) -> Self {
        Self::Lifecycle {
            from: transition.from,
            to: transition.to,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentOutcome {
    pub resource_group_id: ResourceId,
    pub deployment: DeploymentRecord,
}

/// One provisioning run with its phase trail.
pub struct DeploymentRun<'a> {
    manager: &'a dyn ResourceManager,
    console: &'a Console,
    settings: &'a SampleSettings,
    tracker: LifecycleTracker,
}

impl<'a> DeploymentRun<'a> {
    pub fn new(
        manager: &'a dyn ResourceManager,
        console: &'a Console,
        settings: &'a SampleSettings,
    ) -> Self {
        Self {
            manager,
            console,
            settings,
            tracker: LifecycleTracker::default(),
        }
    }

    pub fn phases(&self) -> &[LifecyclePhase] {
        self.tracker.history()
    }

    pub async fn execute(&mut self) -> Result<DeploymentOutcome, DeploymentError> {
        let mut created = None;
        let provisioning = self.provision(&mut created).await;

        if let Err(error) = &provisioning {
            tracing::warn!(
                phase = self.tracker.current().as_label(),
                error = %error,
                "provisioning aborted"
            );
        }

        self.cleanup(created.as_ref()).await;
        debug_assert!(self.tracker.current().is_terminal());
        tracing::debug!(phases = ?self.phases(), "deployment run finished");

        provisioning
    }

    async fn provision(
        &mut self,
        created: &mut Option<ResourceId>,
    ) -> Result<DeploymentOutcome, DeploymentError> {
        let settings = self.settings;
        let console = self.console;

        self.tracker.advance(LifecyclePhase::GroupCreating)?;
        console.log(&format!(
            "Creating a resource group with name: {}",
            settings.resource_group_name
        ));

        let subscription = self
            .manager
            .resolve_subscription()
            .await
            .map_err(DeploymentError::Subscription)?;

        let group = self
            .manager
            .create_resource_group(
                &subscription,
                &settings.resource_group_name,
                &settings.location,
            )
            .await
            .map_err(|source| DeploymentError::ResourceGroup {
                name: settings.resource_group_name.clone(),
                source,
            })?;
        *created = Some(group.id.clone());

        self.tracker.advance(LifecyclePhase::GroupReady)?;
        tracing::info!(
            name = %group.name,
            location = %group.location,
            state = ?group.provisioning_state,
            "resource group ready"
        );
        console.log(&format!("Created a resource group: {}", group.id));

        console.log(&format!(
            "Starting a deployment for an Azure App Service: {}",
            settings.deployment_name
        ));

        let path = template_path(console.project_root());
        let template = load_template(&path).map_err(|source| DeploymentError::TemplateRead {
            path: path.clone(),
            source,
        })?;
        let request =
            DeploymentRequest::incremental(&settings.deployment_name, template, &settings.parameters)
                .map_err(|source| DeploymentError::TemplateInvalid {
                    path: path.clone(),
                    source,
                })?;

        self.tracker.advance(LifecyclePhase::DeploymentSubmitting)?;
        let deployment = self
            .manager
            .create_deployment(&group.id, &request)
            .await
            .map_err(|source| DeploymentError::Deployment {
                name: settings.deployment_name.clone(),
                source,
            })?;

        self.tracker.advance(LifecyclePhase::DeploymentComplete)?;
        console.log(&format!(
            "Completed the deployment: {}",
            settings.deployment_name
        ));

        Ok(DeploymentOutcome {
            resource_group_id: group.id,
            deployment,
        })
    }

    async fn cleanup(&mut self, created: Option<&ResourceId>) {
        self.advance_or_log(LifecyclePhase::Cleanup);

        if let Some(id) = created {
            self.console.log(&format!("Deleting Resource Group: {id}"));
            match self.manager.delete_resource_group(id).await {
                Ok(()) => self.console.log(&format!("Deleted Resource Group: {id}")),
                Err(error) => {
                    tracing::error!(
                        resource_group = id.resource_group_name().unwrap_or_default(),
                        code = error.code().unwrap_or("none"),
                        error = %error,
                        "resource group cleanup failed"
                    );
                    self.console.log_value(Some(&error));
                }
            }
        }

        self.advance_or_log(LifecyclePhase::Done);
    }

    fn advance_or_log(&mut self, phase: LifecyclePhase) {
        if let Err(error) = self.tracker.advance(phase) {
            tracing::error!(from = ?error.from, to = ?error.to, "illegal lifecycle transition");
        }
    }
}

/// Runs the whole sample once.
pub async fn run_deployment_sample(
    manager: &dyn ResourceManager,
    console: &Console,
    settings: &SampleSettings,
) -> Result<DeploymentOutcome, DeploymentError> {
    DeploymentRun::new(manager, console, settings).execute().await
}
