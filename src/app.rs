use std::sync::Arc;

use anyhow::Result;
use tokio::runtime::Builder;

use crate::{
    arm::{self, credential::DefaultCredential, ArmClient},
    cli::{Cli, Command},
    domain,
    infra::{self, console::Console, error::AppError},
    usecases::{
        self, bootstrap,
        context::AppContext,
        contracts::ResourceManager,
        deploy_sample::{run_deployment_sample, SampleSettings},
    },
};

pub fn run(cli: Cli) -> Result<()> {
    match cli.command_or_default() {
        Command::Run => {
            let context = bootstrap::bootstrap(cli.config.as_deref(), cli.overrides())?;

            tracing::debug!(
                domain = domain::module_name(),
                arm = arm::module_name(),
                usecases = usecases::module_name(),
                infra = infra::module_name(),
                "module boundaries loaded"
            );

            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(AppError::RuntimeInit)?;

            runtime.block_on(run_sample(&context));
        }
    }

    Ok(())
}

/// Runs the sample against Azure. Failures end up on the console, never in
/// the process exit status.
async fn run_sample(context: &AppContext) {
    let client = match build_client(context) {
        Ok(client) => client,
        Err(error) => {
            report_failure(&context.console, &error);
            return;
        }
    };

    tracing::debug!(client = ?client, "resource manager client ready");
    execute(&client, context).await;
}

fn build_client(context: &AppContext) -> Result<ArmClient> {
    let http = arm::http_client()?;
    let credential = DefaultCredential::from_env(&http, &context.config.azure.authority_host);

    Ok(ArmClient::from_config(
        &context.config,
        http,
        Arc::new(credential),
    ))
}

async fn execute(manager: &dyn ResourceManager, context: &AppContext) {
    let settings = SampleSettings::from(&context.config.sample);

    match run_deployment_sample(manager, &context.console, &settings).await {
        Ok(outcome) => tracing::debug!(
            resource_group = %outcome.resource_group_id,
            deployment = %outcome.deployment.id,
            state = ?outcome.deployment.provisioning_state,
            outputs = ?outcome.deployment.outputs,
            "deployment sample finished"
        ),
        Err(error) => report_failure(&context.console, &anyhow::Error::new(error)),
    }
}

fn report_failure(console: &Console, error: &anyhow::Error) {
    tracing::error!(error = ?error, "deployment sample failed");
    console.log(&format!("{error:#}"));
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use super::*;
    use crate::{
        infra::{config::AppConfig, stubs::MemorySink},
        test_support::{Failure, StubResourceManager},
    };

    fn context_with_template(root: &std::path::Path, sink: Arc<MemorySink>) -> AppContext {
        fs::create_dir_all(root.join("Asset")).expect("asset dir must be created");
        fs::write(
            root.join("Asset").join("ArmTemplate.json"),
            "{\"resources\": []}\n",
        )
        .expect("template must be written");

        let mut config = AppConfig::default();
        config.sample.project_root = root.to_path_buf();

        let mut context = AppContext::new(config);
        context.console = context.console.clone().with_sink(sink);
        context
    }

    #[tokio::test]
    async fn deployment_error_is_what_the_caller_logs() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        let sink = Arc::new(MemorySink::default());
        let context = context_with_template(root.path(), sink.clone());
        let manager = StubResourceManager::failing_many(&[Failure::Deployment, Failure::Delete]);

        execute(&manager, &context).await;

        let lines = sink.lines();
        let reported = lines.last().expect("failure must be reported");
        assert!(reported.starts_with("deployment dpRSAT failed"));
        assert!(reported.contains("InvalidTemplateDeployment"));
        assert!(!reported.contains("ResourceGroupDeletionBlocked"));
        assert_eq!(manager.delete_calls(), 1);
    }

    #[tokio::test]
    async fn successful_run_reports_nothing_extra() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        let sink = Arc::new(MemorySink::default());
        let context = context_with_template(root.path(), sink.clone());
        let manager = StubResourceManager::default();

        execute(&manager, &context).await;

        let lines = sink.lines();
        assert_eq!(lines.len(), 6);
        assert!(lines[5].starts_with("Deleted Resource Group"));
    }
}
