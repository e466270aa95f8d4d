use std::path::Path;

use crate::{
    infra::{
        self,
        config::{ConfigOverrides, FileConfigAdapter},
        contracts::ConfigAdapter,
        error::AppError,
    },
    usecases::context::AppContext,
};

pub fn bootstrap(
    config_path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<AppContext, AppError> {
    let context = build_context(config_path, overrides)?;
    infra::logging::init(&context.config.logging)?;

    Ok(context)
}

fn build_context(
    config_path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<AppContext, AppError> {
    let config_adapter = FileConfigAdapter::new(config_path).with_overrides(overrides);
    let config = config_adapter.load().map_err(AppError::Config)?;

    Ok(AppContext::new(config))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn builds_context_with_default_config_when_file_is_missing() {
        let context = build_context(
            Some(Path::new("./missing-config.toml")),
            ConfigOverrides::default(),
        )
        .expect("context should build from defaults");

        assert_eq!(context.config, crate::infra::config::AppConfig::default());
        assert_eq!(context.console.project_root(), Path::new("."));
    }

    #[test]
    fn console_follows_project_root_override() {
        let context = build_context(
            Some(Path::new("./missing-config.toml")),
            ConfigOverrides {
                subscription_id: None,
                project_root: Some(PathBuf::from("/opt/sample")),
            },
        )
        .expect("context should build");

        assert_eq!(context.console.project_root(), Path::new("/opt/sample"));
    }
}
