use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::infra::{
    config::{load, AppConfig},
    contracts::ConfigAdapter,
};

/// Values supplied on the command line or through the environment. They win
/// over whatever the config file says.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub subscription_id: Option<String>,
    pub project_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct FileConfigAdapter {
    path: Option<PathBuf>,
    overrides: ConfigOverrides,
}

impl FileConfigAdapter {
    pub fn new(path: Option<&Path>) -> Self {
        Self {
            path: path.map(Path::to_path_buf),
            overrides: ConfigOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

impl ConfigAdapter for FileConfigAdapter {
    fn load(&self) -> Result<AppConfig> {
        let mut config = load(self.path.as_deref())?;

        if let Some(subscription_id) = self
            .overrides
            .subscription_id
            .as_ref()
            .filter(|id| !id.trim().is_empty())
        {
            config.azure.subscription_id = Some(subscription_id.trim().to_owned());
        }

        if let Some(project_root) = &self.overrides.project_root {
            config.sample.project_root = project_root.clone();
        }

        Ok(config)
    }
}
