use std::path::PathBuf;

use serde::Deserialize;

use crate::infra::config::{AppConfig, AzureConfig, LogConfig, LroConfig, SampleConfig};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub azure: Option<FileAzureConfig>,
    pub lro: Option<FileLroConfig>,
    pub sample: Option<FileSampleConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(azure) = self.azure {
            azure.merge_into(&mut config.azure);
        }

        if let Some(lro) = self.lro {
            lro.merge_into(&mut config.lro);
        }

        if let Some(sample) = self.sample {
            sample.merge_into(&mut config.sample);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileAzureConfig {
    pub subscription_id: Option<String>,
    pub resource_manager_endpoint: Option<String>,
    pub authority_host: Option<String>,
}

impl FileAzureConfig {
    fn merge_into(self, config: &mut AzureConfig) {
        if let Some(subscription_id) = self.subscription_id.filter(|id| !id.trim().is_empty()) {
            config.subscription_id = Some(subscription_id);
        }

        if let Some(endpoint) = self.resource_manager_endpoint {
            config.resource_manager_endpoint = endpoint;
        }

        if let Some(authority_host) = self.authority_host {
            config.authority_host = authority_host;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLroConfig {
    pub poll_interval_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
}

impl FileLroConfig {
    fn merge_into(self, config: &mut LroConfig) {
        if let Some(poll_interval_ms) = self.poll_interval_ms {
            config.poll_interval_ms = poll_interval_ms;
        }

        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = Some(timeout_secs);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileSampleConfig {
    pub project_root: Option<PathBuf>,
    pub resource_group_name: Option<String>,
    pub deployment_name: Option<String>,
    pub location: Option<String>,
    pub hosting_plan_name: Option<String>,
    pub web_site_name: Option<String>,
    pub sku_name: Option<String>,
    pub sku_capacity: Option<u32>,
}

impl FileSampleConfig {
    fn merge_into(self, config: &mut SampleConfig) {
        if let Some(project_root) = self.project_root {
            config.project_root = project_root;
        }

        if let Some(name) = self.resource_group_name {
            config.resource_group_name = name;
        }

        if let Some(name) = self.deployment_name {
            config.deployment_name = name;
        }

        if let Some(location) = self.location {
            config.location = location;
        }

        if let Some(name) = self.hosting_plan_name {
            config.hosting_plan_name = name;
        }

        if let Some(name) = self.web_site_name {
            config.web_site_name = name;
        }

        if let Some(sku_name) = self.sku_name {
            config.sku_name = sku_name;
        }

        if let Some(capacity) = self.sku_capacity {
            config.sku_capacity = capacity;
        }
    }
}
