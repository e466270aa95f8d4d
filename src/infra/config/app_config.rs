use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub logging: LogConfig,
    pub azure: AzureConfig,
    pub lro: LroConfig,
    pub sample: SampleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AzureConfig {
    pub subscription_id: Option<String>,
    pub resource_manager_endpoint: String,
    pub authority_host: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            subscription_id: None,
            resource_manager_endpoint: "https://management.azure.com".to_owned(),
            authority_host: "https://login.microsoftonline.com".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LroConfig {
    pub poll_interval_ms: u64,
    /// Upper bound on waiting for one operation; `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for LroConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SampleConfig {
    pub project_root: PathBuf,
    pub resource_group_name: String,
    pub deployment_name: String,
    pub location: String,
    pub hosting_plan_name: String,
    pub web_site_name: String,
    pub sku_name: String,
    pub sku_capacity: u32,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            resource_group_name: "rgRSAT".to_owned(),
            deployment_name: "dpRSAT".to_owned(),
            location: "westus".to_owned(),
            hosting_plan_name: "hpRSAT".to_owned(),
            web_site_name: "wnRSAT".to_owned(),
            sku_name: "B1".to_owned(),
            sku_capacity: 1,
        }
    }
}
