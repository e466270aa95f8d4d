use crate::infra::{config::AppConfig, console::Console};

#[derive(Debug)]
pub struct AppContext {
    pub config: AppConfig,
    pub console: Console,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        let console = Console::default().with_project_root(config.sample.project_root.clone());
        Self { config, console }
    }
}
