use std::path::Path;

use anyhow::Result;

use devstack::wait::RetryConfig;
use devstack::{StackConfig, Toolbox};

pub mod check;
pub mod cluster;
pub mod credentials;
pub mod deploy;
pub mod down;
pub mod forward;
pub mod gateway;
pub mod up;

/// Resolved config and tool access shared by every command.
pub struct Context {
    pub config: StackConfig,
    pub tools: Toolbox,
}

impl Context {
    pub fn load(config_path: Option<&Path>, profile: Option<String>) -> Result<Self> {
        let config = StackConfig::load(config_path)?.with_profile(profile);
        config.validate()?;
        let tools = Toolbox::system(&config.cluster.profile);
        Ok(Self { config, tools })
    }

    pub fn retry(&self) -> RetryConfig {
        self.config.readiness.retry()
    }
}
