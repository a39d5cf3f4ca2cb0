//! Argo CD post-install patching.

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use crate::config::ArgoCdConfig;
use crate::deploy::ChartDeployer;
use crate::exec::Toolbox;
use crate::wait::RetryConfig;

/// Config map holding the API server's command-line parameters.
const CMD_PARAMS_CONFIGMAP: &str = "argocd-cmd-params-cm";

/// Applies local-development patches to an Argo CD installation.
pub struct ArgoCd<'a> {
    tools: &'a Toolbox,
    config: &'a ArgoCdConfig,
    retry: RetryConfig,
}

impl<'a> ArgoCd<'a> {
    #[must_use]
    pub const fn new(tools: &'a Toolbox, config: &'a ArgoCdConfig, retry: RetryConfig) -> Self {
        Self {
            tools,
            config,
            retry,
        }
    }

    /// Apply every configured patch.
    ///
    /// # Errors
    ///
    /// Returns an error if any patch fails or the server does not come back.
    pub async fn configure(&self) -> Result<()> {
        self.patch_service_type()?;
        if self.config.insecure {
            self.enable_insecure().await?;
        }
        Ok(())
    }

    /// Patch the API server service to the configured type.
    ///
    /// # Errors
    ///
    /// Returns an error if `kubectl patch` fails.
    pub fn patch_service_type(&self) -> Result<()> {
        let patch = json!({ "spec": { "type": self.config.service_type } });
        info!(service = %self.config.server, service_type = %self.config.service_type, "Patching Argo CD service");

        self.tools
            .run(&self.tools.kubectl().args([
                "patch".to_string(),
                "service".to_string(),
                self.config.server.clone(),
                "-n".to_string(),
                self.config.namespace.clone(),
                "-p".to_string(),
                patch.to_string(),
            ]))
            .context("Failed to patch Argo CD server service")?;
        Ok(())
    }

    /// Serve the API over plain HTTP and restart the server to pick it up.
    ///
    /// # Errors
    ///
    /// Returns an error if patching, restarting or the rollout fails.
    pub async fn enable_insecure(&self) -> Result<()> {
        let patch = json!({ "data": { "server.insecure": "true" } });
        info!("Enabling Argo CD insecure mode");

        self.tools
            .run(&self.tools.kubectl().args([
                "patch".to_string(),
                "configmap".to_string(),
                CMD_PARAMS_CONFIGMAP.to_string(),
                "-n".to_string(),
                self.config.namespace.clone(),
                "--type".to_string(),
                "merge".to_string(),
                "-p".to_string(),
                patch.to_string(),
            ]))
            .context("Failed to patch Argo CD command parameters")?;

        let workload = format!("deployment/{}", self.config.server);
        self.tools
            .run(&self.tools.kubectl().args([
                "rollout",
                "restart",
                workload.as_str(),
                "-n",
                self.config.namespace.as_str(),
            ]))
            .context("Failed to restart Argo CD server")?;

        ChartDeployer::new(self.tools, self.retry)
            .wait_rollout(&self.config.namespace, &workload)
            .await
    }
}
