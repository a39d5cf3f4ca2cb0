//! Local cluster lifecycle through minikube.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::ClusterConfig;
use crate::exec::Toolbox;
use crate::wait::{poll_until, RetryConfig};

/// Component states reported by `minikube status`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClusterStatus {
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Kubelet")]
    pub kubelet: String,
    #[serde(rename = "APIServer")]
    pub apiserver: String,
}

impl ClusterStatus {
    /// Status of a profile that does not exist.
    #[must_use]
    pub fn absent() -> Self {
        Self {
            host: "Nonexistent".into(),
            kubelet: "Nonexistent".into(),
            apiserver: "Nonexistent".into(),
        }
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.host != "Nonexistent"
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.host == "Running" && self.kubelet == "Running" && self.apiserver == "Running"
    }

    /// Parse `minikube status -o json` output.
    ///
    /// Anything that is not a status object (e.g. "Profile not found") is
    /// treated as an absent cluster.
    #[must_use]
    pub fn parse(stdout: &str) -> Self {
        serde_json::from_str(stdout.trim()).unwrap_or_else(|_| Self::absent())
    }
}

impl std::fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "host={} kubelet={} apiserver={}",
            self.host, self.kubelet, self.apiserver
        )
    }
}

/// minikube cluster bound to one profile.
pub struct Cluster<'a> {
    tools: &'a Toolbox,
    config: &'a ClusterConfig,
}

impl<'a> Cluster<'a> {
    #[must_use]
    pub const fn new(tools: &'a Toolbox, config: &'a ClusterConfig) -> Self {
        Self { tools, config }
    }

    /// Current cluster status.
    ///
    /// # Errors
    ///
    /// Returns an error if minikube cannot be executed.
    pub fn status(&self) -> Result<ClusterStatus> {
        // minikube exits non-zero for stopped clusters but still prints the JSON.
        let output = self
            .tools
            .output(&self.tools.minikube().args(["status", "-o", "json"]))?;
        Ok(ClusterStatus::parse(&output.stdout))
    }

    /// Start the cluster unless it is already running.
    ///
    /// Returns `true` if the cluster was started by this call.
    ///
    /// # Errors
    ///
    /// Returns an error if `minikube start` fails.
    pub fn start(&self) -> Result<bool> {
        let status = self.status()?;
        if status.is_running() {
            info!(profile = %self.tools.profile(), "Cluster already running");
            return Ok(false);
        }

        info!(
            profile = %self.tools.profile(),
            %status,
            driver = %self.config.driver,
            cpus = self.config.cpus,
            memory_mb = self.config.memory_mb,
            "Starting cluster"
        );

        let mut invocation = self.tools.minikube().args([
            "start".to_string(),
            format!("--driver={}", self.config.driver),
            format!("--cpus={}", self.config.cpus),
            format!("--memory={}", self.config.memory_mb),
            format!("--disk-size={}", self.config.disk_size),
        ]);
        if let Some(version) = &self.config.kubernetes_version {
            invocation = invocation.arg(format!("--kubernetes-version={version}"));
        }

        self.tools
            .run(&invocation)
            .context("Failed to start minikube cluster")?;
        Ok(true)
    }

    /// Stop the cluster, keeping its state.
    ///
    /// # Errors
    ///
    /// Returns an error if `minikube stop` fails.
    pub fn stop(&self) -> Result<()> {
        self.tools
            .run(&self.tools.minikube().arg("stop"))
            .context("Failed to stop minikube cluster")?;
        Ok(())
    }

    /// Delete the cluster and its state.
    ///
    /// # Errors
    ///
    /// Returns an error if `minikube delete` fails.
    pub fn delete(&self) -> Result<()> {
        if !self.status()?.exists() {
            warn!(profile = %self.tools.profile(), "Cluster does not exist, nothing to delete");
            return Ok(());
        }
        self.tools
            .run(&self.tools.minikube().arg("delete"))
            .context("Failed to delete minikube cluster")?;
        Ok(())
    }

    /// Whether every node reports the Ready condition.
    ///
    /// # Errors
    ///
    /// Returns an error if kubectl fails.
    pub fn nodes_ready(&self) -> Result<bool> {
        let stdout = self.tools.run(&self.tools.kubectl().args([
            "get",
            "nodes",
            "-o",
            r#"jsonpath={.items[*].status.conditions[?(@.type=="Ready")].status}"#,
        ]))?;

        let statuses: Vec<&str> = stdout.split_whitespace().collect();
        Ok(!statuses.is_empty() && statuses.iter().all(|s| *s == "True"))
    }

    /// Wait until every node is Ready.
    ///
    /// # Errors
    ///
    /// Returns an error if the nodes are not Ready within the polling budget.
    pub async fn wait_ready(&self, retry: &RetryConfig) -> Result<()> {
        poll_until(retry, "nodes to be Ready", || self.nodes_ready()).await?;
        info!("All nodes Ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::exec::testing::ScriptedRunner;
    use crate::exec::CommandOutput;

    const RUNNING: &str = r#"{"Name":"devstack","Host":"Running","Kubelet":"Running","APIServer":"Running","Kubeconfig":"Configured","Worker":false}"#;
    const STOPPED: &str = r#"{"Name":"devstack","Host":"Stopped","Kubelet":"Stopped","APIServer":"Stopped","Kubeconfig":"Stopped","Worker":false}"#;

    fn toolbox(runner: &Arc<ScriptedRunner>) -> Toolbox {
        Toolbox::new(runner.clone(), "devstack")
    }

    #[test]
    fn test_parse_status() {
        assert!(ClusterStatus::parse(RUNNING).is_running());

        let stopped = ClusterStatus::parse(STOPPED);
        assert!(stopped.exists());
        assert!(!stopped.is_running());

        let missing = ClusterStatus::parse("* Profile \"devstack\" not found.");
        assert!(!missing.exists());
    }

    #[test]
    fn test_start_skips_running_cluster() {
        let runner = Arc::new(
            ScriptedRunner::default().on("status", vec![CommandOutput::ok(RUNNING)]),
        );
        let tools = toolbox(&runner);
        let config = ClusterConfig::default();

        assert!(!Cluster::new(&tools, &config).start().unwrap());
        assert_eq!(runner.calls(), vec!["minikube -p devstack status -o json"]);
    }

    #[test]
    fn test_start_stopped_cluster() {
        let runner = Arc::new(ScriptedRunner::default().on(
            "status",
            vec![CommandOutput {
                success: false,
                stdout: STOPPED.into(),
                stderr: String::new(),
            }],
        ));
        let tools = toolbox(&runner);
        let config = ClusterConfig {
            kubernetes_version: Some("v1.31.0".into()),
            ..ClusterConfig::default()
        };

        assert!(Cluster::new(&tools, &config).start().unwrap());
        assert_eq!(
            runner.calls()[1],
            "minikube -p devstack start --driver=docker --cpus=4 --memory=8192 \
             --disk-size=40g --kubernetes-version=v1.31.0"
        );
    }

    #[test]
    fn test_start_failure_propagates() {
        let runner = Arc::new(
            ScriptedRunner::default()
                .on("status", vec![CommandOutput::failed("not found")])
                .on("start", vec![CommandOutput::failed("driver docker not healthy")]),
        );
        let tools = toolbox(&runner);
        let config = ClusterConfig::default();

        let err = Cluster::new(&tools, &config).start().unwrap_err();
        assert!(format!("{err:#}").contains("driver docker not healthy"));
    }

    #[test]
    fn test_delete_missing_cluster_is_noop() {
        let runner = Arc::new(ScriptedRunner::default().on(
            "status",
            vec![CommandOutput::failed("Profile \"devstack\" not found")],
        ));
        let tools = toolbox(&runner);
        let config = ClusterConfig::default();

        Cluster::new(&tools, &config).delete().unwrap();
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_ready_polls_nodes() {
        let runner = Arc::new(ScriptedRunner::default().on(
            "get nodes",
            vec![
                CommandOutput::failed("connection refused"),
                CommandOutput::ok("False"),
                CommandOutput::ok("True"),
            ],
        ));
        let tools = toolbox(&runner);
        let config = ClusterConfig::default();
        let retry = RetryConfig::new(5, Duration::ZERO);

        Cluster::new(&tools, &config).wait_ready(&retry).await.unwrap();
        assert_eq!(runner.calls().len(), 3);
    }
}
