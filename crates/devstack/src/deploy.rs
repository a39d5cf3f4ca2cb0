//! Helm chart deployment.
//!
//! Charts are installed one after another. A failed chart is recorded and the
//! next one is still attempted; the caller decides what a non-empty failure
//! list means.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::config::ChartSpec;
use crate::exec::Toolbox;
use crate::ui;
use crate::wait::{poll_until, RetryConfig};

/// A chart that did not deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartFailure {
    pub release: String,
    pub error: String,
}

/// Outcome of deploying a set of charts.
#[derive(Debug, Default)]
pub struct DeployReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<ChartFailure>,
}

impl DeployReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    #[must_use]
    pub fn deployed(&self, release: &str) -> bool {
        self.succeeded.iter().any(|r| r == release)
    }
}

/// Installs Helm releases and waits for their workloads.
pub struct ChartDeployer<'a> {
    tools: &'a Toolbox,
    retry: RetryConfig,
}

impl<'a> ChartDeployer<'a> {
    #[must_use]
    pub const fn new(tools: &'a Toolbox, retry: RetryConfig) -> Self {
        Self { tools, retry }
    }

    /// Deploy every chart in order, continuing past failures.
    pub async fn deploy_all(&self, charts: &[ChartSpec]) -> DeployReport {
        let mut report = DeployReport::default();

        self.prepare_repos(charts);

        for chart in charts {
            ui::print_component(&chart.release);
            match self.deploy(chart).await {
                Ok(()) => {
                    ui::print_success(&format!("{} deployed", chart.release));
                    report.succeeded.push(chart.release.clone());
                }
                Err(e) => {
                    error!(release = %chart.release, error = %format!("{e:#}"), "Chart deployment failed");
                    ui::print_error(&format!("{} failed: {e:#}", chart.release));
                    report.failed.push(ChartFailure {
                        release: chart.release.clone(),
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        report
    }

    /// Add every chart repository once and refresh the index.
    fn prepare_repos(&self, charts: &[ChartSpec]) {
        let mut seen = HashSet::new();
        for chart in charts {
            if !seen.insert(chart.repo_name.as_str()) {
                continue;
            }
            let add = self
                .tools
                .helm()
                .args(["repo", "add", chart.repo_name.as_str(), chart.repo_url.as_str()]);
            // Re-adding an existing repo fails; that is fine.
            if let Err(e) = self.tools.run(&add) {
                warn!(repo = %chart.repo_name, error = %e, "helm repo add failed");
            }
        }

        if !seen.is_empty() {
            if let Err(e) = self.tools.run(&self.tools.helm().args(["repo", "update"])) {
                warn!(error = %e, "helm repo update failed, using cached index");
            }
        }
    }

    /// Install or upgrade one release and wait for its workloads.
    ///
    /// # Errors
    ///
    /// Returns an error if helm fails or a workload does not roll out.
    pub async fn deploy(&self, chart: &ChartSpec) -> Result<()> {
        info!(release = %chart.release, chart = %chart.chart, namespace = %chart.namespace, "Installing chart");
        ui::print_progress(&format!("helm upgrade --install {} {}", chart.release, chart.chart));
        self.tools.run(&self.install_invocation(chart))?;

        for workload in &chart.wait_for {
            ui::print_progress(&format!("Waiting for {workload}"));
            self.wait_rollout(&chart.namespace, workload).await?;
        }

        Ok(())
    }

    fn install_invocation(&self, chart: &ChartSpec) -> crate::exec::Invocation {
        let mut invocation = self.tools.helm().args([
            "upgrade",
            "--install",
            chart.release.as_str(),
            chart.chart.as_str(),
            "--namespace",
            chart.namespace.as_str(),
            "--create-namespace",
        ]);
        if let Some(version) = &chart.version {
            invocation = invocation.args(["--version", version.as_str()]);
        }
        for (key, value) in &chart.values {
            invocation = invocation.args(["--set".to_string(), format!("{key}={value}")]);
        }
        invocation
    }

    /// Poll `kubectl rollout status` for a workload.
    ///
    /// # Errors
    ///
    /// Returns an error if the workload does not roll out within the polling budget.
    pub async fn wait_rollout(&self, namespace: &str, workload: &str) -> Result<()> {
        let invocation = self.tools.kubectl().args([
            "rollout",
            "status",
            workload,
            "-n",
            namespace,
            "--timeout=30s",
        ]);
        poll_until(&self.retry, workload, || {
            self.tools.run(&invocation).map(|_| true)
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::StackConfig;
    use crate::exec::testing::ScriptedRunner;
    use crate::exec::CommandOutput;

    fn spec(release: &str, repo: &str) -> ChartSpec {
        ChartSpec {
            release: release.into(),
            chart: format!("{repo}/{release}"),
            repo_name: repo.into(),
            repo_url: format!("https://{repo}.example.com"),
            namespace: release.into(),
            version: None,
            values: BTreeMap::new(),
            wait_for: vec![],
        }
    }

    fn instant() -> RetryConfig {
        RetryConfig::new(3, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_install_arguments() {
        let runner = Arc::new(ScriptedRunner::default());
        let tools = Toolbox::new(runner.clone(), "dev");
        let mut chart = spec("kong", "kong");
        chart.version = Some("2.38.0".into());
        chart.values.insert("admin.enabled".into(), "true".into());
        chart.values.insert("env.database".into(), "postgres".into());

        let report = ChartDeployer::new(&tools, instant())
            .deploy_all(&[chart])
            .await;

        assert!(report.is_success());
        assert_eq!(
            runner.calls(),
            vec![
                "helm --kube-context dev repo add kong https://kong.example.com",
                "helm --kube-context dev repo update",
                "helm --kube-context dev upgrade --install kong kong/kong --namespace kong \
                 --create-namespace --version 2.38.0 --set admin.enabled=true \
                 --set env.database=postgres",
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_charts() {
        let runner = Arc::new(ScriptedRunner::default().on(
            "install jenkins",
            vec![CommandOutput::failed("Error: INSTALLATION FAILED: timed out")],
        ));
        let tools = Toolbox::new(runner.clone(), "dev");
        let charts = vec![spec("argocd", "argo"), spec("jenkins", "jenkins"), spec("kong", "kong")];

        let report = ChartDeployer::new(&tools, instant())
            .deploy_all(&charts)
            .await;

        assert!(!report.is_success());
        assert_eq!(report.succeeded, vec!["argocd", "kong"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].release, "jenkins");
        assert!(report.failed[0].error.contains("INSTALLATION FAILED"));
        assert!(report.deployed("kong"));
        assert!(!report.deployed("jenkins"));
    }

    #[tokio::test]
    async fn test_repo_add_failure_is_ignored() {
        let runner = Arc::new(ScriptedRunner::default().on(
            "repo add",
            vec![CommandOutput::failed("repository name (argo) already exists")],
        ));
        let tools = Toolbox::new(runner.clone(), "dev");

        let report = ChartDeployer::new(&tools, instant())
            .deploy_all(&[spec("argocd", "argo")])
            .await;

        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_shared_repo_added_once() {
        let runner = Arc::new(ScriptedRunner::default());
        let tools = Toolbox::new(runner.clone(), "dev");

        ChartDeployer::new(&tools, instant())
            .deploy_all(&[spec("argo-cd", "argo"), spec("argo-workflows", "argo")])
            .await;

        let adds = runner
            .calls()
            .iter()
            .filter(|c| c.contains("repo add"))
            .count();
        assert_eq!(adds, 1);
    }

    #[tokio::test]
    async fn test_rollout_timeout_marks_chart_failed() {
        let runner = Arc::new(ScriptedRunner::default().on(
            "rollout status",
            vec![CommandOutput::failed("Waiting for deployment rollout to finish")],
        ));
        let tools = Toolbox::new(runner.clone(), "dev");
        let mut chart = spec("argocd", "argo");
        chart.wait_for = vec!["deployment/argocd-server".into()];

        let report = ChartDeployer::new(&tools, instant())
            .deploy_all(&[chart])
            .await;

        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.contains("deployment/argocd-server"));
        let rollouts = runner
            .calls()
            .iter()
            .filter(|c| c.contains("rollout status deployment/argocd-server -n argocd"))
            .count();
        assert_eq!(rollouts, 3);
    }

    #[tokio::test]
    async fn test_default_stack_order() {
        let runner = Arc::new(ScriptedRunner::default());
        let tools = Toolbox::new(runner.clone(), "devstack");
        let config = StackConfig::default();

        let report = ChartDeployer::new(&tools, instant())
            .deploy_all(&config.charts)
            .await;

        assert_eq!(report.succeeded, vec!["argocd", "kong", "jenkins", "monitoring"]);
        let jenkins_rollout = "kubectl --context devstack rollout status statefulset/jenkins \
                               -n jenkins --timeout=30s";
        assert!(runner.calls().iter().any(|c| c == jenkins_rollout));
    }
}
