//! Stack configuration.
//!
//! Every field has a default, so an empty or partial YAML file is valid and
//! running without any file deploys the standard stack (Argo CD, Kong,
//! Jenkins, kube-prometheus-stack) on a minikube profile named `devstack`.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::wait::RetryConfig;

/// Full stack configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    /// Local cluster settings.
    pub cluster: ClusterConfig,
    /// Helm charts to deploy, in order.
    pub charts: Vec<ChartSpec>,
    /// Argo CD post-install patching.
    pub argocd: ArgoCdConfig,
    /// Kong admin API and declarative config.
    pub gateway: GatewaySettings,
    /// Local port forwards.
    pub forwards: Vec<ForwardSpec>,
    /// Admin credentials read from cluster secrets.
    pub credentials: Vec<CredentialSpec>,
    /// Fixed-count polling used by every readiness wait.
    pub readiness: ReadinessConfig,
}

/// minikube cluster settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    /// minikube profile name, also the kube context name.
    pub profile: String,
    /// VM or container driver (docker, hyperkit, kvm2, ...).
    pub driver: String,
    pub cpus: u32,
    pub memory_mb: u64,
    /// Disk size in minikube notation (e.g. "40g").
    pub disk_size: String,
    /// Kubernetes version (e.g. "v1.31.0"); minikube's default when unset.
    pub kubernetes_version: Option<String>,
}

/// A Helm release to install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChartSpec {
    /// Release name.
    pub release: String,
    /// Chart reference (e.g. "argo/argo-cd").
    pub chart: String,
    /// Local name of the chart repository.
    pub repo_name: String,
    /// Chart repository URL.
    pub repo_url: String,
    /// Target namespace (created if missing).
    pub namespace: String,
    /// Pinned chart version.
    #[serde(default)]
    pub version: Option<String>,
    /// `--set` overrides.
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    /// Workloads (`deployment/name`, `statefulset/name`) that must roll out.
    #[serde(default)]
    pub wait_for: Vec<String>,
}

/// Argo CD patches applied after its chart is installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArgoCdConfig {
    /// Skip patching entirely.
    pub enabled: bool,
    pub namespace: String,
    /// Name of the API server service and deployment.
    pub server: String,
    /// Service type the server service is patched to.
    pub service_type: String,
    /// Serve the UI over plain HTTP (TLS is terminated by the port forward).
    pub insecure: bool,
}

/// Kong admin API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewaySettings {
    /// Admin API base URL.
    pub admin_url: String,
    /// Declarative service config registered by `up`.
    pub config_file: Option<PathBuf>,
}

/// A `kubectl port-forward` to a cluster service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardSpec {
    pub name: String,
    pub namespace: String,
    pub service: String,
    pub local_port: u16,
    pub remote_port: u16,
}

/// Where to find an application's admin credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialSpec {
    pub name: String,
    pub namespace: String,
    /// Secret holding the credentials.
    pub secret: String,
    /// Fixed username, when the secret only holds a password.
    #[serde(default)]
    pub username: Option<String>,
    /// Secret key holding the username.
    #[serde(default)]
    pub username_key: Option<String>,
    /// Secret key holding the password.
    pub password_key: String,
}

/// Fixed-count polling settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadinessConfig {
    pub attempts: u32,
    pub interval_secs: u64,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            cluster: ClusterConfig::default(),
            charts: default_charts(),
            argocd: ArgoCdConfig::default(),
            gateway: GatewaySettings::default(),
            forwards: default_forwards(),
            credentials: default_credentials(),
            readiness: ReadinessConfig::default(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            profile: "devstack".into(),
            driver: "docker".into(),
            cpus: 4,
            memory_mb: 8192,
            disk_size: "40g".into(),
            kubernetes_version: None,
        }
    }
}

impl Default for ArgoCdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "argocd".into(),
            server: "argocd-server".into(),
            service_type: "NodePort".into(),
            insecure: true,
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            admin_url: gateway::DEFAULT_ADMIN_URL.into(),
            config_file: None,
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            attempts: 30,
            interval_secs: 10,
        }
    }
}

impl ReadinessConfig {
    /// Polling schedule for readiness waits.
    #[must_use]
    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new(self.attempts, Duration::from_secs(self.interval_secs))
    }
}

fn chart(
    release: &str,
    chart: &str,
    repo: (&str, &str),
    namespace: &str,
    values: &[(&str, &str)],
    wait_for: &[&str],
) -> ChartSpec {
    ChartSpec {
        release: release.into(),
        chart: chart.into(),
        repo_name: repo.0.into(),
        repo_url: repo.1.into(),
        namespace: namespace.into(),
        version: None,
        values: values
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
        wait_for: wait_for.iter().map(|w| (*w).to_string()).collect(),
    }
}

fn default_charts() -> Vec<ChartSpec> {
    vec![
        chart(
            "argocd",
            "argo/argo-cd",
            ("argo", "https://argoproj.github.io/argo-helm"),
            "argocd",
            &[],
            &["deployment/argocd-server", "deployment/argocd-repo-server"],
        ),
        // Kong needs a database for the admin API to accept writes.
        chart(
            "kong",
            "kong/kong",
            ("kong", "https://charts.konghq.com"),
            "kong",
            &[
                ("admin.enabled", "true"),
                ("admin.http.enabled", "true"),
                ("admin.tls.enabled", "false"),
                ("env.database", "postgres"),
                ("postgresql.enabled", "true"),
                ("ingressController.enabled", "false"),
            ],
            &["deployment/kong-kong"],
        ),
        chart(
            "jenkins",
            "jenkins/jenkins",
            ("jenkins", "https://charts.jenkins.io"),
            "jenkins",
            &[],
            &["statefulset/jenkins"],
        ),
        chart(
            "monitoring",
            "prometheus-community/kube-prometheus-stack",
            (
                "prometheus-community",
                "https://prometheus-community.github.io/helm-charts",
            ),
            "monitoring",
            &[],
            &[
                "deployment/monitoring-grafana",
                "deployment/monitoring-kube-prometheus-operator",
            ],
        ),
    ]
}

fn forward(name: &str, namespace: &str, service: &str, local: u16, remote: u16) -> ForwardSpec {
    ForwardSpec {
        name: name.into(),
        namespace: namespace.into(),
        service: service.into(),
        local_port: local,
        remote_port: remote,
    }
}

fn default_forwards() -> Vec<ForwardSpec> {
    vec![
        forward("argocd", "argocd", "argocd-server", 8080, 443),
        forward("kong-proxy", "kong", "kong-kong-proxy", 8000, 80),
        forward("kong-admin", "kong", "kong-kong-admin", 8001, 8001),
        forward("jenkins", "jenkins", "jenkins", 8081, 8080),
        forward("grafana", "monitoring", "monitoring-grafana", 3000, 80),
        forward(
            "prometheus",
            "monitoring",
            "monitoring-kube-prometheus-prometheus",
            9090,
            9090,
        ),
    ]
}

fn default_credentials() -> Vec<CredentialSpec> {
    vec![
        CredentialSpec {
            name: "argocd".into(),
            namespace: "argocd".into(),
            secret: "argocd-initial-admin-secret".into(),
            username: Some("admin".into()),
            username_key: None,
            password_key: "password".into(),
        },
        CredentialSpec {
            name: "jenkins".into(),
            namespace: "jenkins".into(),
            secret: "jenkins".into(),
            username: None,
            username_key: Some("jenkins-admin-user".into()),
            password_key: "jenkins-admin-password".into(),
        },
        CredentialSpec {
            name: "grafana".into(),
            namespace: "monitoring".into(),
            secret: "monitoring-grafana".into(),
            username: None,
            username_key: Some("admin-user".into()),
            password_key: "admin-password".into(),
        },
    ]
}

impl StackConfig {
    /// Default config file location (`~/.config/devstack/config.yaml` on Linux).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("devstack").join("config.yaml"))
    }

    /// Load config from an explicit path, the default location, or built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit path is missing, or any file is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };

        let Some(path) = path else {
            info!("No config file found, using defaults");
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        info!(path = %path.display(), "Loaded stack config");
        Ok(config)
    }

    /// Parse and validate config from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or fails validation.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty mapping.
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml).context("Failed to parse config YAML")?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.cluster.profile.trim().is_empty() {
            anyhow::bail!("cluster.profile must not be empty");
        }
        if self.readiness.attempts == 0 {
            anyhow::bail!("readiness.attempts must be at least 1");
        }

        let mut releases = HashSet::new();
        for chart in &self.charts {
            if !releases.insert(chart.release.as_str()) {
                anyhow::bail!("duplicate chart release '{}'", chart.release);
            }
            if let Some(bad) = chart.wait_for.iter().find(|w| !w.contains('/')) {
                anyhow::bail!(
                    "chart '{}': wait_for entry '{bad}' must be <kind>/<name>",
                    chart.release
                );
            }
        }

        let mut names = HashSet::new();
        let mut ports = HashSet::new();
        for fwd in &self.forwards {
            if !names.insert(fwd.name.as_str()) {
                anyhow::bail!("duplicate forward name '{}'", fwd.name);
            }
            if !ports.insert(fwd.local_port) {
                anyhow::bail!("local port {} forwarded twice", fwd.local_port);
            }
        }

        for cred in &self.credentials {
            if cred.username.is_none() && cred.username_key.is_none() {
                anyhow::bail!(
                    "credential '{}' needs either username or username_key",
                    cred.name
                );
            }
        }

        Ok(())
    }

    /// Override the minikube profile.
    #[must_use]
    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        if let Some(profile) = profile {
            self.cluster.profile = profile;
        }
        self
    }

    /// Look up a chart by release name.
    #[must_use]
    pub fn chart(&self, release: &str) -> Option<&ChartSpec> {
        self.charts.iter().find(|c| c.release == release)
    }
}
