//! devstack: local Kubernetes development stack.
//!
//! Brings up a single-node minikube cluster, installs Argo CD, Kong, Jenkins
//! and kube-prometheus-stack with Helm, patches Argo CD for local use,
//! registers Kong services from a declarative file and exposes everything
//! through `kubectl port-forward`.
//!
//! # Example
//!
//! ```ignore
//! use devstack::{ChartDeployer, Cluster, StackConfig, Toolbox};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StackConfig::load(None)?;
//!     let tools = Toolbox::system(&config.cluster.profile);
//!     let retry = config.readiness.retry();
//!
//!     Cluster::new(&tools, &config.cluster).start()?;
//!     let report = ChartDeployer::new(&tools, retry).deploy_all(&config.charts).await;
//!     assert!(report.is_success());
//!     Ok(())
//! }
//! ```

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]

pub mod argocd;
pub mod cluster;
pub mod config;
pub mod credentials;
pub mod deploy;
pub mod exec;
pub mod forward;
pub mod registration;
pub mod ui;
pub mod validator;
pub mod wait;

// Re-export commonly used types at the crate root
pub use cluster::{Cluster, ClusterStatus};
pub use config::StackConfig;
pub use deploy::{ChartDeployer, DeployReport};
pub use exec::Toolbox;
