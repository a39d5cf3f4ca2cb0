//! devstack CLI.
//!
//! Bootstraps a local minikube cluster, deploys the development stack with
//! Helm, registers Kong services and forwards ports to localhost.

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::check::CheckCommand;
use commands::cluster::ClusterCommand;
use commands::credentials::CredentialsCommand;
use commands::deploy::DeployCommand;
use commands::down::DownCommand;
use commands::forward::ForwardCommand;
use commands::gateway::GatewayCommand;
use commands::up::UpCommand;
use commands::Context;

/// devstack - Local Kubernetes Development Stack.
#[derive(Parser)]
#[command(
    name = "devstack",
    version,
    about = "Local Kubernetes development stack",
    long_about = "Bring up a local Kubernetes development stack.\n\n\
                  Starts a minikube cluster, deploys Argo CD, Kong, Jenkins and\n\
                  kube-prometheus-stack with Helm, registers Kong services from a\n\
                  declarative file and forwards the UIs to localhost.\n\n\
                  Re-running a command is safe: running clusters are reused and\n\
                  charts are upgraded in place."
)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Stack config file (defaults to ~/.config/devstack/config.yaml when present).
    #[arg(short, long, global = true, env = "DEVSTACK_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// minikube profile / kube context to use.
    #[arg(short, long, global = true, env = "DEVSTACK_PROFILE", value_name = "NAME")]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the required tools are installed.
    Check(CheckCommand),

    /// Bring up the whole stack.
    ///
    /// Starts the cluster, deploys every chart, patches Argo CD, registers
    /// the Kong config, prints credentials and holds port forwards open.
    Up(UpCommand),

    /// Manage the local cluster.
    #[command(subcommand)]
    Cluster(ClusterCommand),

    /// Deploy Helm charts.
    Deploy(DeployCommand),

    /// Register or validate a declarative Kong service config.
    #[command(subcommand)]
    Gateway(GatewayCommand),

    /// Forward cluster services to localhost until interrupted.
    Forward(ForwardCommand),

    /// Print admin credentials for the deployed applications.
    Credentials(CredentialsCommand),

    /// Delete the local cluster.
    Down(DownCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("info,devstack=debug,gateway=debug")
    } else {
        EnvFilter::new("warn,devstack=info,gateway=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let ctx = Context::load(cli.config.as_deref(), cli.profile)?;

    match cli.command {
        Commands::Check(cmd) => cmd.run(&ctx),
        Commands::Up(cmd) => cmd.run(&ctx).await,
        Commands::Cluster(cmd) => cmd.run(&ctx).await,
        Commands::Deploy(cmd) => cmd.run(&ctx).await,
        Commands::Gateway(cmd) => cmd.run(&ctx).await,
        Commands::Forward(cmd) => cmd.run(&ctx).await,
        Commands::Credentials(cmd) => cmd.run(&ctx).await,
        Commands::Down(cmd) => cmd.run(&ctx),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use serial_test::serial;

    use super::*;

    const ADMIN_VARS: [&str; 2] = ["KONG_ADMIN_URL", "DRY_RUN"];

    fn parse_with_env(vars: &[(&str, &str)], args: &[&str]) -> Cli {
        for name in ADMIN_VARS {
            std::env::remove_var(name);
        }
        for (name, value) in vars {
            std::env::set_var(name, value);
        }
        let cli = Cli::try_parse_from(args);
        for name in ADMIN_VARS {
            std::env::remove_var(name);
        }
        cli.unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    #[serial]
    fn test_up_reads_admin_env() {
        let cli = parse_with_env(
            &[("KONG_ADMIN_URL", "http://kong:8001"), ("DRY_RUN", "1")],
            &["devstack", "up"],
        );
        let Commands::Up(cmd) = cli.command else {
            panic!("expected up");
        };
        assert_eq!(cmd.admin.admin_url.as_deref(), Some("http://kong:8001"));
        assert!(cmd.admin.dry_run);
    }

    #[test]
    #[serial]
    fn test_gateway_apply_reads_admin_env() {
        let cli = parse_with_env(
            &[("KONG_ADMIN_URL", "http://kong:8001"), ("DRY_RUN", "true")],
            &["devstack", "gateway", "apply", "services.yaml"],
        );
        let Commands::Gateway(GatewayCommand::Apply(args)) = cli.command else {
            panic!("expected gateway apply");
        };
        assert_eq!(args.file, PathBuf::from("services.yaml"));
        assert_eq!(args.admin.admin_url.as_deref(), Some("http://kong:8001"));
        assert!(args.admin.dry_run);
    }

    #[test]
    #[serial]
    fn test_dry_run_env_false() {
        let cli = parse_with_env(&[("DRY_RUN", "false")], &["devstack", "up"]);
        let Commands::Up(cmd) = cli.command else {
            panic!("expected up");
        };
        assert!(!cmd.admin.dry_run);
    }

    #[test]
    #[serial]
    fn test_admin_defaults_without_env() {
        let cli = parse_with_env(&[], &["devstack", "gateway", "apply", "services.yaml"]);
        let Commands::Gateway(GatewayCommand::Apply(args)) = cli.command else {
            panic!("expected gateway apply");
        };
        assert!(args.admin.admin_url.is_none());
        assert!(!args.admin.dry_run);
    }

    #[test]
    #[serial]
    fn test_flags_override_env() {
        let cli = parse_with_env(
            &[("KONG_ADMIN_URL", "http://kong:8001")],
            &["devstack", "up", "--admin-url", "http://127.0.0.1:9001", "--dry-run"],
        );
        let Commands::Up(cmd) = cli.command else {
            panic!("expected up");
        };
        assert_eq!(cmd.admin.admin_url.as_deref(), Some("http://127.0.0.1:9001"));
        assert!(cmd.admin.dry_run);
    }
}
