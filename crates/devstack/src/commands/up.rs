use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::{error, info};

use devstack::argocd::ArgoCd;
use devstack::forward::{self, PortForwarder};
use devstack::validator::PrerequisitesValidator;
use devstack::{ui, ChartDeployer, Cluster};

use super::credentials::print_credentials;
use super::deploy::print_report;
use super::gateway::{register, AdminArgs};
use super::Context;

const TOTAL_STEPS: u8 = 7;

/// Bring up the whole stack
#[derive(Args)]
pub struct UpCommand {
    /// Declarative Kong config to register (overrides gateway.config_file).
    #[arg(long, value_name = "FILE")]
    gateway_config: Option<PathBuf>,

    /// Do not register the Kong config.
    #[arg(long)]
    skip_gateway: bool,

    /// Do not start port forwards.
    #[arg(long)]
    no_forward: bool,

    #[command(flatten)]
    pub admin: AdminArgs,
}

impl UpCommand {
    #[allow(clippy::too_many_lines)]
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        ui::print_banner(ctx.tools.profile());
        let retry = ctx.retry();
        let mut failures: Vec<String> = Vec::new();

        // Step 1: prerequisites are the only hard gate besides the cluster itself
        ui::print_progress_step(1, TOTAL_STEPS, "Checking prerequisites");
        PrerequisitesValidator::new(ctx.config.cluster.memory_mb).validate()?;

        // Step 2: cluster
        ui::print_progress_step(2, TOTAL_STEPS, "Starting cluster");
        let cluster = Cluster::new(&ctx.tools, &ctx.config.cluster);
        if cluster.start()? {
            ui::print_success(&format!("Cluster '{}' started", ctx.tools.profile()));
        } else {
            ui::print_info(&format!("Cluster '{}' already running", ctx.tools.profile()));
        }
        cluster.wait_ready(&retry).await?;

        // Step 3: charts
        ui::print_progress_step(3, TOTAL_STEPS, "Deploying charts");
        let report = ChartDeployer::new(&ctx.tools, retry)
            .deploy_all(&ctx.config.charts)
            .await;
        print_report(&report);
        failures.extend(
            report
                .failed
                .iter()
                .map(|f| format!("chart {}: {}", f.release, f.error)),
        );

        // Step 4: Argo CD
        ui::print_progress_step(4, TOTAL_STEPS, "Configuring Argo CD");
        let argocd = &ctx.config.argocd;
        if !argocd.enabled {
            ui::print_info("Argo CD patching disabled");
        } else if ctx.config.chart("argocd").is_some() && !report.deployed("argocd") {
            ui::print_warning("Argo CD chart did not deploy, skipping patches");
        } else if let Err(e) = ArgoCd::new(&ctx.tools, argocd, retry).configure().await {
            error!(error = %format!("{e:#}"), "Argo CD configuration failed");
            ui::print_error(&format!("Argo CD configuration failed: {e:#}"));
            failures.push(format!("argocd: {e:#}"));
        } else {
            ui::print_success("Argo CD configured");
        }

        // Step 5: port forwards
        ui::print_progress_step(5, TOTAL_STEPS, "Starting port forwards");
        let forwarder = if self.no_forward {
            ui::print_info("Port forwards disabled");
            None
        } else {
            let specs = forward::select(&ctx.config.forwards, &[])?;
            match PortForwarder::spawn(&ctx.tools, &specs) {
                Ok(mut forwarder) => {
                    for name in forwarder.wait_ready(&retry).await {
                        ui::print_error(&format!("Port forward '{name}' not reachable"));
                        failures.push(format!("forward {name}: not reachable"));
                    }
                    info!(active = forwarder.len(), "Port forwards running");
                    Some(forwarder)
                }
                Err(e) => {
                    ui::print_error(&format!("{e:#}"));
                    failures.push(format!("forwards: {e:#}"));
                    None
                }
            }
        };

        // Step 6: gateway
        ui::print_progress_step(6, TOTAL_STEPS, "Registering gateway config");
        let gateway_file = self
            .gateway_config
            .as_ref()
            .or(ctx.config.gateway.config_file.as_ref());
        match gateway_file {
            _ if self.skip_gateway => ui::print_info("Gateway registration skipped"),
            None => ui::print_info("No gateway config file configured"),
            Some(file) => {
                if let Err(e) = register(file, &self.admin, ctx).await {
                    ui::print_error(&format!("{e:#}"));
                    failures.push(format!("gateway: {e:#}"));
                }
            }
        }

        // Step 7: credentials
        ui::print_progress_step(7, TOTAL_STEPS, "Retrieving credentials");
        match print_credentials(ctx).await {
            Ok(0) => {}
            Ok(missing) => failures.push(format!("credentials: {missing} unavailable")),
            Err(e) => {
                ui::print_error(&format!("{e:#}"));
                failures.push(format!("credentials: {e:#}"));
            }
        }

        // Summary
        if failures.is_empty() {
            ui::print_section("Stack is up!");
        } else {
            ui::print_section("Stack is up with failures");
            for failure in &failures {
                ui::print_error(failure);
            }
        }

        if let Some(forwarder) = forwarder.filter(|f| !f.is_empty()) {
            println!();
            forwarder.print_endpoints();
            ui::print_info("Press Ctrl-C to stop the port forwards.");
            forwarder.run_until_interrupted().await?;
        }

        if failures.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("{} step(s) failed", failures.len())
        }
    }
}
