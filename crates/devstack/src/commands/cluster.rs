use anyhow::Result;
use clap::Subcommand;

use devstack::{ui, Cluster};

use super::down::DownCommand;
use super::Context;

/// Cluster lifecycle
#[derive(Subcommand)]
pub enum ClusterCommand {
    /// Start the cluster (no-op when already running) and wait for nodes.
    Start,
    /// Stop the cluster, keeping its state.
    Stop,
    /// Delete the cluster.
    Delete(DownCommand),
    /// Show cluster status.
    Status,
}

impl ClusterCommand {
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        let cluster = Cluster::new(&ctx.tools, &ctx.config.cluster);
        let profile = ctx.tools.profile();

        match self {
            Self::Start => {
                if cluster.start()? {
                    ui::print_success(&format!("Cluster '{profile}' started"));
                } else {
                    ui::print_info(&format!("Cluster '{profile}' already running"));
                }
                cluster.wait_ready(&ctx.retry()).await?;
                ui::print_success("Nodes Ready");
            }
            Self::Stop => {
                cluster.stop()?;
                ui::print_success(&format!("Cluster '{profile}' stopped"));
            }
            Self::Delete(cmd) => cmd.run(ctx)?,
            Self::Status => {
                let status = cluster.status()?;
                ui::print_kv("profile", profile);
                ui::print_kv("host", &status.host);
                ui::print_kv("kubelet", &status.kubelet);
                ui::print_kv("apiserver", &status.apiserver);
                if !status.exists() {
                    ui::print_info("Run `devstack cluster start` to create it.");
                }
            }
        }

        Ok(())
    }
}
