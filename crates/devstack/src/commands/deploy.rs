use anyhow::{Context as _, Result};
use clap::Args;

use devstack::config::ChartSpec;
use devstack::{ui, ChartDeployer, DeployReport};

use super::Context;

/// Deploy Helm charts
#[derive(Args)]
pub struct DeployCommand {
    /// Deploy only this release
    #[arg(long, value_name = "RELEASE")]
    only: Option<String>,
}

impl DeployCommand {
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        let charts: Vec<ChartSpec> = match &self.only {
            Some(release) => vec![ctx
                .config
                .chart(release)
                .with_context(|| format!("No chart with release name '{release}'"))?
                .clone()],
            None => ctx.config.charts.clone(),
        };

        ui::print_section("Deploying charts");
        let report = ChartDeployer::new(&ctx.tools, ctx.retry())
            .deploy_all(&charts)
            .await;

        print_report(&report);
        if report.is_success() {
            Ok(())
        } else {
            anyhow::bail!("{} of {} charts failed", report.failed.len(), charts.len())
        }
    }
}

/// Print a deploy summary.
pub fn print_report(report: &DeployReport) {
    ui::print_section("Deployment summary");
    for release in &report.succeeded {
        ui::print_success(release);
    }
    for failure in &report.failed {
        ui::print_error(&format!("{}: {}", failure.release, failure.error));
    }
}
