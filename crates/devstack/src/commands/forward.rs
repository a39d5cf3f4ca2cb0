use anyhow::Result;
use clap::Args;

use devstack::forward::{self, PortForwarder};
use devstack::ui;

use super::Context;

/// Forward cluster services to localhost
#[derive(Args)]
pub struct ForwardCommand {
    /// Forwards to start (all when omitted)
    #[arg(value_name = "NAME")]
    names: Vec<String>,
}

impl ForwardCommand {
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        let specs = forward::select(&ctx.config.forwards, &self.names)?;

        ui::print_section("Port forwards");
        let mut forwarder = PortForwarder::spawn(&ctx.tools, &specs)?;
        let failed = forwarder.wait_ready(&ctx.retry()).await;
        for name in &failed {
            ui::print_error(&format!("{name}: not reachable"));
        }

        if forwarder.is_empty() {
            anyhow::bail!("No port forward became reachable");
        }

        forwarder.print_endpoints();
        ui::print_info("Press Ctrl-C to stop.");
        forwarder.run_until_interrupted().await?;

        if failed.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("{} port forward(s) failed: {}", failed.len(), failed.join(", "))
        }
    }
}
