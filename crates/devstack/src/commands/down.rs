use anyhow::Result;
use clap::Args;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm};

use devstack::{ui, Cluster};

use super::Context;

/// Delete the local cluster
#[derive(Args)]
pub struct DownCommand {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

impl DownCommand {
    pub fn run(&self, ctx: &Context) -> Result<()> {
        let profile = ctx.tools.profile();

        if !self.yes {
            let proceed = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(format!("Delete cluster '{profile}' and everything deployed on it?"))
                .default(false)
                .interact()?;

            if !proceed {
                println!("{}", "Cancelled.".yellow());
                return Ok(());
            }
        }

        Cluster::new(&ctx.tools, &ctx.config.cluster).delete()?;
        ui::print_success(&format!("Cluster '{profile}' deleted"));
        Ok(())
    }
}
