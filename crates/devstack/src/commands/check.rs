use anyhow::Result;
use clap::Args;

use devstack::ui;
use devstack::validator::PrerequisitesValidator;

use super::Context;

/// Check prerequisites
#[derive(Args)]
pub struct CheckCommand {}

impl CheckCommand {
    pub fn run(&self, ctx: &Context) -> Result<()> {
        ui::print_section("Checking prerequisites");
        PrerequisitesValidator::new(ctx.config.cluster.memory_mb).validate()
    }
}
