use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Subcommand};

use devstack::registration::{self, Registration};
use devstack::ui;
use gateway::{plan, AdminCall};

use super::Context;

/// Kong declarative config
#[derive(Subcommand)]
pub enum GatewayCommand {
    /// Register services, routes and plugins with the Kong admin API.
    Apply(ApplyArgs),
    /// Parse and validate a config file, printing the calls it would make.
    Validate {
        /// Declarative service config.
        file: PathBuf,
    },
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Declarative service config.
    pub file: PathBuf,

    #[command(flatten)]
    pub admin: AdminArgs,
}

/// Admin API target shared by every command that registers services.
#[derive(Args)]
pub struct AdminArgs {
    /// Kong admin API URL (defaults to gateway.admin_url from the stack config).
    #[arg(long, env = "KONG_ADMIN_URL", value_name = "URL")]
    pub admin_url: Option<String>,

    /// Print the calls without issuing them.
    #[arg(
        long,
        env = "DRY_RUN",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub dry_run: bool,
}

impl AdminArgs {
    pub fn admin_url<'a>(&'a self, ctx: &'a Context) -> &'a str {
        self.admin_url
            .as_deref()
            .unwrap_or(&ctx.config.gateway.admin_url)
    }
}

impl GatewayCommand {
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        match self {
            Self::Apply(args) => register(&args.file, &args.admin, ctx).await,
            Self::Validate { file } => {
                let config = registration::load(file)?;
                ui::print_success(&format!(
                    "{} is valid ({} service(s))",
                    file.display(),
                    config.services.len()
                ));
                print_calls(&plan(&config));
                Ok(())
            }
        }
    }
}

fn print_calls(calls: &[AdminCall]) {
    for call in calls {
        ui::print_list_item(&call.to_string());
    }
}

/// Register a declarative config file and print what happened.
pub async fn register(file: &Path, admin: &AdminArgs, ctx: &Context) -> Result<()> {
    let admin_url = admin.admin_url(ctx);

    match registration::register(file, admin_url, admin.dry_run).await? {
        Registration::Planned(calls) => {
            ui::print_info(&format!("Dry run: calls that would be sent to {admin_url}"));
            print_calls(&calls);
        }
        Registration::Applied(report) => {
            for call in &report.applied {
                ui::print_success(&call.to_string());
            }
            for call in &report.skipped {
                ui::print_info(&format!("{call} (already present)"));
            }
        }
    }
    Ok(())
}
