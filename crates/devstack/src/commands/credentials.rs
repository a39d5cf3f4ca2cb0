use anyhow::Result;
use clap::Args;

use devstack::credentials::CredentialReader;
use devstack::ui;

use super::Context;

/// Print admin credentials
#[derive(Args)]
pub struct CredentialsCommand {}

impl CredentialsCommand {
    pub async fn run(&self, ctx: &Context) -> Result<()> {
        ui::print_section("Credentials");
        let missing = print_credentials(ctx).await?;
        if missing > 0 {
            anyhow::bail!("{missing} credential(s) unavailable");
        }
        Ok(())
    }
}

/// Print every configured credential, returning how many could not be read.
pub async fn print_credentials(ctx: &Context) -> Result<usize> {
    let reader = CredentialReader::for_context(ctx.tools.profile()).await?;
    let mut missing = 0;

    for (name, result) in reader.fetch_all(&ctx.config.credentials).await {
        match result {
            Ok(cred) => {
                ui::print_kv(&name, &format!("{} / {}", cred.username, cred.password));
            }
            Err(e) => {
                ui::print_warning(&format!("{name}: {e:#}"));
                missing += 1;
            }
        }
    }

    Ok(missing)
}
