//! The `captionist admin` command for service-wide maintenance.

use captionist_core::output::to_json;
use captionist_core::Config;
use clap::{Args, Subcommand};
use dialoguer::Confirm;

/// Arguments for the `admin` command.
#[derive(Args, Debug)]
pub struct AdminArgs {
    #[command(subcommand)]
    pub command: AdminCommand,
}

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
    /// Count stored caption records and distinct users
    Stats,

    /// Delete records and images older than the retention window
    Purge {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

/// Execute the admin command.
pub async fn execute(args: AdminArgs, config: Config) -> anyhow::Result<()> {
    let pretty = config.output.pretty;
    let retention_days = config.storage.retention_days;
    let service = super::open_service(config).await?;

    match args.command {
        AdminCommand::Stats => {
            let stats = service.usage_stats().await?;
            println!("{}", to_json(&stats, pretty)?);
        }

        AdminCommand::Purge { yes } => {
            let confirmed = yes
                || Confirm::with_theme(&super::theme())
                    .with_prompt(format!(
                        "Delete every caption older than {retention_days} days?"
                    ))
                    .default(false)
                    .interact()?;
            if !confirmed {
                eprintln!("Nothing purged");
                return Ok(());
            }

            let summary = service.purge_expired().await?;
            println!("{}", to_json(&summary, pretty)?);
        }
    }

    Ok(())
}
