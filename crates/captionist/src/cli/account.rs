//! The `captionist account` command: sign-up, sign-in, and per-user data.

use captionist_core::output::to_json;
use captionist_core::Config;
use clap::{Args, Subcommand};
use console::style;
use dialoguer::{Confirm, Input, Password};

use super::SessionArgs;

/// Arguments for the `account` command.
#[derive(Args, Debug)]
pub struct AccountArgs {
    #[command(subcommand)]
    pub command: AccountCommand,
}

#[derive(Subcommand, Debug)]
pub enum AccountCommand {
    /// Create an account
    Signup {
        /// Email address (prompted when omitted)
        #[arg(long)]
        email: Option<String>,

        /// Display name (prompted when omitted)
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        password: PasswordArg,
    },

    /// Sign in and remember the session for later commands
    Login {
        /// Email address (prompted when omitted)
        #[arg(long)]
        email: Option<String>,

        #[command(flatten)]
        password: PasswordArg,
    },

    /// End the current session
    Logout {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Show the signed-in account
    Whoami {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Show how many caption requests this process may still make
    Quota {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Delete every stored image and caption record of the signed-in account
    DeleteData {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,

        #[command(flatten)]
        session: SessionArgs,
    },
}

/// Non-interactive password input.
#[derive(Args, Debug, Clone, Default)]
pub struct PasswordArg {
    /// Password (prompted when omitted)
    #[arg(long, env = "CAPTIONIST_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

/// Execute the account command.
pub async fn execute(args: AccountArgs, config: Config) -> anyhow::Result<()> {
    let pretty = config.output.pretty;
    let service = super::open_service(config).await?;

    match args.command {
        AccountCommand::Signup {
            email,
            name,
            password,
        } => {
            let email = prompt_or(email, "Email")?;
            let name = prompt_or(name, "Full name")?;
            let password = match password.password {
                Some(password) => password,
                None => Password::with_theme(&super::theme())
                    .with_prompt("Password")
                    .with_confirmation("Confirm password", "Passwords do not match")
                    .interact()?,
            };

            let user_id = service.auth().signup(&email, &password, &name).await?;
            eprintln!(
                "{} Account created for {}",
                style("✓").green(),
                style(&email).bold()
            );
            println!("{user_id}");
        }

        AccountCommand::Login { email, password } => {
            let email = prompt_or(email, "Email")?;
            let password = match password.password {
                Some(password) => password,
                None => Password::with_theme(&super::theme())
                    .with_prompt("Password")
                    .interact()?,
            };

            let session = service.auth().signin(&email, &password).await?;
            super::save_session(&super::session_file(service.config()), &session.session_id)?;
            eprintln!(
                "{} Signed in as {} until {}",
                style("✓").green(),
                style(&session.email).bold(),
                session.expires_at.format("%Y-%m-%d %H:%M UTC")
            );
        }

        AccountCommand::Logout { session } => {
            let saved = super::session_file(service.config());
            let session_id = super::resolve_session(session.session.as_deref(), &saved)?;
            let ended = service.auth().logout(&session_id).await?;
            super::clear_session(&saved)?;
            if ended {
                eprintln!("{} Signed out", style("✓").green());
            } else {
                eprintln!("Session had already ended");
            }
        }

        AccountCommand::Whoami { session } => {
            let session = super::signed_in(&service, &session).await?;
            let profile = service
                .auth()
                .profile(&session.user_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Account {} no longer exists", session.user_id))?;
            println!("{}", to_json(&profile, pretty)?);
        }

        AccountCommand::Quota { session } => {
            let session = super::signed_in(&service, &session).await?;
            println!(
                "{} of {} caption requests available (refills at {}/sec)",
                service.remaining_quota(&session.user_id),
                service.quota_capacity(),
                service.config().rate_limit.refill_rate
            );
        }

        AccountCommand::DeleteData { yes, session } => {
            let session = super::signed_in(&service, &session).await?;
            let confirmed = yes
                || Confirm::with_theme(&super::theme())
                    .with_prompt(format!(
                        "Delete all stored images and captions for {}?",
                        session.email
                    ))
                    .default(false)
                    .interact()?;
            if !confirmed {
                eprintln!("Nothing deleted");
                return Ok(());
            }

            let summary = service.delete_user_data(&session.user_id).await?;
            eprintln!(
                "{} Deleted {} record(s) and {} stored file(s)",
                style("✓").green(),
                summary.records_deleted,
                summary.objects_deleted
            );
        }
    }

    Ok(())
}

fn prompt_or(value: Option<String>, prompt: &str) -> anyhow::Result<String> {
    match value {
        Some(value) => Ok(value),
        None => Ok(Input::<String>::with_theme(&super::theme())
            .with_prompt(prompt)
            .interact_text()?),
    }
}
