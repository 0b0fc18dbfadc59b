//! Command handlers and the helpers they share: opening the service,
//! resolving the caller's session, and prompt styling.

pub mod account;
pub mod admin;
pub mod caption;
pub mod config;
pub mod history;
pub mod providers;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use captionist_core::{Captionist, Config, UserSession};
use clap::Args;
use console::{style, Style};
use dialoguer::theme::ColorfulTheme;

/// File under the data directory holding the session id from `account login`.
const SESSION_FILE: &str = "session";

/// Session selection shared by every command that acts for a user.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Session id (defaults to the one saved by `captionist account login`)
    #[arg(long, env = "CAPTIONIST_SESSION", hide_env_values = true)]
    pub session: Option<String>,
}

pub async fn open_service(config: Config) -> anyhow::Result<Captionist> {
    let data_dir = config.data_dir();
    Captionist::open(config)
        .await
        .with_context(|| format!("Failed to open data directory {}", data_dir.display()))
}

pub fn session_file(config: &Config) -> PathBuf {
    config.data_dir().join(SESSION_FILE)
}

/// Explicit session id first, then the saved session file.
pub fn resolve_session(explicit: Option<&str>, saved: &Path) -> anyhow::Result<String> {
    if let Some(id) = explicit.map(str::trim).filter(|id| !id.is_empty()) {
        return Ok(id.to_string());
    }
    match std::fs::read_to_string(saved) {
        Ok(content) if !content.trim().is_empty() => Ok(content.trim().to_string()),
        Ok(_) => anyhow::bail!("Not signed in. Run `captionist account login` first."),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            anyhow::bail!("Not signed in. Run `captionist account login` first.")
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", saved.display())),
    }
}

pub fn save_session(path: &Path, session_id: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    // The session id is a bearer credential; keep it owner-only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        if path.exists() {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict {}", path.display()))?;
        }
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.write_all(session_id.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Remove the saved session. Returns false when there was none.
pub fn clear_session(path: &Path) -> anyhow::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// Resolve and validate the caller's session against the auth store.
pub async fn signed_in(service: &Captionist, args: &SessionArgs) -> anyhow::Result<UserSession> {
    let session_id = resolve_session(args.session.as_deref(), &session_file(service.config()))?;
    service
        .authenticate(&session_id)
        .await
        .context("Session is invalid or expired. Run `captionist account login` again.")
}

/// Prompt theme: cyan `?` prefix, green values, red errors, all on stderr.
pub fn theme() -> ColorfulTheme {
    ColorfulTheme {
        prompt_prefix: style("?".to_string()).for_stderr().cyan(),
        prompt_style: Style::new().for_stderr().bold(),
        success_prefix: style("✓".to_string()).for_stderr().green(),
        error_prefix: style("✗".to_string()).for_stderr().red(),
        error_style: Style::new().for_stderr().red(),
        values_style: Style::new().for_stderr().green(),
        ..ColorfulTheme::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_session_wins() {
        let dir = tempfile::tempdir().unwrap();
        let saved = dir.path().join(SESSION_FILE);
        save_session(&saved, "from-file").unwrap();

        assert_eq!(resolve_session(Some("from-flag"), &saved).unwrap(), "from-flag");
        assert_eq!(resolve_session(Some("  "), &saved).unwrap(), "from-file");
        assert_eq!(resolve_session(None, &saved).unwrap(), "from-file");
    }

    #[test]
    fn test_missing_session_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_session(None, &dir.path().join(SESSION_FILE)).unwrap_err();
        assert!(err.to_string().contains("account login"));
    }

    #[test]
    fn test_save_and_clear_session() {
        let dir = tempfile::tempdir().unwrap();
        let saved = dir.path().join("nested").join(SESSION_FILE);

        save_session(&saved, "abc\n").unwrap();
        assert_eq!(resolve_session(None, &saved).unwrap(), "abc");
        assert!(clear_session(&saved).unwrap());
        assert!(!clear_session(&saved).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_session_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let saved = dir.path().join(SESSION_FILE);
        std::fs::write(&saved, "old").unwrap();
        std::fs::set_permissions(&saved, std::fs::Permissions::from_mode(0o644)).unwrap();

        save_session(&saved, "fresh").unwrap();
        let mode = std::fs::metadata(&saved).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(resolve_session(None, &saved).unwrap(), "fresh");
    }

    #[test]
    fn test_session_file_lives_in_data_dir() {
        let mut config = Config::default();
        config.general.data_dir = PathBuf::from("/tmp/captionist-data");
        assert_eq!(
            session_file(&config),
            PathBuf::from("/tmp/captionist-data/session")
        );
    }
}
