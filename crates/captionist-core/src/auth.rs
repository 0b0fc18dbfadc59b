//! User accounts and sign-in sessions.
//!
//! Accounts and sessions live in one JSON document (`auth.json` in the data
//! directory). Passwords are stored as salted BLAKE3 digests. Sessions expire
//! after `auth.session_days`; an expired session is deleted the first time it
//! is presented.

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::storage::{read_json_or_default, write_json_atomic};
use crate::types::{UserProfile, UserSession};
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use tokio::sync::Mutex;

const MIN_PASSWORD_CHARS: usize = 8;
const DEFAULT_ROLE: &str = "user";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
    })
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if email_regex().is_match(email) {
        Ok(())
    } else {
        Err(AuthError::InvalidEmail)
    }
}

/// At least eight characters with an uppercase letter, a lowercase letter, and a digit.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let weak = |msg: &str| Err(AuthError::WeakPassword(msg.to_string()));
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return weak("Password must be at least 8 characters long");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return weak("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return weak("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return weak("Password must contain at least one number");
    }
    Ok(())
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn hash_password(password: &str, salt: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hasher.finalize()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserAccount {
    user_id: String,
    email: String,
    full_name: String,
    password_hash: String,
    salt: String,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    is_active: bool,
    #[serde(default = "default_role")]
    role: String,
}

fn default_active() -> bool {
    true
}

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}

impl UserAccount {
    fn verify(&self, password: &str) -> bool {
        // blake3::Hash equality is constant-time.
        blake3::Hash::from_hex(&self.password_hash)
            .map(|stored| stored == hash_password(password, &self.salt))
            .unwrap_or(false)
    }

    fn profile(&self) -> UserProfile {
        UserProfile {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            created_at: self.created_at,
            last_login: self.last_login,
            role: self.role.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AuthState {
    #[serde(default)]
    users: HashMap<String, UserAccount>,
    #[serde(default)]
    sessions: HashMap<String, UserSession>,
}

impl AuthState {
    fn find_by_email(&self, email: &str) -> Option<&UserAccount> {
        self.users.values().find(|u| u.email == email)
    }
}

/// File-backed account and session manager.
pub struct UserAuth {
    path: PathBuf,
    session_lifetime: Duration,
    state: Mutex<AuthState>,
}

impl UserAuth {
    pub async fn open(path: impl Into<PathBuf>, config: &AuthConfig) -> Result<Self, AuthError> {
        let path = path.into();
        let state: AuthState = read_json_or_default(&path)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(Self {
            path,
            session_lifetime: Duration::days(i64::from(config.session_days)),
            state: Mutex::new(state),
        })
    }

    /// Write `next` to disk, then make it the live state.
    async fn commit(&self, state: &mut AuthState, next: AuthState) -> Result<(), AuthError> {
        write_json_atomic(&self.path, &next)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        *state = next;
        Ok(())
    }

    /// Register a new account and return its user id.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<String, AuthError> {
        let email = email.trim();
        validate_email(email)?;
        validate_password(password)?;
        let email = email.to_lowercase();

        let mut state = self.state.lock().await;
        if state.find_by_email(&email).is_some() {
            return Err(AuthError::EmailTaken);
        }

        let user_id = format!("user_{}", random_token(22));
        let salt = random_token(32);
        let account = UserAccount {
            user_id: user_id.clone(),
            email,
            full_name: full_name.trim().to_string(),
            password_hash: hash_password(password, &salt).to_hex().to_string(),
            salt,
            created_at: Utc::now(),
            last_login: None,
            is_active: true,
            role: default_role(),
        };
        let mut next = state.clone();
        next.users.insert(user_id.clone(), account);
        self.commit(&mut state, next).await?;

        tracing::info!(user_id = %user_id, "Account created");
        Ok(user_id)
    }

    pub async fn signin(&self, email: &str, password: &str) -> Result<UserSession, AuthError> {
        self.signin_at(email, password, Utc::now()).await
    }

    /// Check credentials and open a session starting at `now`.
    pub async fn signin_at(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<UserSession, AuthError> {
        let email = email.trim().to_lowercase();
        let mut state = self.state.lock().await;

        let account = state
            .find_by_email(&email)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;
        if !account.is_active {
            return Err(AuthError::Inactive);
        }
        if !account.verify(password) {
            tracing::debug!(user_id = %account.user_id, "Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let expires_at = now
            .checked_add_signed(self.session_lifetime)
            .ok_or(AuthError::SessionLifetime {
                days: self.session_lifetime.num_days(),
            })?;

        let mut next = state.clone();
        if let Some(user) = next.users.get_mut(&account.user_id) {
            user.last_login = Some(now);
        }
        next.sessions.retain(|_, s| !s.is_expired_at(now));

        let session = UserSession {
            session_id: random_token(43),
            user_id: account.user_id,
            email: account.email,
            full_name: account.full_name,
            created_at: now,
            expires_at,
        };
        next.sessions.insert(session.session_id.clone(), session.clone());
        self.commit(&mut state, next).await?;

        tracing::info!(user_id = %session.user_id, "Signed in");
        Ok(session)
    }

    pub async fn validate_session(&self, session_id: &str) -> Result<Option<UserSession>, AuthError> {
        self.validate_session_at(session_id, Utc::now()).await
    }

    /// Look up a live session. Expired sessions are removed and reported as `None`.
    pub async fn validate_session_at(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserSession>, AuthError> {
        let mut state = self.state.lock().await;
        match state.sessions.get(session_id) {
            None => return Ok(None),
            Some(session) if !session.is_expired_at(now) => return Ok(Some(session.clone())),
            Some(_) => {}
        }

        let mut next = state.clone();
        next.sessions.remove(session_id);
        self.commit(&mut state, next).await?;
        tracing::debug!("Removed expired session");
        Ok(None)
    }

    /// Like [`validate_session`](Self::validate_session), but missing or
    /// expired sessions are an error.
    pub async fn require_session(&self, session_id: &str) -> Result<UserSession, AuthError> {
        self.validate_session(session_id)
            .await?
            .ok_or(AuthError::InvalidSession)
    }

    /// End a session. Returns whether it existed.
    pub async fn logout(&self, session_id: &str) -> Result<bool, AuthError> {
        let mut state = self.state.lock().await;
        if !state.sessions.contains_key(session_id) {
            return Ok(false);
        }
        let mut next = state.clone();
        next.sessions.remove(session_id);
        self.commit(&mut state, next).await?;
        Ok(true)
    }

    pub async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>, AuthError> {
        let state = self.state.lock().await;
        Ok(state.users.get(user_id).map(UserAccount::profile))
    }

    /// Enable or disable sign-in for an account. Disabling also ends its sessions.
    pub async fn set_active(&self, user_id: &str, active: bool) -> Result<bool, AuthError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let Some(user) = next.users.get_mut(user_id) else {
            return Ok(false);
        };
        user.is_active = active;
        if !active {
            next.sessions.retain(|_, s| s.user_id != user_id);
        }
        self.commit(&mut state, next).await?;
        Ok(true)
    }
}
