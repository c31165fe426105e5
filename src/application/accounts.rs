//! Signup, login and session management.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::RngCore;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::{SessionRecord, UserRecord};
use crate::domain::slug::is_valid_username;

const MIN_PASSWORD_LENGTH: usize = 8;
const SESSION_TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

#[derive(Debug, Clone, Default)]
pub struct SignupInput {
    pub username: String,
    pub display_name: Option<String>,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupIssues {
    pub username: Option<&'static str>,
    pub password: Option<&'static str>,
}

impl SignupIssues {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none()
    }
}

#[derive(Debug)]
pub enum SignupOutcome {
    /// Account created and immediately signed in.
    Created {
        user: UserRecord,
        session: SessionRecord,
    },
    Invalid(SignupIssues),
}

#[derive(Debug)]
pub enum LoginOutcome {
    LoggedIn {
        user: UserRecord,
        session: SessionRecord,
    },
    /// Unknown username or wrong password; the form does not say which.
    BadCredentials,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    pub async fn signup(&self, input: SignupInput) -> Result<SignupOutcome, AccountError> {
        let mut issues = SignupIssues::default();

        let username = input.username.trim();
        if !is_valid_username(username) {
            issues.username =
                Some("Usernames may only contain letters, digits, `-`, `_` and `.`.");
        } else if self.users.find_by_username(username).await?.is_some() {
            issues.username = Some("This username is already taken.");
        }

        if input.password.len() < MIN_PASSWORD_LENGTH {
            issues.password = Some("Passwords must be at least 8 characters long.");
        } else if input.password != input.password_confirm {
            issues.password = Some("The two password fields do not match.");
        }

        if !issues.is_empty() {
            return Ok(SignupOutcome::Invalid(issues));
        }

        let password_hash = hash_password(&input.password)?;
        let display_name = input
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let user = match self
            .users
            .create_user(CreateUserParams {
                username: username.to_string(),
                password_hash,
                display_name,
            })
            .await
        {
            Ok(user) => user,
            // A concurrent signup can still win the unique index race.
            Err(RepoError::Duplicate { .. }) => {
                return Ok(SignupOutcome::Invalid(SignupIssues {
                    username: Some("This username is already taken."),
                    password: None,
                }));
            }
            Err(err) => return Err(err.into()),
        };

        let session = self.issue_session(&user).await?;
        Ok(SignupOutcome::Created { user, session })
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, AccountError> {
        let Some(user) = self.users.find_by_username(username.trim()).await? else {
            return Ok(LoginOutcome::BadCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            return Ok(LoginOutcome::BadCredentials);
        }

        let session = self.issue_session(&user).await?;
        Ok(LoginOutcome::LoggedIn { user, session })
    }

    pub async fn logout(&self, token: &str) -> Result<(), AccountError> {
        self.sessions.delete_session(token).await?;
        Ok(())
    }

    /// Resolve a session cookie to its user, rejecting expired sessions.
    pub async fn resolve_session(&self, token: &str) -> Result<Option<UserRecord>, AccountError> {
        let Some((session, user)) = self.sessions.find_session(token).await? else {
            return Ok(None);
        };

        if session.is_expired(OffsetDateTime::now_utc()) {
            self.sessions.delete_session(token).await?;
            return Ok(None);
        }

        Ok(Some(user))
    }

    /// Remove expired sessions; called from the background sweeper.
    pub async fn sweep_sessions(&self) -> Result<u64, AccountError> {
        let removed = self
            .sessions
            .delete_expired(OffsetDateTime::now_utc())
            .await?;
        Ok(removed)
    }

    async fn issue_session(&self, user: &UserRecord) -> Result<SessionRecord, AccountError> {
        let session = self
            .sessions
            .create_session(CreateSessionParams {
                token: generate_token(),
                user_id: user.id,
                expires_at: OffsetDateTime::now_utc() + self.session_ttl,
            })
            .await?;
        Ok(session)
    }
}

fn generate_token() -> String {
    let mut bytes = [0_u8; SESSION_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AccountError::Hash(err.to_string()))
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<bool, AccountError> {
    let parsed = PasswordHash::new(hash).map_err(|err| AccountError::Hash(err.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Hash a password for out-of-band account creation (the `create-user`
/// CLI subcommand).
pub fn hash_password_for_cli(password: &str) -> Result<String, AccountError> {
    hash_password(password)
}
