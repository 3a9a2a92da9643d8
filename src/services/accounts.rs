//! Account subsystem: durable sessions, registered users, and the
//! per-user game bookmarks rooms maintain for registered players.
//!
//! DESIGN
//! ======
//! A connection's identity is an [`AccountRef`]: the client-chosen
//! session id while anonymous, the account email once logged in. Rooms
//! key players by this ref, which is what makes reconnection and
//! multi-tab play work. Session ids are client-generated and bound with
//! the `sessionid` verb; `register`/`login` attach an account to the
//! bound session so later connections restore it.
//!
//! TRADE-OFFS
//! ==========
//! Passwords are salted sha256 digests. A memory-hard KDF would be the
//! production choice; swapping one in only touches `hash_password` /
//! `verify_password`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use tracing::warn;

use crate::frame::now_ms;
use crate::room::AccountHook;
use crate::state::AppState;

// =============================================================================
// ACCOUNT REFS
// =============================================================================

/// Player identity: an anonymous session or a registered account.
/// Explicit variants instead of sniffing the string shape; only
/// `Registered` identities get durable per-user bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRef {
    Guest(String),
    Registered(String),
}

impl AccountRef {
    #[must_use]
    pub fn is_registered(&self) -> bool {
        matches!(self, AccountRef::Registered(_))
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            AccountRef::Guest(id) | AccountRef::Registered(id) => id,
        }
    }
}

/// A logged-in user as rooms and the `user|` frame see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub email: String,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Invalid sessionid")]
    InvalidSession,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("An account with e-mail address \"{0}\" already exists.")]
    EmailTaken(String),
    #[error("No account with that email exists")]
    NoSuchAccount,
    #[error("Wrong password")]
    WrongPassword,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

// =============================================================================
// VALIDATION AND HASHING
// =============================================================================

/// Session ids are client-generated: lowercase alphanumerics and
/// hyphens, at most 100 chars.
#[must_use]
pub fn valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 100
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let parts = normalized.split('@').collect::<Vec<_>>();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return None;
    }
    Some(normalized)
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

/// Produce a `salt$digest` credential string with a fresh random salt.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let salt_bytes: [u8; 16] = rand::rng().random();
    let salt = bytes_to_hex(&salt_bytes);
    let hash = digest(&salt, password);
    format!("{salt}${hash}")
}

#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, hash)) = stored.split_once('$') else {
        return false;
    };
    digest(salt, password) == hash
}

// =============================================================================
// SESSIONS AND USERS
// =============================================================================

/// Create an account and bind it to the session.
///
/// # Errors
///
/// Fails on a malformed email, a taken address, or a database error.
pub async fn register(
    pool: &PgPool,
    session_id: &str,
    email: &str,
    name: &str,
    password: &str,
) -> Result<User, AccountError> {
    let Some(email) = normalize_email(email) else {
        return Err(AccountError::InvalidEmail);
    };
    let credential = hash_password(password);
    let inserted = sqlx::query(
        "INSERT INTO users (email, password, name, regtime)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (email) DO NOTHING",
    )
    .bind(&email)
    .bind(&credential)
    .bind(name)
    .bind(now_ms())
    .execute(pool)
    .await?;
    if inserted.rows_affected() == 0 {
        return Err(AccountError::EmailTaken(email));
    }

    bind_session(pool, session_id, &email).await?;
    Ok(User { email, name: name.to_string() })
}

/// Validate credentials and bind the account to the session.
///
/// # Errors
///
/// Fails on an unknown address, a wrong password, or a database error.
pub async fn login(
    pool: &PgPool,
    session_id: &str,
    email: &str,
    password: &str,
) -> Result<User, AccountError> {
    let email = normalize_email(email).unwrap_or_else(|| email.to_string());
    let Some(row) = sqlx::query("SELECT password, name FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool)
        .await?
    else {
        return Err(AccountError::NoSuchAccount);
    };
    let stored: String = row.get("password");
    if !verify_password(password, &stored) {
        return Err(AccountError::WrongPassword);
    }

    bind_session(pool, session_id, &email).await?;
    Ok(User { email, name: row.get("name") })
}

/// Delete the session row. In-memory logout proceeds regardless; the
/// caller only logs a failure here.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn logout(pool: &PgPool, session_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE sessionid = $1")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Look up the user a previously bound session belongs to, if any.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn restore_session(pool: &PgPool, session_id: &str) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT u.email, u.name
         FROM sessions s
         JOIN users u ON u.email = s.email
         WHERE s.sessionid = $1",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| User { email: r.get("email"), name: r.get("name") }))
}

async fn bind_session(pool: &PgPool, session_id: &str, email: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO sessions (sessionid, email, lastlogintime)
         VALUES ($1, $2, $3)
         ON CONFLICT (sessionid) DO UPDATE SET email = $2, lastlogintime = $3",
    )
    .bind(session_id)
    .bind(email)
    .bind(now_ms())
    .execute(pool)
    .await?;
    Ok(())
}

// =============================================================================
// GAME BOOKMARKS
// =============================================================================

/// Upsert the "you have an active game here" row for a registered
/// player.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn remember_game(
    pool: &PgPool,
    email: &str,
    room_code: &str,
    last_move_time: i64,
    your_stacks: usize,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_rooms (userroomid, email, roomcode, lastmovetime, yourstacks)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (userroomid) DO UPDATE SET lastmovetime = $4, yourstacks = $5",
    )
    .bind(format!("{email}|{room_code}"))
    .bind(email)
    .bind(room_code)
    .bind(last_move_time)
    .bind(i32::try_from(your_stacks).unwrap_or(i32::MAX))
    .execute(pool)
    .await?;
    Ok(())
}

/// Drop the bookmark after the player leaves the game.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn forget_game(pool: &PgPool, email: &str, room_code: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM user_rooms WHERE userroomid = $1")
        .bind(format!("{email}|{room_code}"))
        .execute(pool)
        .await?;
    Ok(())
}

/// Fire-and-forget a membership hook emitted by a room. Guest refs are
/// skipped; failures are logged and never surfaced.
pub fn apply_hook(state: &AppState, room_code: &str, last_move_time: i64, hook: AccountHook) {
    let email = match &hook {
        AccountHook::Remember { account: AccountRef::Registered(email), .. }
        | AccountHook::Forget { account: AccountRef::Registered(email) } => email.clone(),
        _ => return,
    };
    let pool = state.pool.clone();
    let room_code = room_code.to_string();
    tokio::spawn(async move {
        let result = match hook {
            AccountHook::Remember { your_stacks, .. } => {
                remember_game(&pool, &email, &room_code, last_move_time, your_stacks).await
            }
            AccountHook::Forget { .. } => forget_game(&pool, &email, &room_code).await,
        };
        if let Err(error) = result {
            warn!(%error, room = %room_code, "game bookmark update failed");
        }
    });
}

#[cfg(test)]
#[path = "accounts_test.rs"]
mod tests;
