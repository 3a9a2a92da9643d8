//! Wire protocol: pipe-delimited text frames.
//!
//! DESIGN
//! ======
//! Every client message is a single text frame of the form
//! `verb|arg1|arg2|...`. The boundary parses each frame into a tagged
//! [`Command`] and rejects unknown verbs or missing arguments before any
//! state is touched. Payload fields that may legally contain `|`
//! (passwords, settings JSON, submitted sheet values) are the final
//! argument of their verb, so the parser rejoins all trailing segments.
//!
//! Server-to-client frames use the same framing and are encoded by
//! [`Outbound`]: `room|<json>` snapshots, `player|<json or empty>` turn
//! requests, `user|<name or empty>` account state, and `error|` /
//! `usererror|` diagnostics.

use std::time::{SystemTime, UNIX_EPOCH};

// =============================================================================
// TIME
// =============================================================================

/// Current time as milliseconds since Unix epoch.
pub(crate) fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// INBOUND COMMANDS
// =============================================================================

/// A validated inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Bind this connection to a durable session id.
    SessionId { id: String },
    Login { email: String, password: String },
    Register { email: String, name: String, password: String },
    Logout,
    /// Set the connection's default display name.
    Name { name: String },
    /// Join (or create) a room as a spectator.
    Join { room: String },
    /// Become a player. `name` is `None` when the client sent no name
    /// (or an empty one) and wants the server default.
    AddPlayer { room: String, name: Option<String> },
    RemovePlayer { room: String },
    StartGame { room: String },
    /// Partial settings patch as raw JSON, validated downstream.
    Settings { room: String, json: String },
    /// Contribute the active sheet's value (text or image data-URL).
    Submit { room: String, value: String },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unrecognized message {0}")]
    Unrecognized(String),
    #[error("Missing argument: {0}")]
    MissingArg(&'static str),
}

impl Command {
    /// Parse one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Unrecognized`] for unknown verbs and
    /// [`CommandError::MissingArg`] when a required argument is absent.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let parts: Vec<&str> = text.split('|').collect();

        let arg = |index: usize, name: &'static str| -> Result<String, CommandError> {
            parts
                .get(index)
                .map(|s| (*s).to_string())
                .ok_or(CommandError::MissingArg(name))
        };
        // Rejoin everything from `index` onward; the value may contain '|'.
        let rest = |index: usize, name: &'static str| -> Result<String, CommandError> {
            if parts.len() <= index {
                return Err(CommandError::MissingArg(name));
            }
            Ok(parts[index..].join("|"))
        };

        match parts[0] {
            "sessionid" => Ok(Command::SessionId { id: arg(1, "sessionid")? }),
            "login" => Ok(Command::Login { email: arg(1, "email")?, password: rest(2, "password")? }),
            "register" => Ok(Command::Register {
                email: arg(1, "email")?,
                name: arg(2, "name")?,
                password: rest(3, "password")?,
            }),
            "logout" => Ok(Command::Logout),
            "name" => Ok(Command::Name { name: arg(1, "name")? }),
            "join" => Ok(Command::Join { room: arg(1, "room")? }),
            "addplayer" => Ok(Command::AddPlayer {
                room: arg(1, "room")?,
                name: parts.get(2).filter(|s| !s.is_empty()).map(|s| (*s).to_string()),
            }),
            "removeplayer" => Ok(Command::RemovePlayer { room: arg(1, "room")? }),
            "startgame" => Ok(Command::StartGame { room: arg(1, "room")? }),
            "settings" => Ok(Command::Settings { room: arg(1, "room")?, json: rest(2, "settings")? }),
            "submit" => Ok(Command::Submit { room: arg(1, "room")?, value: rest(2, "value")? }),
            _ => Err(CommandError::Unrecognized(text.to_string())),
        }
    }
}

// =============================================================================
// OUTBOUND FRAMES
// =============================================================================

/// A server-to-client frame, encoded on send.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Full room snapshot for spectators.
    Room(serde_json::Value),
    /// Personal turn request. `None` encodes the empty `player|` frame
    /// that tells a connection it is no longer (or not yet) a player.
    Player(Option<serde_json::Value>),
    /// Room/protocol error shown to the offending connection.
    Error(String),
    /// Logged-in account name, or `None` after logout.
    User(Option<String>),
    /// Account-subsystem error.
    UserError(String),
}

impl Outbound {
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Outbound::Room(json) => format!("room|{json}"),
            Outbound::Player(Some(json)) => format!("player|{json}"),
            Outbound::Player(None) => "player|".to_string(),
            Outbound::Error(message) => format!("error|{message}"),
            Outbound::User(Some(name)) => format!("user|{name}"),
            Outbound::User(None) => "user|".to_string(),
            Outbound::UserError(message) => format!("usererror|{message}"),
        }
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
