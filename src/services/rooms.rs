//! Room registry and command entry points.
//!
//! DESIGN
//! ======
//! The registry is the map of live rooms inside [`AppState`], populated
//! on the first join for a code and drained when a room loses its last
//! spectator. Every protocol command lands here: acquire the registry
//! write lock, run the room's synchronous state-machine method, release,
//! then perform any persistence side effects (initial load, eviction
//! save, account bookmarks) outside the lock.
//!
//! ERROR HANDLING
//! ==============
//! Command failures surface as typed errors the websocket layer turns
//! into `error|` frames; the room is left unchanged. Database failures
//! during load fall open to a fresh room and are only logged.

use tracing::{error, info};

use crate::room::{ConnHandle, DisconnectOutcome, Room, RoomError, SettingsPatch};
use crate::services::{accounts, persistence};
use crate::state::AppState;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RoomCommandError {
    #[error("Room code must contain lowercase letters, numbers, and hyphens (dashes) only")]
    BadCodeFormat,
    #[error("Room code must be under 200 characters long")]
    CodeTooLong,
    #[error("Room {0} not found")]
    NotFound(String),
    #[error("Could not change settings (invalid settings JSON)")]
    BadSettings,
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// Room codes double as URLs and database keys: lowercase
/// alphanumerics and hyphens, bounded length.
///
/// # Errors
///
/// Returns the protocol-visible validation failure.
pub fn validate_room_code(code: &str) -> Result<(), RoomCommandError> {
    if code.is_empty()
        || !code
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(RoomCommandError::BadCodeFormat);
    }
    if code.len() > 200 {
        return Err(RoomCommandError::CodeTooLong);
    }
    Ok(())
}

// =============================================================================
// JOIN (GET-OR-CREATE)
// =============================================================================

/// Join a room as a spectator, creating it on first reference. The
/// creating call performs the initial load after releasing the lock;
/// a missing or unreadable record falls open to a fresh room.
///
/// # Errors
///
/// Fails only on room-code validation for an unknown code.
pub async fn join(state: &AppState, conn: &ConnHandle, code: &str) -> Result<(), RoomCommandError> {
    let created = {
        let mut rooms = state.rooms.write().await;
        let created = if rooms.contains_key(code) {
            false
        } else {
            validate_room_code(code)?;
            rooms.insert(code.to_string(), Room::new(code));
            info!(room = %code, "room created");
            true
        };
        if let Some(room) = rooms.get_mut(code) {
            room.join(conn);
            room.host = conn.name.clone().unwrap_or_default();
        }
        created
    };

    if created {
        let record = match persistence::get_room(&state.pool, code).await {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, room = %code, "room load failed, starting fresh");
                None
            }
        };
        let mut rooms = state.rooms.write().await;
        if let Some(room) = rooms.get_mut(code) {
            room.finish_load(record);
        }
    }
    Ok(())
}

// =============================================================================
// LIFECYCLE COMMANDS
// =============================================================================

/// Become a player in a room that has not started yet.
///
/// # Errors
///
/// Fails on an unknown room, a name collision, or a started game.
pub async fn add_player(
    state: &AppState,
    conn: &ConnHandle,
    code: &str,
    name: Option<String>,
) -> Result<(), RoomCommandError> {
    let hook = {
        let mut rooms = state.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else {
            return Err(RoomCommandError::NotFound(code.to_string()));
        };
        let hook = room.add_player(Some(conn), name, None)?;
        hook.map(|hook| (hook, room.last_move_time))
    };
    if let Some((hook, last_move_time)) = hook {
        accounts::apply_hook(state, code, last_move_time, hook);
    }
    Ok(())
}

/// Leave the ring before the game starts.
///
/// # Errors
///
/// Fails on an unknown room, a non-player connection, or a started game.
pub async fn remove_player(state: &AppState, conn_id: uuid::Uuid, code: &str) -> Result<(), RoomCommandError> {
    let hook = {
        let mut rooms = state.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else {
            return Err(RoomCommandError::NotFound(code.to_string()));
        };
        let hook = room.remove_player(conn_id)?;
        hook.map(|hook| (hook, room.last_move_time))
    };
    if let Some((hook, last_move_time)) = hook {
        accounts::apply_hook(state, code, last_move_time, hook);
    }
    Ok(())
}

/// # Errors
///
/// Fails on an unknown room, an empty ring, or a second start.
pub async fn start_game(state: &AppState, code: &str) -> Result<(), RoomCommandError> {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(code) else {
        return Err(RoomCommandError::NotFound(code.to_string()));
    };
    room.start()?;
    info!(room = %code, players = room.players.len(), "game started");
    Ok(())
}

/// # Errors
///
/// Fails on an unknown room or unparseable settings JSON.
pub async fn change_settings(state: &AppState, code: &str, json: &str) -> Result<(), RoomCommandError> {
    let patch: SettingsPatch =
        serde_json::from_str(json).map_err(|_| RoomCommandError::BadSettings)?;
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(code) else {
        return Err(RoomCommandError::NotFound(code.to_string()));
    };
    room.change_settings(patch);
    Ok(())
}

/// # Errors
///
/// Fails on an unknown room, a non-player connection, or a player with
/// no pending turn.
pub async fn submit(
    state: &AppState,
    conn_id: uuid::Uuid,
    code: &str,
    value: String,
) -> Result<(), RoomCommandError> {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(code) else {
        return Err(RoomCommandError::NotFound(code.to_string()));
    };
    room.submit(conn_id, value)?;
    Ok(())
}

// =============================================================================
// IDENTITY AND CONNECTION EVENTS
// =============================================================================

/// Propagate a login/logout on this connection into one joined room.
pub async fn account_update(state: &AppState, conn: &ConnHandle, code: &str) {
    let hook = {
        let mut rooms = state.rooms.write().await;
        let Some(room) = rooms.get_mut(code) else {
            return;
        };
        let hook = room.handle_account_update(conn);
        hook.map(|hook| (hook, room.last_move_time))
    };
    if let Some((hook, last_move_time)) = hook {
        accounts::apply_hook(state, code, last_move_time, hook);
    }
}

/// Tear a dropped connection out of every room it joined. A room whose
/// last spectator drains is saved (best effort) and evicted.
pub async fn disconnect(state: &AppState, conn_id: uuid::Uuid, codes: &[String]) {
    for code in codes {
        let evicted = {
            let mut rooms = state.rooms.write().await;
            let Some(room) = rooms.get_mut(code) else {
                continue;
            };
            match room.handle_disconnect(conn_id) {
                DisconnectOutcome::Kept => None,
                DisconnectOutcome::Evict(record) => {
                    rooms.remove(code);
                    Some(record)
                }
            }
        };
        if let Some(record) = evicted {
            info!(room = %code, "room evicted");
            if let Some(record) = record {
                persistence::save_fire_and_forget(state, code, record);
            }
        }
    }
}

// =============================================================================
// SHUTDOWN
// =============================================================================

/// Persist every live room. Called once on graceful shutdown, so the
/// writes are awaited rather than fired and forgotten.
pub async fn save_all(state: &AppState) {
    let records = {
        let rooms = state.rooms.read().await;
        rooms
            .iter()
            .filter_map(|(code, room)| room.to_record().map(|r| (code.clone(), r)))
            .collect::<Vec<_>>()
    };
    info!(count = records.len(), "saving open rooms");
    for (code, record) in records {
        if let Err(e) = persistence::set_room(&state.pool, &code, &record).await {
            error!(error = %e, room = %code, "room save failed");
        }
    }
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
