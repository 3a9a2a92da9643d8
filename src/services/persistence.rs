//! Room persistence: the rooms table as a key-value store.
//!
//! DESIGN
//! ======
//! Rooms are persisted as one row per room code: a few list/debug
//! columns plus the serialized game state as JSON. The table is only
//! ever touched by primary key (get on first join, upsert on eviction
//! and shutdown), so the room core stays ignorant of the schema.
//!
//! ERROR HANDLING
//! ==============
//! Failures here are never fatal and never reach the client. A failed
//! load falls open to a fresh room; a failed save leaves in-memory
//! state untouched and is only logged.

use sqlx::{PgPool, Row};
use tracing::{error, info};

use crate::room::RoomRecord;
use crate::state::AppState;

/// Fetch the persisted record for a room code, if one exists.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn get_room(pool: &PgPool, code: &str) -> Result<Option<RoomRecord>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT host, creationtime, lastmovetime, playercount, players, state
         FROM rooms WHERE roomid = $1",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| RoomRecord {
        host: r.get("host"),
        creation_time: r.get("creationtime"),
        last_move_time: r.get("lastmovetime"),
        player_count: r.get("playercount"),
        players: r.get("players"),
        state: r.get("state"),
    }))
}

/// Upsert the record for a room code.
///
/// # Errors
///
/// Returns the underlying database error.
pub async fn set_room(pool: &PgPool, code: &str, record: &RoomRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO rooms (roomid, host, creationtime, lastmovetime, playercount, players, state)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (roomid) DO UPDATE SET
             host = EXCLUDED.host,
             lastmovetime = EXCLUDED.lastmovetime,
             playercount = EXCLUDED.playercount,
             players = EXCLUDED.players,
             state = EXCLUDED.state",
    )
    .bind(code)
    .bind(&record.host)
    .bind(record.creation_time)
    .bind(record.last_move_time)
    .bind(record.player_count)
    .bind(&record.players)
    .bind(&record.state)
    .execute(pool)
    .await?;
    Ok(())
}

/// Spawn a fire-and-forget save for an evicted room.
pub fn save_fire_and_forget(state: &AppState, code: &str, record: RoomRecord) {
    let pool = state.pool.clone();
    let code = code.to_string();
    tokio::spawn(async move {
        match set_room(&pool, &code, &record).await {
            Ok(()) => info!(room = %code, "room saved"),
            Err(e) => error!(error = %e, room = %code, "room save failed"),
        }
    });
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
