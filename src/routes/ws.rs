//! WebSocket handler: the protocol boundary.
//!
//! DESIGN
//! ======
//! On upgrade, each connection gets a client id and a bounded outbound
//! channel, then enters a `select!` loop:
//! - Incoming text frames are parsed into commands and dispatched.
//! - Frames pushed by rooms (broadcasts, turn requests) are forwarded.
//!
//! `process_inbound_text` is the dispatch seam, kept separate from the
//! socket so tests can drive the full command surface end-to-end. It
//! returns the frames owed to the sender; everything addressed to other
//! connections travels through room spectator channels.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade; the connection starts anonymous.
//! 2. `sessionid` binds identity; `join`/`addplayer` attach to rooms.
//! 3. Close or error ends the loop; teardown detaches the connection
//!    from every joined room, which may save and evict emptied rooms.

use std::collections::HashSet;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Command, Outbound};
use crate::room::ConnHandle;
use crate::services;
use crate::services::accounts::{self, AccountError, AccountRef, User};
use crate::state::AppState;

// =============================================================================
// CONNECTION CONTEXT
// =============================================================================

/// Everything the protocol knows about one live connection.
struct ConnCtx {
    id: Uuid,
    tx: mpsc::Sender<Outbound>,
    session_id: Option<String>,
    /// Default display name for rooms joined by this connection.
    name: Option<String>,
    user: Option<User>,
    /// Codes of every room this connection has joined.
    rooms: HashSet<String>,
}

impl ConnCtx {
    fn new(id: Uuid, tx: mpsc::Sender<Outbound>) -> Self {
        Self { id, tx, session_id: None, name: None, user: None, rooms: HashSet::new() }
    }

    /// The identity rooms key players by: the account email once logged
    /// in, otherwise the bound session id.
    fn account(&self) -> Option<AccountRef> {
        match &self.user {
            Some(user) => Some(AccountRef::Registered(user.email.clone())),
            None => self.session_id.clone().map(AccountRef::Guest),
        }
    }

    fn handle(&self) -> ConnHandle {
        ConnHandle {
            id: self.id,
            account: self.account(),
            name: self.name.clone(),
            tx: self.tx.clone(),
        }
    }
}

// =============================================================================
// UPGRADE AND CONNECTION LOOP
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();
    let (client_tx, mut client_rx) = mpsc::channel::<Outbound>(256);
    let mut ctx = ConnCtx::new(client_id, client_tx);

    info!(%client_id, "ws: client connected");

    'conn: loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        for frame in process_inbound_text(&state, &mut ctx, &text).await {
                            if send_frame(&mut socket, &frame).await.is_err() {
                                break 'conn;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    let codes: Vec<String> = ctx.rooms.iter().cloned().collect();
    services::rooms::disconnect(&state, ctx.id, &codes).await;
    info!(%client_id, "ws: client disconnected");
}

async fn send_frame(socket: &mut WebSocket, frame: &Outbound) -> Result<(), ()> {
    if let Outbound::Error(message) | Outbound::UserError(message) = frame {
        warn!(message = %message, "ws: send error frame");
    }
    socket
        .send(Message::Text(frame.encode().into()))
        .await
        .map_err(|_| ())
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Parse and process one inbound text frame; returns the frames owed to
/// the sender.
async fn process_inbound_text(state: &AppState, ctx: &mut ConnCtx, text: &str) -> Vec<Outbound> {
    let command = match Command::parse(text) {
        Ok(command) => command,
        Err(e) => return vec![Outbound::Error(e.to_string())],
    };
    info!(client_id = %ctx.id, verb = text.split('|').next().unwrap_or(""), "ws: recv frame");

    match command {
        Command::SessionId { id } => bind_session(state, ctx, id).await,
        Command::Login { email, password } => login(state, ctx, &email, &password).await,
        Command::Register { email, name, password } => register(state, ctx, &email, &name, &password).await,
        Command::Logout => logout(state, ctx).await,
        Command::Name { name } => {
            ctx.name = Some(name);
            vec![]
        }
        Command::Join { room } => match services::rooms::join(state, &ctx.handle(), &room).await {
            Ok(()) => {
                ctx.rooms.insert(room);
                vec![]
            }
            Err(e) => vec![Outbound::Error(e.to_string())],
        },
        Command::AddPlayer { room, name } => {
            match services::rooms::add_player(state, &ctx.handle(), &room, name).await {
                Ok(()) => {
                    ctx.rooms.insert(room);
                    vec![]
                }
                Err(e) => vec![Outbound::Error(e.to_string())],
            }
        }
        Command::RemovePlayer { room } => {
            room_result(services::rooms::remove_player(state, ctx.id, &room).await)
        }
        Command::StartGame { room } => room_result(services::rooms::start_game(state, &room).await),
        Command::Settings { room, json } => {
            room_result(services::rooms::change_settings(state, &room, &json).await)
        }
        Command::Submit { room, value } => {
            room_result(services::rooms::submit(state, ctx.id, &room, value).await)
        }
    }
}

fn room_result(result: Result<(), services::rooms::RoomCommandError>) -> Vec<Outbound> {
    match result {
        Ok(()) => vec![],
        Err(e) => vec![Outbound::Error(e.to_string())],
    }
}

// =============================================================================
// ACCOUNT COMMANDS
// =============================================================================

async fn bind_session(state: &AppState, ctx: &mut ConnCtx, id: String) -> Vec<Outbound> {
    if !accounts::valid_session_id(&id) {
        return vec![Outbound::Error(format!("Invalid sessionid \"{id}\""))];
    }
    ctx.session_id = Some(id.clone());
    ctx.user = None;

    match accounts::restore_session(&state.pool, &id).await {
        Ok(Some(user)) => set_user(state, ctx, Some(user)).await,
        Ok(None) => vec![],
        Err(e) => {
            warn!(error = %e, "session restore failed");
            vec![]
        }
    }
}

async fn login(state: &AppState, ctx: &mut ConnCtx, email: &str, password: &str) -> Vec<Outbound> {
    let Some(session_id) = ctx.session_id.clone() else {
        return vec![Outbound::UserError("Invalid sessionid".into())];
    };
    match accounts::login(&state.pool, &session_id, email, password).await {
        Ok(user) => set_user(state, ctx, Some(user)).await,
        Err(e) => account_failure(&e),
    }
}

async fn register(
    state: &AppState,
    ctx: &mut ConnCtx,
    email: &str,
    name: &str,
    password: &str,
) -> Vec<Outbound> {
    let Some(session_id) = ctx.session_id.clone() else {
        return vec![Outbound::UserError("Invalid sessionid".into())];
    };
    match accounts::register(&state.pool, &session_id, email, name, password).await {
        Ok(user) => set_user(state, ctx, Some(user)).await,
        Err(e) => account_failure(&e),
    }
}

async fn logout(state: &AppState, ctx: &mut ConnCtx) -> Vec<Outbound> {
    if ctx.user.is_none() {
        return vec![];
    }
    let frames = set_user(state, ctx, None).await;
    if let Some(session_id) = ctx.session_id.clone() {
        if let Err(e) = accounts::logout(&state.pool, &session_id).await {
            warn!(error = %e, "session delete failed");
        }
    }
    frames
}

fn account_failure(error: &AccountError) -> Vec<Outbound> {
    if let AccountError::Database(e) = error {
        tracing::error!(error = %e, "account database error");
    }
    vec![Outbound::UserError(error.to_string())]
}

/// Switch the connection's logged-in user and tell every joined room.
/// No-op when nothing changed.
async fn set_user(state: &AppState, ctx: &mut ConnCtx, user: Option<User>) -> Vec<Outbound> {
    if ctx.user == user {
        return vec![];
    }
    ctx.user = user;
    let frame = match &ctx.user {
        Some(user) => {
            ctx.name = Some(user.name.clone());
            Outbound::User(Some(user.name.clone()))
        }
        None => Outbound::User(None),
    };

    let handle = ctx.handle();
    let codes: Vec<String> = ctx.rooms.iter().cloned().collect();
    for code in codes {
        services::rooms::account_update(state, &handle, &code).await;
    }
    vec![frame]
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
