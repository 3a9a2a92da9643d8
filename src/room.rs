//! Room: the game-state core and its broadcast fan-out.
//!
//! DESIGN
//! ======
//! A `Room` owns everything about one game: the player ring, the stack
//! arena, spectator channels, settings, and lifecycle phase. All mutation
//! happens in synchronous methods invoked under the registry write lock;
//! outbound updates are non-blocking `try_send` pushes, so every handler
//! runs to completion before the next one starts and the lock is never
//! held across I/O.
//!
//! STACK OWNERSHIP
//! ===============
//! A stack is created once per player at game start and never moves: it
//! lives in the room's arena keyed by its owner's name. What circulates
//! is the owner name. Each player's queue holds the names of the stacks
//! currently awaiting that player's contribution, resolved against the
//! arena on demand, so no two places ever hold the same stack.
//!
//! LIFECYCLE
//! =========
//! `Loading -> NotStarted -> Started -> Ended`. A room is constructed in
//! `Loading`; the creator's task fetches the persisted record and calls
//! `finish_load`, which either restores the saved game or falls open to a
//! fresh `NotStarted` room. Membership is only mutable in `NotStarted`.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::frame::{Outbound, now_ms};
use crate::services::accounts::AccountRef;

// =============================================================================
// SHEETS AND STACKS
// =============================================================================

/// The two contribution modalities. Each sheet demands the opposite kind
/// from the next contributor; that alternation is the whole game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetKind {
    Text,
    Pic,
}

impl SheetKind {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            SheetKind::Text => SheetKind::Pic,
            SheetKind::Pic => SheetKind::Text,
        }
    }
}

/// One contributed unit: a description or a drawing (data-URL), plus its
/// author. Immutable once pushed onto a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    #[serde(rename = "type")]
    pub kind: SheetKind,
    pub value: String,
    pub author: String,
}

/// An append-only pile of sheets. The owner's name is the arena key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub sheets: Vec<Sheet>,
}

// =============================================================================
// SETTINGS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub start_with: SheetKind,
    /// 0 means "pick a default at start": `max(5, player count)`.
    pub desired_stack_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self { start_with: SheetKind::Text, desired_stack_size: 0 }
    }
}

/// Partial settings patch parsed from the wire.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub start_with: Option<SheetKind>,
    pub desired_stack_size: Option<u32>,
}

// =============================================================================
// PLAYERS AND CONNECTIONS
// =============================================================================

/// A participant in the ring. One player may have several live
/// connections (tabs, devices) and survives having none at all.
#[derive(Debug)]
pub struct Player {
    pub account: Option<AccountRef>,
    pub name: String,
    /// Owner names of held stacks; the front is the active one.
    pub queue: VecDeque<String>,
    pub connections: HashSet<Uuid>,
}

/// The slice of a live connection a room needs: identity plus a
/// non-blocking outbound channel.
#[derive(Debug, Clone)]
pub struct ConnHandle {
    pub id: Uuid,
    pub account: Option<AccountRef>,
    pub name: Option<String>,
    pub tx: mpsc::Sender<Outbound>,
}

/// A connection attached to the room, player or pure observer.
#[derive(Debug, Clone)]
pub struct Spectator {
    pub tx: mpsc::Sender<Outbound>,
    pub account: Option<AccountRef>,
}

/// Strip whitespace and case before comparing display names.
#[must_use]
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

// =============================================================================
// LIFECYCLE AND OUTCOMES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    NotStarted,
    Started,
    Ended,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("Name {0} already in use")]
    NameInUse(String),
    #[error("The room is still loading")]
    Loading,
    #[error("The game has already started")]
    AlreadyStarted,
    #[error("You're not a player")]
    NotAPlayer,
    #[error("Could not start game (no players or already started)")]
    CannotStart,
    #[error("Could not submit sheet")]
    CannotSubmit,
}

/// Side effect for the account subsystem, emitted by membership changes.
/// The caller persists these outside the registry lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountHook {
    Remember { account: AccountRef, your_stacks: usize },
    Forget { account: AccountRef },
}

/// What the registry must do after a connection drops out of a room.
#[derive(Debug)]
pub enum DisconnectOutcome {
    Kept,
    /// The last spectator drained: drop the room from the registry and
    /// persist the record, if there is one worth saving.
    Evict(Option<RoomRecord>),
}

/// Row shape for the rooms table. `state` is the serialized game; the
/// remaining columns exist for listing and debugging.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomRecord {
    pub host: String,
    pub creation_time: i64,
    pub last_move_time: i64,
    pub player_count: i32,
    pub players: String,
    pub state: serde_json::Value,
}

// =============================================================================
// WIRE SHAPES
// =============================================================================

/// Personal `player|` payload: what, if anything, this player owes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<Sheet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<SheetKind>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayerSummary {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    offline: Option<bool>,
    /// Sheet counts of the held stacks, present once the game started.
    #[serde(skip_serializing_if = "Option::is_none")]
    stacks: Option<Vec<usize>>,
    /// The finished collaborative artifact, revealed only once ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    own_stack: Option<Vec<Sheet>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomSummary {
    roomid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    started: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    loading: Option<bool>,
    players: Vec<PlayerSummary>,
    settings: Settings,
}

// =============================================================================
// PERSISTED SHAPES
// =============================================================================

/// The `state` JSON blob inside a [`RoomRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    pub started: bool,
    pub ended: bool,
    pub players: Vec<PlayerState>,
    pub settings: Settings,
}

/// Stacks are persisted by reference: a player's queue is the list of
/// owner names, reconstituted against the arena on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_stack: Option<Vec<Sheet>>,
    pub stacks: Vec<String>,
}

// =============================================================================
// ROOM
// =============================================================================

#[derive(Debug)]
pub struct Room {
    pub code: String,
    pub phase: Phase,
    pub host: String,
    pub creation_time: i64,
    pub last_move_time: i64,
    /// Ring order; fixed once the game starts.
    pub players: Vec<Player>,
    /// Stack arena keyed by owner name.
    pub stacks: HashMap<String, Stack>,
    /// Every attached connection, players included.
    pub spectators: HashMap<Uuid, Spectator>,
    pub settings: Settings,
}

impl Room {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            code: code.into(),
            phase: Phase::Loading,
            host: String::new(),
            creation_time: now,
            last_move_time: now,
            players: Vec::new(),
            stacks: HashMap::new(),
            spectators: HashMap::new(),
            settings: Settings::default(),
        }
    }

    // -------------------------------------------------------------------------
    // membership
    // -------------------------------------------------------------------------

    /// Attach a connection as a spectator. If its account matches an
    /// existing player, it also becomes one of that player's connections
    /// (several tabs, or a reconnect after a drop). Duplicate joins that
    /// change nothing are silent.
    pub fn join(&mut self, conn: &ConnHandle) {
        let already_spectator = self.spectators.contains_key(&conn.id);
        let mut rejoined = None;
        if let Some(account) = &conn.account {
            for (index, player) in self.players.iter_mut().enumerate() {
                if player.account.as_ref() == Some(account) && player.connections.insert(conn.id) {
                    rejoined = Some(index);
                }
            }
        }
        self.spectators
            .insert(conn.id, Spectator { tx: conn.tx.clone(), account: conn.account.clone() });

        if let Some(index) = rejoined {
            // Online status changed for everyone; the rejoining player
            // also needs their pending turn request back.
            self.update_spectators();
            self.update_player(index);
        } else if !already_spectator && self.phase != Phase::Loading {
            // While loading, the snapshot is deferred to `finish_load`.
            self.update_conn(conn.id);
        }
    }

    #[must_use]
    pub fn has_player(&self, name: &str) -> bool {
        let wanted = normalize(name);
        self.players.iter().any(|p| normalize(&p.name) == wanted)
    }

    fn player_index(&self, conn_id: Uuid) -> Option<usize> {
        self.players.iter().position(|p| p.connections.contains(&conn_id))
    }

    /// Insert a new player at `index` (default: end of the ring).
    ///
    /// # Errors
    ///
    /// Fails outside `NotStarted` or when the name collides with an
    /// existing player under normalization.
    pub fn add_player(
        &mut self,
        conn: Option<&ConnHandle>,
        name: Option<String>,
        index: Option<usize>,
    ) -> Result<Option<AccountHook>, RoomError> {
        match self.phase {
            Phase::Loading => return Err(RoomError::Loading),
            Phase::Started | Phase::Ended => return Err(RoomError::AlreadyStarted),
            Phase::NotStarted => {}
        }
        let name = name
            .filter(|n| !n.is_empty())
            .or_else(|| conn.and_then(|c| c.name.clone()).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| format!("Player {}", self.players.len() + 1));
        if self.has_player(&name) {
            return Err(RoomError::NameInUse(name));
        }

        let mut player = Player {
            account: conn.and_then(|c| c.account.clone()),
            name,
            queue: VecDeque::new(),
            connections: HashSet::new(),
        };
        if let Some(conn) = conn {
            player.connections.insert(conn.id);
            self.spectators
                .entry(conn.id)
                .or_insert_with(|| Spectator { tx: conn.tx.clone(), account: conn.account.clone() });
        }
        let index = index.unwrap_or(self.players.len()).min(self.players.len());
        self.players.insert(index, player);

        self.update_spectators();
        self.update_player(index);
        Ok(self.players[index]
            .account
            .clone()
            .map(|account| AccountHook::Remember { account, your_stacks: 0 }))
    }

    /// Remove the player owning this connection from the ring.
    ///
    /// # Errors
    ///
    /// Fails outside `NotStarted` or when the connection maps to no
    /// player.
    pub fn remove_player(&mut self, conn_id: Uuid) -> Result<Option<AccountHook>, RoomError> {
        match self.phase {
            Phase::Loading => return Err(RoomError::Loading),
            Phase::Started | Phase::Ended => return Err(RoomError::AlreadyStarted),
            Phase::NotStarted => {}
        }
        let Some(index) = self.player_index(conn_id) else {
            return Err(RoomError::NotAPlayer);
        };
        let player = self.players.remove(index);
        for conn in &player.connections {
            self.send_to(*conn, Outbound::Player(None));
        }
        self.update_spectators();
        Ok(player.account.map(|account| AccountHook::Forget { account }))
    }

    // -------------------------------------------------------------------------
    // settings and start
    // -------------------------------------------------------------------------

    /// Merge a partial settings patch and broadcast. Deliberately not
    /// restricted to `NotStarted`; mid-game changes are accepted.
    pub fn change_settings(&mut self, patch: SettingsPatch) {
        if let Some(kind) = patch.start_with {
            self.settings.start_with = kind;
        }
        if let Some(size) = patch.desired_stack_size {
            self.settings.desired_stack_size = size;
        }
        self.update_spectators();
    }

    /// Begin the game: allocate every player's own stack and hand it to
    /// them as their first pending turn.
    ///
    /// # Errors
    ///
    /// Fails outside `NotStarted` or with an empty ring.
    pub fn start(&mut self) -> Result<(), RoomError> {
        if self.phase != Phase::NotStarted || self.players.is_empty() {
            return Err(RoomError::CannotStart);
        }
        self.phase = Phase::Started;
        if self.settings.desired_stack_size == 0 {
            self.settings.desired_stack_size =
                u32::try_from(self.players.len()).unwrap_or(u32::MAX).max(5);
        }
        for index in 0..self.players.len() {
            let name = self.players[index].name.clone();
            self.stacks.insert(name.clone(), Stack::default());
            self.players[index].queue = VecDeque::from([name]);
        }
        self.update_spectators();
        self.update_players();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // turns
    // -------------------------------------------------------------------------

    /// Derive what the player at `index` owes right now. No held stack
    /// means "waiting" (name only). An empty active stack asks for the
    /// configured opening kind; otherwise the request alternates from
    /// the last sheet, which doubles as the preview.
    #[must_use]
    pub fn turn_request(&self, index: usize) -> TurnRequest {
        let player = &self.players[index];
        let Some(owner) = player.queue.front() else {
            return TurnRequest { name: player.name.clone(), preview: None, request: None };
        };
        let preview = self
            .stacks
            .get(owner)
            .and_then(|stack| stack.sheets.last())
            .cloned();
        let request = preview
            .as_ref()
            .map_or(self.settings.start_with, |sheet| sheet.kind.opposite());
        TurnRequest { name: player.name.clone(), preview, request: Some(request) }
    }

    /// Accept a contribution from this connection's player and pass the
    /// stack along the ring, unless it just reached the target size and
    /// retires.
    ///
    /// # Errors
    ///
    /// Fails when the connection maps to no player or the player has no
    /// pending turn.
    pub fn submit(&mut self, conn_id: Uuid, value: String) -> Result<(), RoomError> {
        let Some(index) = self.player_index(conn_id) else {
            return Err(RoomError::CannotSubmit);
        };
        let Some(kind) = self.turn_request(index).request else {
            return Err(RoomError::CannotSubmit);
        };
        let Some(owner) = self.players[index].queue.pop_front() else {
            return Err(RoomError::CannotSubmit);
        };
        let author = self.players[index].name.clone();
        let Some(stack) = self.stacks.get_mut(&owner) else {
            return Err(RoomError::CannotSubmit);
        };
        stack.sheets.push(Sheet { kind, value, author });
        let size = u32::try_from(stack.sheets.len()).unwrap_or(u32::MAX);

        let next = (index + 1) % self.players.len();
        let mut next_newly_busy = false;
        if size < self.settings.desired_stack_size {
            next_newly_busy = self.players[next].queue.is_empty();
            self.players[next].queue.push_back(owner);
        }
        self.last_move_time = now_ms();

        if self.try_end() {
            return Ok(());
        }
        self.update_spectators();
        self.update_player(index);
        if next_newly_busy {
            self.update_player(next);
        }
        Ok(())
    }

    /// End the game if every queue has drained. Checked after every
    /// submit.
    pub fn try_end(&mut self) -> bool {
        if self.phase != Phase::Started {
            return false;
        }
        if self.players.iter().any(|p| !p.queue.is_empty()) {
            return false;
        }
        self.end()
    }

    /// One-shot transition to `Ended`: queues are cleared, own stacks
    /// remain for display, and everyone gets a final update.
    pub fn end(&mut self) -> bool {
        if self.phase != Phase::Started {
            return false;
        }
        self.phase = Phase::Ended;
        for player in &mut self.players {
            player.queue.clear();
        }
        self.update_spectators();
        self.update_players();
        true
    }

    // -------------------------------------------------------------------------
    // connection lifecycle
    // -------------------------------------------------------------------------

    /// Detach a dropped connection everywhere. Broadcasts when a player
    /// just went offline; reports eviction when the room emptied out.
    pub fn handle_disconnect(&mut self, conn_id: Uuid) -> DisconnectOutcome {
        let mut status_changed = false;
        for player in &mut self.players {
            if !status_changed && player.connections.len() == 1 && player.connections.contains(&conn_id) {
                status_changed = true;
            }
            player.connections.remove(&conn_id);
        }
        self.spectators.remove(&conn_id);

        if self.spectators.is_empty() {
            DisconnectOutcome::Evict(self.to_record())
        } else {
            if status_changed {
                self.update_spectators();
            }
            DisconnectOutcome::Kept
        }
    }

    /// React to a connection's identity changing (login/logout) while
    /// already joined.
    pub fn handle_account_update(&mut self, conn: &ConnHandle) -> Option<AccountHook> {
        if let Some(spectator) = self.spectators.get_mut(&conn.id) {
            spectator.account = conn.account.clone();
        }
        let Some(index) = self.player_index(conn.id) else {
            // Perhaps the new identity matches an account that is
            // already playing here.
            self.join(conn);
            return None;
        };

        let mut hook = None;
        if matches!(conn.account, Some(AccountRef::Registered(_))) {
            let collides = self
                .players
                .iter()
                .enumerate()
                .any(|(i, p)| i != index && p.account.is_some() && p.account == conn.account);
            if collides {
                self.send_to(
                    conn.id,
                    Outbound::Error(
                        "You were a player, but the account you logged into is a different player.".into(),
                    ),
                );
            } else {
                self.players[index].account = conn.account.clone();
                hook = conn.account.clone().map(|account| AccountHook::Remember {
                    account,
                    your_stacks: self.players[index].queue.len(),
                });
            }
        }
        if self.players[index].account != conn.account {
            // Logged out from under this player: this connection is no
            // longer one of theirs.
            self.players[index].connections.remove(&conn.id);
            self.send_to(conn.id, Outbound::Player(None));
            if self.players[index].connections.is_empty() {
                self.update_spectators();
            }
        }
        hook
    }

    // -------------------------------------------------------------------------
    // broadcast
    // -------------------------------------------------------------------------

    fn send_to(&self, conn_id: Uuid, frame: Outbound) {
        if let Some(spectator) = self.spectators.get(&conn_id) {
            // Best-effort: a client with a full channel misses the frame.
            let _ = spectator.tx.try_send(frame);
        }
    }

    fn update_conn(&self, conn_id: Uuid) {
        self.send_to(conn_id, Outbound::Room(self.snapshot_json()));
    }

    pub fn update_spectators(&self) {
        let frame = Outbound::Room(self.snapshot_json());
        for spectator in self.spectators.values() {
            let _ = spectator.tx.try_send(frame.clone());
        }
    }

    pub fn update_players(&self) {
        for index in 0..self.players.len() {
            self.update_player(index);
        }
    }

    pub fn update_player(&self, index: usize) {
        let request = self.turn_request(index);
        let json = serde_json::to_value(&request).unwrap_or_default();
        for conn in &self.players[index].connections {
            self.send_to(*conn, Outbound::Player(Some(json.clone())));
        }
    }

    // -------------------------------------------------------------------------
    // snapshots
    // -------------------------------------------------------------------------

    /// The `room|` payload every spectator sees.
    #[must_use]
    pub fn snapshot_json(&self) -> serde_json::Value {
        let ended = self.phase == Phase::Ended;
        let players = self
            .players
            .iter()
            .map(|player| PlayerSummary {
                name: player.name.clone(),
                offline: player.connections.is_empty().then_some(true),
                stacks: self.stacks.contains_key(&player.name).then(|| {
                    player
                        .queue
                        .iter()
                        .map(|owner| self.stacks.get(owner).map_or(0, |s| s.sheets.len()))
                        .collect()
                }),
                own_stack: if ended {
                    self.stacks.get(&player.name).map(|s| s.sheets.clone())
                } else {
                    None
                },
            })
            .collect();
        let summary = RoomSummary {
            roomid: self.code.clone(),
            started: matches!(self.phase, Phase::Started | Phase::Ended).then_some(true),
            loading: (self.phase == Phase::Loading).then_some(true),
            players,
            settings: self.settings,
        };
        serde_json::to_value(summary).unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // persistence
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn serialize_state(&self) -> RoomState {
        RoomState {
            started: matches!(self.phase, Phase::Started | Phase::Ended),
            ended: self.phase == Phase::Ended,
            players: self
                .players
                .iter()
                .map(|player| PlayerState {
                    name: player.name.clone(),
                    account: player.account.clone(),
                    own_stack: self.stacks.get(&player.name).map(|s| s.sheets.clone()),
                    stacks: player.queue.iter().cloned().collect(),
                })
                .collect(),
            settings: self.settings,
        }
    }

    /// The record to persist, or `None` when there is nothing worth
    /// saving (a room that never collected players, or one still
    /// loading).
    #[must_use]
    pub fn to_record(&self) -> Option<RoomRecord> {
        match self.phase {
            Phase::Loading => return None,
            Phase::NotStarted if self.players.is_empty() => return None,
            _ => {}
        }
        let mut roster = self
            .players
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        roster.truncate(100);
        Some(RoomRecord {
            host: self.host.clone(),
            creation_time: self.creation_time,
            last_move_time: self.last_move_time,
            player_count: i32::try_from(self.players.len()).unwrap_or(i32::MAX),
            players: roster,
            state: serde_json::to_value(self.serialize_state()).unwrap_or_default(),
        })
    }

    /// Rebuild the ring and arena from a persisted state blob, resolving
    /// queue references by owner name, then re-attach any spectator whose
    /// account matches a restored player and broadcast.
    pub fn apply_state(&mut self, state: RoomState) {
        self.phase = match (state.started, state.ended) {
            (true, true) => Phase::Ended,
            (true, false) => Phase::Started,
            (false, _) => Phase::NotStarted,
        };
        self.players.clear();
        self.stacks.clear();
        for player in state.players {
            if let Some(sheets) = player.own_stack {
                self.stacks.insert(player.name.clone(), Stack { sheets });
            }
            self.players.push(Player {
                account: player.account,
                name: player.name,
                queue: player.stacks.into_iter().collect(),
                connections: HashSet::new(),
            });
        }
        // A queue entry naming an unknown owner is a corrupt record;
        // drop it rather than strand an unresolvable reference.
        for player in &mut self.players {
            player.queue.retain(|owner| self.stacks.contains_key(owner));
        }
        self.settings = state.settings;

        for (conn_id, spectator) in &self.spectators {
            if let Some(account) = &spectator.account {
                for player in &mut self.players {
                    if player.account.as_ref() == Some(account) {
                        player.connections.insert(*conn_id);
                    }
                }
            }
        }
        self.update_spectators();
        self.update_players();
    }

    /// Apply the result of the initial load. `None` means no record was
    /// found or the read failed: the room falls open to a fresh
    /// `NotStarted` state.
    pub fn finish_load(&mut self, record: Option<RoomRecord>) {
        if self.phase != Phase::Loading {
            return;
        }
        let Some(record) = record else {
            self.phase = Phase::NotStarted;
            self.update_spectators();
            return;
        };
        self.host = record.host;
        self.creation_time = record.creation_time;
        self.last_move_time = record.last_move_time;
        match serde_json::from_value::<RoomState>(record.state) {
            Ok(state) => self.apply_state(state),
            Err(error) => {
                tracing::warn!(room = %self.code, %error, "corrupt room record, starting fresh");
                self.phase = Phase::NotStarted;
                self.update_spectators();
            }
        }
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
