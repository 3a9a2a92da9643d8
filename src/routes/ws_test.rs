use super::*;
use crate::room::Phase;
use crate::state::test_helpers;

fn test_ctx() -> (ConnCtx, mpsc::Receiver<Outbound>) {
    let (tx, rx) = mpsc::channel(64);
    (ConnCtx::new(Uuid::new_v4(), tx), rx)
}

/// Every `room|` payload currently waiting in the channel.
fn drain_room_json(rx: &mut mpsc::Receiver<Outbound>) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        if let Outbound::Room(json) = frame {
            out.push(json);
        }
    }
    out
}

// =============================================================================
// PROTOCOL ERRORS
// =============================================================================

#[tokio::test]
async fn unknown_verbs_get_an_error_frame() {
    let state = test_helpers::test_app_state();
    let (mut ctx, _rx) = test_ctx();

    let frames = process_inbound_text(&state, &mut ctx, "frobnicate|x").await;
    assert_eq!(frames.len(), 1);
    let Outbound::Error(message) = &frames[0] else {
        panic!("expected an error frame");
    };
    assert_eq!(message, "Unrecognized message frobnicate|x");
}

#[tokio::test]
async fn malformed_session_ids_are_rejected() {
    let state = test_helpers::test_app_state();
    let (mut ctx, _rx) = test_ctx();

    let frames = process_inbound_text(&state, &mut ctx, "sessionid|NOT VALID").await;
    let Outbound::Error(message) = &frames[0] else {
        panic!("expected an error frame");
    };
    assert_eq!(message, "Invalid sessionid \"NOT VALID\"");
    assert!(ctx.session_id.is_none());
}

// =============================================================================
// IDENTITY
// =============================================================================

#[tokio::test]
async fn session_binding_survives_a_dead_database() {
    let state = test_helpers::test_app_state();
    let (mut ctx, _rx) = test_ctx();

    let frames = process_inbound_text(&state, &mut ctx, "sessionid|abc-123").await;
    assert!(frames.is_empty());
    assert_eq!(ctx.session_id.as_deref(), Some("abc-123"));
    assert_eq!(
        ctx.account(),
        Some(AccountRef::Guest("abc-123".to_string()))
    );
}

#[tokio::test]
async fn name_sets_the_default_display_name() {
    let state = test_helpers::test_app_state();
    let (mut ctx, _rx) = test_ctx();

    let frames = process_inbound_text(&state, &mut ctx, "name|Alice").await;
    assert!(frames.is_empty());
    assert_eq!(ctx.name.as_deref(), Some("Alice"));
}

#[tokio::test]
async fn login_requires_a_bound_session() {
    let state = test_helpers::test_app_state();
    let (mut ctx, _rx) = test_ctx();

    let frames = process_inbound_text(&state, &mut ctx, "login|a@example.com|pw").await;
    let Outbound::UserError(message) = &frames[0] else {
        panic!("expected a usererror frame");
    };
    assert_eq!(message, "Invalid sessionid");
}

#[tokio::test]
async fn register_reports_database_failures_as_usererror() {
    let state = test_helpers::test_app_state();
    let (mut ctx, _rx) = test_ctx();
    process_inbound_text(&state, &mut ctx, "sessionid|abc-123").await;

    let frames = process_inbound_text(&state, &mut ctx, "register|a@example.com|Alice|pw").await;
    let Outbound::UserError(message) = &frames[0] else {
        panic!("expected a usererror frame");
    };
    assert!(message.starts_with("Database error:"));
    assert!(ctx.user.is_none());
}

#[tokio::test]
async fn logout_without_a_login_is_silent() {
    let state = test_helpers::test_app_state();
    let (mut ctx, _rx) = test_ctx();

    let frames = process_inbound_text(&state, &mut ctx, "logout").await;
    assert!(frames.is_empty());
}

// =============================================================================
// ROOM FLOW
// =============================================================================

#[tokio::test]
async fn join_registers_the_room_and_delivers_a_snapshot() {
    let state = test_helpers::test_app_state();
    let (mut ctx, mut rx) = test_ctx();
    process_inbound_text(&state, &mut ctx, "name|Alice").await;

    let frames = process_inbound_text(&state, &mut ctx, "join|party-room").await;
    assert!(frames.is_empty());
    assert!(ctx.rooms.contains("party-room"));

    let snapshots = drain_room_json(&mut rx);
    assert!(!snapshots.is_empty());
    assert_eq!(snapshots[0]["roomid"], serde_json::json!("party-room"));

    let rooms = state.rooms.read().await;
    assert_eq!(rooms["party-room"].host, "Alice");
}

#[tokio::test]
async fn join_with_a_bad_code_reports_the_format_rule() {
    let state = test_helpers::test_app_state();
    let (mut ctx, _rx) = test_ctx();

    let frames = process_inbound_text(&state, &mut ctx, "join|Party Room").await;
    let Outbound::Error(message) = &frames[0] else {
        panic!("expected an error frame");
    };
    assert_eq!(
        message,
        "Room code must contain lowercase letters, numbers, and hyphens (dashes) only"
    );
    assert!(ctx.rooms.is_empty());
}

#[tokio::test]
async fn addplayer_against_an_unknown_room_fails() {
    let state = test_helpers::test_app_state();
    let (mut ctx, _rx) = test_ctx();

    let frames = process_inbound_text(&state, &mut ctx, "addplayer|ghost|Alice").await;
    let Outbound::Error(message) = &frames[0] else {
        panic!("expected an error frame");
    };
    assert_eq!(message, "Room ghost not found");
}

#[tokio::test]
async fn duplicate_player_names_are_reported() {
    let state = test_helpers::test_app_state();
    let (mut alice, _rx_a) = test_ctx();
    let (mut bob, _rx_b) = test_ctx();

    process_inbound_text(&state, &mut alice, "join|r1").await;
    process_inbound_text(&state, &mut bob, "join|r1").await;
    process_inbound_text(&state, &mut alice, "addplayer|r1|Sam").await;

    let frames = process_inbound_text(&state, &mut bob, "addplayer|r1|s a m").await;
    let Outbound::Error(message) = &frames[0] else {
        panic!("expected an error frame");
    };
    assert_eq!(message, "Name s a m already in use");
}

#[tokio::test]
async fn removeplayer_for_a_spectator_fails() {
    let state = test_helpers::test_app_state();
    let (mut ctx, _rx) = test_ctx();
    process_inbound_text(&state, &mut ctx, "join|r1").await;

    let frames = process_inbound_text(&state, &mut ctx, "removeplayer|r1").await;
    let Outbound::Error(message) = &frames[0] else {
        panic!("expected an error frame");
    };
    assert_eq!(message, "You're not a player");
}

#[tokio::test]
async fn startgame_with_no_players_is_rejected() {
    let state = test_helpers::test_app_state();
    let (mut ctx, _rx) = test_ctx();
    process_inbound_text(&state, &mut ctx, "join|r1").await;

    let frames = process_inbound_text(&state, &mut ctx, "startgame|r1").await;
    let Outbound::Error(message) = &frames[0] else {
        panic!("expected an error frame");
    };
    assert_eq!(message, "Could not start game (no players or already started)");
}

#[tokio::test]
async fn full_game_through_the_dispatch_layer() {
    let state = test_helpers::test_app_state();
    let (mut alice, mut rx_a) = test_ctx();
    let (mut bob, _rx_b) = test_ctx();

    process_inbound_text(&state, &mut alice, "join|game").await;
    process_inbound_text(&state, &mut bob, "join|game").await;
    process_inbound_text(&state, &mut alice, "addplayer|game|Alice").await;
    process_inbound_text(&state, &mut bob, "addplayer|game|Bob").await;
    process_inbound_text(&state, &mut alice, r#"settings|game|{"desiredStackSize": 2}"#).await;
    process_inbound_text(&state, &mut alice, "startgame|game").await;

    for (is_alice, value) in [
        (true, "a lighthouse"),
        (false, "a storm"),
        (true, "storm.png"),
        (false, "lighthouse.png"),
    ] {
        let ctx = if is_alice { &mut alice } else { &mut bob };
        let frames = process_inbound_text(&state, ctx, &format!("submit|game|{value}")).await;
        assert!(frames.is_empty(), "submit should not error: {frames:?}");
    }

    let rooms = state.rooms.read().await;
    let room = &rooms["game"];
    assert_eq!(room.phase, Phase::Ended);
    drop(rooms);

    // The final broadcast reveals the finished stacks.
    let snapshots = drain_room_json(&mut rx_a);
    let last = snapshots.last().expect("final snapshot");
    assert!(
        last["players"]
            .as_array()
            .expect("players array")
            .iter()
            .all(|p| p["ownStack"].is_array())
    );
}

#[tokio::test]
async fn submit_without_a_pending_turn_is_reported() {
    let state = test_helpers::test_app_state();
    let (mut ctx, _rx) = test_ctx();
    process_inbound_text(&state, &mut ctx, "join|r1").await;

    let frames = process_inbound_text(&state, &mut ctx, "submit|r1|anything").await;
    let Outbound::Error(message) = &frames[0] else {
        panic!("expected an error frame");
    };
    assert_eq!(message, "Could not submit sheet");
}
