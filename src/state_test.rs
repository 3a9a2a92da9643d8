use super::*;
use crate::room::Phase;

#[tokio::test]
async fn new_state_has_no_rooms() {
    let state = test_helpers::test_app_state();
    assert!(state.rooms.read().await.is_empty());
}

#[tokio::test]
async fn seeded_room_is_ready_to_play() {
    let state = test_helpers::test_app_state();
    test_helpers::seed_room(&state, "r1").await;

    let rooms = state.rooms.read().await;
    let room = rooms.get("r1").expect("room should exist");
    assert_eq!(room.phase, Phase::NotStarted);
    assert!(room.players.is_empty());
    assert!(room.spectators.is_empty());
}
