use super::*;
use crate::state::test_helpers;

// =============================================================================
// VALIDATION
// =============================================================================

#[test]
fn session_ids_accept_lowercase_digits_and_hyphens() {
    assert!(valid_session_id("abc-123"));
    assert!(valid_session_id("a"));
    assert!(valid_session_id(&"a".repeat(100)));
}

#[test]
fn session_ids_reject_bad_shapes() {
    assert!(!valid_session_id(""));
    assert!(!valid_session_id("ABC"));
    assert!(!valid_session_id("with space"));
    assert!(!valid_session_id("under_score"));
    assert!(!valid_session_id(&"a".repeat(101)));
}

#[test]
fn normalize_email_trims_and_lowercases() {
    assert_eq!(normalize_email("  Alice@Example.COM "), Some("alice@example.com".into()));
}

#[test]
fn normalize_email_rejects_malformed_addresses() {
    assert_eq!(normalize_email("not-an-email"), None);
    assert_eq!(normalize_email("@example.com"), None);
    assert_eq!(normalize_email("alice@"), None);
    assert_eq!(normalize_email("a@b@c"), None);
    assert_eq!(normalize_email(""), None);
}

// =============================================================================
// PASSWORD HASHING
// =============================================================================

#[test]
fn hash_and_verify_round_trip() {
    let stored = hash_password("hunter2");
    assert!(verify_password("hunter2", &stored));
    assert!(!verify_password("hunter3", &stored));
}

#[test]
fn hashes_are_salted() {
    let a = hash_password("hunter2");
    let b = hash_password("hunter2");
    assert_ne!(a, b);
    assert!(verify_password("hunter2", &a));
    assert!(verify_password("hunter2", &b));
}

#[test]
fn malformed_stored_credentials_never_verify() {
    assert!(!verify_password("anything", ""));
    assert!(!verify_password("anything", "nosalt"));
}

// =============================================================================
// ACCOUNT REFS
// =============================================================================

#[test]
fn account_ref_discriminates_guests_from_registered() {
    let guest = AccountRef::Guest("session-1".into());
    let registered = AccountRef::Registered("a@example.com".into());
    assert!(!guest.is_registered());
    assert!(registered.is_registered());
    assert_eq!(guest.id(), "session-1");
    assert_eq!(registered.id(), "a@example.com");
    assert_ne!(guest, AccountRef::Registered("session-1".into()));
}

#[test]
fn account_ref_serde_round_trip() {
    for account in [
        AccountRef::Guest("session-1".into()),
        AccountRef::Registered("a@example.com".into()),
    ] {
        let json = serde_json::to_string(&account).expect("serialize");
        let back: AccountRef = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, account);
    }
    assert_eq!(
        serde_json::to_string(&AccountRef::Guest("s".into())).expect("serialize"),
        r#"{"guest":"s"}"#
    );
}

// =============================================================================
// DATABASE ERROR PATHS
// =============================================================================

#[tokio::test]
async fn register_surfaces_database_failures() {
    let state = test_helpers::test_app_state();
    let err = register(&state.pool, "session-1", "a@example.com", "Alice", "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Database(_)));
    assert!(err.to_string().starts_with("Database error:"));
}

#[tokio::test]
async fn register_rejects_malformed_email_before_touching_the_database() {
    let state = test_helpers::test_app_state();
    let err = register(&state.pool, "session-1", "nope", "Alice", "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::InvalidEmail));
}

#[tokio::test]
async fn login_surfaces_database_failures() {
    let state = test_helpers::test_app_state();
    let err = login(&state.pool, "session-1", "a@example.com", "pw").await.unwrap_err();
    assert!(matches!(err, AccountError::Database(_)));
}

#[tokio::test]
async fn apply_hook_skips_guest_accounts() {
    let state = test_helpers::test_app_state();
    // Nothing to persist for a guest; this must not touch the pool.
    apply_hook(
        &state,
        "r1",
        0,
        crate::room::AccountHook::Remember {
            account: AccountRef::Guest("session-1".into()),
            your_stacks: 0,
        },
    );
}

#[tokio::test]
async fn apply_hook_tolerates_a_dead_pool_for_registered_accounts() {
    let state = test_helpers::test_app_state();
    apply_hook(
        &state,
        "r1",
        0,
        crate::room::AccountHook::Forget { account: AccountRef::Registered("a@example.com".into()) },
    );
    // The spawned write fails and logs; nothing to assert beyond "no
    // panic", which the runtime would surface on shutdown.
    tokio::task::yield_now().await;
}
