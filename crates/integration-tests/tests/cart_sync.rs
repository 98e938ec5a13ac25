//! Integration tests for cart synchronization against a mock backend.
//!
//! Run with: cargo test -p shopcart-integration-tests --test cart_sync

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use serde_json::json;
use shopcart_core::QuantityChange;
use shopcart_integration_tests::{
    CART_PATH, line_json, mount_cart, mount_echo_put, product, pushed_snapshots, quantities,
    store_for,
};
use shopcart_storefront::cart::{CartNotice, CartOptions, LogoutPolicy, MergePolicy, SyncMode};
use shopcart_storefront::session::{AuthSession, SessionProvider};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pairs(state: &shopcart_core::CartState) -> Vec<(String, u64)> {
    state
        .items()
        .iter()
        .map(|item| (item.id.to_string(), u64::from(item.quantity)))
        .collect()
}

fn pair(id: &str, quantity: u64) -> (String, u64) {
    (id.to_string(), quantity)
}

// ============================================================================
// Anonymous carts
// ============================================================================

#[tokio::test]
async fn test_anonymous_cart_never_calls_backend() {
    let server = MockServer::start().await;
    let store = store_for(&server, CartOptions::default());

    store.add_item(&product("A", 100)).unwrap();
    store.add_item(&product("A", 100)).unwrap();
    store.add_item(&product("B", 50)).unwrap();
    store.change_quantity(&"A".into(), QuantityChange::Decrement);
    store.remove_item(&"B".into());
    store.flush().await;

    assert_eq!(store.state().grand_total(), Decimal::new(105, 0));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ============================================================================
// Sign-in
// ============================================================================

#[tokio::test]
async fn test_login_unions_anonymous_cart_with_backend_cart() {
    let server = MockServer::start().await;
    // First fetch sees the stored cart, the second one the merged result.
    mount_cart(&server, "t1", &[line_json("A", 100.0, 1), line_json("C", 5.0, 3)], 1).await;
    mount_cart(
        &server,
        "t1",
        &[
            line_json("A", 100.0, 2),
            line_json("C", 5.0, 3),
            line_json("B", 50.0, 1),
        ],
        1,
    )
    .await;
    mount_echo_put(&server).await;

    let store = store_for(&server, CartOptions::default());
    store.add_item(&product("A", 100)).unwrap();
    store.add_item(&product("B", 50)).unwrap();

    let state = store.login(AuthSession::new("u1", "t1")).await;

    assert_eq!(store.mode(), SyncMode::AuthenticatedSyncing);
    assert_eq!(pairs(&state), [pair("A", 2), pair("C", 3), pair("B", 1)]);
    assert!(!store.needs_resync());

    let pushed = pushed_snapshots(&server).await;
    assert_eq!(pushed.len(), 1);
    assert_eq!(
        quantities(&pushed[0]["products"]),
        [pair("A", 2), pair("C", 3), pair("B", 1)]
    );
    assert!(pushed[0]["updatedAt"].is_string());
}

#[tokio::test]
async fn test_login_with_discard_policy_adopts_backend_cart() {
    let server = MockServer::start().await;
    mount_cart(&server, "t1", &[line_json("C", 5.0, 1)], 10).await;

    let options = CartOptions {
        merge_policy: MergePolicy::DiscardLocal,
        ..CartOptions::default()
    };
    let store = store_for(&server, options);
    store.add_item(&product("A", 100)).unwrap();

    let state = store.login(AuthSession::new("u1", "t1")).await;

    assert_eq!(pairs(&state), [pair("C", 1)]);
    assert!(pushed_snapshots(&server).await.is_empty());
}

#[tokio::test]
async fn test_login_with_backend_down_keeps_local_cart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CART_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = store_for(&server, CartOptions::default());
    store.add_item(&product("A", 100)).unwrap();
    let mut notices = store.subscribe();

    let state = store.login(AuthSession::new("u1", "t1")).await;

    assert_eq!(store.mode(), SyncMode::AuthenticatedSyncing);
    assert_eq!(pairs(&state), [pair("A", 1)]);
    assert!(store.needs_resync());
    assert!(matches!(
        notices.recv().await.unwrap(),
        CartNotice::SyncFailed { .. }
    ));
}

// ============================================================================
// Signed-in mutations
// ============================================================================

#[tokio::test]
async fn test_each_mutation_pushes_the_full_cart() {
    let server = MockServer::start().await;
    mount_cart(&server, "t1", &[], 10).await;
    mount_echo_put(&server).await;

    let store = store_for(&server, CartOptions::default());
    store.login(AuthSession::new("u1", "t1")).await;

    store.add_item(&product("A", 100)).unwrap();
    store.flush().await;
    store.add_item(&product("B", 50)).unwrap();
    store.flush().await;
    store.change_quantity(&"A".into(), QuantityChange::Increment);
    store.flush().await;
    store.clear();
    store.flush().await;

    let pushed: Vec<_> = pushed_snapshots(&server)
        .await
        .iter()
        .map(|body| quantities(&body["products"]))
        .collect();
    assert_eq!(
        pushed,
        [
            vec![pair("A", 1)],
            vec![pair("A", 1), pair("B", 1)],
            vec![pair("A", 2), pair("B", 1)],
            vec![],
        ]
    );
}

#[tokio::test]
async fn test_failed_push_is_reported_and_resync_recovers() {
    let server = MockServer::start().await;
    mount_cart(&server, "t1", &[], 10).await;
    Mock::given(method("PUT"))
        .and(path(CART_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_echo_put(&server).await;

    let store = store_for(&server, CartOptions::default());
    store.login(AuthSession::new("u1", "t1")).await;
    let mut notices = store.subscribe();

    let state = store.add_item(&product("A", 100)).unwrap();
    store.flush().await;

    // The optimistic change stays even though the backend refused it.
    assert_eq!(pairs(&state), [pair("A", 1)]);
    assert_eq!(pairs(&store.state()), [pair("A", 1)]);
    assert!(store.needs_resync());
    match notices.recv().await.unwrap() {
        CartNotice::SyncFailed { message } => assert!(message.contains("boom")),
        other => panic!("unexpected notice: {other:?}"),
    }

    let state = store.resync().await.unwrap();
    assert!(!store.needs_resync());
    assert_eq!(pairs(&state), [pair("A", 1)]);
    assert!(matches!(
        notices.recv().await.unwrap(),
        CartNotice::Synced { item_count: 1 }
    ));
}

// ============================================================================
// Sign-out
// ============================================================================

#[tokio::test]
async fn test_logout_leaves_backend_cart_alone() {
    let server = MockServer::start().await;
    mount_cart(&server, "t1", &[line_json("C", 5.0, 2)], 10).await;
    mount_echo_put(&server).await;

    let store = store_for(&server, CartOptions::default());
    store.login(AuthSession::new("u1", "t1")).await;
    let before = server.received_requests().await.unwrap().len();

    let state = store.logout();
    store.add_item(&product("A", 1)).unwrap();
    store.flush().await;

    assert!(state.is_empty());
    assert_eq!(store.mode(), SyncMode::AnonymousLocal);
    assert_eq!(server.received_requests().await.unwrap().len(), before);
}

#[tokio::test]
async fn test_logout_restores_unmerged_anonymous_cart() {
    let server = MockServer::start().await;
    mount_cart(&server, "t1", &[line_json("C", 5.0, 2)], 10).await;

    let options = CartOptions {
        merge_policy: MergePolicy::DiscardLocal,
        logout_policy: LogoutPolicy::RestoreAnonymous,
        ..CartOptions::default()
    };
    let store = store_for(&server, options);
    store.add_item(&product("A", 100)).unwrap();

    store.login(AuthSession::new("u1", "t1")).await;
    let state = store.logout();

    assert_eq!(pairs(&state), [pair("A", 1)]);
}

// ============================================================================
// Session provider
// ============================================================================

#[tokio::test]
async fn test_store_follows_session_provider() {
    let server = MockServer::start().await;
    mount_cart(&server, "t1", &[line_json("C", 5.0, 1)], 10).await;
    mount_cart(&server, "t2", &[line_json("D", 7.0, 4)], 10).await;

    let store = store_for(&server, CartOptions::default());
    let provider = SessionProvider::default();
    let follower = tokio::spawn({
        let store = store.clone();
        let sessions = provider.subscribe();
        async move { store.follow_session(sessions).await }
    });

    provider.login(AuthSession::new("u1", "t1"));
    wait_for(|| pairs(&store.state()) == [pair("C", 1)]).await;

    // Switching users signs the first one out before the second signs in.
    provider.login(AuthSession::new("u2", "t2"));
    wait_for(|| pairs(&store.state()) == [pair("D", 4)]).await;
    assert_eq!(store.session().unwrap().user_id().as_str(), "u2");

    provider.logout();
    drop(provider);
    follower.await.unwrap();
    assert_eq!(store.mode(), SyncMode::AnonymousLocal);
}

async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
