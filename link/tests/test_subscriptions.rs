//! Subscription integration tests against an in-process mock node.

mod common;

use common::*;
use serde_json::json;
use sublink::SublinkError;

#[tokio::test]
async fn test_notifications_arrive_in_push_order() {
    let (listener, url) = bind().await;

    tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let request = read_request(&mut ws).await;
        assert_eq!(request.method, "state_subscribeStorage");
        respond_result(&mut ws, request.id, json!("sub-order")).await;
        for n in 1..=3 {
            notify(&mut ws, "state_storage", "sub-order", json!(n)).await;
        }
        // Hold the connection open until the client is done.
        let _ = read_request(&mut ws).await;
    });

    let client = test_client(&url).connect().await.unwrap();
    let mut sub = within(client.subscribe_storage(&["0x26aa394e"])).await.unwrap();
    assert_eq!(sub.id(), "sub-order");

    for expected in 1..=3 {
        let update = within(sub.next()).await.unwrap().unwrap();
        assert_eq!(update, json!(expected));
    }

    client.close().await;
}

#[tokio::test]
async fn test_unsubscribe_cancels_and_is_idempotent() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let subscribe = read_request(&mut ws).await;
        respond_result(&mut ws, subscribe.id, json!("sub-cancel")).await;

        let unsubscribe = read_request(&mut ws).await;
        assert_eq!(unsubscribe.method, "state_unsubscribeStorage");
        assert_eq!(unsubscribe.params, vec![json!("sub-cancel")]);
        respond_result(&mut ws, unsubscribe.id, json!(true)).await;
        ws
    });

    let client = test_client(&url).connect().await.unwrap();
    let mut sub = within(client.subscribe_storage(&["0x26aa394e"])).await.unwrap();

    sub.unsubscribe().await.unwrap();
    assert!(!sub.is_active());
    // One cancel request reaches the node; the repeat is a local no-op.
    sub.unsubscribe().await.unwrap();
    assert!(within(sub.next()).await.is_none());

    let _ws = server.await.unwrap();
    client.close().await;
}

#[tokio::test]
async fn test_unsubscribe_after_connection_gone_is_a_noop() {
    let (listener, url) = bind().await;

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let subscribe = read_request(&mut ws).await;
        respond_result(&mut ws, subscribe.id, json!("sub-orphan")).await;
        ws
    });

    // No reconnection: once the mock hangs up, the client closes.
    let client = test_client(&url)
        .connection_options(
            sublink::ConnectionOptions::new().with_auto_reconnect(false),
        )
        .connect()
        .await
        .unwrap();
    let mut sub = within(client.subscribe_storage(&["0x26aa394e"])).await.unwrap();

    let ws = server.await.unwrap();
    drop(ws);
    client.wait_for_state(sublink::ConnectionState::Closed).await;

    // The cancel has nowhere to go; locally it still succeeds.
    sub.unsubscribe().await.unwrap();
    assert!(!sub.is_active());
}

#[tokio::test]
async fn test_close_delivers_client_closed_to_active_subscriptions() {
    let (listener, url) = bind().await;

    tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let subscribe = read_request(&mut ws).await;
        respond_result(&mut ws, subscribe.id, json!("sub-close")).await;
        notify(&mut ws, "state_storage", "sub-close", json!("update-1")).await;
        // Stay up until the client closes.
        let _ = read_request(&mut ws).await;
    });

    let client = test_client(&url).connect().await.unwrap();
    let mut sub = within(client.subscribe_storage(&["0x26aa394e"])).await.unwrap();
    assert_eq!(
        within(sub.next()).await.unwrap().unwrap(),
        json!("update-1")
    );

    client.close().await;

    // The stream reports the close once, then ends.
    match within(sub.next()).await {
        Some(Err(SublinkError::ClientClosed)) => {}
        other => panic!("expected ClientClosed, got {:?}", other),
    }
    assert!(within(sub.next()).await.is_none());
}

#[tokio::test]
async fn test_subscribe_rejection_is_a_remote_error() {
    let (listener, url) = bind().await;

    tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let subscribe = read_request(&mut ws).await;
        respond_error(&mut ws, subscribe.id, -32602, "Too many keys").await;
        let _ = read_request(&mut ws).await;
    });

    let client = test_client(&url).connect().await.unwrap();
    let result = within(client.subscribe_storage(&["0x01", "0x02"])).await;
    match result {
        Err(SublinkError::Remote { code, .. }) => assert_eq!(code, -32602),
        other => panic!("expected remote error, got {:?}", other.map(|_| ())),
    }
    client.close().await;
}
