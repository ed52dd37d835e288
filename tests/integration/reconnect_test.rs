use crate::{assert_no_event, next_event, test_client, test_client_with};
use chatlink::{ChatError, ClientEvent, ConnectionState};
use chatlink_tests::{ScriptedServer, STEP_TIMEOUT};
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn test_manual_disconnect_says_goodbye_and_stays_down() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept_and_admit("alice").await;
        let frames = conn.read_until_closed().await;
        (server, frames)
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);

    t.client.disconnect().await;
    assert_eq!(t.client.state(), ConnectionState::Disconnected);
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Disconnected);

    let (server, frames) = server_task.await.unwrap();
    let goodbye = frames.last().expect("no goodbye frame");
    assert_eq!(goodbye["type"], "disconnect");
    assert_eq!(goodbye["username"], "alice");

    // No automatic reconnection after a manual disconnect.
    assert!(timeout(Duration::from_millis(500), server.accept())
        .await
        .is_err());
    assert_no_event(&mut t.events).await;

    // Disconnect is idempotent.
    t.client.disconnect().await;
    assert_no_event(&mut t.events).await;
}

#[tokio::test]
async fn test_reconnects_after_server_drop() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client();

    let server_task = tokio::spawn(async move {
        let conn = server.accept_and_admit("alice").await;
        drop(conn);
        // The client should come back on its own with the same parameters.
        let conn = server.accept_and_admit("alice").await;
        (server, conn)
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Disconnected);
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);

    let _keep = server_task.await.unwrap();
    assert!(t.client.is_connected());
    assert_eq!(t.client.reconnect_attempts(), 0);

    t.client.send_text_message("back again").await.unwrap();
    t.client.disconnect().await;
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Disconnected);
}

#[tokio::test]
async fn test_reconnect_gives_up_after_budget() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client_with(|b| b.max_reconnect_attempts(3));

    let server_task = tokio::spawn(async move {
        let conn = server.accept_and_admit("alice").await;
        // Take the listener down with the connection: every retry is refused.
        drop(server);
        drop(conn);
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);
    server_task.await.unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Disconnected);

    match next_event(&mut t.events).await {
        ClientEvent::Error(reason) => assert!(reason.contains("3 attempts"), "{reason}"),
        other => panic!("unexpected event: {other:?}"),
    }
    assert_no_event(&mut t.events).await;
    assert_eq!(t.client.state(), ConnectionState::Disconnected);
    assert_eq!(t.client.reconnect_attempts(), 3);
}

#[tokio::test]
async fn test_disconnect_cancels_pending_reconnect() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client_with(|b| b.reconnect_delay(Duration::from_secs(2)));

    let server_task = tokio::spawn(async move {
        let conn = server.accept_and_admit("alice").await;
        drop(conn);
        server
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Disconnected);

    // The supervisor is now waiting out its delay.
    t.client.disconnect().await;

    let server = server_task.await.unwrap();
    assert!(timeout(Duration::from_secs(3), server.accept())
        .await
        .is_err());
    assert_no_event(&mut t.events).await;
}

#[tokio::test]
async fn test_explicit_connect_supersedes_supervisor() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client_with(|b| b.reconnect_delay(Duration::from_secs(3)));

    let server_task = tokio::spawn(async move {
        let conn = server.accept_and_admit("alice").await;
        drop(conn);
        let conn = server.accept_and_admit("bob").await;
        (server, conn)
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Disconnected);

    t.client.connect("127.0.0.1", port, "bob").await.unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);

    let (server, _conn) = server_task.await.unwrap();
    // The cancelled supervisor must not dial in as alice later.
    assert!(timeout(Duration::from_secs(4), server.accept())
        .await
        .is_err());

    t.client.disconnect().await;
}

/// Send large images at a peer that never reads until a write gives up.
async fn fill_until_stalled(client: &chatlink::ChatClient) -> ChatError {
    let image = vec![0x5a_u8; 600 * 1024];
    for _ in 0..200 {
        if let Err(e) = client.send_image_message(&image, "big.png").await {
            return e;
        }
    }
    panic!("socket buffers never filled up");
}

#[tokio::test]
async fn test_heartbeat_timeout_on_stalled_peer_reconnects_once() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client_with(|b| {
        b.read_timeout(Duration::from_millis(200))
            .write_timeout(Duration::from_millis(300))
            .heartbeat_interval(Duration::from_millis(100))
            .heartbeat_timeout_factor(3)
    });

    let server_task = tokio::spawn(async move {
        // Admit alice, then neither read nor reply on that connection.
        let stalled = server.accept_and_admit("alice").await;
        let conn = server.accept_and_admit("alice").await;
        (server, stalled, conn)
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);

    // Either the write gives up first or the loss is noticed mid-fill.
    let err = fill_until_stalled(&t.client).await;
    assert!(
        matches!(err, ChatError::Transport(_) | ChatError::NotConnected),
        "got {err:?}"
    );

    assert_eq!(next_event(&mut t.events).await, ClientEvent::Disconnected);
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);
    assert!(t.client.is_connected());
    assert_eq!(t.client.reconnect_attempts(), 0);

    // Exactly one reconnection attempt reached the server.
    let (server, _stalled, _conn) = server_task.await.unwrap();
    assert!(timeout(Duration::from_millis(500), server.accept())
        .await
        .is_err());
    assert_no_event(&mut t.events).await;

    t.client.disconnect().await;
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Disconnected);
}

#[tokio::test]
async fn test_disconnect_after_stalled_write_tears_down() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client_with(|b| b.write_timeout(Duration::from_millis(300)));

    let server_task = tokio::spawn(async move {
        let stalled = server.accept_and_admit("alice").await;
        let conn = server.accept_and_admit("alice").await;
        (stalled, conn)
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);
    fill_until_stalled(&t.client).await;

    timeout(STEP_TIMEOUT, t.client.disconnect())
        .await
        .expect("disconnect hung on a stalled writer");
    assert_eq!(t.client.state(), ConnectionState::Disconnected);
    assert!(!t.client.is_connected());
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Disconnected);

    // The client is usable again.
    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);

    let _conns = server_task.await.unwrap();
    t.client.disconnect().await;
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Disconnected);
}
