use crate::{assert_no_event, next_event, test_client};
use chatlink::{ChatError, ClientEvent, ConnectionState};
use chatlink_common::HandshakeError;
use chatlink_tests::ScriptedServer;
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn test_successful_handshake() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept().await;
        let version = conn.read_json().await;
        assert_eq!(version["type"], "version");
        assert_eq!(version["version"], "MS4wLjAtbXY=");
        conn.send_json(&json!({"type": "version_accepted"})).await;

        let name = conn.read_json().await;
        assert_eq!(name, json!({"type": "username", "username": "alice"}));
        conn.send_json(&json!({"type": "connected"})).await;
        (server, conn)
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    assert!(t.client.is_connected());
    assert_eq!(t.client.state(), ConnectionState::Connected);
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);

    let _keep = server_task.await.unwrap();
    t.client.disconnect().await;
}

#[tokio::test]
async fn test_version_mismatch_is_reported_once() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept().await;
        conn.read_json().await;
        conn.send_json(&json!({"type": "version_mismatch", "required_version": "2.0.0"}))
            .await;
        // The client must give up without sending its username.
        let frames = conn.read_until_closed().await;
        assert!(frames.is_empty(), "client sent {frames:?}");
        server
    });

    let err = t.client.connect("127.0.0.1", port, "alice").await.unwrap_err();
    assert!(matches!(
        err,
        ChatError::VersionRejected { ref required_version } if required_version == "2.0.0"
    ));
    assert_eq!(t.client.state(), ConnectionState::Disconnected);

    assert_eq!(
        next_event(&mut t.events).await,
        ClientEvent::VersionMismatch("2.0.0".into())
    );
    assert_no_event(&mut t.events).await;

    // Handshake failures never start automatic reconnection.
    let server = server_task.await.unwrap();
    let reconnect = timeout(Duration::from_millis(500), server.accept()).await;
    assert!(reconnect.is_err(), "client reconnected after a rejection");
}

#[tokio::test]
async fn test_username_rejected() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client();

    tokio::spawn(async move {
        let mut conn = server.accept().await;
        conn.read_json().await;
        conn.send_json(&json!({"type": "version_accepted"})).await;
        conn.read_json().await;
        conn.send_json(&json!({"type": "error", "content": "name taken"}))
            .await;
        conn.read_until_closed().await;
    });

    let err = t.client.connect("127.0.0.1", port, "alice").await.unwrap_err();
    assert!(matches!(
        err,
        ChatError::UsernameRejected { ref reason } if reason == "name taken"
    ));

    match next_event(&mut t.events).await {
        ClientEvent::Error(reason) => assert!(reason.contains("name taken"), "{reason}"),
        other => panic!("unexpected event: {other:?}"),
    }
    assert_no_event(&mut t.events).await;
    assert!(!t.client.is_connected());
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept().await;
        conn.read_json().await;
        // Never answer.
        conn.read_until_closed().await;
    });

    let err = t.client.connect("127.0.0.1", port, "alice").await.unwrap_err();
    assert!(matches!(
        err,
        ChatError::Handshake(HandshakeError::NoReply { phase: "version" })
    ));
    assert!(matches!(
        next_event(&mut t.events).await,
        ClientEvent::Error(_)
    ));
    server_task.await.unwrap();
}

#[tokio::test]
async fn test_second_connect_while_connecting_is_refused() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept().await;
        conn.read_json().await;
        conn.read_until_closed().await;
    });

    let first = {
        let client = t.client.clone();
        tokio::spawn(async move { client.connect("127.0.0.1", port, "alice").await })
    };

    timeout(Duration::from_secs(2), async {
        while !t.client.state().is_connecting() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let err = t.client.connect("127.0.0.1", port, "bob").await.unwrap_err();
    assert!(matches!(err, ChatError::ConnectInProgress));
    assert!(matches!(
        next_event(&mut t.events).await,
        ClientEvent::Error(_)
    ));

    // The first attempt still runs to its own conclusion.
    assert!(first.await.unwrap().is_err());
    server_task.await.unwrap();
}

#[tokio::test]
async fn test_connect_accepts_url_style_host() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client();

    let server_task = tokio::spawn(async move {
        let conn = server.accept_and_admit("alice").await;
        (server, conn)
    });

    t.client
        .connect(&format!("  http://127.0.0.1:{port}/room "), 1, "alice")
        .await
        .unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);

    let _keep = server_task.await.unwrap();
    t.client.disconnect().await;
}
