use crate::{assert_no_event, next_event, test_client, test_client_with};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chatlink::{ChatError, ChatEvent, ClientEvent};
use chatlink_tests::ScriptedServer;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_inbound_text_and_system() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept_and_admit("alice").await;
        conn.send_json(&json!({"type": "system", "content": "bob joined", "timestamp": 1_700_000_000.5}))
            .await;
        conn.send_json(&json!({"type": "text", "sender": "bob", "content": "hi", "timestamp": 42}))
            .await;
        conn
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);
    assert_eq!(
        next_event(&mut t.events).await,
        ClientEvent::Message(ChatEvent::System {
            content: "bob joined".into(),
            timestamp: 1_700_000_000_500,
        })
    );
    assert_eq!(
        next_event(&mut t.events).await,
        ClientEvent::Message(ChatEvent::Text {
            sender: "bob".into(),
            content: "hi".into(),
            timestamp: 42,
        })
    );

    let _conn = server_task.await.unwrap();
    t.client.disconnect().await;
}

#[tokio::test]
async fn test_liveness_and_user_list_are_not_surfaced() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept_and_admit("alice").await;
        conn.send_json(&json!({"type": "heartbeat", "content": "ping"})).await;
        conn.send_json(&json!({"type": "pong"})).await;
        conn.send_json(&json!({"type": "user_list", "users": [{"username": "bob"}]}))
            .await;
        conn.send_json(&json!({"type": "typing", "sender": "bob"})).await;
        conn.send_json(&json!({"type": "text", "sender": "bob", "content": "after"}))
            .await;
        conn
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);
    match next_event(&mut t.events).await {
        ClientEvent::Message(ChatEvent::Text { content, .. }) => assert_eq!(content, "after"),
        other => panic!("unexpected event: {other:?}"),
    }
    assert_no_event(&mut t.events).await;

    let _conn = server_task.await.unwrap();
    t.client.disconnect().await;
}

#[tokio::test]
async fn test_oversized_length_does_not_kill_connection() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept_and_admit("alice").await;
        // Header only: the bogus length must be discarded on its own.
        conn.send_raw(2_000_000, &[]).await;
        conn.send_json(&json!({"type": "text", "sender": "bob", "content": "still here"}))
            .await;
        conn
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);
    match next_event(&mut t.events).await {
        ClientEvent::Message(ChatEvent::Text { content, .. }) => {
            assert_eq!(content, "still here");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(t.client.is_connected());

    let _conn = server_task.await.unwrap();
    t.client.disconnect().await;
}

#[tokio::test]
async fn test_malformed_json_is_skipped() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept_and_admit("alice").await;
        conn.send_raw(9, b"{not json").await;
        conn.send_json(&json!({"type": "system", "content": "ok"})).await;
        conn
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);
    assert!(matches!(
        next_event(&mut t.events).await,
        ClientEvent::Message(ChatEvent::System { .. })
    ));

    let _conn = server_task.await.unwrap();
    t.client.disconnect().await;
}

#[tokio::test]
async fn test_outbound_text() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let t = test_client();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept_and_admit("alice").await;
        let frame = conn.read_kind("text").await;
        assert_eq!(frame["content"], "hello room");
        assert!(frame["timestamp"].as_i64().unwrap() > 0);
        conn
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    t.client.send_text_message("hello room").await.unwrap();

    let _conn = server_task.await.unwrap();
    t.client.disconnect().await;
}

#[tokio::test]
async fn test_outbound_image_hides_original_name() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let t = test_client();
    let image = vec![0x89, b'P', b'N', b'G', 0, 1, 2, 3];
    let expected = image.clone();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept_and_admit("alice").await;
        let frame = conn.read_kind("file").await;
        assert_eq!(frame["file_type"], "images");
        assert_eq!(frame["original_file_name"], "holiday.png");

        let wire_name = frame["file_name"].as_str().unwrap();
        let (token, ext) = wire_name.split_once('.').unwrap();
        assert_eq!(ext, "png");
        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_lowercase()));

        let data = STANDARD
            .decode(frame["file_data"].as_str().unwrap())
            .unwrap();
        assert_eq!(data, expected);
        conn
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    t.client
        .send_image_message(&image, "holiday.png")
        .await
        .unwrap();

    let _conn = server_task.await.unwrap();
    t.client.disconnect().await;
}

#[tokio::test]
async fn test_outbound_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "line one\n").unwrap();

    let server = ScriptedServer::bind().await;
    let port = server.port();
    let t = test_client();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept_and_admit("alice").await;
        let frame = conn.read_kind("file").await;
        assert_eq!(frame["file_type"], "text");
        assert_eq!(frame["original_file_name"], "notes.txt");
        let data = STANDARD
            .decode(frame["file_data"].as_str().unwrap())
            .unwrap();
        assert_eq!(data, b"line one\n");
        conn
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();

    let missing = t
        .client
        .send_file_message(dir.path().join("missing.txt"), "missing.txt", "text")
        .await
        .unwrap_err();
    assert!(matches!(missing, ChatError::FileNotFound(_)));

    t.client
        .send_file_message(&path, "notes.txt", "text")
        .await
        .unwrap();

    let _conn = server_task.await.unwrap();
    t.client.disconnect().await;
}

#[tokio::test]
async fn test_inbound_file_is_stored() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let mut t = test_client();

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept_and_admit("alice").await;
        conn.send_json(&json!({
            "type": "file",
            "sender": "carol",
            "file_type": "images",
            "file_name": "zxcvbnma.jpg",
            "original_file_name": "sunset.jpg",
            "file_data": STANDARD.encode(b"jpeg bytes"),
            "timestamp": 99
        }))
        .await;
        conn
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();
    assert_eq!(next_event(&mut t.events).await, ClientEvent::Connected);

    match next_event(&mut t.events).await {
        ClientEvent::Message(ChatEvent::Image {
            sender,
            file_name,
            reference,
            timestamp,
            ..
        }) => {
            assert_eq!(sender, "carol");
            assert_eq!(file_name, "sunset.jpg");
            assert_eq!(reference.unwrap().as_str(), "zxcvbnma.jpg");
            assert_eq!(timestamp, 99);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(t.store.get("zxcvbnma.jpg"), Some(b"jpeg bytes".to_vec()));

    let _conn = server_task.await.unwrap();
    t.client.disconnect().await;
}

#[tokio::test]
async fn test_heartbeats_are_sent_while_connected() {
    let server = ScriptedServer::bind().await;
    let port = server.port();
    let t = test_client_with(|b| b.heartbeat_interval(Duration::from_millis(100)));

    let server_task = tokio::spawn(async move {
        let mut conn = server.accept_and_admit("alice").await;
        for _ in 0..2 {
            let frame = conn.read_json().await;
            assert_eq!(frame["type"], "heartbeat");
            assert_eq!(frame["content"], "ping");
        }
        conn
    });

    t.client.connect("127.0.0.1", port, "alice").await.unwrap();

    let _conn = server_task.await.unwrap();
    t.client.disconnect().await;
}

#[tokio::test]
async fn test_send_while_disconnected() {
    let t = test_client();
    assert!(matches!(
        t.client.send_text_message("nobody home").await,
        Err(ChatError::NotConnected)
    ));
}
