//! Integration tests for the Broadside server: handshake, request
//! dispatch, and full games over real WebSocket connections.

use std::sync::Arc;
use std::time::Duration;

use broadside::prelude::*;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

type TestCoordinator = Coordinator<FleetCatalog, Arc<Scoreboard>>;

/// Starts a server on a random port and returns its address and engine.
async fn start_server() -> (String, Arc<TestCoordinator>) {
    let server = BroadsideServerBuilder::new()
        .bind("127.0.0.1:0")
        .build(
            FleetCatalog::standard(),
            Arc::new(Scoreboard::new()),
            TrustedTokenAuth,
        )
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let coordinator = server.coordinator();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, coordinator)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, seq: u64, message: Message) {
    let envelope = Envelope {
        seq,
        timestamp: 0,
        message,
    };
    let text = serde_json::to_string(&envelope).expect("encode");
    ws.send(WsMessage::Text(text.into())).await.expect("send");
}

async fn recv(ws: &mut ClientWs) -> Envelope {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("reply within timeout")
            .expect("stream open")
            .expect("frame ok");
        match frame {
            WsMessage::Text(_) | WsMessage::Binary(_) => {
                return serde_json::from_slice(&frame.into_data()).expect("decode");
            }
            WsMessage::Close(_) => panic!("connection closed unexpectedly"),
            _ => continue,
        }
    }
}

/// Sends a request and returns the reply's message.
async fn request(ws: &mut ClientWs, message: Message) -> Message {
    send(ws, 1, message).await;
    recv(ws).await.message
}

/// Connects and completes the handshake as `player`.
async fn login(addr: &str, player: &str) -> ClientWs {
    let mut ws = connect(addr).await;
    send(
        &mut ws,
        0,
        Message::Handshake {
            version: PROTOCOL_VERSION,
            token: Some(player.to_string()),
        },
    )
    .await;
    match recv(&mut ws).await.message {
        Message::HandshakeAck { player_id, .. } => assert_eq!(player_id, PlayerId::new(player)),
        other => panic!("expected HandshakeAck, got {other:?}"),
    }
    ws
}

/// One length-2 ship at cells {0, 1}.
fn small_fleet() -> Vec<ShipPlacement> {
    vec![ShipPlacement::horizontal(5, 0)]
}

async fn join(ws: &mut ClientWs) -> (SessionId, Role) {
    match request(ws, Message::Join { placements: small_fleet() }).await {
        Message::Joined { session_id, role } => (session_id, role),
        other => panic!("expected Joined, got {other:?}"),
    }
}

fn expect_error(message: Message) -> (u16, String) {
    match message {
        Message::Error { code, message } => (code, message),
        other => panic!("expected Error, got {other:?}"),
    }
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_handshake_returns_player_id() {
    let (addr, _) = start_server().await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        0,
        Message::Handshake {
            version: PROTOCOL_VERSION,
            token: Some("alice".into()),
        },
    )
    .await;

    let ack = recv(&mut ws).await;
    assert_eq!(ack.seq, 0);
    assert!(matches!(
        ack.message,
        Message::HandshakeAck { ref player_id, .. } if *player_id == PlayerId::new("alice")
    ));
}

#[tokio::test]
async fn test_handshake_version_mismatch_is_rejected() {
    let (addr, _) = start_server().await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        0,
        Message::Handshake {
            version: PROTOCOL_VERSION + 1,
            token: Some("alice".into()),
        },
    )
    .await;

    let (code, message) = expect_error(recv(&mut ws).await.message);
    assert_eq!(code, 400);
    assert!(message.contains("version mismatch"));
}

#[tokio::test]
async fn test_handshake_without_token_is_unauthorized() {
    let (addr, _) = start_server().await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        0,
        Message::Handshake {
            version: PROTOCOL_VERSION,
            token: None,
        },
    )
    .await;

    let (code, _) = expect_error(recv(&mut ws).await.message);
    assert_eq!(code, 401);
}

#[tokio::test]
async fn test_first_message_must_be_handshake() {
    let (addr, _) = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, 0, Message::Diagnostics).await;

    let (code, message) = expect_error(recv(&mut ws).await.message);
    assert_eq!(code, 400);
    assert_eq!(message, "expected Handshake");
}

// =========================================================================
// Connection lifecycle
// =========================================================================

#[tokio::test]
async fn test_heartbeat_echoes_client_time() {
    let (addr, _) = start_server().await;
    let mut ws = login(&addr, "alice").await;

    send(&mut ws, 1, Message::Heartbeat { client_time: 1234 }).await;
    let reply = recv(&mut ws).await;

    assert_eq!(reply.seq, 1);
    assert!(matches!(
        reply.message,
        Message::HeartbeatAck { client_time: 1234, .. }
    ));
}

#[tokio::test]
async fn test_malformed_message_keeps_connection_open() {
    let (addr, _) = start_server().await;
    let mut ws = login(&addr, "alice").await;

    ws.send(WsMessage::Text(r#"{"seq":1,"nope":true}"#.into()))
        .await
        .unwrap();
    let (code, _) = expect_error(recv(&mut ws).await.message);
    assert_eq!(code, 400);

    let reply = request(&mut ws, Message::Heartbeat { client_time: 7 }).await;
    assert!(matches!(reply, Message::HeartbeatAck { client_time: 7, .. }));
}

#[tokio::test]
async fn test_server_only_message_from_client_is_rejected() {
    let (addr, _) = start_server().await;
    let mut ws = login(&addr, "alice").await;

    let reply = request(
        &mut ws,
        Message::Joined {
            session_id: SessionId::new("s"),
            role: Role::Player1,
        },
    )
    .await;
    assert_eq!(expect_error(reply).0, 400);
}

#[tokio::test]
async fn test_disconnect_closes_connection_but_keeps_session() {
    let (addr, coordinator) = start_server().await;
    let mut ws = login(&addr, "alice").await;
    let (session_id, _) = join(&mut ws).await;

    send(
        &mut ws,
        2,
        Message::Disconnect {
            reason: "bye".into(),
        },
    )
    .await;

    let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("server should close");
    assert!(matches!(next, None | Some(Ok(WsMessage::Close(_))) | Some(Err(_))));

    assert!(coordinator.status(&session_id).await.is_some());
}

// =========================================================================
// Matchmaking and play
// =========================================================================

#[tokio::test]
async fn test_two_players_are_paired() {
    let (addr, _) = start_server().await;
    let mut alice = login(&addr, "alice").await;
    let mut bob = login(&addr, "bob").await;

    let (alice_session, alice_role) = join(&mut alice).await;
    let (bob_session, bob_role) = join(&mut bob).await;

    assert_eq!(alice_session, bob_session);
    assert_eq!(alice_role, Role::Player1);
    assert_eq!(bob_role, Role::Player2);

    match request(&mut alice, Message::Status { session_id: alice_session }).await {
        Message::Snapshot { session: Some(snap) } => {
            assert_eq!(snap.status, SessionStatus::Active);
            assert_eq!(snap.player2_id, Some(PlayerId::new("bob")));
            assert_eq!(snap.current_turn, Some(PlayerId::new("alice")));
        }
        other => panic!("expected Snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_full_game_over_websocket() {
    let (addr, coordinator) = start_server().await;
    let mut alice = login(&addr, "alice").await;
    let mut bob = login(&addr, "bob").await;
    let (session_id, _) = join(&mut alice).await;
    join(&mut bob).await;

    // Alice misses, the turn passes to Bob.
    match request(
        &mut alice,
        Message::Fire {
            session_id: session_id.clone(),
            cell_index: 99,
        },
    )
    .await
    {
        Message::ShotResult { hit, next_turn, status, .. } => {
            assert!(!hit);
            assert_eq!(status, ShotStatus::ShotFired);
            assert_eq!(next_turn, Some(PlayerId::new("bob")));
        }
        other => panic!("expected ShotResult, got {other:?}"),
    }

    // Bob sinks Alice's only ship.
    let first = request(
        &mut bob,
        Message::Fire {
            session_id: session_id.clone(),
            cell_index: 0,
        },
    )
    .await;
    assert!(matches!(first, Message::ShotResult { hit: true, status: ShotStatus::ShotFired, .. }));

    match request(
        &mut bob,
        Message::Fire {
            session_id: session_id.clone(),
            cell_index: 1,
        },
    )
    .await
    {
        Message::ShotResult {
            status,
            next_turn,
            game_status,
            winner_id,
            ..
        } => {
            assert_eq!(status, ShotStatus::GameOver);
            assert_eq!(next_turn, None);
            assert_eq!(game_status, SessionStatus::Finished);
            assert_eq!(winner_id, Some(PlayerId::new("bob")));
        }
        other => panic!("expected ShotResult, got {other:?}"),
    }

    let stats = coordinator.reporter().stats(&PlayerId::new("bob"));
    assert_eq!(stats.wins, 1);
    assert_eq!(coordinator.reporter().stats(&PlayerId::new("alice")).losses, 1);

    // Further shots are refused: the session is finished.
    let after = request(
        &mut alice,
        Message::Fire {
            session_id,
            cell_index: 50,
        },
    )
    .await;
    assert_eq!(expect_error(after).0, 409);
}

#[tokio::test]
async fn test_fire_errors_map_to_codes() {
    let (addr, _) = start_server().await;
    let mut alice = login(&addr, "alice").await;
    let mut bob = login(&addr, "bob").await;
    let mut carol = login(&addr, "carol").await;
    let (session_id, _) = join(&mut alice).await;

    // Waiting for an opponent.
    let waiting = request(
        &mut alice,
        Message::Fire {
            session_id: session_id.clone(),
            cell_index: 5,
        },
    )
    .await;
    assert_eq!(expect_error(waiting).0, 409);

    join(&mut bob).await;

    let out_of_turn = request(
        &mut bob,
        Message::Fire {
            session_id: session_id.clone(),
            cell_index: 5,
        },
    )
    .await;
    assert_eq!(expect_error(out_of_turn).0, 409);

    let outsider = request(
        &mut carol,
        Message::Fire {
            session_id: session_id.clone(),
            cell_index: 5,
        },
    )
    .await;
    assert_eq!(expect_error(outsider).0, 403);

    let off_grid = request(
        &mut alice,
        Message::Fire {
            session_id: session_id.clone(),
            cell_index: 100,
        },
    )
    .await;
    assert_eq!(expect_error(off_grid).0, 400);

    let unknown = request(
        &mut alice,
        Message::Fire {
            session_id: SessionId::new("missing"),
            cell_index: 5,
        },
    )
    .await;
    assert_eq!(expect_error(unknown).0, 404);
}

#[tokio::test]
async fn test_repeat_shot_is_conflict() {
    let (addr, _) = start_server().await;
    let mut alice = login(&addr, "alice").await;
    let mut bob = login(&addr, "bob").await;
    let (session_id, _) = join(&mut alice).await;
    join(&mut bob).await;

    let hit = request(
        &mut alice,
        Message::Fire {
            session_id: session_id.clone(),
            cell_index: 0,
        },
    )
    .await;
    assert!(matches!(hit, Message::ShotResult { hit: true, .. }));

    let again = request(
        &mut alice,
        Message::Fire {
            session_id,
            cell_index: 0,
        },
    )
    .await;
    let (code, message) = expect_error(again);
    assert_eq!(code, 409);
    assert!(message.contains("already"));
}

#[tokio::test]
async fn test_status_unknown_session_is_empty_snapshot() {
    let (addr, _) = start_server().await;
    let mut ws = login(&addr, "alice").await;

    let reply = request(
        &mut ws,
        Message::Status {
            session_id: SessionId::new("missing"),
        },
    )
    .await;
    assert_eq!(reply, Message::Snapshot { session: None });
}

#[tokio::test]
async fn test_leave_is_idempotent_over_websocket() {
    let (addr, _) = start_server().await;
    let mut alice = login(&addr, "alice").await;
    let (session_id, _) = join(&mut alice).await;

    match request(&mut alice, Message::Leave { session_id: session_id.clone() }).await {
        Message::Left {
            ok,
            message,
            removed_session_id,
            player_id,
        } => {
            assert!(ok);
            assert_eq!(message, "Game removed");
            assert_eq!(removed_session_id, Some(session_id.clone()));
            assert_eq!(player_id, PlayerId::new("alice"));
        }
        other => panic!("expected Left, got {other:?}"),
    }

    match request(&mut alice, Message::Leave { session_id }).await {
        Message::Left {
            ok,
            message,
            removed_session_id,
            ..
        } => {
            assert!(ok);
            assert_eq!(message, "Game already removed");
            assert_eq!(removed_session_id, None);
        }
        other => panic!("expected Left, got {other:?}"),
    }
}

#[tokio::test]
async fn test_diagnostics_reports_open_slot() {
    let (addr, _) = start_server().await;
    let mut alice = login(&addr, "alice").await;
    let (session_id, _) = join(&mut alice).await;

    match request(&mut alice, Message::Diagnostics).await {
        Message::MatchmakerReport(report) => {
            assert_eq!(report.open_slot, Some(session_id));
            assert_eq!(report.session_count, 1);
            assert_eq!(report.waiting_status, Some(SessionStatus::Waiting));
            assert_eq!(report.waiting_player1, Some(PlayerId::new("alice")));
        }
        other => panic!("expected MatchmakerReport, got {other:?}"),
    }
}
