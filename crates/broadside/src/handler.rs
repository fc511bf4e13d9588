//! Per-connection handler: handshake, auth, and request dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version
//!   2. Authenticate token → get PlayerId
//!   3. Send HandshakeAck → connection now acts as that player
//!   4. Loop: receive envelopes → call the coordinator → reply
//!
//! Closing the connection does not leave any session. A player who drops
//! mid-game can reconnect and keep playing by session id.

use std::sync::Arc;
use std::time::{Duration, Instant};

use broadside_engine::{ScoreReporter, ShipCatalog};
use broadside_protocol::{Codec, Envelope, Message, PlayerId, ProtocolError};
use broadside_transport::{Connection, WebSocketConnection};

use crate::server::{PROTOCOL_VERSION, ServerState};
use crate::{Authenticator, BroadsideError};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-connection bookkeeping for outgoing envelopes.
struct Outbox<'a, C: Codec> {
    conn: &'a WebSocketConnection,
    codec: &'a C,
    seq: u64,
    start: Instant,
}

impl<'a, C: Codec> Outbox<'a, C> {
    fn new(conn: &'a WebSocketConnection, codec: &'a C) -> Self {
        Self {
            conn,
            codec,
            seq: 0,
            start: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    async fn send(&mut self, message: Message) -> Result<(), BroadsideError> {
        let envelope = Envelope {
            seq: next_seq(&mut self.seq),
            timestamp: self.elapsed_ms(),
            message,
        };
        let bytes = self.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    async fn send_error(&mut self, code: u16, message: impl Into<String>) -> Result<(), BroadsideError> {
        self.send(Message::Error {
            code,
            message: message.into(),
        })
        .await
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, R, A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, R, A, C>>,
) -> Result<(), BroadsideError>
where
    S: ShipCatalog,
    R: ScoreReporter,
    A: Authenticator,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let mut outbox = Outbox::new(&conn, &state.codec);
    let player_id = perform_handshake(&conn, &state, &mut outbox).await?;
    tracing::info!(%conn_id, %player_id, "player authenticated");

    loop {
        let data = match tokio::time::timeout(IDLE_TIMEOUT, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%player_id, "connection timed out");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "failed to decode envelope");
                outbox.send_error(400, format!("malformed message: {e}")).await?;
                continue;
            }
        };

        if dispatch(&state, &player_id, envelope.message, &mut outbox).await? {
            break;
        }
    }

    // Best effort; the peer may already be gone.
    let _ = conn.close().await;
    Ok(())
}

/// Receives the Handshake, validates it, authenticates, and sends the Ack.
async fn perform_handshake<S, R, A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<S, R, A, C>,
    outbox: &mut Outbox<'_, C>,
) -> Result<PlayerId, BroadsideError>
where
    S: ShipCatalog,
    R: ScoreReporter,
    A: Authenticator,
    C: Codec,
{
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope = match state.codec.decode(&data) {
        Ok(env) => env,
        Err(e) => {
            outbox.send_error(400, "expected Handshake").await?;
            return Err(e.into());
        }
    };

    let (version, token) = match envelope.message {
        Message::Handshake { version, token } => (version, token),
        _ => {
            outbox.send_error(400, "expected Handshake").await?;
            return Err(ProtocolError::InvalidMessage(
                "first message must be Handshake".into(),
            )
            .into());
        }
    };

    if version != PROTOCOL_VERSION {
        outbox
            .send_error(
                400,
                format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
            )
            .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let player_id = match state.auth.authenticate(token.as_deref().unwrap_or("")).await {
        Ok(pid) => pid,
        Err(e) => {
            outbox.send_error(401, "unauthorized").await?;
            return Err(e.into());
        }
    };

    let server_time = outbox.elapsed_ms();
    outbox
        .send(Message::HandshakeAck {
            player_id: player_id.clone(),
            server_time,
        })
        .await?;

    Ok(player_id)
}

/// Routes one request to the coordinator and sends the reply. Returns
/// `true` if the connection should close.
///
/// Game rule rejections are answered with an `Error` message; only
/// transport or encoding failures end the connection.
async fn dispatch<S, R, A, C>(
    state: &ServerState<S, R, A, C>,
    player_id: &PlayerId,
    message: Message,
    outbox: &mut Outbox<'_, C>,
) -> Result<bool, BroadsideError>
where
    S: ShipCatalog,
    R: ScoreReporter,
    A: Authenticator,
    C: Codec,
{
    let coordinator = &state.coordinator;

    match message {
        Message::Heartbeat { client_time } => {
            let server_time = outbox.elapsed_ms();
            outbox
                .send(Message::HeartbeatAck {
                    client_time,
                    server_time,
                })
                .await?;
        }

        Message::Join { placements } => {
            match coordinator.join(player_id.clone(), placements).await {
                Ok(joined) => {
                    outbox
                        .send(Message::Joined {
                            session_id: joined.session_id,
                            role: joined.role,
                        })
                        .await?;
                }
                Err(e) => outbox.send_error(e.code(), e.to_string()).await?,
            }
        }

        Message::Status { session_id } => {
            let session = coordinator.status(&session_id).await;
            outbox.send(Message::Snapshot { session }).await?;
        }

        Message::Fire {
            session_id,
            cell_index,
        } => match coordinator.fire(&session_id, player_id, cell_index).await {
            Ok(shot) => {
                outbox
                    .send(Message::ShotResult {
                        status: shot.status,
                        cell_index: shot.cell_index,
                        hit: shot.hit,
                        next_turn: shot.next_turn,
                        game_status: shot.game_status,
                        winner_id: shot.winner_id,
                    })
                    .await?;
            }
            Err(e) => {
                tracing::debug!(%player_id, %session_id, error = %e, "shot rejected");
                outbox.send_error(e.code(), e.to_string()).await?;
            }
        },

        Message::Leave { session_id } => {
            let left = coordinator.leave(&session_id, player_id).await;
            outbox
                .send(Message::Left {
                    ok: left.ok,
                    message: left.message,
                    removed_session_id: left.removed_session_id,
                    player_id: left.player_id,
                })
                .await?;
        }

        Message::Diagnostics => {
            let report = coordinator.diagnostics().await;
            outbox.send(Message::MatchmakerReport(report)).await?;
        }

        Message::Disconnect { reason } => {
            tracing::info!(%player_id, %reason, "client disconnected");
            return Ok(true);
        }

        other => {
            tracing::debug!(%player_id, ?other, "unexpected message from client");
            outbox.send_error(400, "unexpected message").await?;
        }
    }

    Ok(false)
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
