//! Unified error type for the Broadside server.

use broadside_engine::GameError;
use broadside_protocol::ProtocolError;
use broadside_transport::TransportError;

use crate::AuthError;

/// Top-level error wrapping every layer's error.
///
/// Only connection-fatal problems travel as `BroadsideError`. Game rule
/// rejections are answered on the wire and the connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum BroadsideError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Game(#[from] GameError),
}
