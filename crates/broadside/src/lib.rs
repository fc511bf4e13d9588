//! # Broadside
//!
//! Session coordination server for two-player grid combat.
//!
//! Players connect over WebSocket, submit a fleet, and are paired by the
//! matchmaker. Every shot is validated and applied by the engine under
//! the session's own lock, so requests from both players and from many
//! sessions can arrive concurrently without corrupting a game.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use broadside::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BroadsideError> {
//!     let server = BroadsideServerBuilder::new()
//!         .bind("0.0.0.0:8080")
//!         .build(FleetCatalog::standard(), Arc::new(Scoreboard::new()), TrustedTokenAuth)
//!         .await?;
//!     server.run().await
//! }
//! ```

mod auth;
mod error;
mod handler;
mod server;

pub use auth::{AuthError, Authenticator, TrustedTokenAuth};
pub use error::BroadsideError;
pub use server::{BroadsideServer, BroadsideServerBuilder, PROTOCOL_VERSION, spawn_reaper};

pub mod prelude {
    pub use crate::{
        AuthError, Authenticator, BroadsideError, BroadsideServer, BroadsideServerBuilder,
        PROTOCOL_VERSION, TrustedTokenAuth,
    };
    pub use broadside_engine::{
        Coordinator, EngineConfig, FleetCatalog, GameError, PlayerStats, ScoreError,
        ScoreReporter, Scoreboard, ShipCatalog,
    };
    pub use broadside_protocol::{
        Envelope, MatchmakerReport, Message, PlayerId, Role, SessionId, SessionSnapshot,
        SessionStatus, ShipPlacement, ShotStatus,
    };
}
