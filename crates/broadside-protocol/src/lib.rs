//! Wire protocol for Broadside.
//!
//! This crate defines the vocabulary that clients, the server adapter,
//! and the session engine share:
//!
//! - **Identity** ([`PlayerId`], [`SessionId`]) — opaque string
//!   identifiers.
//! - **Game data** ([`ShipPlacement`], [`Role`], [`SessionStatus`],
//!   [`SessionSnapshot`]) — the shapes that cross the engine boundary.
//! - **Messages** ([`Envelope`], [`Message`]) — what travels on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how messages become
//!   bytes.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Engine (sessions, turns)
//! ```
//!
//! The protocol layer knows nothing about locking or matchmaking. It only
//! describes data.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Envelope, MatchmakerReport, Message, PlayerId, Role, SessionId,
    SessionSnapshot, SessionStatus, ShipPlacement, ShotStatus,
};
