//! Authentication hook for establishing player identity.
//!
//! Broadside does not manage accounts or passwords. The [`Authenticator`]
//! trait turns the token a client presents in its handshake into an
//! opaque [`PlayerId`]; every later request on that connection acts as
//! that player.

use std::future::Future;

use broadside_protocol::PlayerId;

/// Why a handshake token was refused.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The client sent no token.
    #[error("missing token")]
    MissingToken,

    /// The token was presented but not accepted.
    #[error("authentication failed: {0}")]
    Rejected(String),
}

/// Validates a client's token and returns the player it identifies.
///
/// # Example
///
/// ```rust
/// use broadside::{AuthError, Authenticator};
/// use broadside_protocol::PlayerId;
///
/// /// Accepts only numeric account ids.
/// struct NumericAuth;
///
/// impl Authenticator for NumericAuth {
///     async fn authenticate(&self, token: &str) -> Result<PlayerId, AuthError> {
///         token
///             .parse::<u64>()
///             .map(|id| PlayerId::new(id.to_string()))
///             .map_err(|_| AuthError::Rejected("token must be numeric".into()))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<PlayerId, AuthError>> + Send;
}

/// Trusts the token as the player id. Use it behind a gateway that has
/// already authenticated the caller, or in development.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustedTokenAuth;

impl Authenticator for TrustedTokenAuth {
    async fn authenticate(&self, token: &str) -> Result<PlayerId, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        Ok(PlayerId::new(token))
    }
}
