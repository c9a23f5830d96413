//! Authentication-oracle seam and the request identity extractor.
//!
//! Credential hashing and token issuance live outside this service; the only
//! contract consumed here is [`AuthOracle::verify`], which resolves an opaque
//! bearer token to the stable user identifier it was issued for.

use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use thiserror::Error;
use uuid::Uuid;

use crate::{error::AppError, services::presence_service, state::SharedState};

/// Header carrying the client-chosen device identifier.
pub const DEVICE_ID_HEADER: &str = "x-device-id";

/// Failures reported by the authentication oracle.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credentials were presented.
    #[error("authorization header required")]
    MissingCredentials,
    /// The presented token did not verify.
    #[error("invalid or expired token")]
    InvalidToken,
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Unauthorized(err.to_string())
    }
}

/// Oracle resolving bearer tokens to user identities.
pub trait AuthOracle: Send + Sync {
    /// Verify a token and return the user identifier it belongs to.
    fn verify(&self, token: &str) -> Result<String, AuthError>;
}

/// Oracle accepting tokens whose subject is the bare user UUID.
///
/// This is the deployment seam: a real installation swaps in an oracle backed
/// by its token verifier. The shape of the identifier is still enforced so a
/// garbage token never turns into an identity.
#[derive(Debug, Default)]
pub struct SubjectOracle;

impl AuthOracle for SubjectOracle {
    fn verify(&self, token: &str) -> Result<String, AuthError> {
        Uuid::parse_str(token)
            .map(|id| id.to_string())
            .map_err(|_| AuthError::InvalidToken)
    }
}

/// Authenticated caller identity attached to every guarded route.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Stable user identifier issued by the oracle.
    pub user_id: String,
    /// Device identifier from the `X-Device-ID` header, if present.
    pub device_id: Option<String>,
    /// Client descriptor from the `User-Agent` header, if present.
    pub user_agent: Option<String>,
}

impl FromRequestParts<SharedState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::MissingCredentials)?;
        let token = header_value
            .strip_prefix("Bearer ")
            .unwrap_or(header_value);

        let user_id = state.oracle().verify(token)?;

        let device_id = parts
            .headers
            .get(DEVICE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_owned);
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let identity = Identity {
            user_id,
            device_id,
            user_agent,
        };

        // Every authenticated request refreshes presence, detached from the
        // request path so storage hiccups never fail the caller.
        presence_service::touch(state, &identity);

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_oracle_accepts_uuid_tokens() {
        let oracle = SubjectOracle;
        let id = Uuid::new_v4();
        assert_eq!(oracle.verify(&id.to_string()).unwrap(), id.to_string());
    }

    #[test]
    fn subject_oracle_rejects_garbage() {
        let oracle = SubjectOracle;
        assert!(oracle.verify("not-a-token").is_err());
        assert!(oracle.verify("").is_err());
    }
}
