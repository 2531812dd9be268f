use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::{error::LedgerError, state::AppState, store::Identity};

use super::jwt::{JwtKeys, TokenKind};

/// Authenticates the request and resolves the full request-scoped identity
/// from the store. Every handler that acts on ledger state takes this and
/// passes the identity down, so no service call ever reads ambient auth
/// state.
pub struct Caller(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = LedgerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);

        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(LedgerError::Unauthenticated)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(LedgerError::Unauthenticated)?;

        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            LedgerError::Unauthenticated
        })?;

        if claims.kind != TokenKind::Access {
            return Err(LedgerError::Unauthenticated);
        }

        let identity = state
            .store
            .load_identity(claims.sub)
            .await?
            .ok_or(LedgerError::Unauthenticated)?;

        Ok(Caller(identity))
    }
}
