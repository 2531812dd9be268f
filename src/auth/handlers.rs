use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
        extractors::Caller,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
    },
    error::LedgerError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9._-]{3,100}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

fn validate_password(password: &str) -> Result<(), LedgerError> {
    if password.len() < 8 {
        return Err(LedgerError::InvalidRequest("password too short".into()));
    }
    if password.len() > 100 {
        return Err(LedgerError::InvalidRequest("password too long".into()));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, LedgerError> {
    payload.username = payload.username.trim().to_string();

    if !is_valid_username(&payload.username) {
        warn!(username = %payload.username, "invalid username");
        return Err(LedgerError::InvalidRequest("invalid username".into()));
    }
    validate_password(&payload.password)?;

    let hash = hash_password(&payload.password)?;

    // The unique constraint on usernames is the duplicate check, so two
    // concurrent registrations cannot both slip through.
    let identity = state
        .store
        .create_account(&payload.username, &hash, false)
        .await?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(identity.user_id)?;
    let refresh_token = keys.sign_refresh(identity.user_id)?;

    info!(user_id = %identity.user_id, username = %identity.username, "user registered");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: identity.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, LedgerError> {
    payload.username = payload.username.trim().to_string();

    // Unknown username and wrong password produce the identical response.
    let user = state
        .store
        .find_user_by_username(&payload.username)
        .await?
        .ok_or_else(|| {
            warn!(username = %payload.username, "login unknown username");
            LedgerError::InvalidCredentials
        })?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(username = %payload.username, user_id = %user.id, "login invalid password");
        return Err(LedgerError::InvalidCredentials);
    }

    let identity = state
        .store
        .load_identity(user.id)
        .await?
        .ok_or(LedgerError::InvalidCredentials)?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(identity.user_id)?;
    let refresh_token = keys.sign_refresh(identity.user_id)?;

    info!(user_id = %identity.user_id, username = %identity.username, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: identity.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, LedgerError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| LedgerError::Unauthenticated)?;

    let identity = state
        .store
        .load_identity(claims.sub)
        .await?
        .ok_or(LedgerError::Unauthenticated)?;

    let access_token = keys.sign_access(identity.user_id)?;
    let refresh_token = keys.sign_refresh(identity.user_id)?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: identity.into(),
    }))
}

#[instrument(skip_all)]
pub async fn get_me(Caller(identity): Caller) -> Json<PublicUser> {
    Json(identity.into())
}
