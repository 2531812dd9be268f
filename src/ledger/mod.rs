mod dto;
pub mod guard;
pub mod handlers;
pub mod service;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::resource_routes())
        .merge(handlers::admin_routes())
}
