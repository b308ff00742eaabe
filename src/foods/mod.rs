pub mod dto;
pub mod fingerprint;
pub mod handlers;
pub mod ingest;
pub mod repo;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_router())
        .merge(handlers::write_router())
}
