mod dto;
pub mod handlers;
mod repo_types;
mod services;
mod store;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
