pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod model;
pub mod mongo;
pub mod store;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::user_routes())
}
