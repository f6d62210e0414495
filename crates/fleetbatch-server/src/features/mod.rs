//! Feature modules implementing the batch API
//!
//! Each feature is a vertical slice with its own commands, queries and
//! routes. Commands are pure data structures with a `validate()` method and a
//! standalone async `handle` function carrying the business logic.

pub mod batch;

use axum::Router;

use crate::api::AppState;

/// All feature routes, to be nested under the API root.
pub fn router() -> Router<AppState> {
    Router::new().nest("/batch", batch::batch_routes())
}
