//! The HTTP facade.
//!
//! All repository traffic goes through one route, `/{user}/{repo}`:
//!
//! ```text
//! PUT    /{user}/{repo}?key=<uri>[&datetime=<ts>]   push a revision
//! DELETE /{user}/{repo}?key=<uri>[&datetime=<ts>]   append a tombstone
//! GET    /{user}/{repo}?key=<uri>[&datetime=<ts>]   Memento / TimeGate
//! GET    /{user}/{repo}?key=<uri>&timemap=true      TimeMap (link or JSON)
//! GET    /{user}/{repo}?index=true[&page=<n>]       live-key index
//! ```
//!
//! Mutating verbs authenticate via `Authorization: token <value>` and must
//! match the `{user}` path segment.

pub mod auth;
pub mod handlers;
pub mod memento;

mod error;

pub use self::error::ApiError;

use axum::routing::get;
use axum::Router;
use sqlx::AnyPool;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pool: AnyPool,
}

/// Builds the API router on top of an opened pool.
pub fn router(pool: AnyPool) -> Router {
    Router::new()
        .route(
            "/{user}/{repo}",
            get(handlers::get_repo)
                .put(handlers::put_resource)
                .delete(handlers::delete_resource),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { pool })
}
