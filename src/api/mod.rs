/// API routes and handlers
pub mod chatter;
pub mod geo;
pub mod images;

use crate::context::AppContext;
use axum::Router;

/// Build admin API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(chatter::routes())
        .merge(images::routes())
        .merge(geo::routes())
}

/// Build public routes (no authentication)
pub fn public_routes() -> Router<AppContext> {
    images::public_routes()
}
