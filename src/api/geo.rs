/// Reverse-geocode and nearby-places passthrough endpoints
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{auth::AdminAuth, context::AppContext, error::CoffeyResult, records::Coordinates};

/// Default nearby-search radius when the caller does not give one
const DEFAULT_RADIUS_M: u32 = 500;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/admin/geocode", get(reverse_geocode))
        .route("/api/admin/places", get(nearby_places))
}

#[derive(Debug, Deserialize)]
struct GeocodeQuery {
    lat: f64,
    lng: f64,
}

async fn reverse_geocode(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Query(query): Query<GeocodeQuery>,
) -> CoffeyResult<impl IntoResponse> {
    let snapshot = ctx
        .enricher
        .geocoding_source()
        .reverse(Coordinates {
            lat: query.lat,
            lng: query.lng,
        })
        .await?;

    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
struct PlacesQuery {
    lat: f64,
    lng: f64,
    radius: Option<u32>,
    query: Option<String>,
}

async fn nearby_places(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Query(query): Query<PlacesQuery>,
) -> CoffeyResult<impl IntoResponse> {
    let snapshot = ctx
        .enricher
        .nearby_source()
        .fetch(
            Coordinates {
                lat: query.lat,
                lng: query.lng,
            },
            query.radius.unwrap_or(DEFAULT_RADIUS_M).clamp(1, 50_000),
            query.query.as_deref(),
        )
        .await?;

    Ok(Json(snapshot))
}
