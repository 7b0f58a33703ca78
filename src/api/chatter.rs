/// Chatter creation endpoint
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::{
    auth::AdminAuth,
    context::AppContext,
    error::CoffeyResult,
    records::{assemble, ChatterData, CreateChatterRequest, Envelope, RecordKind},
};

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/admin/chatter", post(create_chatter))
}

#[derive(Debug, Serialize)]
struct CreateChatterResponse {
    id: String,
    object_key: String,
    created_at: DateTime<Utc>,
    record: Envelope<ChatterData>,
}

/// Create an enriched chatter record.
///
/// Validation and place resolution reject the request outright; provider
/// failures degrade to absent environment keys and the create still
/// succeeds with whatever enrichment came back.
async fn create_chatter(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Json(request): Json<CreateChatterRequest>,
) -> CoffeyResult<impl IntoResponse> {
    let explicit_created_at = request.created_at;

    let data = ctx.enricher.enrich_chatter(request).await?;
    let envelope = assemble(RecordKind::Chatter, data, explicit_created_at)?;
    let object_key = ctx.store.store_chatter(&envelope).await;

    info!("Created chatter {}", envelope.id);

    Ok((
        StatusCode::CREATED,
        Json(CreateChatterResponse {
            id: envelope.id.clone(),
            object_key,
            created_at: envelope.created_at,
            record: envelope,
        }),
    ))
}
