/// Image upload, listing, deletion, and public serving
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::AdminAuth,
    context::AppContext,
    error::{CoffeyError, CoffeyResult},
    store::index::ImageRow,
};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/admin/images", post(upload_image).get(list_images))
        .route("/api/admin/images/:sha256", delete(delete_image))
}

pub fn public_routes() -> Router<AppContext> {
    Router::new().route("/images/:key", get(serve_image))
}

/// Multipart image upload; runs the dedup pipeline
async fn upload_image(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    mut multipart: Multipart,
) -> CoffeyResult<impl IntoResponse> {
    let mut upload: Option<(Vec<u8>, String, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CoffeyError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(String::from)
            .unwrap_or_else(|| "upload".to_string());
        let content_type = field
            .content_type()
            .map(String::from)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| CoffeyError::Validation(format!("Failed to read upload: {}", e)))?
            .to_vec();

        upload = Some((data, filename, content_type));
        break;
    }

    let (data, filename, content_type) = upload
        .ok_or_else(|| CoffeyError::Validation("Missing 'file' multipart field".to_string()))?;

    let response = ctx
        .image_pipeline
        .upload(data, &filename, &content_type)
        .await?;

    let status = if response.is_duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, Json(response)))
}

#[derive(Debug, Deserialize)]
struct ListImagesQuery {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
struct ListImagesResponse {
    images: Vec<ImageRow>,
}

async fn list_images(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Query(query): Query<ListImagesQuery>,
) -> CoffeyResult<impl IntoResponse> {
    let images = ctx.store.index().list_images(query.limit.clamp(1, 500)).await?;
    Ok(Json(ListImagesResponse { images }))
}

async fn delete_image(
    State(ctx): State<AppContext>,
    _auth: AdminAuth,
    Path(sha256): Path<String>,
) -> CoffeyResult<impl IntoResponse> {
    if ctx.store.index().soft_delete_image(&sha256).await? {
        Ok(Json(json!({ "deleted": sha256 })))
    } else {
        Err(CoffeyError::NotFound(format!("Image {}", sha256)))
    }
}

/// Public redirect from `images/sha_{hash}` to the hosted delivery URL
async fn serve_image(
    State(ctx): State<AppContext>,
    Path(key): Path<String>,
) -> CoffeyResult<Response> {
    let sha256 = key.strip_prefix("sha_").unwrap_or(&key);

    let row = ctx
        .store
        .index()
        .find_image(sha256)
        .await?
        .ok_or_else(|| CoffeyError::NotFound(format!("Image {}", sha256)))?;

    let location = format!(
        "{}/{}/public",
        ctx.config.image_host.delivery_base_url.trim_end_matches('/'),
        row.uuid
    );

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, location)],
    )
        .into_response())
}
