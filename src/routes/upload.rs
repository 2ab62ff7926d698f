use axum::{
    extract::multipart::Multipart,
    http::{header, HeaderMap},
    routing::post,
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::{
    error::{bad, AppErr, AppResult},
    media::ImageStore,
};

pub const NO_FILE: &str = "No file uploaded";

pub fn router() -> Router {
    Router::new().route("/upload", post(upload_image))
}

/// Multipart field `image`; answers `{"url": ...}`.
pub async fn upload_image(
    Extension(images): Extension<Arc<ImageStore>>,
    headers: HeaderMap,
    mut mp: Multipart,
) -> AppResult<Json<Value>> {
    while let Some(field) = mp.next_field().await.map_err(bad)? {
        if field.name() != Some("image") {
            continue;
        }
        let mime = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();
        let original = field.file_name().map(str::to_owned);
        let data = field.bytes().await.map_err(bad)?;
        if data.is_empty() {
            break;
        }

        let name = images.store(&data, &mime, original.as_deref()).await?;
        let base = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(|host| format!("http://{host}"));
        return Ok(Json(json!({ "url": images.url_for(&name, base.as_deref()) })));
    }
    Err(AppErr::Bad(NO_FILE.into()))
}
