use axum::{routing::get, Extension, Json, Router};

use crate::state::SharedHub;

pub mod upload;
pub mod ws;

pub const BANNER: &str = "Chat server is running.";

pub fn router() -> Router {
    Router::new()
        .route("/", get(|| async { BANNER }))
        .route("/users", get(list_users))
        .merge(upload::router())
        .merge(ws::router())
}

/// Every username ever registered, online or not.
async fn list_users(Extension(hub): Extension<SharedHub>) -> Json<Vec<String>> {
    Json(hub.lock().await.users())
}
