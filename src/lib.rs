//! Mesh chat server: rooms, messages and peer-to-peer call signalling over
//! a single WebSocket, plus image uploads.

pub mod config;
pub mod coord;
pub mod error;
pub mod media;
pub mod peer;
pub mod protocol;
pub mod routes;
pub mod state;
pub mod utils {
    pub mod clean;
}

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, Extension, Router};
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer,
};

use crate::{media::ImageStore, state::SharedHub};

/// The full HTTP surface, ready to serve.
pub fn app(hub: SharedHub, images: Arc<ImageStore>, body_limit: usize) -> Router {
    Router::new()
        .nest_service("/uploads", ServeDir::new(images.dir()))
        .merge(routes::router())
        .layer(Extension(hub))
        .layer(Extension(images))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
