use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use mesh_chat::{media::ImageStore, protocol::ClientEvent, state::{Hub, SharedHub}};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "XmeshBoundary";

fn app(dir: &std::path::Path, hub: SharedHub) -> Router {
    mesh_chat::app(hub, Arc::new(ImageStore::new(dir, None)), 64 * 1024)
}

fn multipart(field: &str, file_name: &str, mime: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::post("/upload")
        .header(header::HOST, "chat.test:4000")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

async fn read_json(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn banner() {
    let tmp = tempfile::tempdir().unwrap();
    let res = app(tmp.path(), Hub::shared())
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"Chat server is running.");
}

#[tokio::test]
async fn users_lists_everyone_ever_registered() {
    let tmp = tempfile::tempdir().unwrap();
    let hub = Hub::shared();
    {
        let mut hub = hub.lock().await;
        let (bob, alice) = (Uuid::new_v4(), Uuid::new_v4());
        hub.handle(bob, ClientEvent::RegisterUser("bob".into()));
        hub.handle(alice, ClientEvent::RegisterUser("alice".into()));
        hub.detach(bob);
    }

    let res = app(tmp.path(), hub)
        .oneshot(Request::get("/users").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(read_json(res).await, serde_json::json!(["alice", "bob"]));
}

#[tokio::test]
async fn uploaded_image_is_served_back() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(tmp.path(), Hub::shared());
    let png = b"\x89PNG\r\n\x1a\nfake image bytes";

    let res = app
        .clone()
        .oneshot(upload_request(multipart("image", "cat.png", "image/png", png)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let url = read_json(res).await["url"].as_str().unwrap().to_owned();
    let path = url.strip_prefix("http://chat.test:4000").unwrap().to_owned();
    assert!(path.starts_with("/uploads/") && path.ends_with(".png"), "{path}");

    let res = app
        .oneshot(Request::get(path.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], &png[..]);
}

#[tokio::test]
async fn upload_without_image_field_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let res = app(tmp.path(), Hub::shared())
        .oneshot(upload_request(multipart("avatar", "cat.png", "image/png", b"data")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(res).await, serde_json::json!({ "error": "No file uploaded" }));
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn oversized_upload_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let big = vec![7u8; 128 * 1024];
    let res = app(tmp.path(), Hub::shared())
        .oneshot(upload_request(multipart("image", "big.png", "image/png", &big)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
