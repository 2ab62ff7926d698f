use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    protocol::{ClientEvent, ServerEvent},
    state::SharedHub,
};

pub fn router() -> Router {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(ws: WebSocketUpgrade, Extension(hub): Extension<SharedHub>) -> impl IntoResponse {
    ws.on_upgrade(move |s| user_ws(s, hub))
}

/* ---------------- per connection ---------------- */
async fn user_ws(sock: WebSocket, hub: SharedHub) {
    let conn = Uuid::new_v4();
    let (mut sink, mut stream) = sock.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    hub.lock().await.attach(conn, tx);
    info!(%conn, "socket opened");

    /* 寫出：hub → socket */
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "could not encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    /* 讀入：socket → hub */
    while let Some(frame) = stream.next().await {
        let raw = match frame {
            Ok(Message::Text(raw)) => raw,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        match serde_json::from_str::<ClientEvent>(&raw) {
            Ok(event) => hub.lock().await.handle(conn, event),
            Err(e) => warn!(%conn, error = %e, "unparseable frame dropped"),
        }
    }

    hub.lock().await.detach(conn);
    writer.abort();
    info!(%conn, "socket closed");
}
