//! WebSocket transport for the broadcast hub

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;

use crate::web::server::AppState;

/// Inbound frames are short text commands
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

pub async fn ws_upgrade(
    State(app): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, app, peer))
}

async fn handle_socket(socket: WebSocket, app: AppState, peer: SocketAddr) {
    let (id, mut outbound) = app.hub.connect(peer.to_string());
    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let hub = app.hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => hub.handle_message(id, &text),
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("WebSocket {} read error: {}", peer, e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
        _ = app.shutdown.cancelled() => {
            recv_task.abort();
            send_task.abort();
        }
    }

    app.hub.disconnect(id);
    tracing::info!("WebSocket client {} disconnected", peer);
}

#[cfg(test)]
mod tests {
    use crate::web::server::tests::test_state;
    use crate::web::server::{serve, ws_router};
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    /// Read text frames until `expected` shows up
    async fn wait_for(client: &mut Client, expected: &str) {
        let deadline = Duration::from_secs(3);
        tokio::time::timeout(deadline, async {
            while let Some(frame) = client.next().await {
                if let WsMessage::Text(text) = frame.unwrap() {
                    if text == expected {
                        return;
                    }
                }
            }
            panic!("socket closed before {:?}", expected);
        })
        .await
        .unwrap_or_else(|_| panic!("no {:?} within {:?}", expected, deadline));
    }

    #[tokio::test]
    async fn test_owner_disconnect_promotes_next_socket() {
        let app = test_state();
        let hub = app.hub.clone();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        let shutdown = app.shutdown.clone();
        let server = tokio::spawn(serve(listener, ws_router(app), shutdown.clone()));

        let (mut owner, _) = connect_async(url.as_str()).await.unwrap();
        wait_for(&mut owner, "ROLE:OWNER").await;
        let (mut viewer, _) = connect_async(url.as_str()).await.unwrap();
        wait_for(&mut viewer, "ROLE:VIEWER").await;
        assert_eq!(hub.client_count(), 2);

        viewer.send(WsMessage::Text("WEB:CMD_START_REC".into())).await.unwrap();
        wait_for(&mut viewer, "MSG:NOT_OWNER (view-only)").await;

        owner.close(None).await.unwrap();
        wait_for(&mut viewer, "ROLE:OWNER").await;
        wait_for(&mut viewer, "MSG:You are now OWNER (control granted)").await;
        assert_eq!(hub.client_count(), 1);

        shutdown.cancel();
        drop(viewer);
        tokio::time::timeout(Duration::from_secs(3), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
