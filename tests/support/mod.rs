// One-time relay bootstrap shared by the integration tests in a binary.
#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use move_sync::interface_adapters::protocol::{ClientMessage, ServerMessage};
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

static SERVER_ADDR: OnceLock<String> = OnceLock::new();
static SERVER_READY: OnceLock<()> = OnceLock::new();

// Ensure the relay is running and return its `host:port`.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_addr = Arc::new(OnceLock::<String>::new());
        let published_addr_thread = Arc::clone(&published_addr);
        // A dedicated OS thread keeps the relay alive across `#[tokio::test]` runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_addr_thread.set(addr.to_string());
                move_sync::run(listener).await.expect("server failed");
            });
        });
        wait_for_readiness(published_addr);
    });

    SERVER_ADDR
        .get()
        .expect("server addr should be initialized")
        .as_str()
}

fn wait_for_readiness(published_addr: Arc<OnceLock<String>>) {
    let addr = loop {
        if let Some(addr) = published_addr.get() {
            break addr.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };
    let _ = SERVER_ADDR.set(addr.clone());

    for _ in 0..100 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("server did not become ready in time");
}

pub fn base_url() -> String {
    format!("http://{}", ensure_server())
}

pub async fn create_object(object_id: &str, width: Option<usize>) -> reqwest::StatusCode {
    let payload = serde_json::json!({ "object_id": object_id, "width": width });
    reqwest::Client::new()
        .post(format!("{}/objects", base_url()))
        .json(&payload)
        .send()
        .await
        .expect("request should succeed")
        .status()
}

pub async fn connect(object_id: &str) -> Socket {
    let url = format!("ws://{}/ws?object_id={object_id}", ensure_server());
    let (socket, _) = connect_async(url).await.expect("websocket upgrade");
    socket
}

pub async fn connect_as(object_id: &str, node_id: u64) -> Socket {
    let url = format!(
        "ws://{}/ws?object_id={object_id}&node_id={node_id}",
        ensure_server()
    );
    let (socket, _) = connect_async(url).await.expect("websocket upgrade");
    socket
}

// Waits for the server to end the connection, skipping any data still in flight.
pub async fn expect_closed(socket: &mut Socket) {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("server closes within timeout");
        match frame {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(_)) => continue,
        }
    }
}

pub async fn send(socket: &mut Socket, msg: &ClientMessage) {
    let text = serde_json::to_string(msg).expect("client message serializes");
    socket
        .send(Message::text(text))
        .await
        .expect("websocket send");
}

// Next server message, skipping control frames.
pub async fn recv(socket: &mut Socket) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("server message within timeout")
            .expect("socket still open")
            .expect("websocket frame");
        match frame {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("server message parses");
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

// Reads the Identity, snapshot and authority messages every connection starts with.
pub async fn handshake(socket: &mut Socket) -> (u64, ServerMessage, ServerMessage) {
    let ServerMessage::Identity { node_id, .. } = recv(socket).await else {
        panic!("expected identity first");
    };
    let snapshot = recv(socket).await;
    let authority = recv(socket).await;
    (node_id, snapshot, authority)
}
