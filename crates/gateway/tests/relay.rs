use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    futures::{SinkExt, StreamExt},
    lobby_gateway::{room::Room, server::serve},
    tokio::{net::TcpListener, sync::oneshot, task::JoinHandle},
    tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message},
};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    room: Arc<Room>,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<anyhow::Result<()>>,
}

async fn start_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let room = Room::new();
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(serve(
        listener,
        Arc::clone(&room),
        Duration::from_secs(5),
        async move {
            let _ = stopped.await;
        },
    ));
    TestServer {
        addr,
        room,
        stop,
        handle,
    }
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

/// Next text frame with the `|<timestamp>| ` prefix removed.
async fn next_body(ws: &mut Client) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            let (_, body) = text
                .as_str()
                .strip_prefix('|')
                .and_then(|t| t.split_once("| "))
                .unwrap();
            return body.to_string();
        }
    }
}

async fn wait_for_members(room: &Room, n: usize) {
    for _ in 0..100 {
        if room.member_count().await == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("room never reached {n} members");
}

#[tokio::test]
async fn ping_and_health() {
    let srv = start_server().await;
    let base = format!("http://{}", srv.addr);

    let pong = reqwest::get(format!("{base}/ping"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(pong, "pong");

    let _a = connect(srv.addr).await;
    wait_for_members(&srv.room, 1).await;
    let health: serde_json::Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["connections"], 1);
}

#[tokio::test]
async fn relays_join_chat_and_bye() {
    let srv = start_server().await;

    let mut a = connect(srv.addr).await;
    assert_eq!(next_body(&mut a).await, "<大廳> id 1 join");

    let mut b = connect(srv.addr).await;
    assert_eq!(next_body(&mut a).await, "<大廳> id 2 join");
    assert_eq!(next_body(&mut b).await, "<大廳> id 2 join");

    a.send(Message::Text("hi".into())).await.unwrap();
    assert_eq!(next_body(&mut a).await, "<1> hi");
    assert_eq!(next_body(&mut b).await, "<1> hi");

    b.send(Message::Binary(b"raw".to_vec().into())).await.unwrap();
    assert_eq!(next_body(&mut a).await, "<2> raw");

    b.close(None).await.unwrap();
    assert_eq!(next_body(&mut a).await, "<大廳> id 2 bye!");
    wait_for_members(&srv.room, 1).await;
}

#[tokio::test]
async fn identities_are_not_reused() {
    let srv = start_server().await;

    let mut a = connect(srv.addr).await;
    assert_eq!(next_body(&mut a).await, "<大廳> id 1 join");
    a.close(None).await.unwrap();
    wait_for_members(&srv.room, 0).await;

    let mut b = connect(srv.addr).await;
    assert_eq!(next_body(&mut b).await, "<大廳> id 2 join");
}

#[tokio::test]
async fn shutdown_closes_clients_and_refuses_new_ones() {
    let srv = start_server().await;
    let mut a = connect(srv.addr).await;
    assert_eq!(next_body(&mut a).await, "<大廳> id 1 join");

    srv.stop.send(()).unwrap();

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = a.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => return,
                Ok(_) => {},
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "client was not closed");
    assert!(srv.room.is_closed());

    srv.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn closed_room_rejects_upgrade() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let room = Room::new();
    room.shutdown().await;
    let app = lobby_gateway::server::build_app(room);
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    });

    match connect_async(format!("ws://{addr}/ws")).await {
        Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
            assert_eq!(resp.status(), 503);
        },
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("upgrade should be refused"),
    }
}
