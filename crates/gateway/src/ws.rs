use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use {
    axum::extract::ws::{CloseFrame, Message, WebSocket, close_code},
    futures::{SinkExt, StreamExt},
    tokio::sync::mpsc,
    tracing::{debug, warn},
};

use crate::{
    connection::{Connection, DeliveryError},
    room::Room,
};

enum Outbound {
    Frame(String),
    Close,
}

/// A WebSocket peer as seen by the room.
///
/// Frames are queued on an unbounded channel drained by a per-socket write
/// task, so `send` returns immediately regardless of how slow the peer is.
pub struct WsConnection {
    conn_id: String,
    remote_addr: SocketAddr,
    sender: mpsc::UnboundedSender<Outbound>,
    closed: AtomicBool,
}

impl WsConnection {
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}

impl Connection for WsConnection {
    fn conn_id(&self) -> &str {
        &self.conn_id
    }

    fn send(&self, frame: &str) -> Result<(), DeliveryError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DeliveryError::Closed {
                conn_id: self.conn_id.clone(),
            });
        }
        self.sender
            .send(Outbound::Frame(frame.to_string()))
            .map_err(|_| DeliveryError::Closed {
                conn_id: self.conn_id.clone(),
            })
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.sender.send(Outbound::Close);
        }
    }
}

/// Drive one upgraded socket: join the room, relay every data frame, and
/// leave when the peer closes or the read side fails.
pub async fn handle_connection(socket: WebSocket, room: Arc<Room>, remote_addr: SocketAddr) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (sender, mut outbound) = mpsc::unbounded_channel::<Outbound>();

    let write_conn_id = conn_id.clone();
    tokio::spawn(async move {
        while let Some(out) = outbound.recv().await {
            let msg = match out {
                Outbound::Frame(text) => Message::Text(text.into()),
                Outbound::Close => {
                    let _ = ws_tx
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::AWAY,
                            reason: "server shutting down".into(),
                        })))
                        .await;
                    break;
                },
            };
            if let Err(e) = ws_tx.send(msg).await {
                debug!(conn_id = %write_conn_id, error = %e, "ws: write failed");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let conn = Arc::new(WsConnection {
        conn_id: conn_id.clone(),
        remote_addr,
        sender,
        closed: AtomicBool::new(false),
    });
    let identity = room.on_connect(Arc::clone(&conn) as Arc<dyn Connection>).await;
    debug!(conn_id = %conn_id, remote = %conn.remote_addr(), identity, "ws: connected");

    let mut reason = None;
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                room.on_message(&conn_id, text.as_bytes()).await;
            },
            Ok(Message::Binary(bytes)) => {
                room.on_message(&conn_id, &bytes).await;
            },
            Ok(Message::Close(close)) => {
                reason = close.map(|c| format!("{} {}", c.code, c.reason.as_str()));
                break;
            },
            Ok(Message::Ping(_) | Message::Pong(_)) => {},
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "ws: read error");
                reason = Some(e.to_string());
                break;
            },
        }
    }

    // The write task ends once the last handle to `conn` is dropped.
    room.on_disconnect(&conn_id, reason.as_deref()).await;
}
