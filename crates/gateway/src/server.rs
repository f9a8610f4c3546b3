use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    anyhow::Context,
    axum::{
        Router,
        extract::{ConnectInfo, State, WebSocketUpgrade},
        http::StatusCode,
        response::{IntoResponse, Json, Response},
        routing::get,
    },
    tokio::net::TcpListener,
    tokio_util::sync::CancellationToken,
    tower_http::trace::TraceLayer,
    tracing::{info, warn},
};

use lobby_config::ServerConfig;

use crate::{room::Room, ws::handle_connection};

#[derive(Clone)]
struct AppState {
    room: Arc<Room>,
}

/// Build the relay router (shared between production startup and tests).
pub fn build_app(room: Arc<Room>) -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_upgrade_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { room })
}

/// Bind the configured address and serve until SIGINT/SIGTERM.
pub async fn start(config: &ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.bind, config.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to listen on {addr}"))?;

    let lines = [
        format!("lobby relay v{}", env!("CARGO_PKG_VERSION")),
        format!("listening on {addr}"),
        format!("shutdown grace {}s", config.shutdown_grace_secs),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    serve(listener, Room::new(), config.shutdown_grace(), shutdown_signal()).await
}

/// Serve `room` on `listener` until `signal` resolves, then close every
/// socket and give the listener `grace` to drain.
pub async fn serve(
    listener: TcpListener,
    room: Arc<Room>,
    grace: Duration,
    signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let token = CancellationToken::new();
    let app = build_app(Arc::clone(&room));

    let server_token = token.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { server_token.cancelled().await })
        .await
    });

    tokio::select! {
        joined = &mut server => {
            joined?.context("listener failed")?;
            return Ok(());
        },
        () = signal => {},
    }

    info!("shutting down server");
    room.shutdown().await;
    token.cancel();

    match tokio::time::timeout(grace, server).await {
        Ok(joined) => {
            joined?.context("listener failed during shutdown")?;
            info!("server exited");
            Ok(())
        },
        Err(_) => anyhow::bail!("server shutdown timed out after {}s", grace.as_secs_f32()),
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn ping_handler() -> &'static str {
    "pong"
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.room.member_count().await,
    }))
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    if state.room.is_closed() {
        return (StatusCode::SERVICE_UNAVAILABLE, "room is closed").into_response();
    }
    ws.on_upgrade(move |socket| handle_connection(socket, state.room, addr))
}
