//! Демонстрационный HTTP сервер со счетчиками запросов.
//!
//! Счетчики принадлежат экземпляру [`ServerStats`] и передаются в обработчики
//! через состояние роутера, глобальных переменных нет.

use super::errors::ServerError;
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use chrono::{DateTime, Local};
use crossbeam::utils::CachePadded;
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;


#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub root_delay: Duration,
    pub slow_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root_delay: Duration::from_millis(50),
            slow_delay: Duration::from_secs(2),
        }
    }
}


#[derive(Debug)]
pub struct ServerStats {
    total_requests: CachePadded<AtomicU64>,
    active_requests: CachePadded<AtomicI64>,
    started_at: Instant,
    started_wall: DateTime<Local>,
}

impl Default for ServerStats {
    fn default() -> Self {
        Self {
            total_requests: CachePadded::new(AtomicU64::new(0)),
            active_requests: CachePadded::new(AtomicI64::new(0)),
            started_at: Instant::now(),
            started_wall: Local::now(),
        }
    }
}

impl ServerStats {
    #[inline]
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn active_requests(&self) -> i64 {
        self.active_requests.load(Ordering::Relaxed)
    }

    /// Аптайм с точностью до секунды.
    pub fn uptime(&self) -> Duration {
        Duration::from_secs(self.started_at.elapsed().as_secs())
    }

    pub fn start_time(&self) -> String {
        self.started_wall.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn begin_request(self: &Arc<Self>) -> (RequestId, ActiveRequest) {
        let guard = ActiveRequest::enter(Arc::clone(self));
        let id = self.total_requests.fetch_add(1, Ordering::Relaxed) + 1;
        (RequestId(id), guard)
    }
}

/// Порядковый номер запроса, кладется в extensions middleware-слоем.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub u64);

struct ActiveRequest(Arc<ServerStats>);

impl ActiveRequest {
    fn enter(stats: Arc<ServerStats>) -> Self {
        stats.active_requests.fetch_add(1, Ordering::Relaxed);
        Self(stats)
    }
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        self.0.active_requests.fetch_sub(1, Ordering::Relaxed);
    }
}


#[derive(Clone)]
pub struct AppState {
    stats: Arc<ServerStats>,
    config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            stats: Arc::new(ServerStats::default()),
            config: Arc::new(config),
        }
    }

    #[inline]
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}


/// Роутер: `/`, `/health`, `/stats`, `/slow`; остальное 404 без учета в счетчиках.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/stats", get(handle_stats))
        .route("/slow", get(handle_slow))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .fallback(handle_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn track_requests(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let (id, _active) = state.stats.begin_request();
    request.extensions_mut().insert(id);
    next.run(request).await
}

async fn handle_root(State(state): State<AppState>, Extension(RequestId(id)): Extension<RequestId>) -> String {
    tokio::time::sleep(state.config.root_delay).await;

    let stats = state.stats();
    format!(
        "HTTP Server Demo\n\nRequest ID: {}\nActive requests: {}\nUptime: {}s\n",
        id,
        stats.active_requests(),
        stats.uptime().as_secs(),
    )
}

async fn handle_health() -> &'static str {
    "Server is healthy\n"
}

async fn handle_stats(State(state): State<AppState>) -> String {
    let stats = state.stats();
    format!(
        "Server Statistics:\nTotal requests: {}\nActive requests: {}\nUptime: {}s\nStart time: {}\n",
        stats.total_requests(),
        stats.active_requests(),
        stats.uptime().as_secs(),
        stats.start_time(),
    )
}

async fn handle_slow(State(state): State<AppState>, Extension(RequestId(id)): Extension<RequestId>) -> String {
    let delay = state.config.slow_delay;
    tracing::debug!(request_id = id, ?delay, "Slow request started");
    tokio::time::sleep(delay).await;
    format!("Slow request completed after {:?}\n", delay)
}

async fn handle_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "404 page not found\n")
}


/// Сервер, привязанный к собственному [`AppState`].
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }

    #[inline]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Привязывается к `addr` (порт 0 допустим) и обслуживает запросы в фоне.
    pub async fn start(&self, addr: &str) -> Result<ServerHandle, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let app = router(self.state.clone());

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });

        tracing::info!(addr = %local_addr, "HTTP server listening");
        Ok(ServerHandle {
            local_addr,
            shutdown,
            task,
        })
    }
}


pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Перестает принимать соединения и ждет завершения текущих запросов до `timeout`.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), ServerError> {
        tracing::info!("Stopping HTTP server");
        self.shutdown.cancel();

        let mut task = self.task;
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(joined) => {
                joined??;
                tracing::info!("HTTP server stopped");
                Ok(())
            }
            Err(_) => {
                task.abort();
                Err(ServerError::ShutdownTimeout(timeout))
            }
        }
    }
}
