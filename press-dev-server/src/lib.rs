pub mod watcher;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Request, State},
    http::Uri,
    middleware,
    response::IntoResponse,
    routing::get,
};
use log::{debug, info, warn};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

pub use watcher::{Cooldown, SourceWatcher, WatchHandle};

pub const LIVERELOAD_PATH: &str = "/__livereload";

/// Configuration for the development server
#[derive(Debug, Clone)]
pub struct LiveServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served as the site root
    pub root: PathBuf,
    /// Open a browser once the server is listening
    pub open: bool,
}

impl Default for LiveServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            root: PathBuf::from("./published"),
            open: false,
        }
    }
}

impl LiveServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL pages should connect to for reload notifications.
    pub fn livereload_url(&self) -> String {
        format!("ws://{}{LIVERELOAD_PATH}", self.address())
    }
}

/// Tells every connected page to reload.
#[derive(Clone)]
pub struct Reloader {
    tx: broadcast::Sender<String>,
}

impl Reloader {
    /// Returns how many pages were notified.
    pub fn reload(&self) -> usize {
        match self.tx.send("reload".to_string()) {
            Ok(n) => {
                debug!("reload sent to {n} page(s)");
                n
            }
            // no page connected yet
            Err(_) => 0,
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

/// Static file server over the output tree with a live-reload socket
pub struct LiveServer {
    config: LiveServerConfig,
    reloader: Reloader,
}

impl LiveServer {
    pub fn new(config: LiveServerConfig) -> Self {
        let (tx, _) = broadcast::channel::<String>(100);
        Self {
            config,
            reloader: Reloader { tx },
        }
    }

    pub fn reloader(&self) -> Reloader {
        self.reloader.clone()
    }

    pub async fn run(self) -> Result<()> {
        if !self.config.root.exists() {
            return Err(anyhow::anyhow!(
                "Root directory does not exist: {}",
                self.config.root.display()
            ));
        }

        let app = router(&self.config.root, self.reloader);
        let addr: SocketAddr = self.config.address().parse()?;

        info!("Serving {} at http://{addr}", self.config.root.display());
        info!("Live reload at {}", self.config.livereload_url());

        if self.config.open {
            if let Err(e) = open::that(format!("http://{addr}")) {
                warn!("Failed to open browser: {e}");
            }
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

fn router(root: &Path, reloader: Reloader) -> Router {
    let root = Arc::new(root.to_path_buf());

    Router::new()
        .route(LIVERELOAD_PATH, get(websocket_handler))
        .fallback_service(ServeDir::new(root.as_path()))
        .with_state(reloader)
        .layer(middleware::map_request_with_state(root, rewrite_extensionless))
        .layer(CorsLayer::new().allow_origin(Any))
}

/// `/blog/post` → `/blog/post.html` when that file exists under `root`.
///
/// Paths ending in `/`, whose last segment has a `.`, or that contain a
/// `..` segment are left alone.
pub fn resolve_extensionless(root: &Path, path: &str) -> Option<String> {
    if path.ends_with('/') || path.split('/').any(|segment| segment == "..") {
        return None;
    }
    let last = path.rsplit('/').next()?;
    if last.is_empty() || last.contains('.') {
        return None;
    }

    let candidate = format!("{path}.html");
    root.join(candidate.trim_start_matches('/'))
        .is_file()
        .then_some(candidate)
}

async fn rewrite_extensionless(State(root): State<Arc<PathBuf>>, mut request: Request) -> Request {
    let Some(path) = resolve_extensionless(&root, request.uri().path()) else {
        return request;
    };
    let rewritten = match request.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };

    match rewritten.parse::<Uri>() {
        Ok(uri) => {
            debug!("{} -> {uri}", request.uri());
            *request.uri_mut() = uri;
        }
        Err(e) => warn!("could not rewrite {}: {e}", request.uri()),
    }
    request
}

async fn websocket_handler(ws: WebSocketUpgrade, State(reloader): State<Reloader>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_connection(socket, reloader.subscribe()))
}

async fn websocket_connection(mut socket: WebSocket, mut rx: broadcast::Receiver<String>) {
    if socket.send(Message::Text("connected".into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Ok(reload_msg) => {
                        if socket.send(Message::Text(reload_msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
            msg = socket.recv() => {
                if msg.is_none() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{StatusCode, header};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("blog")).unwrap();
        std::fs::write(dir.path().join("contact.html"), "contact").unwrap();
        std::fs::write(dir.path().join("blog/hello-world.html"), "hello").unwrap();
        std::fs::write(dir.path().join("blog/index.html"), "index").unwrap();
        dir
    }

    #[test]
    fn resolves_existing_html_files() {
        let dir = site();
        let root = dir.path();

        assert_eq!(resolve_extensionless(root, "/contact").as_deref(), Some("/contact.html"));
        assert_eq!(
            resolve_extensionless(root, "/blog/hello-world").as_deref(),
            Some("/blog/hello-world.html")
        );
    }

    #[test]
    fn leaves_other_paths_alone() {
        let dir = site();
        let root = dir.path();

        assert_eq!(resolve_extensionless(root, "/missing"), None);
        assert_eq!(resolve_extensionless(root, "/contact.html"), None);
        assert_eq!(resolve_extensionless(root, "/blog/"), None);
        assert_eq!(resolve_extensionless(root, "/"), None);
        assert_eq!(resolve_extensionless(root, "/blog/../contact"), None);
    }

    #[test]
    fn reload_without_pages_is_harmless() {
        let server = LiveServer::new(LiveServerConfig::default());
        assert_eq!(server.reloader().reload(), 0);

        let mut rx = server.reloader.subscribe();
        assert_eq!(server.reloader().reload(), 1);
        assert_eq!(rx.try_recv().unwrap(), "reload");
    }

    #[test]
    fn livereload_url_uses_bind_address() {
        let config = LiveServerConfig {
            port: 9000,
            ..Default::default()
        };
        assert_eq!(config.livereload_url(), "ws://127.0.0.1:9000/__livereload");
    }

    #[tokio::test]
    async fn serves_extensionless_pages_with_cors() {
        let dir = site();
        let server = LiveServer::new(LiveServerConfig::default());
        let app = router(dir.path(), server.reloader());

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/blog/hello-world?ref=feed")
                    .header(header::ORIGIN, "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn unknown_pages_are_not_found() {
        let dir = site();
        let server = LiveServer::new(LiveServerConfig::default());
        let app = router(dir.path(), server.reloader());

        let response = app
            .oneshot(axum::http::Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
