//! A minimal static file server used to stand up a local test site for
//! manual runs and integration tests. Carries none of the crawl engine's
//! logic — purely the spec's "companion static test-site fixture".

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::Router;
use tower_http::services::ServeDir;

/// Serve `root` over HTTP on `addr` until the process is killed.
pub async fn serve(root: PathBuf, addr: SocketAddr) -> std::io::Result<()> {
    let app = Router::new().fallback_service(ServeDir::new(root));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "serving static site");
    axum::serve(listener, app).await
}

/// Build the router alone, for embedding in an in-process test server.
pub fn router(root: PathBuf) -> Router {
    Router::new().fallback_service(ServeDir::new(root))
}
