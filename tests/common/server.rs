//! Test server lifecycle management.
//!
//! Each test gets an isolated server on a random port with its own catalog
//! and user databases. Dropping the server shuts it down gracefully.

use super::constants::*;
use super::fixtures::create_test_databases;
use reelrater_server::catalog_store::SqliteCatalogStore;
use reelrater_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use reelrater_server::user::SqliteUserStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Catalog/rating store for direct database access in tests
    pub catalog_store: Arc<SqliteCatalogStore>,

    /// User store for direct database access in tests
    pub user_store: Arc<SqliteUserStore>,

    // Keep resources alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server whose catalog is seeded with the fixture movies.
    pub async fn spawn() -> Self {
        Self::spawn_inner(true).await
    }

    /// Spawns a server with an empty catalog.
    pub async fn spawn_empty() -> Self {
        Self::spawn_inner(false).await
    }

    async fn spawn_inner(seed_movies: bool) -> Self {
        let (temp_dir, catalog_db_path, user_db_path) =
            create_test_databases(seed_movies).expect("Failed to create test databases");

        let catalog_store = Arc::new(
            SqliteCatalogStore::new(&catalog_db_path).expect("Failed to open catalog store"),
        );
        let user_store =
            Arc::new(SqliteUserStore::new(&user_db_path).expect("Failed to open user store"));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
        };

        let app = make_app(
            config,
            catalog_store.clone(),
            catalog_store.clone(),
            user_store.clone(),
        )
        .expect("Failed to build app");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            catalog_store,
            user_store,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint.
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    return;
                }
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
