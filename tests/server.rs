//! Server loop over real TCP: static service, reload and shutdown.

use std::sync::Arc;
use std::time::Duration;

use acorn::config::{AcornConfig, ListenerConfig, MountConfig, ServerConfig};
use acorn::http::{DispatchSettings, Dispatcher, HttpServer};
use acorn::lifecycle::Shutdown;
use acorn::net::Listener;
use acorn::routing::RouteTable;
use acorn::service;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

mod common;

struct Harness {
    addr: std::net::SocketAddr,
    dispatcher: Arc<Dispatcher>,
    shutdown: Shutdown,
    updates: mpsc::UnboundedSender<RouteTable>,
    server: JoinHandle<()>,
}

async fn start(config: &AcornConfig) -> Harness {
    let listener = Listener::bind(&ListenerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        ..ListenerConfig::default()
    })
    .await
    .unwrap();
    let addr = listener.local_addr().unwrap();

    let dispatcher = Arc::new(Dispatcher::new(DispatchSettings {
        server_name: Arc::from(config.server.name.as_str()),
        read_buffer_size: config.listener.read_buffer_size,
    }));
    dispatcher.install(service::routes(config).unwrap());
    dispatcher.install_middleware(service::middleware(config));

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    let (updates, table_rx) = mpsc::unbounded_channel();

    let server = HttpServer::new(Arc::clone(&dispatcher), config.server.clone());
    let server = tokio::spawn(async move {
        server.run(listener, table_rx, shutdown_rx).await.unwrap();
    });

    Harness {
        addr,
        dispatcher,
        shutdown,
        updates,
        server,
    }
}

fn site() -> (tempfile::TempDir, AcornConfig) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>Acorn</h1>").unwrap();
    std::fs::write(dir.path().join("about.html"), "about us").unwrap();
    std::fs::create_dir(dir.path().join("assets")).unwrap();
    std::fs::write(dir.path().join("assets").join("site.css"), "body{}").unwrap();

    let mut config = AcornConfig::default();
    config.static_files.root = dir.path().to_path_buf();
    config.server = ServerConfig {
        name: "Acorn/test".to_string(),
        status_interval_secs: 0,
        shutdown_grace_secs: 1,
        middleware_delay_ms: 0,
    };
    config.mounts = vec![
        MountConfig {
            pattern: "/about".to_string(),
            file: Some("about.html".to_string()),
        },
        MountConfig {
            pattern: "/assets/.*".to_string(),
            file: None,
        },
    ];
    (dir, config)
}

#[tokio::test]
async fn serves_index_and_mounts() {
    let (_dir, config) = site();
    let harness = start(&config).await;

    let index = common::tcp_exchange(harness.addr, "GET / HTTP/1.1\r\nHost: t\r\n\r\n").await;
    let (head, body) = common::split_response(&index);
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(head.contains("Server: Acorn/test"));
    assert!(head.contains("Content-Type: text/html"));
    assert!(head.contains("Content-Length: 14"));
    assert_eq!(body, "<h1>Acorn</h1>");

    let about = common::tcp_exchange(harness.addr, "GET /about HTTP/1.1\r\n\r\n").await;
    assert_eq!(common::split_response(&about).1, "about us");

    let css = common::tcp_exchange(harness.addr, "GET /assets/site.css HTTP/1.1\r\n\r\n").await;
    let (head, body) = common::split_response(&css);
    assert!(head.contains("Content-Type: text/css"));
    assert_eq!(body, "body{}");

    harness.shutdown.trigger();
    harness.server.await.unwrap();
}

#[tokio::test]
async fn missing_files_and_traversal_get_404() {
    let (_dir, config) = site();
    let harness = start(&config).await;

    let missing = common::tcp_exchange(harness.addr, "GET /assets/none.js HTTP/1.1\r\n\r\n").await;
    assert!(missing.starts_with("HTTP/1.1 404 Not Found"));

    let escape = common::tcp_exchange(
        harness.addr,
        "GET /assets/%2e%2e/%2e%2e/etc/passwd HTTP/1.1\r\n\r\n",
    )
    .await;
    assert!(escape.starts_with("HTTP/1.1 404 Not Found"));

    let unrouted = common::tcp_exchange(harness.addr, "GET /nowhere HTTP/1.1\r\n\r\n").await;
    assert!(unrouted.starts_with("HTTP/1.1 404 Not Found"));

    harness.shutdown.trigger();
    harness.server.await.unwrap();
}

#[tokio::test]
async fn installs_route_tables_from_updates() {
    let (_dir, config) = site();
    let harness = start(&config).await;

    let mut table = RouteTable::new();
    table
        .on_get("/reloaded", |_req, mut res| {
            res.set_body("new table");
            res.send(true);
        })
        .unwrap();
    harness.updates.send(table).unwrap();

    let dispatcher = Arc::clone(&harness.dispatcher);
    common::wait_until(|| dispatcher.router().snapshot().len() == 1).await;

    let response = common::tcp_exchange(harness.addr, "GET /reloaded HTTP/1.1\r\n\r\n").await;
    assert_eq!(common::split_response(&response).1, "new table");

    let old = common::tcp_exchange(harness.addr, "GET / HTTP/1.1\r\n\r\n").await;
    assert!(old.starts_with("HTTP/1.1 404 Not Found"));

    harness.shutdown.trigger();
    harness.server.await.unwrap();
}

#[tokio::test]
async fn shutdown_closes_idle_connections() {
    let (_dir, config) = site();
    let harness = start(&config).await;

    let mut idle = tokio::net::TcpStream::connect(harness.addr).await.unwrap();
    let dispatcher = Arc::clone(&harness.dispatcher);
    common::wait_until(|| dispatcher.active_connections() == 1).await;

    harness.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(3), harness.server)
        .await
        .expect("server did not stop")
        .unwrap();

    let mut rest = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut idle, &mut rest).await.unwrap();
    assert!(rest.is_empty());
    assert_eq!(harness.dispatcher.active_connections(), 0);
}

#[tokio::test]
async fn delayed_middleware_still_answers() {
    let (_dir, mut config) = site();
    config.server.middleware_delay_ms = 20;
    let harness = start(&config).await;

    let started = std::time::Instant::now();
    let index = common::tcp_exchange(harness.addr, "GET / HTTP/1.1\r\n\r\n").await;
    assert!(index.starts_with("HTTP/1.1 200 OK"));
    assert!(started.elapsed() >= Duration::from_millis(20));

    harness.shutdown.trigger();
    harness.server.await.unwrap();
}
