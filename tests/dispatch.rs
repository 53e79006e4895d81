//! End-to-end dispatch over in-memory streams.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use acorn::http::middleware::{Cookies, Next, COOKIES};
use acorn::http::{Dispatcher, FileEntry, Method, Request, Response};
use acorn::routing::RouteTable;
use tokio::io::AsyncWriteExt;

mod common;

type Trace = Arc<Mutex<Vec<String>>>;

fn record(trace: &Trace, entry: &str) {
    trace.lock().unwrap().push(entry.to_string());
}

#[tokio::test]
async fn index_resolves_and_unknown_path_gets_404() {
    let dispatcher = Arc::new(Dispatcher::default());
    dispatcher
        .on(Method::Get, "/", |_req, mut res| {
            res.set_header("Content-Type", "text/plain").set_body("H");
            res.send(true);
        })
        .unwrap();

    let (mut client, _) = common::connect(&dispatcher);
    let ok = common::exchange(&mut client, "GET / HTTP/1.1\r\nHost: acorn\r\n\r\n").await;
    let (head, body) = common::split_response(&ok);
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(head.contains("Content-Length: 1"));
    assert_eq!(body, "H");

    let (mut client, _) = common::connect(&dispatcher);
    let missing = common::exchange(&mut client, "GET /missing HTTP/1.1\r\n\r\n").await;
    let (head, body) = common::split_response(&missing);
    assert!(head.starts_with("HTTP/1.1 404 Not Found"));
    assert!(head.contains("Connection: close"));
    assert!(head.contains("Server: IncludeOS/Acorn"));
    assert_eq!(body, "");
}

#[tokio::test]
async fn method_without_routes_gets_404() {
    let dispatcher = Arc::new(Dispatcher::default());
    dispatcher.on(Method::Get, "/", |_req, res| res.send(true)).unwrap();

    let (mut client, _) = common::connect(&dispatcher);
    let response = common::exchange(&mut client, "DELETE / HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found"));
}

#[tokio::test]
async fn third_connection_reuses_first_slot() {
    let dispatcher = Arc::new(Dispatcher::default());

    let (first, slot_a) = common::connect(&dispatcher);
    let (_second, slot_b) = common::connect(&dispatcher);
    assert_eq!(slot_a, 0);
    assert_eq!(slot_b, 1);

    drop(first);
    common::wait_until(|| dispatcher.active_connections() == 1).await;

    let (_third, slot_c) = common::connect(&dispatcher);
    assert_eq!(slot_c, 0);
    assert_eq!(dispatcher.pool_stats().slots, 2);
}

#[tokio::test]
async fn pool_length_tracks_peak_concurrency() {
    let dispatcher = Arc::new(Dispatcher::default());

    for _ in 0..10 {
        let (a, _) = common::connect(&dispatcher);
        let (b, _) = common::connect(&dispatcher);
        let (c, _) = common::connect(&dispatcher);
        drop((a, b, c));
        common::wait_until(|| dispatcher.active_connections() == 0).await;
    }

    let stats = dispatcher.pool_stats();
    assert_eq!(stats.slots, 3);
    assert_eq!(stats.peak, 3);
    assert_eq!(stats.free, 3);
}

#[tokio::test]
async fn handler_runs_only_after_deferred_step() {
    let trace = Trace::default();
    let dispatcher = Arc::new(Dispatcher::default());

    let step_trace = Arc::clone(&trace);
    dispatcher.use_middleware(move |next: Next| {
        record(&step_trace, "step1 entered");
        let trace = Arc::clone(&step_trace);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            record(&trace, "timer fired");
            next.resume();
        });
    });
    let step_trace = Arc::clone(&trace);
    dispatcher.use_middleware(move |next: Next| {
        record(&step_trace, "step2");
        next.resume();
    });

    let handler_trace = Arc::clone(&trace);
    dispatcher
        .on(Method::Get, "/", move |_req, res| {
            record(&handler_trace, "handler");
            res.send(true);
        })
        .unwrap();

    let (mut client, _) = common::connect(&dispatcher);
    let response = common::exchange(&mut client, "GET / HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["step1 entered", "timer fired", "step2", "handler"]
    );
}

#[tokio::test]
async fn middleware_can_answer_early() {
    let dispatcher = Arc::new(Dispatcher::default());
    dispatcher.use_middleware(|next: Next| {
        if next.request().header("authorization").is_some() {
            next.resume();
        } else {
            let (_req, mut res) = next.halt();
            res.set_status(http::StatusCode::UNAUTHORIZED);
            res.send(true);
        }
    });
    dispatcher.on(Method::Get, "/", |_req, res| res.send(true)).unwrap();

    let (mut client, _) = common::connect(&dispatcher);
    let denied = common::exchange(&mut client, "GET / HTTP/1.1\r\n\r\n").await;
    assert!(denied.starts_with("HTTP/1.1 401 Unauthorized"));

    let (mut client, _) = common::connect(&dispatcher);
    let allowed =
        common::exchange(&mut client, "GET / HTTP/1.1\r\nAuthorization: yes\r\n\r\n").await;
    assert!(allowed.starts_with("HTTP/1.1 200 OK"));
}

#[tokio::test]
async fn cookies_reach_the_handler() {
    let dispatcher = Arc::new(Dispatcher::default());
    dispatcher.install_middleware(acorn::service::middleware(&Default::default()));
    dispatcher
        .on(Method::Get, "/whoami", |req: Request, mut res: Response| {
            let user = req
                .attribute::<Cookies>(COOKIES)
                .and_then(|c| c.get("user"))
                .unwrap_or("anonymous")
                .to_string();
            res.set_body(user);
            res.send(true);
        })
        .unwrap();

    let (mut client, _) = common::connect(&dispatcher);
    let response = common::exchange(
        &mut client,
        "GET /whoami HTTP/1.1\r\nCookie: theme=dark; user=ada\r\n\r\n",
    )
    .await;
    assert_eq!(common::split_response(&response).1, "ada");
}

#[tokio::test]
async fn malformed_request_gets_400() {
    let dispatcher = Arc::new(Dispatcher::default());
    let (mut client, _) = common::connect(&dispatcher);
    let response = common::exchange(&mut client, "this is not http\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request"));
    common::wait_until(|| dispatcher.active_connections() == 0).await;
}

#[tokio::test]
async fn post_body_and_query_reach_the_handler() {
    let dispatcher = Arc::new(Dispatcher::default());
    dispatcher
        .on(Method::Post, "/echo", |req, mut res| {
            let name = req.query_param("name").unwrap_or("").to_string();
            res.write_body(name).write_body(":").write_body(req.body().clone());
            res.send(true);
        })
        .unwrap();

    let (mut client, _) = common::connect(&dispatcher);
    let response = common::exchange(
        &mut client,
        "POST /echo?name=J%C3%B8rgen+B HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello",
    )
    .await;
    assert_eq!(common::split_response(&response).1, "Jørgen B:hello");
}

#[tokio::test]
async fn empty_file_sends_zero_length_and_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.txt");
    std::fs::write(&path, b"").unwrap();
    let entry = FileEntry::open(&path).await.unwrap();

    let (outcome_tx, outcome_rx) = tokio::sync::oneshot::channel();
    let outcome_tx = Mutex::new(Some(outcome_tx));

    let dispatcher = Arc::new(Dispatcher::default());
    dispatcher
        .on(Method::Get, "/empty", move |_req, res| {
            let outbound = res.outbound().clone();
            let transfer = res.send_file(&entry);
            outbound.close();
            if let Some(tx) = outcome_tx.lock().unwrap().take() {
                tokio::spawn(async move {
                    let _ = tx.send(transfer.outcome().await.map_err(|e| e.to_string()));
                });
            }
        })
        .unwrap();

    let (mut client, _) = common::connect(&dispatcher);
    let response = common::exchange(&mut client, "GET /empty HTTP/1.1\r\n\r\n").await;
    let (head, body) = common::split_response(&response);
    assert!(head.contains("Content-Length: 0"));
    assert!(head.contains("Content-Type: text/plain"));
    assert_eq!(body, "");
    assert_eq!(outcome_rx.await.unwrap(), Ok(0));
}

#[tokio::test]
async fn reinstalling_a_snapshot_keeps_routing() {
    let dispatcher = Arc::new(Dispatcher::default());
    dispatcher
        .on(Method::Get, "/a", |_req, mut res| {
            res.set_body("a");
            res.send(true);
        })
        .unwrap();
    dispatcher
        .on(Method::Get, "/.*", |_req, mut res| {
            res.set_body("fallback");
            res.send(true);
        })
        .unwrap();

    let snapshot = RouteTable::clone(&dispatcher.router().snapshot());
    dispatcher.install(snapshot);

    let (mut client, _) = common::connect(&dispatcher);
    let a = common::exchange(&mut client, "GET /a HTTP/1.1\r\n\r\n").await;
    assert_eq!(common::split_response(&a).1, "a");

    let (mut client, _) = common::connect(&dispatcher);
    let other = common::exchange(&mut client, "GET /b HTTP/1.1\r\n\r\n").await;
    assert_eq!(common::split_response(&other).1, "fallback");
}

#[tokio::test]
async fn stalled_middleware_still_frees_the_slot() {
    let dispatcher = Arc::new(Dispatcher::default());
    dispatcher.use_middleware(|_next: Next| {});
    dispatcher.on(Method::Get, "/", |_req, res| res.send(true)).unwrap();

    let (mut client, _) = common::connect(&dispatcher);
    client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(dispatcher.active_connections(), 1);

    drop(client);
    common::wait_until(|| dispatcher.active_connections() == 0).await;
}

#[tokio::test]
async fn explicit_close_ends_connection() {
    let dispatcher = Arc::new(Dispatcher::default());
    let (mut client, slot) = common::connect(&dispatcher);

    assert!(dispatcher.close(slot));
    assert_eq!(common::read_all(&mut client).await, "");
    common::wait_until(|| dispatcher.active_connections() == 0).await;
}
