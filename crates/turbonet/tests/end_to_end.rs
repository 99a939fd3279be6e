//! Hello-world scenarios through the facade

use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use turbonet::prelude::*;

async fn serve(transport: &Arc<MemoryTransport>, port: u16, dispatcher: Dispatcher) -> RunningServer {
    let config = ServerConfig::builder()
        .name("e2e")
        .port(port)
        .poll_interval(Duration::from_millis(10))
        .build();
    let endpoint = Endpoint::parse(&config.endpoint()).unwrap();
    let server = Server::new(transport.clone(), config, dispatcher).start();
    for _ in 0..100 {
        if transport.is_bound(&endpoint) {
            return server;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("server never bound {}", endpoint);
}

#[tokio::test]
async fn test_http_hello_world() {
    let transport = Arc::new(MemoryTransport::new());
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .on_http("GET", "/hello-world", |ctx, _| {
            ctx.send_status(200, "hello world");
        })
        .unwrap()
        .on_http("GET", "/items/new", |ctx, _| {
            ctx.send_status(200, "literal");
        })
        .unwrap()
        .on_http("GET", "/items/{id}", |ctx, params| {
            let id: i64 = params.parse("id").unwrap();
            ctx.send_json(200, &json!({ "id": id })).unwrap();
        })
        .unwrap();
    let server = serve(&transport, 9401, dispatcher).await;

    let client = HttpClient::new(
        transport.clone(),
        "http://127.0.0.1:9401",
        SessionConfig::default(),
    )
    .unwrap();

    let reply = client.request(HttpRequest::get("/hello-world")).await.unwrap();
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body_text(), Some("hello world"));

    let reply = client.request(HttpRequest::get("/items/new")).await.unwrap();
    assert_eq!(reply.body_text(), Some("literal"));

    let reply = client.request(HttpRequest::get("/items/42")).await.unwrap();
    assert_eq!(reply.json::<Value>().unwrap(), json!({ "id": 42 }));
    assert_eq!(reply.header("content-type"), Some("application/json"));

    client.disconnect().await.unwrap();
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_ws_hello_world() {
    let transport = Arc::new(MemoryTransport::new());
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .on_ws("POST", "hello-world", |ctx, envelope, _| {
            ctx.send(&json!({ "id": envelope.id, "text": "hello world" }))
                .unwrap();
        })
        .unwrap();
    let server = serve(&transport, 9402, dispatcher).await;

    let replies = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&replies);
    let client = WsClient::builder(transport.clone())
        .on("hello-world", move |_, envelope, _| {
            seen.lock().unwrap().push(envelope.get("text").cloned());
        })
        .unwrap()
        .build();
    client.connect("ws://127.0.0.1:9402").await.unwrap();

    // Missing id: dropped by the server without an error
    client.send(&json!({ "method": "POST" })).await.unwrap();
    client
        .send(&json!({ "id": "hello-world", "method": "POST" }))
        .await
        .unwrap();

    for _ in 0..200 {
        if !replies.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(*replies.lock().unwrap(), vec![Some(json!("hello world"))]);
    assert!(client.is_connected());

    client.disconnect().await.unwrap();
    server.stop().await.unwrap();
}
