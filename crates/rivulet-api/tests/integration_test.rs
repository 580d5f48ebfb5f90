use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use futures::StreamExt;
use rivulet_api::{build_router, config::Config, emitter, state::AppState};
use rivulet_source::{ServerSentDataSource, SourceEvent, TransportConfig};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_config() -> Config {
    let mut config: Config =
        toml::from_str(include_str!("../config/default.toml")).expect("default config parses");
    config.emitter.sample_interval_ms = 5;
    config.emitter.flush_interval_ms = 20;
    config.buffer.capacity = Some(10);
    config
}

fn test_state() -> Arc<AppState> {
    Arc::new(AppState::new(test_config()).unwrap())
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = build_router(test_state());

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["emitter"], "starting");
    assert_eq!(body["buffered"], 0);
}

#[tokio::test]
async fn test_snapshot_reflects_emitted_points() {
    let state = test_state();
    emitter::publish(&state, 1, vec![[1.0, 2.0], [3.0, 4.0]]).unwrap();

    let response = build_router(Arc::clone(&state))
        .oneshot(Request::get("/snapshot").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["fields"], serde_json::json!(["x", "y"]));
    assert_eq!(body["records"], serde_json::json!([[1.0, 2.0], [3.0, 4.0]]));
    assert_eq!(body["version"], 1);
    assert_eq!(body["capacity"], 10);
    assert_eq!(body["mode"], "append");
}

#[tokio::test]
async fn test_data_is_event_stream() {
    let state = test_state();
    let app = build_router(Arc::clone(&state));

    let response = app
        .oneshot(Request::get("/data").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    // the handler has subscribed by now, so this event reaches it
    emitter::publish(&state, 1, vec![[0.5, -0.5]]).unwrap();

    let mut body = response.into_body().into_data_stream();
    let chunk = tokio::time::timeout(Duration::from_secs(2), body.next())
        .await
        .expect("event within timeout")
        .expect("stream open")
        .unwrap();
    let text = String::from_utf8(chunk.to_vec()).unwrap();

    assert!(text.contains("id: 1"), "got {:?}", text);
    assert!(text.contains("data: [[0.5,-0.5]]"), "got {:?}", text);
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = build_router(test_state());

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/data")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-requested-with")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "21600");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "x-requested-with"
    );
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap()
        .to_string();
    for method in ["GET", "OPTIONS", "POST"] {
        assert!(methods.contains(method), "missing {} in {}", method, methods);
    }
}

#[tokio::test]
async fn test_cors_origin_list() {
    let mut config = test_config();
    config.cors.origins = vec!["http://allowed.test".to_string()];
    let app = build_router(Arc::new(AppState::new(config).unwrap()));

    let response = app
        .oneshot(
            Request::get("/health")
                .header(header::ORIGIN, "http://allowed.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://allowed.test"
    );
}

#[tokio::test]
async fn test_rejects_foreign_schema() {
    let mut config = test_config();
    config.buffer.fields = Some(vec!["a".to_string(), "b".to_string()]);
    assert!(AppState::new(config).is_err());
}

#[tokio::test]
async fn test_client_follows_live_emitter() {
    let state = test_state();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = build_router(Arc::clone(&state));
    let server = tokio::spawn(async move { axum::serve(listener, app).await });
    let producer = emitter::spawn(Arc::clone(&state));

    let source = ServerSentDataSource::new(
        TransportConfig::new(format!("http://{}/data", addr)).with_reconnect(false),
    )
    .unwrap();
    let mut events = source.subscribe();

    let mut ids = Vec::new();
    while ids.len() < 2 {
        let item = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .expect("event within timeout")
            .expect("stream open");
        if let Ok(SourceEvent::Batch { id, batch }) = item {
            assert!(!batch.is_empty());
            assert_eq!(batch.schema().unwrap().fields(), &["x", "y"]);
            ids.push(id.unwrap().parse::<u64>().unwrap());
        }
    }

    producer.abort();
    server.abort();

    assert!(ids[1] > ids[0]);
}
