//! HTTP-level integration tests.
//!
//! Drives the real router against a `FsObjectStore` in a temp directory:
//! route shapes, status codes, JSON bodies, multipart upload, preview
//! variants and the locally-signed raw download path.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use bucket_gateway::{
    routes::routes::routes,
    services::gateway_service::GatewayService,
    store::{ObjectStore, fs::FsObjectStore, signer::UrlSigner},
};
use bytes::Bytes;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const PUBLIC_URL: &str = "http://localhost:8000";
const BOUNDARY: &str = "gateway-test-boundary";

/// Router wired to a fresh store; the TempDir keeps the root alive.
fn app() -> (Router, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let signer = UrlSigner::new(*b"api-test-secret", PUBLIC_URL);
    let store = FsObjectStore::new(dir.path(), signer.clone());
    let service = GatewayService::new(Arc::new(store), Some(signer));
    (routes().with_state(service), dir)
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.expect("infallible")
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Multipart POST to the upload route, single `file` field.
fn upload(folder: &str, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    multipart_request(folder, "file", file_name, content_type, data)
}

fn multipart_request(
    folder: &str,
    field: &str,
    file_name: &str,
    content_type: &str,
    data: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(format!("/files/upload/{folder}/"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn folder_listing_starts_empty() {
    let (app, _dir) = app();
    let response = send(&app, get("/folders/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn created_folder_appears_in_listing() {
    let (app, _dir) = app();

    let response = send(&app, post_json("/folders/create/", json!({"folder_name": "x"}))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await, json!({"folder": "x"}));

    let response = send(&app, get("/folders/")).await;
    assert_eq!(body_json(response).await, json!(["x"]));
}

#[tokio::test]
async fn create_folder_validates_the_name() {
    let (app, _dir) = app();

    for payload in [json!({}), json!({"folder_name": ""}), json!({"folder_name": "a/b"})] {
        let response = send(&app, post_json("/folders/create/", payload.clone())).await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "expected 400 for {payload}"
        );
        let body = body_json(response).await;
        assert!(body.get("error").is_some(), "error body for {payload}");
    }
}

#[tokio::test]
async fn upload_then_listing_returns_matching_record() {
    let (app, _dir) = app();

    let response = send(&app, upload("a", "b.txt", "text/plain", b"hello world")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let record = body_json(response).await;
    assert_eq!(record["name"], "a/b.txt");
    assert_eq!(record["size"], 11);
    assert_eq!(record["type"], "text/plain");
    assert!(record["updated"].is_string());

    let response = send(&app, get("/files/a/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    assert_eq!(listing.as_array().map(Vec::len), Some(1));
    assert_eq!(listing[0]["name"], "a/b.txt");
    assert_eq!(listing[0]["size"], 11);
    assert_eq!(listing[0]["type"], "text/plain");
}

#[tokio::test]
async fn upload_overwrites_silently() {
    let (app, _dir) = app();

    send(&app, upload("a", "b.txt", "text/plain", b"first")).await;
    let response = send(&app, upload("a", "b.txt", "text/plain", b"second!")).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let listing = body_json(send(&app, get("/files/a/")).await).await;
    assert_eq!(listing.as_array().map(Vec::len), Some(1));
    assert_eq!(listing[0]["size"], 7);
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let (app, _dir) = app();
    let response = send(
        &app,
        multipart_request("a", "attachment", "b.txt", "text/plain", b"x"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "no file was sent");
}

#[tokio::test]
async fn listing_excludes_folder_markers() {
    let (app, _dir) = app();

    send(&app, post_json("/folders/create/", json!({"folder_name": "docs"}))).await;
    send(&app, upload("docs", "a.txt", "text/plain", b"x")).await;

    let listing = body_json(send(&app, get("/files/docs/")).await).await;
    let names: Vec<&str> = listing
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["docs/a.txt"]);
}

#[tokio::test]
async fn delete_folder_clears_prefix_and_listing() {
    let (app, _dir) = app();

    send(&app, post_json("/folders/create/", json!({"folder_name": "a"}))).await;
    send(&app, upload("a", "b.txt", "text/plain", b"hello")).await;
    send(&app, upload("a", "c.txt", "text/plain", b"world")).await;

    let response = send(&app, delete("/folders/a/")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert_eq!(body_json(send(&app, get("/files/a/")).await).await, json!([]));
    assert_eq!(body_json(send(&app, get("/folders/")).await).await, json!([]));
}

#[tokio::test]
async fn delete_only_file_leaves_listing_empty() {
    let (app, _dir) = app();

    send(&app, upload("a", "only.txt", "text/plain", b"x")).await;
    let response = send(&app, delete("/files/delete/a/only.txt/")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert_eq!(body_json(send(&app, get("/files/a/")).await).await, json!([]));
}

#[tokio::test]
async fn delete_file_decodes_encoded_segments() {
    let (app, _dir) = app();

    send(&app, upload("docs", "report final.txt", "text/plain", b"x")).await;
    let response = send(&app, delete("/files/delete/docs/report%20final.txt/")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert_eq!(
        body_json(send(&app, get("/files/docs/")).await).await,
        json!([])
    );
}

#[tokio::test]
async fn delete_missing_file_is_not_found_on_the_local_backend() {
    let (app, _dir) = app();
    let response = send(&app, delete("/files/delete/a/ghost.txt/")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn preview_of_missing_key_is_not_found() {
    let (app, _dir) = app();
    let response = send(&app, get("/files/preview/a/ghost.txt/")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn preview_inlines_small_text() {
    let (app, _dir) = app();

    send(&app, upload("docs", "note.txt", "text/plain", b"hello preview")).await;
    let response = send(&app, get("/files/preview/docs/note.txt/")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let preview = body_json(response).await;
    assert_eq!(preview["type"], "text");
    assert_eq!(preview["content"], "hello preview");
    assert_eq!(preview["content_type"], "text/plain");
    assert_eq!(preview["size"], 13);
    assert_eq!(preview["name"], "docs/note.txt");
}

#[tokio::test]
async fn media_preview_signs_a_fifteen_minute_url() {
    let (app, _dir) = app();

    send(&app, upload("pics", "dot.png", "image/png", b"\x89PNG-data")).await;

    let issued_at = chrono::Utc::now().timestamp();
    let response = send(&app, get("/files/preview/pics/dot.png/")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let preview = body_json(response).await;
    assert_eq!(preview["type"], "media");
    assert_eq!(preview["content_type"], "image/png");
    assert_eq!(preview["name"], "pics/dot.png");

    let url = preview["url"].as_str().expect("signed url");
    let expires: i64 = url
        .split("expires=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .and_then(|value| value.parse().ok())
        .expect("expires param");
    let ttl = expires - issued_at;
    assert!((899..=901).contains(&ttl), "expected ~900s, got {ttl}s");
}

#[tokio::test]
async fn signed_url_downloads_through_the_raw_route() {
    let (app, _dir) = app();

    send(&app, upload("pics", "dot.png", "image/png", b"\x89PNG-data")).await;
    let preview = body_json(send(&app, get("/files/preview/pics/dot.png/")).await).await;
    let url = preview["url"].as_str().unwrap();
    let path = url.strip_prefix(PUBLIC_URL).expect("gateway-relative url");

    let response = send(&app, get(path)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"\x89PNG-data");
}

#[tokio::test]
async fn raw_route_refuses_bad_signatures() {
    let (app, _dir) = app();

    send(&app, upload("pics", "dot.png", "image/png", b"\x89PNG-data")).await;
    let preview = body_json(send(&app, get("/files/preview/pics/dot.png/")).await).await;
    let url = preview["url"].as_str().unwrap();
    let path = url.strip_prefix(PUBLIC_URL).unwrap();

    // Tampered token.
    let tampered = format!("{path}AAAA");
    let response = send(&app, get(&tampered)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Missing query half entirely.
    let response = send(&app, get("/files/raw/pics/dot.png")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Expiry rewound into the past invalidates the signature too.
    let rewound = path.replace("expires=", "expires=1&old=");
    let response = send(&app, get(&rewound)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unset_content_type_is_inferred_in_listings() {
    // The multipart upload always declares a type, so seed the object
    // through the store seam to get a genuinely unset one.
    let dir = TempDir::new().expect("temp dir");
    let signer = UrlSigner::new(*b"api-test-secret", PUBLIC_URL);
    let store = FsObjectStore::new(dir.path(), signer.clone());
    let service = GatewayService::new(Arc::new(store.clone()), Some(signer));
    let app = routes().with_state(service);

    store
        .put("docs/plain.txt", Bytes::from_static(b"text"), None)
        .await
        .unwrap();

    let listing = body_json(send(&app, get("/files/docs/")).await).await;
    assert_eq!(listing[0]["type"], "text/plain");
}

#[tokio::test]
async fn health_probes_respond() {
    let (app, _dir) = app();

    let response = send(&app, get("/healthz")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));

    let response = send(&app, get("/readyz")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["store"]["ok"], true);
}
