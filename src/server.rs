//! Axum router construction.
//!
//! The [`app`] function wires the browse and portfolio endpoints, the
//! operational endpoints (`/health`, `/metrics`) and the OpenAPI docs,
//! and returns a ready-to-serve [`axum::Router`].

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::generate_request_id;
use crate::handlers::{browse, portfolio};
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

/// Response header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// -- OpenAPI document ---------------------------------------------------------

/// OpenAPI documentation for the portfolio browser API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Portfolio Browser API",
        version = "0.1.0",
        description = "Folder-style browsing of an S3 bucket organised into portfolios and opportunities"
    ),
    paths(
        health_check,
        browse::list,
        browse::delete,
        browse::create_folder,
        browse::rename,
        browse::upload,
        portfolio::list_portfolios,
        portfolio::list_opportunities,
        portfolio::create_opportunity,
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Browse", description = "Prefix listing and object management"),
        (name = "Portfolios", description = "Portfolio and opportunity folders"),
    )
)]
struct ApiDoc;

// -- Router -------------------------------------------------------------------

/// Build the application router.
pub fn app(state: Arc<AppState>) -> Router {
    let openapi = ApiDoc::openapi();
    let metrics_enabled = state.config.observability.metrics;
    let health_enabled = state.config.observability.health_check;
    let max_upload_size = state.config.server.max_upload_size;

    let mut router = Router::new()
        .route("/browse", get(browse::list).delete(browse::delete))
        .route("/browse/folder", post(browse::create_folder))
        .route("/browse/rename", post(browse::rename))
        .route("/browse/upload", post(browse::upload))
        .route("/portfolios", get(portfolio::list_portfolios))
        .route(
            "/portfolios/:portfolio/opportunities",
            get(portfolio::list_opportunities),
        )
        .route(
            "/portfolios/:portfolio/opportunities/create",
            post(portfolio::create_opportunity),
        );

    if health_enabled {
        router = router.route("/health", get(health_check));
    }
    if metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    let router = router
        // Swagger UI at /docs, OpenAPI document at /openapi.json
        .merge(SwaggerUi::new("/docs").url("/openapi.json", openapi))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_size))
        .layer(middleware::from_fn(common_headers_middleware))
        .layer(TraceLayer::new_for_http());

    if metrics_enabled {
        router.layer(middleware::from_fn(metrics_middleware))
    } else {
        router
    }
}

// -- Common headers middleware -----------------------------------------------

async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let request_id = generate_request_id();
    debug!(
        request_id = %request_id,
        "{} {}",
        req.method(),
        req.uri().path()
    );

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    if let Ok(value) = HeaderValue::from_str(&date) {
        headers.insert("date", value);
    }
    headers.insert("server", HeaderValue::from_static("portfolio-browser"));

    response
}

/// `GET /health` -- Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Health check OK")
    )
)]
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browse::BrowseService;
    use crate::config::Config;
    use crate::storage::backend::ObjectStore;
    use crate::storage::memory::MemoryStore;
    use axum::body::Body;
    use bytes::Bytes;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_state() -> (Arc<AppState>, Arc<MemoryStore>) {
        let mut config = Config::default();
        config.observability.metrics = false;
        state_with(config)
    }

    fn state_with(config: Config) -> (Arc<AppState>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(0));
        let browse = BrowseService::new(store.clone(), config.browse.opportunities_segment.clone());
        (Arc::new(AppState { config, browse }), store)
    }

    async fn seed(store: &MemoryStore, keys: &[&str]) {
        for key in keys {
            store
                .put(key, Bytes::from_static(b"data"), None)
                .await
                .unwrap();
        }
    }

    async fn send(router: Router, req: Request<Body>) -> (StatusCode, Value, Response) {
        let response = router.oneshot(req).await.unwrap();
        let status = response.status();
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value, Response::from_parts(parts, Body::empty()))
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_and_request_id() {
        let (state, _) = test_state();
        let (status, body, response) = send(app(state), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
        let id = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert_eq!(id.len(), 16);
    }

    #[tokio::test]
    async fn test_list_root_and_nested() {
        let (state, store) = test_state();
        seed(
            &store,
            &["acme/", "acme/notes.txt", "acme/opportunities/deal1/", "globex/x.pdf"],
        )
        .await;

        let (status, body, _) = send(app(state.clone()), get_request("/browse")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["folders"], json!(["acme", "globex"]));
        assert_eq!(body["files"], json!([]));

        let (status, body, _) = send(app(state), get_request("/browse?prefix=acme/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["folders"], json!(["opportunities"]));
        assert_eq!(body["files"][0]["name"], "notes.txt");
        assert_eq!(body["files"][0]["key"], "acme/notes.txt");
        assert_eq!(body["files"][0]["size"], 4);
        assert!(body["files"][0]["lastModified"].is_string());
    }

    #[tokio::test]
    async fn test_list_rejects_bad_prefix() {
        let (state, _) = test_state();
        let (status, body, _) = send(app(state), get_request("/browse?prefix=acme")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_create_folder() {
        let (state, store) = test_state();
        let (status, body, _) = send(
            app(state),
            json_request("POST", "/browse/folder", json!({"prefix": "acme/", "name": "docs"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));
        assert_eq!(store.get("acme/docs/").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_create_folder_missing_name() {
        let (state, _) = test_state();
        let (status, body, _) = send(
            app(state),
            json_request("POST", "/browse/folder", json!({"prefix": "acme/"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Missing prefix or name"}));
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let (state, _) = test_state();
        let req = Request::builder()
            .method("POST")
            .uri("/browse/rename")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body, _) = send(app(state), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Invalid keys"}));
    }

    #[tokio::test]
    async fn test_rename_file() {
        let (state, store) = test_state();
        seed(&store, &["acme/a.txt"]).await;
        let (status, body, _) = send(
            app(state),
            json_request(
                "POST",
                "/browse/rename",
                json!({"oldKey": "acme/a.txt", "newKey": "acme/b.txt"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));
        assert!(store.get("acme/a.txt").await.is_none());
        assert!(store.get("acme/b.txt").await.is_some());
    }

    #[tokio::test]
    async fn test_rename_folder_recursive() {
        let (state, store) = test_state();
        seed(&store, &["acme/old/", "acme/old/a.txt", "acme/old/sub/b.txt"]).await;
        let (status, _, _) = send(
            app(state),
            json_request(
                "POST",
                "/browse/rename",
                json!({"oldKey": "acme/old/", "newKey": "acme/new/", "recursive": true}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(store.get("acme/new/").await.is_some());
        assert!(store.get("acme/new/sub/b.txt").await.is_some());
        assert!(store.get("acme/old/a.txt").await.is_none());
    }

    #[tokio::test]
    async fn test_rename_missing_source_is_500() {
        let (state, _) = test_state();
        let (status, body, _) = send(
            app(state),
            json_request(
                "POST",
                "/browse/rename",
                json!({"oldKey": "acme/ghost.txt", "newKey": "acme/b.txt"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Rename failed"}));
    }

    #[tokio::test]
    async fn test_delete_keys() {
        let (state, store) = test_state();
        seed(&store, &["acme/a.txt", "acme/b.txt", "acme/c.txt"]).await;
        let (status, body, _) = send(
            app(state),
            json_request("DELETE", "/browse", json!({"keys": ["acme/a.txt", "acme/b.txt"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], json!(["acme/a.txt", "acme/b.txt"]));
        assert!(store.get("acme/c.txt").await.is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_empty_keys() {
        let (state, _) = test_state();
        let (status, body, _) =
            send(app(state), json_request("DELETE", "/browse", json!({"keys": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "No keys provided"}));
    }

    fn multipart_request(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let mut body = String::new();
        for (name, file_name, content) in parts {
            body.push_str(&format!("--{boundary}\r\n"));
            match file_name {
                Some(file_name) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                     Content-Type: text/plain\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{boundary}--\r\n"));
        Request::builder()
            .method("POST")
            .uri("/browse/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload() {
        let (state, store) = test_state();
        let req = multipart_request(&[
            ("prefix", None, "acme/docs/"),
            ("file", Some("report.txt"), "hello"),
        ]);
        let (status, body, _) = send(app(state), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));
        assert_eq!(
            store.get("acme/docs/report.txt").await.unwrap(),
            Bytes::from_static(b"hello")
        );
        assert_eq!(
            store.content_type("acme/docs/report.txt").await.as_deref(),
            Some("text/plain")
        );
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let (state, _) = test_state();
        let req = multipart_request(&[("prefix", None, "acme/docs/")]);
        let (status, body, _) = send(app(state), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Missing prefix or file"}));
    }

    #[tokio::test]
    async fn test_upload_over_body_limit() {
        let mut config = Config::default();
        config.observability.metrics = false;
        config.server.max_upload_size = 64;
        let (state, store) = state_with(config);

        let big = "x".repeat(1000);
        let req = multipart_request(&[
            ("prefix", None, "acme/"),
            ("file", Some("big.bin"), big.as_str()),
        ]);
        let (status, body, _) = send(app(state), req).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body, json!({"error": "File too large"}));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_recursive_rename_of_missing_folder_fails() {
        let (state, store) = test_state();
        let (status, body, _) = send(
            app(state),
            json_request(
                "POST",
                "/browse/rename",
                json!({"oldKey": "p/ghost/", "newKey": "p/new/", "recursive": true}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Rename failed"}));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_portfolios_and_opportunities() {
        let (state, store) = test_state();
        seed(
            &store,
            &["acme/", "acme/opportunities/", "acme/opportunities/deal1/", "globex/"],
        )
        .await;

        let (status, body, _) = send(app(state.clone()), get_request("/portfolios")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(["acme", "globex"]));

        let (status, _, _) = send(
            app(state.clone()),
            json_request(
                "POST",
                "/portfolios/acme/opportunities/create",
                json!({"name": "deal2"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(store.get("acme/opportunities/deal2/").await.is_some());

        let (status, body, _) = send(
            app(state.clone()),
            get_request("/portfolios/acme/opportunities"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(["deal1", "deal2"]));

        let (status, body, _) =
            send(app(state), get_request("/portfolios/globex/opportunities")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_create_opportunity_missing_name() {
        let (state, _) = test_state();
        let (status, body, _) = send(
            app(state),
            json_request("POST", "/portfolios/acme/opportunities/create", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Missing name or portfolio"}));
    }

    #[tokio::test]
    async fn test_metrics_route_absent_when_disabled() {
        let (state, _) = test_state();
        let (status, _, _) = send(app(state), get_request("/metrics")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_route_present_when_enabled() {
        let mut config = Config::default();
        config.observability.metrics = true;
        let (state, _) = state_with(config);
        let (status, _, _) = send(app(state), get_request("/metrics")).await;
        // 503 until a recorder is installed.
        assert_ne!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let (state, _) = test_state();
        let (status, body, _) = send(app(state), get_request("/openapi.json")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/browse"].is_object());
        assert!(body["paths"]["/portfolios/{portfolio}/opportunities/create"].is_object());
    }
}
