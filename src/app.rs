use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::{
    config::AppConfig,
    middleware::{
        cors::{cors, CorsPolicy},
        logging::{LogResponse, RequestSpan},
        metrics::track_metrics,
        rate_limit::rate_limit,
        recovery::handle_panic,
        security::security_headers,
        timeout::enforce_timeout,
        validation::{validate_request, BodyRules},
    },
    orders, routes,
    state::AppState,
    users,
};

/// Builds the router with the full middleware chain.
pub fn build_app(state: AppState) -> Router {
    let routes = Router::new()
        .merge(users::router())
        .merge(orders::router())
        .merge(routes::router());
    with_pipeline(routes, state)
}

/// Wraps `routes` in the middleware chain. Layers are listed innermost
/// first: the last one added sees the request first.
fn with_pipeline(routes: Router<AppState>, state: AppState) -> Router {
    let config = state.config.clone();
    let rules = BodyRules {
        max_bytes: config.limits.max_request_bytes,
    };
    let cors_policy = CorsPolicy::new(&config.server.cors_origins, config.is_production());

    routes
        .method_not_allowed_fallback(routes::method_not_allowed)
        .fallback(routes::not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(RequestSpan)
                .on_response(LogResponse)
                .on_failure(()),
        )
        .layer(from_fn_with_state(state.metrics.clone(), track_metrics))
        .layer(DefaultBodyLimit::max(
            usize::try_from(rules.max_bytes).unwrap_or(usize::MAX),
        ))
        .layer(from_fn_with_state(rules, validate_request))
        .layer(from_fn_with_state(
            config.limits.request_timeout,
            enforce_timeout,
        ))
        .layer(from_fn_with_state(state.rate_limiter.clone(), rate_limit))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(from_fn_with_state(cors_policy, cors))
        .layer(from_fn(security_headers))
        .with_state(state)
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped accepting connections");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
        routing::get,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        app.clone().oneshot(req).await.expect("response")
    }

    async fn json_body(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn user_and_order_flow() {
        let app = build_app(AppState::fake());

        let res = call(
            &app,
            Method::POST,
            "/users",
            Some(json!({ "name": "Ann", "email": "ann@example.com" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let ann = json_body(res).await;
        assert_eq!(ann["isSuccess"], true);
        assert_eq!(ann["data"]["status"], 1);
        let ann_id = ann["data"]["id"].as_str().expect("id").to_string();

        let res = call(
            &app,
            Method::POST,
            "/users",
            Some(json!({ "name": "Bob", "email": "ann@example.com" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["error"]["code"], "EMAIL_EXISTS");

        let res = call(
            &app,
            Method::POST,
            "/orders",
            Some(json!({
                "userId": ann_id,
                "productName": "Widget",
                "quantity": 2,
                "amount": 9.5,
            })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let order = json_body(res).await;
        assert_eq!(order["data"]["userName"], "Ann");
        assert_eq!(order["data"]["statusText"], "pending");

        let res = call(&app, Method::GET, &format!("/orders/user/{ann_id}"), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let listed = json_body(res).await;
        assert_eq!(listed["pagination"]["total"], 1);

        let res = call(&app, Method::GET, "/orders/user/unknown", None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(res).await["error"]["code"], "USER_NOT_FOUND");
    }

    #[tokio::test]
    async fn delete_answers_with_bare_success() {
        let app = build_app(AppState::fake());
        let res = call(
            &app,
            Method::POST,
            "/users",
            Some(json!({ "name": "Cy", "email": "cy@example.com" })),
        )
        .await;
        let id = json_body(res).await["data"]["id"]
            .as_str()
            .expect("id")
            .to_string();

        let res = call(&app, Method::DELETE, &format!("/users/{id}"), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await, json!({ "isSuccess": true }));

        let res = call(&app, Method::GET, &format!("/users/{id}"), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_path_gets_envelope_and_headers() {
        let app = build_app(AppState::fake());
        let res = call(&app, Method::GET, "/nope", None).await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.headers()["x-content-type-options"], "nosniff");
        assert!(res.headers().contains_key("x-request-id"));
        assert_eq!(json_body(res).await["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn inbound_request_id_is_echoed() {
        let app = build_app(AppState::fake());
        let req = Request::builder()
            .uri("/health/live")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .expect("request");
        let res = app.oneshot(req).await.expect("response");
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn non_json_write_is_rejected_before_handler() {
        let app = build_app(AppState::fake());
        let req = Request::builder()
            .method(Method::POST)
            .uri("/users")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("name=Ann"))
            .expect("request");
        let res = app.oneshot(req).await.expect("response");
        assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(json_body(res).await["error"]["code"], "UNSUPPORTED_MEDIA_TYPE");
    }

    #[tokio::test]
    async fn preflight_short_circuits() {
        let app = build_app(AppState::fake());
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/users")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .expect("request");
        let res = app.oneshot(req).await.expect("response");
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
    }

    #[tokio::test]
    async fn health_reports_unreachable_database() {
        let app = build_app(AppState::fake());
        let res = call(&app, Method::GET, "/health", None).await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(res).await["status"], "unhealthy");

        let res = call(&app, Method::GET, "/health/live", None).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn error_codes_and_metrics_are_served() {
        let app = build_app(AppState::fake());
        let res = call(&app, Method::GET, "/error-codes", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(
            body["data"]["categories"]["USER"]["USER_NOT_FOUND"]["httpStatus"],
            404
        );

        let res = call(&app, Method::GET, "/metrics", None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("body");
        let text = String::from_utf8(bytes.to_vec()).expect("utf8");
        assert!(text.contains("http_requests_total"));
        assert!(text.contains("path=\"/error-codes\""));
    }

    fn assert_pipeline_headers(res: &Response) {
        assert!(res.headers().contains_key("x-request-id"));
        assert_eq!(res.headers()["x-frame-options"], "DENY");
        assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn wrong_method_gets_envelope() {
        let app = build_app(AppState::fake());
        let res = call(&app, Method::DELETE, "/health/live", None).await;
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_pipeline_headers(&res);
        let body = json_body(res).await;
        assert_eq!(body["isSuccess"], false);
        assert_eq!(body["error"]["code"], "METHOD_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn rate_limited_request_keeps_pipeline_headers() {
        let config = AppConfig::from_lookup(|key| match key {
            "RATE_LIMIT_BURST" => Some("1".into()),
            "RATE_LIMIT_RPS" => Some("0.001".into()),
            _ => None,
        })
        .expect("config");
        let app = build_app(AppState::fake_with(config));

        let res = call(&app, Method::GET, "/health/live", None).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = call(&app, Method::GET, "/health/live", None).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_pipeline_headers(&res);
        assert_eq!(json_body(res).await["error"]["code"], "RATE_LIMIT_EXCEEDED");
    }

    #[tokio::test]
    async fn slow_request_times_out_with_pipeline_headers() {
        let mut config = AppConfig::from_lookup(|_| None).expect("config");
        config.limits.request_timeout = Duration::from_millis(50);
        let slow = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let app = with_pipeline(slow, AppState::fake_with(config));

        let res = call(&app, Method::GET, "/slow", None).await;
        assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_pipeline_headers(&res);
        assert_eq!(json_body(res).await["error"]["code"], "REQUEST_TIMEOUT");
    }
}
