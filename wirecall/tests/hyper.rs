//! Tests against a real HTTP server over TCP.

#![cfg(any(feature = "tls-ring", feature = "tls-aws-lc"))]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Redirect};
use axum::routing::get;
use tokio::net::TcpListener;
use wirecall::{Error, HttpRequest, HyperTransport, RetryPolicy, Session, TransportError};

async fn serve(router: Router) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            eprintln!("server error: {e}");
        }
    });
    Ok(addr)
}

fn app() -> Router {
    Router::new()
        .route("/hello", get(|| async { "hello" }))
        .route(
            "/whoami",
            get(|headers: HeaderMap| async move {
                match headers.get(header::AUTHORIZATION) {
                    Some(value) => (StatusCode::OK, value.to_str().unwrap_or_default().to_string()),
                    None => (StatusCode::UNAUTHORIZED, String::new()),
                }
            }),
        )
        .route("/moved", get(|| async { Redirect::temporary("/hello") }))
        .route(
            "/unavailable",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down").into_response() }),
        )
}

fn session(addr: SocketAddr) -> anyhow::Result<Session> {
    Ok(Session::new(HyperTransport::new()?)
        .base_url(format!("http://{addr}"))
        .retry(RetryPolicy::new().instant()))
}

#[tokio::test]
async fn test_get_over_tcp() -> anyhow::Result<()> {
    let addr = serve(app()).await?;
    let response = session(addr)?.send(&HttpRequest::get().path("/hello")).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text()?.into_inner(), "hello");
    Ok(())
}

#[tokio::test]
async fn test_basic_auth_header_is_sent() -> anyhow::Result<()> {
    let addr = serve(app()).await?;
    let session = session(addr)?.authorization(wirecall::BasicAuth::new("aladdin", "opensesame"));

    let response = session.send(&HttpRequest::get().path("/whoami")).await?;
    assert_eq!(response.into_inner(), "Basic YWxhZGRpbjpvcGVuc2VzYW1l");
    Ok(())
}

#[tokio::test]
async fn test_redirect_over_tcp() -> anyhow::Result<()> {
    let addr = serve(app()).await?;
    let call = session(addr)?.spawn(HttpRequest::get().path("/moved"));
    let task = call.task();
    let response = call.await?;

    assert_eq!(response.into_inner(), "hello");
    assert_eq!(task.redirect_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_retries_are_bounded() -> anyhow::Result<()> {
    let addr = serve(app()).await?;
    let session = session(addr)?.retry(RetryPolicy::new().max_retry_count(1).instant());

    let call = session.spawn(HttpRequest::get().path("/unavailable"));
    let task = call.task();
    let err = call.await.unwrap_err();

    assert_eq!(err.response().map(|r| r.status()), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(task.retry_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_connection_refused() -> anyhow::Result<()> {
    // Bind and drop to find a port nothing listens on.
    let addr = TcpListener::bind("127.0.0.1:0").await?.local_addr()?;
    let session = session(addr)?
        .retry(RetryPolicy::no_retry())
        .timeout(Duration::from_secs(5));

    let err = session.send(&HttpRequest::get().path("/hello")).await.unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Connect(_))));
    Ok(())
}
