//! Health-check routes for the hosting platform.

use std::{future::Future, net::SocketAddr};

use anyhow::Context;
use axum::{routing::get, Router};
use tokio::task::JoinHandle;

pub const RUNNING_BANNER: &str = "✅ AI Bot is running!";

pub fn router() -> Router {
    Router::new()
        .route("/", get(|| async { RUNNING_BANNER }))
        .route("/health", get(|| async { "ok" }))
}

/// Bind `addr` now and serve `app` in the background until `shutdown` resolves.
///
/// Binding happens before this returns, so a busy or privileged port is a
/// startup error rather than a failure inside the detached task.
pub fn spawn<F>(addr: SocketAddr, app: Router, shutdown: F) -> anyhow::Result<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let server =
        axum::Server::try_bind(&addr).with_context(|| format!("cannot listen on {addr}"))?;
    tracing::info!(%addr, "http listening");

    Ok(tokio::spawn(async move {
        if let Err(e) = server
            .serve(app.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(%addr, "http server failed: {e}");
        }
    }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;

    async fn get_body(uri: &str) -> (StatusCode, String) {
        let resp = router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn root_reports_running() {
        let (status, body) = get_body("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, RUNNING_BANNER);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, body) = get_body("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let (status, _) = get_body("/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn occupied_port_is_a_startup_error() {
        let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = held.local_addr().unwrap();

        let err = spawn(addr, router(), std::future::pending()).unwrap_err();
        assert!(err.to_string().contains(&addr.to_string()), "{err}");
    }

    #[tokio::test]
    async fn free_port_serves_until_shutdown() {
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = spawn("127.0.0.1:0".parse().unwrap(), router(), async move {
            let _ = stop_rx.await;
        })
        .unwrap();

        stop_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
