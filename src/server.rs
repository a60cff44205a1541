//! HTTP surface: telemetry endpoint plus a small landing page.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::WebConfig;
use crate::error::ExporterResult;
use crate::exposition::Exporter;
use crate::{EXPORTER_NAME, EXPORTER_VERSION};

#[derive(Debug, Clone)]
struct AppState {
    exporter: Arc<Exporter>,
    telemetry_path: Arc<str>,
}

/// Routes: `GET {telemetry_path}` scrapes, `GET /` describes the exporter.
pub fn router(exporter: Arc<Exporter>, telemetry_path: &str) -> Router {
    let state = AppState {
        exporter,
        telemetry_path: Arc::from(telemetry_path),
    };

    Router::new()
        .route("/", get(landing_page))
        .route(telemetry_path, get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn metrics(State(state): State<AppState>) -> Response {
    let snapshot = state.exporter.scrape().await;

    match snapshot.encode_text() {
        Ok(body) => ([(CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(target: "netapp_exporter::server", error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn landing_page(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>NetApp Quota Exporter</title></head>\n\
         <body>\n\
         <h1>NetApp Quota Exporter</h1>\n\
         <p>{} v{}</p>\n\
         <p><a href=\"{}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        EXPORTER_NAME, EXPORTER_VERSION, state.telemetry_path
    ))
}

/// Bind the configured address and serve until SIGINT or SIGTERM.
pub async fn serve(config: &WebConfig, exporter: Arc<Exporter>) -> ExporterResult<()> {
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!(
        target: "netapp_exporter::server",
        address = %addr,
        telemetry_path = %config.telemetry_path,
        "Listening"
    );

    serve_on(listener, router(exporter, &config.telemetry_path), shutdown_signal()).await?;

    info!(target: "netapp_exporter::server", "Server shutdown complete");
    Ok(())
}

/// Serve `app` on an already bound listener until `shutdown` resolves.
pub async fn serve_on<F>(listener: TcpListener, app: Router, shutdown: F) -> ExporterResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(target: "netapp_exporter::server", error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(target: "netapp_exporter::server", error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!(target: "netapp_exporter::server", "Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!(target: "netapp_exporter::server", "Received SIGTERM, initiating shutdown");
        }
    }
}
