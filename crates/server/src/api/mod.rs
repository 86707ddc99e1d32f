//! HTTP surface of the onboarding notification service.
//!
//! This module is organized into submodules:
//! - `notifications` - Manual dispatch run and test email (/api/notifications/*)
//! - `assignments` - Assignment creation (/api/assignments)
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod assignments;
pub mod health;
pub mod notifications;
pub mod openapi;

pub use assignments::ASSIGNMENTS_TAG;
pub use health::MISC_TAG;
pub use notifications::NOTIFICATIONS_TAG;

use crate::AppResources;
use axum::Router;
use std::future::Future;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Every route with its layers and the `/api-docs` page.
pub fn router(app_resources: AppResources) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest(
            "/api",
            OpenApiRouter::new()
                .merge(notifications::router())
                .merge(assignments::router()),
        )
        .routes(routes!(health::health))
        .layer(axum::Extension(app_resources))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Serves until `shutdown` resolves, then drains in-flight requests.
#[tracing::instrument(skip(app_resources, shutdown))]
pub async fn start_webserver<F>(app_resources: AppResources, shutdown: F) -> color_eyre::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = app_resources.config.listen_addr.clone();
    let router = router(app_resources);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        name = "api.server.listening",
        target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
        addr = %addr,
        message = "Server running"
    );
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
