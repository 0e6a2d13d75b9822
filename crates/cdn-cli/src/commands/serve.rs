use super::wiring::{build_autorenew_service, load_settings};
use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use cdn_certs::{configure_routes, create_autorenew_app_state, AutorenewApiDoc, CurrentUser};
use clap::Args;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use utoipa::OpenApi;

/// Header carrying the user authenticated by the fronting gateway.
pub const USER_HEADER: &str = "x-cdn-user";

#[derive(Args)]
pub struct ServeCommand {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1:3000", env = "CDN_ADDRESS")]
    pub address: String,

    /// Database connection URL
    #[arg(long, env = "CDN_DATABASE_URL")]
    pub database_url: String,

    /// YAML settings file
    #[arg(long, env = "CDN_CONFIG")]
    pub config: Option<PathBuf>,
}

impl ServeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let settings = load_settings(self.config.as_deref())?;

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async move {
            debug!("Initializing database connection...");
            let db = cdn_database::establish_connection(&self.database_url).await?;
            let service = build_autorenew_service(settings, db)?;

            let app = build_router(create_autorenew_app_state(service.clone()));

            let listener = TcpListener::bind(&self.address).await?;
            info!("Certificate API server listening on {}", self.address);

            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Failed to listen for shutdown signal: {}", e);
                        return;
                    }
                    info!("Shutdown requested");
                    if let Ok(batch_id) = service.cancel().await {
                        info!("Cancelled renewal batch {}", batch_id);
                    }
                })
                .await?;

            info!("Certificate API server exited");
            Ok(())
        })
    }
}

fn build_router(state: std::sync::Arc<cdn_certs::AutorenewAppState>) -> Router {
    configure_routes()
        .with_state(state)
        .route("/openapi.json", get(openapi_document))
        .layer(middleware::from_fn(current_user_from_header))
        .layer(TraceLayer::new_for_http())
}

async fn openapi_document() -> Json<utoipa::openapi::OpenApi> {
    Json(AutorenewApiDoc::openapi())
}

/// Turns the gateway's user header into a [`CurrentUser`] extension.
/// Requests without it reach the handlers unauthenticated.
async fn current_user_from_header(mut req: Request, next: Next) -> Response {
    if let Some(user) = user_from_headers(req.headers()) {
        req.extensions_mut().insert(user);
    }
    next.run(req).await
}

fn user_from_headers(headers: &HeaderMap) -> Option<CurrentUser> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(CurrentUser::new)
}
