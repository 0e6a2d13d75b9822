use super::types::{Alert, AlertsResponse, AutorenewAppState, CurrentUser};
use crate::renewal::ExpirationSummary;
use cdn_core::problemdetails::Problem;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::OpenApi;

pub const ACME_AUTORENEW_PATH: &str = "/acme_autorenew";
pub const DEPRECATED_AUTORENEW_PATH: &str = "/letsencrypt/autorenew";

const ACCEPTED_TEXT: &str =
    "Beginning async call to renew certificates. This may take a few minutes.";

#[derive(OpenApi)]
#[openapi(
    paths(renew_certificates, renew_certificates_deprecated, cancel_renewal),
    components(schemas(Alert, AlertsResponse, ExpirationSummary)),
    info(
        title = "Certificate Auto-Renewal API",
        description = "Starts and cancels the batch that renews delivery service \
        certificates close to expiration.",
        version = "1.0.0"
    ),
    tags(
        (name = "Certificates", description = "Certificate auto-renewal endpoints")
    )
)]
pub struct AutorenewApiDoc;

pub fn configure_routes() -> Router<Arc<AutorenewAppState>> {
    Router::new()
        .route(
            ACME_AUTORENEW_PATH,
            post(renew_certificates).delete(cancel_renewal),
        )
        .route(DEPRECATED_AUTORENEW_PATH, post(renew_certificates_deprecated))
}

/// Renew expiring certificates
///
/// Renews every Let's Encrypt and ACME certificate expiring inside the configured
/// window. The batch runs in the background; the response is sent before any
/// certificate is processed.
#[utoipa::path(
    post,
    path = "/acme_autorenew",
    responses(
        (status = 202, description = "Renewal batch started", body = AlertsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "A renewal batch is already running"),
        (status = 500, description = "Candidate scan failed")
    ),
    tag = "Certificates"
)]
async fn renew_certificates(
    user: CurrentUser,
    State(app_state): State<Arc<AutorenewAppState>>,
) -> Result<impl IntoResponse, Problem> {
    start_batch(&user, &app_state, AlertsResponse::default()).await
}

/// Renew expiring certificates (deprecated)
///
/// Same as `POST /acme_autorenew`, with a deprecation alert.
#[utoipa::path(
    post,
    path = "/letsencrypt/autorenew",
    responses(
        (status = 202, description = "Renewal batch started", body = AlertsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "A renewal batch is already running"),
        (status = 500, description = "Candidate scan failed")
    ),
    tag = "Certificates"
)]
async fn renew_certificates_deprecated(
    user: CurrentUser,
    State(app_state): State<Arc<AutorenewAppState>>,
) -> Result<impl IntoResponse, Problem> {
    warn!(
        "Deprecated endpoint {} called by {}",
        DEPRECATED_AUTORENEW_PATH, user.username
    );
    let mut alerts = AlertsResponse::default();
    alerts.push(Alert::warning(format!(
        "This endpoint is deprecated, please use {} instead",
        ACME_AUTORENEW_PATH
    )));
    start_batch(&user, &app_state, alerts).await
}

async fn start_batch(
    user: &CurrentUser,
    app_state: &AutorenewAppState,
    mut alerts: AlertsResponse,
) -> Result<(StatusCode, Json<AlertsResponse>), Problem> {
    let handle = app_state
        .service
        .trigger(&user.username)
        .await
        .map_err(|e| {
            error!("Failed to start certificate renewal: {}", e);
            e
        })?;

    info!(
        "Certificate renewal batch {} started by {} with {} candidate(s)",
        handle.batch_id, user.username, handle.candidates
    );

    alerts.push(Alert::success(ACCEPTED_TEXT));
    Ok((StatusCode::ACCEPTED, Json(alerts)))
}

/// Cancel the running renewal batch
///
/// The batch stops before its next certificate and still sends its summary.
#[utoipa::path(
    delete,
    path = "/acme_autorenew",
    responses(
        (status = 202, description = "Cancellation requested", body = AlertsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No renewal batch is running")
    ),
    tag = "Certificates"
)]
async fn cancel_renewal(
    user: CurrentUser,
    State(app_state): State<Arc<AutorenewAppState>>,
) -> Result<impl IntoResponse, Problem> {
    let batch_id = app_state.service.cancel().await?;
    info!(
        "Certificate renewal batch {} cancelled by {}",
        batch_id, user.username
    );

    let mut alerts = AlertsResponse::default();
    alerts.push(Alert::success(format!(
        "Cancelling certificate renewal batch {}",
        batch_id
    )));
    Ok((StatusCode::ACCEPTED, Json(alerts)))
}
