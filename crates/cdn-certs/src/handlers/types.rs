use crate::renewal::AutorenewService;
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use cdn_core::error_builder::unauthorized;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

pub struct AutorenewAppState {
    pub service: Arc<AutorenewService>,
}

pub fn create_autorenew_app_state(service: Arc<AutorenewService>) -> Arc<AutorenewAppState> {
    Arc::new(AutorenewAppState { service })
}

/// The authenticated caller. Placed in request extensions by the
/// authentication layer in front of these routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub username: String,
}

impl CurrentUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| {
                unauthorized()
                    .detail("Renewing certificates requires an authenticated user")
                    .build()
                    .into_response()
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct Alert {
    pub text: String,
    /// `success`, `info`, `warning` or `error`
    pub level: String,
}

impl Alert {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: "success".to_string(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: "warning".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct AlertsResponse {
    pub alerts: Vec<Alert>,
}

impl AlertsResponse {
    pub fn push(&mut self, alert: Alert) {
        self.alerts.push(alert);
    }
}
