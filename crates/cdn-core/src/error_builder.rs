use crate::problemdetails::{self, Problem};
use axum::http::StatusCode;
use serde::Serialize;

const PROBLEM_BASE: &str = "https://cdn-certs.dev/probs";

/// Fluent construction of a [`Problem`]. Later calls overwrite earlier ones,
/// so the canned builders below can be refined by callers.
pub struct ErrorBuilder {
    problem: Problem,
}

impl ErrorBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            problem: problemdetails::new(status),
        }
    }

    pub fn type_(mut self, type_: impl Into<String>) -> Self {
        self.problem = self.problem.with_type(type_);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.problem = self.problem.with_title(title);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.problem = self.problem.with_detail(detail);
        self
    }

    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.problem = self.problem.with_instance(instance);
        self
    }

    /// Adds an extension member. Values that fail to serialize are dropped.
    pub fn value<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.problem = self.problem.with_value(key, value);
        }
        self
    }

    pub fn build(self) -> Problem {
        self.problem
            .with_value("timestamp", chrono::Utc::now().to_rfc3339())
    }
}

fn canned(status: StatusCode, slug: &str, title: &str, code: &str) -> ErrorBuilder {
    ErrorBuilder::new(status)
        .type_(format!("{}/{}", PROBLEM_BASE, slug))
        .title(title)
        .instance(format!("/error/{}", slug))
        .value("error_code", code)
}

pub fn internal_server_error() -> ErrorBuilder {
    canned(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal-server-error",
        "Internal Server Error",
        "INTERNAL_SERVER_ERROR",
    )
    .detail("An unexpected error occurred while processing your request")
}

pub fn not_found() -> ErrorBuilder {
    canned(StatusCode::NOT_FOUND, "not-found", "Resource Not Found", "NOT_FOUND")
}

pub fn unauthorized() -> ErrorBuilder {
    canned(StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized", "UNAUTHORIZED")
        .detail("Authentication is required to access this resource")
}

pub fn conflict() -> ErrorBuilder {
    canned(StatusCode::CONFLICT, "conflict", "Conflict", "CONFLICT")
        .detail("The request conflicts with work already in progress")
}
