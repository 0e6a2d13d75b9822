//! RFC 7807 problem responses (`application/problem+json`).

use std::collections::BTreeMap;

use axum::http::header::{HeaderValue, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

const PROBLEM_JSON: &str = "application/problem+json";

/// An error response: a status plus the JSON members of the problem document.
/// Empty string members are left out of the body.
#[derive(Debug, Clone)]
pub struct Problem {
    pub status_code: StatusCode,
    pub body: BTreeMap<String, Value>,
}

pub fn new(status_code: StatusCode) -> Problem {
    Problem {
        status_code,
        body: BTreeMap::new(),
    }
}

impl Problem {
    pub fn with_type(self, value: impl Into<String>) -> Self {
        self.with_member("type", value.into())
    }

    pub fn with_title(self, value: impl Into<String>) -> Self {
        self.with_member("title", value.into())
    }

    pub fn with_detail(self, value: impl Into<String>) -> Self {
        self.with_member("detail", value.into())
    }

    pub fn with_instance(self, value: impl Into<String>) -> Self {
        self.with_member("instance", value.into())
    }

    pub fn with_value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.body.insert(key.to_string(), value.into());
        self
    }

    fn with_member(self, key: &str, value: String) -> Self {
        if value.is_empty() {
            self
        } else {
            self.with_value(key, value)
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        if self.body.is_empty() {
            return self.status_code.into_response();
        }
        let mut response = (self.status_code, Json(self.body)).into_response();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
        response
    }
}
