//! Core utilities and types shared across all CDN control plane crates

pub mod app_settings;
pub mod audit;
pub mod error;
pub mod error_builder;
pub mod notifications;
pub mod problemdetails;
pub mod types;

pub use problemdetails::Problem;

// Re-export commonly used types
pub use app_settings::{
    AcmeAccountSettings, AcmeRenewalSettings, AppSettings, LetsEncryptSettings,
    MalformedCertificatePolicy, SettingsError, SmtpSettings, SmtpTlsMode,
};
pub use audit::*;
pub use error::*;
pub use error_builder::*;

// Re-export external dependencies
pub use anyhow;
pub use async_trait;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tokio;
pub use tracing;
pub use uuid;

// Re-export standard datetime type for use across all crates
pub use types::{DBDateTime, UtcDateTime};
