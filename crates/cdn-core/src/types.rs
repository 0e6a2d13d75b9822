//! Shared datetime aliases

use chrono::{DateTime, Utc};

/// Datetime type backing every `TIMESTAMPTZ` column in the control plane schema.
pub type DBDateTime = DateTime<Utc>;

/// Standard UTC datetime used in API payloads, summaries and audit records.
///
/// Serializes as ISO 8601 with a `Z` suffix, e.g. `2025-10-12T12:15:47.609192Z`.
/// When exposed through utoipa, annotate the field:
/// ```rust,ignore
/// #[schema(value_type = String, format = DateTime)]
/// pub expires_at: UtcDateTime,
/// ```
pub type UtcDateTime = DateTime<Utc>;
