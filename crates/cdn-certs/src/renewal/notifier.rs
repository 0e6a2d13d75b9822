use async_trait::async_trait;
use cdn_core::notifications::{EmailMessage, NotificationError, NotificationService};
use std::fmt::Write as _;
use std::sync::Arc;

use super::models::{OutcomeBucket, RenewalOutcome};
use super::summary::ExpirationSummary;

pub const SUMMARY_SUBJECT: &str = "Certificate Expiration Summary";

/// Delivers a finished batch summary to an operator.
#[async_trait]
pub trait SummaryNotifier: Send + Sync {
    async fn send(
        &self,
        summary: &ExpirationSummary,
        destination: &str,
    ) -> Result<(), NotificationError>;
}

/// Renders the summary as text and HTML email and hands it to a [`NotificationService`].
pub struct EmailSummaryNotifier {
    notification_service: Arc<dyn NotificationService>,
}

impl EmailSummaryNotifier {
    pub fn new(notification_service: Arc<dyn NotificationService>) -> Self {
        Self {
            notification_service,
        }
    }

    pub fn render_text(summary: &ExpirationSummary) -> String {
        let mut body = String::new();
        let _ = writeln!(body, "{}", SUMMARY_SUBJECT);
        let _ = writeln!(
            body,
            "Batch {} finished at {}",
            summary.batch_id,
            summary.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        if summary.truncated {
            let _ = writeln!(
                body,
                "The batch stopped early; some certificates were not checked."
            );
        }

        for bucket in OutcomeBucket::ALL {
            let outcomes: Vec<&RenewalOutcome> = summary.bucket(bucket).collect();
            let _ = writeln!(body, "\n{} ({})", bucket.title(), outcomes.len());
            if outcomes.is_empty() {
                let _ = writeln!(body, "  none");
            }
            for outcome in outcomes {
                let _ = writeln!(
                    body,
                    "  {} version {}{} expires {} [{}]{}",
                    outcome.xml_id,
                    outcome.version,
                    outcome
                        .new_version
                        .map(|v| format!(" -> {}", v))
                        .unwrap_or_default(),
                    format_expiration(outcome),
                    outcome.auth_type,
                    outcome
                        .error
                        .as_ref()
                        .map(|e| format!(" error: {}", e))
                        .unwrap_or_default(),
                );
            }
        }

        body
    }

    pub fn render_html(summary: &ExpirationSummary) -> String {
        let mut html = String::new();
        let _ = write!(
            html,
            r#"<div style="font-family: Arial, sans-serif;"><h2>{}</h2><p style="color: #666;">Batch {} finished at {}</p>"#,
            SUMMARY_SUBJECT,
            summary.batch_id,
            summary.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        if summary.truncated {
            html.push_str(
                r#"<p style="color: #ffa500;">The batch stopped early; some certificates were not checked.</p>"#,
            );
        }

        for bucket in OutcomeBucket::ALL {
            let outcomes: Vec<&RenewalOutcome> = summary.bucket(bucket).collect();
            let _ = write!(html, "<h3>{} ({})</h3>", bucket.title(), outcomes.len());
            if outcomes.is_empty() {
                html.push_str("<p>None</p>");
                continue;
            }
            html.push_str(
                r#"<table style="border-collapse: collapse;"><tr><th>Delivery Service</th><th>Version</th><th>New Version</th><th>Expiration</th><th>Auth Type</th><th>Error</th></tr>"#,
            );
            for outcome in outcomes {
                let _ = write!(
                    html,
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    escape_html(&outcome.xml_id),
                    outcome.version,
                    outcome
                        .new_version
                        .map(|v| v.to_string())
                        .unwrap_or_default(),
                    format_expiration(outcome),
                    escape_html(&outcome.auth_type),
                    escape_html(outcome.error.as_deref().unwrap_or("")),
                );
            }
            html.push_str("</table>");
        }

        html.push_str("</div>");
        html
    }
}

#[async_trait]
impl SummaryNotifier for EmailSummaryNotifier {
    async fn send(
        &self,
        summary: &ExpirationSummary,
        destination: &str,
    ) -> Result<(), NotificationError> {
        let message =
            EmailMessage::to_recipient(destination, SUMMARY_SUBJECT, Self::render_text(summary))
                .with_html(Self::render_html(summary));
        self.notification_service.send_email(message).await
    }
}

fn format_expiration(outcome: &RenewalOutcome) -> String {
    outcome
        .expiration
        .map(|e| e.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
