//! SMTP delivery for operator notifications

pub mod services;

pub use services::SmtpNotificationService;
