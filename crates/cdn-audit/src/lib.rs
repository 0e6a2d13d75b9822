// Re-export audit traits from core for convenience
pub use cdn_core::{AuditLogger, AuditOperation};

pub mod audit_service;

pub use audit_service::AuditService;
