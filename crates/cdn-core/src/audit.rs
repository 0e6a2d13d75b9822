use anyhow::Result;

/// An operation worth recording in the audit trail.
pub trait AuditOperation: Send + Sync {
    /// Returns the operation type (e.g., "CERTIFICATE_AUTORENEWAL")
    fn operation_type(&self) -> String;

    /// Returns the name of the user who triggered the operation
    fn user(&self) -> &str;

    /// Serializes the operation to JSON
    fn serialize(&self) -> Result<String>;
}

/// Trait for services that can create audit logs
#[async_trait::async_trait]
pub trait AuditLogger: Send + Sync {
    /// Creates an audit log entry for the given operation
    async fn create_audit_log(&self, operation: &dyn AuditOperation) -> Result<()>;
}
