//! sea-orm entities for the certificate control plane schema

pub mod acme_accounts;
pub mod audit_logs;
pub mod deliveryservice_ssl_keys;
pub mod deliveryservices;
pub mod dns_challenges;
