//! Database migrations for the certificate control plane

pub use sea_orm_migration::prelude::*;

mod migration;
pub use migration::Migrator;
