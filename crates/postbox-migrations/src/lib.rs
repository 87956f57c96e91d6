//! Database migrations for the Postbox mail dispatcher

pub use sea_orm_migration::prelude::*;

mod migration;
pub use migration::Migrator;
