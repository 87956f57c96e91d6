//! Database-held leases that keep sweeps single-flight across processes.
//!
//! A lease is a row keyed by name. Inserting it claims the lease; a row older
//! than the lease's time-to-live is treated as abandoned and may be taken over.

use chrono::{Duration, Utc};
use postbox_entities::sweep_leases;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveValue::Set,
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::EmailError;

/// Lease guarding delivery of the pending queue
pub const EMAIL_SWEEP_LEASE: &str = "email_sweep";

#[derive(Clone)]
pub struct SweepLeaseRepository {
    db: Arc<DatabaseConnection>,
}

impl SweepLeaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Claim `name` for `holder`. Returns false if a live lease is held by anyone.
    pub async fn try_acquire(
        &self,
        name: &str,
        holder: Uuid,
        ttl: Duration,
    ) -> Result<bool, EmailError> {
        let now = Utc::now();

        let stale = sweep_leases::Entity::delete_many()
            .filter(sweep_leases::Column::Name.eq(name))
            .filter(sweep_leases::Column::AcquiredOn.lt(now - ttl))
            .exec(self.db.as_ref())
            .await?;
        if stale.rows_affected > 0 {
            warn!("Took over abandoned lease '{}'", name);
        }

        let inserted = sweep_leases::Entity::insert(sweep_leases::ActiveModel {
            name: Set(name.to_string()),
            holder: Set(holder),
            acquired_on: Set(now),
        })
        .on_conflict(
            OnConflict::column(sweep_leases::Column::Name)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(self.db.as_ref())
        .await?;

        if inserted > 0 {
            debug!("Lease '{}' acquired by {}", name, holder);
        }
        Ok(inserted > 0)
    }

    /// Push the lease's expiry forward. Returns false if `holder` no longer owns it.
    pub async fn renew(&self, name: &str, holder: Uuid) -> Result<bool, EmailError> {
        let result = sweep_leases::Entity::update_many()
            .col_expr(sweep_leases::Column::AcquiredOn, Expr::value(Utc::now()))
            .filter(sweep_leases::Column::Name.eq(name))
            .filter(sweep_leases::Column::Holder.eq(holder))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Drop the lease if `holder` still owns it.
    pub async fn release(&self, name: &str, holder: Uuid) -> Result<bool, EmailError> {
        let result = sweep_leases::Entity::delete_many()
            .filter(sweep_leases::Column::Name.eq(name))
            .filter(sweep_leases::Column::Holder.eq(holder))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected > 0 {
            debug!("Lease '{}' released by {}", name, holder);
        }
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postbox_database::test_utils::TestDatabase;

    async fn setup() -> (TestDatabase, SweepLeaseRepository) {
        let db = TestDatabase::with_migrations().await.unwrap();
        let leases = SweepLeaseRepository::new(db.db.clone());
        (db, leases)
    }

    #[tokio::test]
    async fn test_only_one_holder_at_a_time() {
        let (db, leases) = setup().await;
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        let ttl = Duration::minutes(5);

        assert!(leases.try_acquire(EMAIL_SWEEP_LEASE, first, ttl).await.unwrap());
        assert!(!leases.try_acquire(EMAIL_SWEEP_LEASE, second, ttl).await.unwrap());

        // Only the holder can release
        assert!(!leases.release(EMAIL_SWEEP_LEASE, second).await.unwrap());
        assert!(leases.release(EMAIL_SWEEP_LEASE, first).await.unwrap());
        assert_eq!(db.count_rows("sweep_leases").await.unwrap(), 0);

        assert!(leases.try_acquire(EMAIL_SWEEP_LEASE, second, ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_abandoned_lease_is_taken_over() {
        let (_db, leases) = setup().await;
        let (crashed, next) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(leases
            .try_acquire(EMAIL_SWEEP_LEASE, crashed, Duration::minutes(5))
            .await
            .unwrap());
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        assert!(leases
            .try_acquire(EMAIL_SWEEP_LEASE, next, Duration::zero())
            .await
            .unwrap());

        // The previous holder has lost it
        assert!(!leases.renew(EMAIL_SWEEP_LEASE, crashed).await.unwrap());
        assert!(!leases.release(EMAIL_SWEEP_LEASE, crashed).await.unwrap());
        assert!(leases.renew(EMAIL_SWEEP_LEASE, next).await.unwrap());
    }

    #[tokio::test]
    async fn test_leases_are_independent_by_name() {
        let (_db, leases) = setup().await;
        let ttl = Duration::minutes(5);

        assert!(leases.try_acquire("a", Uuid::new_v4(), ttl).await.unwrap());
        assert!(leases.try_acquire("b", Uuid::new_v4(), ttl).await.unwrap());
    }
}
