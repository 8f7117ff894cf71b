//! Database access for admin service grants.
//!
//! `admin_services` maps an admin to the services they may administer. The
//! resolver only reads it; the admin management endpoints replace an admin's
//! grants in one transaction.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use std::{future::Future, pin::Pin};
use tracing::Instrument;

pub type GrantFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Read/write access to admin service grants.
pub trait GrantStore: Send + Sync {
    /// Service ids granted to `admin_id`, ascending.
    fn service_ids(&self, admin_id: i64) -> GrantFuture<'_, Vec<i64>>;

    /// Replace every grant of `admin_id` with `service_ids`.
    fn replace_service_ids<'a>(
        &'a self,
        admin_id: i64,
        service_ids: &'a [i64],
    ) -> GrantFuture<'a, Vec<i64>>;

    /// Cheap connectivity probe for health checks.
    fn ping(&self) -> GrantFuture<'_, ()>;
}

#[derive(Clone, Debug)]
pub struct PgGrantStore {
    pool: PgPool,
}

impl PgGrantStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl GrantStore for PgGrantStore {
    fn service_ids(&self, admin_id: i64) -> GrantFuture<'_, Vec<i64>> {
        Box::pin(admin_service_ids(&self.pool, admin_id))
    }

    fn replace_service_ids<'a>(
        &'a self,
        admin_id: i64,
        service_ids: &'a [i64],
    ) -> GrantFuture<'a, Vec<i64>> {
        Box::pin(replace_admin_service_ids(&self.pool, admin_id, service_ids))
    }

    fn ping(&self) -> GrantFuture<'_, ()> {
        Box::pin(ping(&self.pool))
    }
}

pub async fn admin_service_ids(pool: &PgPool, admin_id: i64) -> Result<Vec<i64>> {
    let query = r"
        SELECT service_id
        FROM admin_services
        WHERE admin_id = $1
        ORDER BY service_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(admin_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to lookup admin services")?;

    Ok(rows.iter().map(|row| row.get("service_id")).collect())
}

pub async fn replace_admin_service_ids(
    pool: &PgPool,
    admin_id: i64,
    service_ids: &[i64],
) -> Result<Vec<i64>> {
    let mut ids = service_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let mut tx = pool
        .begin()
        .await
        .context("failed to begin admin services transaction")?;

    let delete_query = "DELETE FROM admin_services WHERE admin_id = $1";
    let delete_span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = delete_query
    );
    sqlx::query(delete_query)
        .bind(admin_id)
        .execute(&mut *tx)
        .instrument(delete_span)
        .await
        .context("failed to clear admin services")?;

    let insert_query = r"
        INSERT INTO admin_services (admin_id, service_id)
        SELECT $1, service_id FROM UNNEST($2::BIGINT[]) AS service_id
    ";
    let insert_span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = insert_query
    );
    sqlx::query(insert_query)
        .bind(admin_id)
        .bind(&ids)
        .execute(&mut *tx)
        .instrument(insert_span)
        .await
        .context("failed to insert admin services")?;

    tx.commit()
        .await
        .context("failed to commit admin services transaction")?;

    Ok(ids)
}

async fn ping(pool: &PgPool) -> Result<()> {
    let query = "SELECT 1";
    let span = tracing::info_span!(
        "db.ping",
        db.system = "postgresql",
        db.operation = "PING"
    );
    sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to ping database")?;
    Ok(())
}

#[cfg(test)]
pub(crate) use self::memory::MemoryGrantStore;
