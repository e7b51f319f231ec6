//! Postgres-backed repository implementations.

mod idioms;
mod jobs;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use apalis_sql::postgres::PostgresStorage;
use sqlx::{
    Postgres, Transaction,
    migrate::Migrator,
    postgres::{PgPool, PgPoolOptions},
    query,
};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    /// Applies the apalis queue schema, then the idiom tables.
    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        for migrator in Self::migrators() {
            migrator.run(pool).await?;
        }
        Ok(())
    }

    /// Both migrators record into the same `_sqlx_migrations` table, so each
    /// must skip the versions owned by the other.
    fn migrators() -> [Migrator; 2] {
        let mut queue = PostgresStorage::<()>::migrations();
        queue.set_ignore_missing(true);
        let mut idioms = sqlx::migrate!("./migrations");
        idioms.set_ignore_missing(true);
        [queue, idioms]
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn migrators_share_a_table_without_tripping_over_each_other() {
        let [queue, idioms] = PostgresRepositories::migrators();

        assert!(queue.ignore_missing);
        assert!(idioms.ignore_missing);
        assert!(queue.iter().count() > 0);
        assert!(idioms.iter().count() > 0);
    }

    #[test]
    fn migration_versions_do_not_collide() {
        let [queue, idioms] = PostgresRepositories::migrators();
        let queue_versions: HashSet<i64> = queue.iter().map(|m| m.version).collect();

        for migration in idioms.iter() {
            assert!(
                !queue_versions.contains(&migration.version),
                "version {} is already used by the queue schema",
                migration.version
            );
        }
    }
}
