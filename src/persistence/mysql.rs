use sqlx::MySqlPool;

use crate::sample::CounterSample;

use super::models::{AdaptorRow, SampleRow};
use super::{Error, Result, SamplePersister};

/// Opens a connection pool to `url` and brings the schema up to date.
///
/// # Errors
///
/// Returns an `Error::ConnectionError` if the database cannot be reached and an
/// `Error::MigrationError` if the migrations fail.
pub async fn connect(url: &str) -> Result<MySqlPool> {
    let db = sqlx::mysql::MySqlPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(10))
        .max_connections(10)
        .connect(url)
        .await
        .map_err(Error::ConnectionError)?;

    sqlx::migrate!()
        .run(&db)
        .await
        .map_err(Error::MigrationError)?;

    Ok(db)
}

#[derive(Debug, Clone)]
pub struct MySqlSamplePersister {
    db: MySqlPool,
}

impl MySqlSamplePersister {
    pub fn new(db: MySqlPool) -> Self {
        Self { db }
    }
}

impl SamplePersister for MySqlSamplePersister {
    /// Inserts one counter sample together with its adaptor list.
    ///
    /// Both inserts share a transaction, so a sample is never stored without its
    /// adaptors.
    ///
    /// # Errors
    ///
    /// Returns an `Error::InsertError` if the transaction or any insert fails.
    async fn persist_sample(&self, sample: &CounterSample) -> Result<()> {
        const INSERT_SAMPLE: &str = r#"
INSERT INTO counter_samples (
    timestamp, uuid, container_id,
    hostname, os_release,
    domain_state, vcpus, cpu_time_ms,
    memory_usage, memory_limit,
    net_bytes_in, net_pkts_in, net_errs_in, net_drops_in,
    net_bytes_out, net_pkts_out, net_errs_out, net_drops_out,
    disk_rd_req, disk_rd_bytes, disk_wr_req, disk_wr_bytes
) VALUES (
    ?, ?, ?,
    ?, ?,
    ?, ?, ?,
    ?, ?,
    ?, ?, ?, ?,
    ?, ?, ?, ?,
    ?, ?, ?, ?
)
"#;
        const INSERT_ADAPTOR: &str = r#"
INSERT INTO sample_adaptors (
    sample_id, ifindex, name, mac
) VALUES (
    ?, ?, ?, ?
)
"#;
        let row = SampleRow::from(sample);
        let mut tx: sqlx::Transaction<'_, sqlx::MySql> =
            self.db.begin().await.map_err(Error::InsertError)?;

        let query = row.bind_all(sqlx::query(INSERT_SAMPLE));
        let sample_id = query
            .execute(&mut *tx)
            .await
            .map_err(Error::InsertError)?
            .last_insert_id();

        for adaptor in &sample.adaptors {
            let adaptor = AdaptorRow::from(adaptor);
            sqlx::query(INSERT_ADAPTOR)
                .bind(sample_id)
                .bind(adaptor.ifindex)
                .bind(adaptor.name)
                .bind(adaptor.mac)
                .execute(&mut *tx)
                .await
                .map_err(Error::InsertError)?;
        }
        tx.commit().await.map_err(Error::InsertError)?;

        Ok(())
    }
}
