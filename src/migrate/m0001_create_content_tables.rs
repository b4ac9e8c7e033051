use anyhow::Result;
use rusqlite::Transaction;

/// Baseline content schema: jobs still carry their company inline.
pub struct Migration;

impl super::Migration for Migration {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &'static str {
        "create_content_tables"
    }

    fn up(&self, tx: &Transaction) -> Result<()> {
        tx.execute_batch(
            r#"
            CREATE TABLE jobs (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                company TEXT,
                companyLogo TEXT,
                job_type TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                requirements TEXT,
                benefits TEXT,
                province_id INTEGER,
                salary REAL,
                experience INTEGER,
                createdAt TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updatedAt TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE books (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                author TEXT,
                format TEXT,
                language TEXT,
                status TEXT NOT NULL DEFAULT 'available',
                downloadCount INTEGER NOT NULL DEFAULT 0,
                viewCount INTEGER NOT NULL DEFAULT 0,
                createdAt TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updatedAt TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX jobs_status_idx ON jobs(status);
            CREATE INDEX books_status_idx ON books(status);
            "#,
        )?;
        Ok(())
    }

    fn down(&self, tx: &Transaction) -> Result<()> {
        tx.execute_batch(
            r#"
            DROP TABLE IF EXISTS books;
            DROP TABLE IF EXISTS jobs;
            "#,
        )?;
        Ok(())
    }
}
