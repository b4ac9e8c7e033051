use super::schema;
use anyhow::Result;
use rusqlite::Transaction;

/// A job may be posted in several provinces: `province_id` becomes a JSON array.
pub struct Migration;

impl super::Migration for Migration {
    fn version(&self) -> i64 {
        6
    }

    fn name(&self) -> &'static str {
        "job_province_ids"
    }

    fn up(&self, tx: &Transaction) -> Result<()> {
        schema::add_column(tx, "jobs", "province_ids", "TEXT NOT NULL DEFAULT '[]'")?;
        tx.execute(
            "UPDATE jobs SET province_ids = json_array(province_id) WHERE province_id IS NOT NULL",
            [],
        )?;
        schema::drop_column(tx, "jobs", "province_id")?;
        Ok(())
    }

    fn down(&self, tx: &Transaction) -> Result<()> {
        schema::add_column(tx, "jobs", "province_id", "INTEGER")?;
        // keeps the first province only
        tx.execute(
            "UPDATE jobs SET province_id = json_extract(province_ids, '$[0]') WHERE json_valid(province_ids)",
            [],
        )?;
        schema::drop_column(tx, "jobs", "province_ids")?;
        Ok(())
    }
}
