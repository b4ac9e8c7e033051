use super::schema;
use anyhow::Result;
use rusqlite::Transaction;

/// The numeric salary is retired in favour of a free-text range ("20,000-30,000 AFN").
/// Old values are not carried over in either direction.
pub struct Migration;

impl super::Migration for Migration {
    fn version(&self) -> i64 {
        4
    }

    fn name(&self) -> &'static str {
        "salary_range"
    }

    fn up(&self, tx: &Transaction) -> Result<()> {
        schema::drop_column(tx, "jobs", "salary")?;
        schema::add_column(tx, "jobs", "salary_range", "TEXT")?;
        Ok(())
    }

    fn down(&self, tx: &Transaction) -> Result<()> {
        schema::add_column(tx, "jobs", "salary", "REAL")?;
        schema::drop_column(tx, "jobs", "salary_range")?;
        Ok(())
    }
}
