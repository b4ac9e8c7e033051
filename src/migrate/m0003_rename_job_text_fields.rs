use super::schema;
use anyhow::Result;
use rusqlite::Transaction;

const RENAMES: [(&str, &str); 2] = [
    ("requirements", "job_requirements"),
    ("benefits", "duties_and_responsibilities"),
];

pub struct Migration;

impl super::Migration for Migration {
    fn version(&self) -> i64 {
        3
    }

    fn name(&self) -> &'static str {
        "rename_job_text_fields"
    }

    fn up(&self, tx: &Transaction) -> Result<()> {
        for (from, to) in RENAMES {
            schema::rename_column(tx, "jobs", from, to)?;
        }
        Ok(())
    }

    fn down(&self, tx: &Transaction) -> Result<()> {
        for (from, to) in RENAMES.iter().rev() {
            schema::rename_column(tx, "jobs", to, from)?;
        }
        Ok(())
    }
}
