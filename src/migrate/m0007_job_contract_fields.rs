use super::schema;
use anyhow::Result;
use rusqlite::Transaction;

// Added in this order, dropped in reverse. Each declares its own null/default
// policy so existing rows get a defined value.
const COLUMNS: [(&str, &str); 9] = [
    ("contract_type", "TEXT"),
    ("contract_duration", "TEXT"),
    ("contract_extensible", "INTEGER NOT NULL DEFAULT 0"),
    ("probation_period", "TEXT"),
    ("vacancy_count", "INTEGER NOT NULL DEFAULT 1"),
    (
        "gender",
        "TEXT NOT NULL DEFAULT 'any' CHECK (gender IN ('any', 'male', 'female'))",
    ),
    ("closing_date", "TEXT"),
    ("posting_date", "TEXT"),
    ("reference_number", "TEXT"),
];

pub struct Migration;

impl super::Migration for Migration {
    fn version(&self) -> i64 {
        7
    }

    fn name(&self) -> &'static str {
        "job_contract_fields"
    }

    fn up(&self, tx: &Transaction) -> Result<()> {
        for (column, decl) in COLUMNS {
            schema::add_column(tx, "jobs", column, decl)?;
        }
        Ok(())
    }

    fn down(&self, tx: &Transaction) -> Result<()> {
        for (column, _) in COLUMNS.iter().rev() {
            schema::drop_column(tx, "jobs", column)?;
        }
        Ok(())
    }
}
