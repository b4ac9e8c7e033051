use super::schema;
use anyhow::Result;
use rusqlite::Transaction;

// only all-digit text survives the trip back to INTEGER
const TO_INTEGER: &str = r#"CASE
    WHEN trim("experience") != '' AND trim("experience") NOT GLOB '*[^0-9]*'
    THEN CAST(trim("experience") AS INTEGER)
    ELSE NULL
END"#;

/// `jobs.experience` becomes free text so values like "3-5 years" fit.
pub struct Migration;

impl super::Migration for Migration {
    fn version(&self) -> i64 {
        5
    }

    fn name(&self) -> &'static str {
        "widen_job_experience"
    }

    fn up(&self, tx: &Transaction) -> Result<()> {
        schema::rebuild_table(tx, "jobs", |def| {
            let col = def.column_mut("experience")?;
            col.info.decl_type = "TEXT".to_string();
            col.copy_from = Some(r#"CAST("experience" AS TEXT)"#.to_string());
            Ok(())
        })
    }

    fn down(&self, tx: &Transaction) -> Result<()> {
        schema::rebuild_table(tx, "jobs", |def| {
            let col = def.column_mut("experience")?;
            col.info.decl_type = "INTEGER".to_string();
            col.copy_from = Some(TO_INTEGER.to_string());
            Ok(())
        })
    }
}
