use super::schema;
use anyhow::Result;
use rusqlite::Transaction;

const COUNTERS: [&str; 2] = ["downloadCount", "viewCount"];

/// Book download/view counters are no longer tracked on the row.
pub struct Migration;

impl super::Migration for Migration {
    fn version(&self) -> i64 {
        8
    }

    fn name(&self) -> &'static str {
        "drop_book_counters"
    }

    fn up(&self, tx: &Transaction) -> Result<()> {
        for column in COUNTERS {
            schema::drop_column(tx, "books", column)?;
        }
        Ok(())
    }

    fn down(&self, tx: &Transaction) -> Result<()> {
        // zero, not NULL, for rows that existed while the counters were gone
        for column in COUNTERS {
            schema::add_column(tx, "books", column, "INTEGER NOT NULL DEFAULT 0")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::Migrator;
    use rusqlite::Connection;

    #[test]
    fn test_restored_counters_default_to_zero() {
        let mut conn = Connection::open_in_memory().unwrap();
        let migrator = Migrator::standard().unwrap();
        migrator.up(&mut conn, None).unwrap();
        conn.execute("INSERT INTO books (title) VALUES ('Dune')", [])
            .unwrap();

        migrator.down(&mut conn, 1).unwrap();
        let (downloads, views): (i64, i64) = conn
            .query_row("SELECT downloadCount, viewCount FROM books", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!((downloads, views), (0, 0));
    }
}
