//! Versioned, reversible schema migrations.
//!
//! Each migration runs inside its own transaction together with the row that
//! records it in `schema_migrations`, so a failing step leaves neither schema
//! changes nor a version marker behind.

pub mod schema;

mod m0001_create_content_tables;
mod m0002_normalize_companies;
mod m0003_rename_job_text_fields;
mod m0004_salary_range;
mod m0005_widen_job_experience;
mod m0006_job_province_ids;
mod m0007_job_contract_fields;
mod m0008_drop_book_counters;

pub use m0002_normalize_companies::UNASSIGNED_COMPANY;

use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{params, Connection, Transaction};
use serde::Serialize;

pub trait Migration {
    fn version(&self) -> i64;
    fn name(&self) -> &'static str;
    fn up(&self, tx: &Transaction) -> Result<()>;
    fn down(&self, tx: &Transaction) -> Result<()>;
}

/// The full, ordered migration chain for the content database.
pub fn migrations() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(m0001_create_content_tables::Migration),
        Box::new(m0002_normalize_companies::Migration),
        Box::new(m0003_rename_job_text_fields::Migration),
        Box::new(m0004_salary_range::Migration),
        Box::new(m0005_widen_job_experience::Migration),
        Box::new(m0006_job_province_ids::Migration),
        Box::new(m0007_job_contract_fields::Migration),
        Box::new(m0008_drop_book_counters::Migration),
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub version: i64,
    pub name: String,
    pub applied_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
}

impl Migrator {
    pub fn new(migrations: Vec<Box<dyn Migration>>) -> Result<Self> {
        for pair in migrations.windows(2) {
            if pair[1].version() <= pair[0].version() {
                bail!(
                    "Migration versions must increase: {} ({}) follows {} ({})",
                    pair[1].version(),
                    pair[1].name(),
                    pair[0].version(),
                    pair[0].name()
                );
            }
        }
        Ok(Self { migrations })
    }

    pub fn standard() -> Result<Self> {
        Self::new(migrations())
    }

    pub fn latest_version(&self) -> i64 {
        self.migrations.last().map(|m| m.version()).unwrap_or(0)
    }

    pub fn status(&self, conn: &Connection) -> Result<Vec<MigrationStatus>> {
        let applied = applied_versions(conn)?;
        Ok(self
            .migrations
            .iter()
            .map(|m| MigrationStatus {
                version: m.version(),
                name: m.name().to_string(),
                applied_at: applied
                    .iter()
                    .find(|(v, _)| *v == m.version())
                    .map(|(_, at)| at.clone()),
            })
            .collect())
    }

    pub fn current_version(&self, conn: &Connection) -> Result<i64> {
        Ok(applied_versions(conn)?
            .last()
            .map(|(v, _)| *v)
            .unwrap_or(0))
    }

    pub fn pending(&self, conn: &Connection) -> Result<Vec<&dyn Migration>> {
        let applied = self.checked_applied(conn)?;
        Ok(self
            .migrations
            .iter()
            .filter(|m| !applied.contains(&m.version()))
            .map(|m| m.as_ref())
            .collect())
    }

    /// Apply pending migrations in order, stopping after `target` if given.
    pub fn up(&self, conn: &mut Connection, target: Option<i64>) -> Result<Vec<i64>> {
        let applied = self.checked_applied(conn)?;
        let mut done = Vec::new();
        for migration in &self.migrations {
            if applied.contains(&migration.version()) {
                continue;
            }
            if target.is_some_and(|t| migration.version() > t) {
                break;
            }
            run_step(conn, migration.as_ref(), Direction::Up)?;
            done.push(migration.version());
        }
        Ok(done)
    }

    /// Revert the `steps` most recently applied migrations, newest first.
    pub fn down(&self, conn: &mut Connection, steps: usize) -> Result<Vec<i64>> {
        let applied = self.checked_applied(conn)?;
        let versions: Vec<i64> = applied.iter().rev().take(steps).copied().collect();
        self.revert(conn, &versions)
    }

    /// Revert every applied migration newer than `target`.
    pub fn down_to(&self, conn: &mut Connection, target: i64) -> Result<Vec<i64>> {
        let applied = self.checked_applied(conn)?;
        let versions: Vec<i64> = applied.iter().rev().filter(|v| **v > target).copied().collect();
        self.revert(conn, &versions)
    }

    fn revert(&self, conn: &mut Connection, versions: &[i64]) -> Result<Vec<i64>> {
        let mut done = Vec::new();
        for version in versions {
            let migration = self.find(*version)?;
            run_step(conn, migration, Direction::Down)?;
            done.push(*version);
        }
        Ok(done)
    }

    fn find(&self, version: i64) -> Result<&dyn Migration> {
        self.migrations
            .iter()
            .find(|m| m.version() == version)
            .map(|m| m.as_ref())
            .ok_or_else(|| anyhow!("Unknown migration version {} recorded in database", version))
    }

    fn checked_applied(&self, conn: &Connection) -> Result<Vec<i64>> {
        let applied: Vec<i64> = applied_versions(conn)?.into_iter().map(|(v, _)| v).collect();
        for version in &applied {
            self.find(*version)?;
        }
        Ok(applied)
    }
}

fn ensure_version_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn applied_versions(conn: &Connection) -> Result<Vec<(i64, String)>> {
    ensure_version_table(conn)?;
    let mut stmt =
        conn.prepare("SELECT version, applied_at FROM schema_migrations ORDER BY version")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect::<Result<Vec<_>, _>>()
        .context("Failed to read applied migrations")
}

fn run_step(conn: &mut Connection, migration: &dyn Migration, direction: Direction) -> Result<()> {
    let verb = match direction {
        Direction::Up => "Applying",
        Direction::Down => "Reverting",
    };
    log::info!("{} migration {} {}", verb, migration.version(), migration.name());

    // Table rebuilds need enforcement off, and the pragma is ignored inside a transaction.
    let fk_enabled: bool = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    conn.execute_batch("PRAGMA foreign_keys = OFF")?;
    let result = run_in_transaction(conn, migration, direction);
    if fk_enabled {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
    }

    result.with_context(|| {
        format!(
            "{} migration {} {} failed",
            verb,
            migration.version(),
            migration.name()
        )
    })
}

fn run_in_transaction(
    conn: &mut Connection,
    migration: &dyn Migration,
    direction: Direction,
) -> Result<()> {
    let tx = conn.transaction()?;
    match direction {
        Direction::Up => {
            migration.up(&tx)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![
                    migration.version(),
                    migration.name(),
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
                ],
            )?;
        }
        Direction::Down => {
            migration.down(&tx)?;
            tx.execute(
                "DELETE FROM schema_migrations WHERE version = ?1",
                [migration.version()],
            )?;
        }
    }
    check_foreign_keys(&tx)?;
    tx.commit()?;
    Ok(())
}

fn check_foreign_keys(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let mut rows = stmt.query([])?;
    if let Some(row) = rows.next()? {
        let table: String = row.get(0)?;
        let parent: String = row.get(2)?;
        bail!("Foreign key violation: {} references missing {} row", table, parent);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON").unwrap();
        conn
    }

    type Snapshot = BTreeMap<String, (Vec<schema::ColumnInfo>, Vec<String>)>;

    fn snapshot(conn: &Connection) -> Snapshot {
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master WHERE type = 'table'
                 AND name NOT LIKE 'sqlite_%' AND name != 'schema_migrations'",
            )
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        tables
            .into_iter()
            .map(|t| {
                let mut cols = schema::columns(conn, &t).unwrap();
                cols.sort();
                let mut idx_stmt = conn
                    .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1")
                    .unwrap();
                let mut indexes: Vec<String> = idx_stmt
                    .query_map([&t], |r| r.get(0))
                    .unwrap()
                    .collect::<Result<_, _>>()
                    .unwrap();
                indexes.sort();
                (t, (cols, indexes))
            })
            .collect()
    }

    struct Failing;

    impl Migration for Failing {
        fn version(&self) -> i64 {
            100
        }
        fn name(&self) -> &'static str {
            "failing"
        }
        fn up(&self, tx: &Transaction) -> Result<()> {
            tx.execute("CREATE TABLE half_done (id INTEGER PRIMARY KEY)", [])?;
            bail!("boom")
        }
        fn down(&self, _tx: &Transaction) -> Result<()> {
            Ok(())
        }
    }

    struct Numbered(i64);

    impl Migration for Numbered {
        fn version(&self) -> i64 {
            self.0
        }
        fn name(&self) -> &'static str {
            "numbered"
        }
        fn up(&self, _tx: &Transaction) -> Result<()> {
            Ok(())
        }
        fn down(&self, _tx: &Transaction) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_standard_chain_is_ordered() {
        let migrator = Migrator::standard().unwrap();
        assert_eq!(migrator.latest_version(), 8);
    }

    #[test]
    fn test_new_rejects_out_of_order_versions() {
        let result = Migrator::new(vec![Box::new(Numbered(2)), Box::new(Numbered(2))]);
        assert!(result.is_err());
        let result = Migrator::new(vec![Box::new(Numbered(3)), Box::new(Numbered(1))]);
        assert!(result.is_err());
    }

    #[test]
    fn test_up_applies_everything_once() {
        let mut conn = conn();
        let migrator = Migrator::standard().unwrap();
        assert_eq!(migrator.pending(&conn).unwrap().len(), 8);

        let applied = migrator.up(&mut conn, None).unwrap();
        assert_eq!(applied, (1..=8).collect::<Vec<_>>());
        assert_eq!(migrator.current_version(&conn).unwrap(), 8);
        assert!(migrator.pending(&conn).unwrap().is_empty());
        assert!(migrator.status(&conn).unwrap().iter().all(|s| s.applied_at.is_some()));

        assert!(migrator.up(&mut conn, None).unwrap().is_empty());

        // enforcement is restored after each step
        let fk: bool = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        assert!(fk);
    }

    #[test]
    fn test_up_stops_at_target() {
        let mut conn = conn();
        let migrator = Migrator::standard().unwrap();
        assert_eq!(migrator.up(&mut conn, Some(3)).unwrap(), vec![1, 2, 3]);
        assert_eq!(migrator.current_version(&conn).unwrap(), 3);
        assert_eq!(migrator.up(&mut conn, Some(5)).unwrap(), vec![4, 5]);
    }

    #[test]
    fn test_down_reverts_newest_first() {
        let mut conn = conn();
        let migrator = Migrator::standard().unwrap();
        migrator.up(&mut conn, None).unwrap();

        assert_eq!(migrator.down(&mut conn, 2).unwrap(), vec![8, 7]);
        assert_eq!(migrator.current_version(&conn).unwrap(), 6);

        assert_eq!(migrator.down_to(&mut conn, 4).unwrap(), vec![6, 5]);
        assert_eq!(migrator.current_version(&conn).unwrap(), 4);

        migrator.down_to(&mut conn, 0).unwrap();
        assert_eq!(migrator.current_version(&conn).unwrap(), 0);
        assert!(!schema::table_exists(&conn, "jobs").unwrap());
        assert!(!schema::table_exists(&conn, "books").unwrap());
        assert!(!schema::table_exists(&conn, "companies").unwrap());
    }

    #[test]
    fn test_every_migration_round_trips_the_schema() {
        let migrator = Migrator::standard().unwrap();
        for m in migrations() {
            let mut conn = conn();
            migrator.up(&mut conn, Some(m.version() - 1)).unwrap();
            let before = snapshot(&conn);

            migrator.up(&mut conn, Some(m.version())).unwrap();
            assert_ne!(snapshot(&conn), before, "{} changed nothing", m.name());

            migrator.down(&mut conn, 1).unwrap();
            assert_eq!(snapshot(&conn), before, "{} did not round-trip", m.name());
        }
    }

    #[test]
    fn test_failed_step_is_rolled_back() {
        let mut conn = conn();
        let migrator =
            Migrator::new(vec![Box::new(Numbered(1)), Box::new(Failing)]).unwrap();
        let err = migrator.up(&mut conn, None).unwrap_err();
        assert!(format!("{:#}", err).contains("boom"));
        assert!(!schema::table_exists(&conn, "half_done").unwrap());
        assert_eq!(migrator.current_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_unknown_applied_version_is_an_error() {
        let mut conn = conn();
        Migrator::new(vec![Box::new(Numbered(1)), Box::new(Numbered(2))])
            .unwrap()
            .up(&mut conn, None)
            .unwrap();
        let shorter = Migrator::new(vec![Box::new(Numbered(1))]).unwrap();
        assert!(shorter.up(&mut conn, None).is_err());
        assert!(shorter.down(&mut conn, 1).is_err());
    }
}
