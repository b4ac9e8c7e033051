use super::schema;
use anyhow::Result;
use rusqlite::{params, OptionalExtension, Transaction};
use std::collections::HashMap;

/// Company that jobs without a company name are attached to; reverting maps it
/// back to NULL. Gets a numeric suffix when a real company already uses the name.
pub const UNASSIGNED_COMPANY: &str = "(unassigned)";

/// Moves `jobs.company` / `jobs.companyLogo` into a `companies` table referenced
/// by `jobs.companyId`.
///
/// When one name appears with several logos, the logo of the lowest job id that
/// has one wins. Reverting copies each company's single logo back to all its jobs.
pub struct Migration;

impl super::Migration for Migration {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &'static str {
        "normalize_companies"
    }

    fn up(&self, tx: &Transaction) -> Result<()> {
        tx.execute_batch(
            r#"
            CREATE TABLE companies (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                about TEXT,
                logo TEXT,
                createdAt TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updatedAt TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE UNIQUE INDEX companies_name_unique ON companies(name);
            -- which company row is the placeholder, whatever its name
            CREATE TABLE company_placeholder (
                company_id INTEGER PRIMARY KEY REFERENCES companies(id)
            );
            "#,
        )?;

        let companies = distinct_companies(tx)?;
        let mut ids: HashMap<String, i64> = HashMap::new();
        for (name, logo) in &companies {
            tx.execute(
                "INSERT INTO companies (name, logo) VALUES (?1, ?2)",
                params![name, logo],
            )?;
            ids.insert(name.clone(), tx.last_insert_rowid());
        }
        log::debug!("Extracted {} companies from jobs", ids.len());

        schema::add_column(tx, "jobs", "companyId", "INTEGER REFERENCES companies(id)")?;

        for (name, id) in &ids {
            tx.execute(
                "UPDATE jobs SET companyId = ?1 WHERE company = ?2",
                params![id, name],
            )?;
        }

        let orphans: i64 =
            tx.query_row("SELECT COUNT(*) FROM jobs WHERE company IS NULL", [], |row| {
                row.get(0)
            })?;
        if orphans > 0 {
            let name = free_placeholder_name(&ids);
            log::warn!("{} jobs have no company, attaching them to '{}'", orphans, name);
            tx.execute("INSERT INTO companies (name) VALUES (?1)", [&name])?;
            let id = tx.last_insert_rowid();
            tx.execute("INSERT INTO company_placeholder (company_id) VALUES (?1)", [id])?;
            tx.execute("UPDATE jobs SET companyId = ?1 WHERE company IS NULL", [id])?;
        }

        // Only tighten once every row has been backfilled.
        schema::rebuild_table(tx, "jobs", |def| {
            def.column_mut("companyId")?.info.not_null = true;
            Ok(())
        })?;
        tx.execute("CREATE INDEX jobs_company_id_idx ON jobs(companyId)", [])?;

        schema::drop_column(tx, "jobs", "company")?;
        schema::drop_column(tx, "jobs", "companyLogo")?;
        Ok(())
    }

    fn down(&self, tx: &Transaction) -> Result<()> {
        schema::add_column(tx, "jobs", "company", "TEXT")?;
        schema::add_column(tx, "jobs", "companyLogo", "TEXT")?;

        tx.execute(
            r#"
            UPDATE jobs SET
                company = (SELECT c.name FROM companies c WHERE c.id = jobs.companyId),
                companyLogo = (SELECT c.logo FROM companies c WHERE c.id = jobs.companyId)
            "#,
            [],
        )?;

        let placeholder: Option<i64> = tx
            .query_row("SELECT company_id FROM company_placeholder", [], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(id) = placeholder {
            tx.execute(
                "UPDATE jobs SET company = NULL, companyLogo = NULL WHERE companyId = ?1",
                [id],
            )?;
        }
        tx.execute("DROP TABLE company_placeholder", [])?;

        tx.execute("DROP INDEX IF EXISTS jobs_company_id_idx", [])?;
        // companyId carries a foreign key, which SQLite cannot drop in place
        schema::rebuild_table(tx, "jobs", |def| {
            def.remove_column("companyId");
            Ok(())
        })?;
        tx.execute("DROP TABLE companies", [])?;
        Ok(())
    }
}

fn free_placeholder_name(taken: &HashMap<String, i64>) -> String {
    let mut name = UNASSIGNED_COMPANY.to_string();
    let mut n = 2;
    while taken.contains_key(&name) {
        name = format!("{} {}", UNASSIGNED_COMPANY, n);
        n += 1;
    }
    name
}

/// Distinct company names in first-seen order, each with the first non-null logo.
fn distinct_companies(tx: &Transaction) -> Result<Vec<(String, Option<String>)>> {
    let mut stmt = tx.prepare(
        "SELECT company, companyLogo FROM jobs WHERE company IS NOT NULL ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
    })?;

    let mut companies: Vec<(String, Option<String>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let (name, logo) = row?;
        match index.get(&name) {
            Some(&i) => {
                let existing = &mut companies[i].1;
                if existing.is_none() {
                    *existing = logo;
                } else if logo.is_some() && *existing != logo {
                    log::warn!("Company '{}' has conflicting logos, keeping the first", name);
                }
            }
            None => {
                index.insert(name.clone(), companies.len());
                companies.push((name, logo));
            }
        }
    }
    Ok(companies)
}

#[cfg(test)]
mod tests {
    use super::super::{schema, Migrator};
    use super::UNASSIGNED_COMPANY;
    use rusqlite::{params, Connection};

    const TRICKY: &str = "O'Reilly \"Media\"; DROP TABLE jobs; --";

    fn seeded() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON").unwrap();
        let migrator = Migrator::standard().unwrap();
        migrator.up(&mut conn, Some(1)).unwrap();

        let rows: [(i64, Option<&str>, Option<&str>); 6] = [
            (1, Some("Acme"), Some("acme.png")),
            (2, Some("Globex"), None),
            (3, Some("Acme"), Some("acme-old.png")),
            (4, Some("Globex"), Some("globex.png")),
            (5, Some(TRICKY), Some("oreilly.png")),
            (6, None, None),
        ];
        for (id, company, logo) in rows {
            conn.execute(
                "INSERT INTO jobs (id, title, company, companyLogo) VALUES (?1, ?2, ?3, ?4)",
                params![id, format!("Job {}", id), company, logo],
            )
            .unwrap();
        }
        migrator.up(&mut conn, Some(2)).unwrap();
        conn
    }

    fn company_of(conn: &Connection, job: i64) -> (String, Option<String>) {
        conn.query_row(
            "SELECT c.name, c.logo FROM jobs j JOIN companies c ON c.id = j.companyId WHERE j.id = ?1",
            [job],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap()
    }

    #[test]
    fn test_one_company_row_per_distinct_name() {
        let conn = seeded();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM companies", [], |r| r.get(0))
            .unwrap();
        // Acme, Globex, the tricky one and the placeholder
        assert_eq!(count, 4);
        assert!(schema::table_exists(&conn, "jobs").unwrap());
    }

    #[test]
    fn test_every_job_resolves_to_its_original_company() {
        let conn = seeded();
        assert_eq!(company_of(&conn, 1), ("Acme".to_string(), Some("acme.png".to_string())));
        assert_eq!(company_of(&conn, 3).0, "Acme");
        // first non-null logo wins
        assert_eq!(company_of(&conn, 2), ("Globex".to_string(), Some("globex.png".to_string())));
        assert_eq!(company_of(&conn, 5).0, TRICKY);
        assert_eq!(company_of(&conn, 6).0, UNASSIGNED_COMPANY);
    }

    #[test]
    fn test_company_id_is_required_and_enforced() {
        let conn = seeded();
        let cols = schema::columns(&conn, "jobs").unwrap();
        let company_id = cols.iter().find(|c| c.name == "companyId").unwrap();
        assert!(company_id.not_null);
        assert!(!cols.iter().any(|c| c.name == "company" || c.name == "companyLogo"));

        assert!(conn
            .execute("INSERT INTO jobs (title) VALUES ('no company')", [])
            .is_err());
        assert!(conn
            .execute("INSERT INTO jobs (title, companyId) VALUES ('ghost', 999)", [])
            .is_err());
    }

    #[test]
    fn test_company_names_are_unique() {
        let conn = seeded();
        assert!(conn
            .execute("INSERT INTO companies (name) VALUES ('Acme')", [])
            .is_err());
    }

    #[test]
    fn test_down_restores_denormalized_columns() {
        let mut conn = seeded();
        Migrator::standard().unwrap().down(&mut conn, 1).unwrap();

        assert!(!schema::table_exists(&conn, "companies").unwrap());
        assert!(!schema::has_column(&conn, "jobs", "companyId").unwrap());

        let row = |id: i64| -> (Option<String>, Option<String>) {
            conn.query_row(
                "SELECT company, companyLogo FROM jobs WHERE id = ?1",
                [id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap()
        };
        assert_eq!(row(1), (Some("Acme".into()), Some("acme.png".into())));
        // the discarded logo comes back as the company's single logo
        assert_eq!(row(3), (Some("Acme".into()), Some("acme.png".into())));
        assert_eq!(row(5).0.as_deref(), Some(TRICKY));
        assert_eq!(row(6), (None, None));
    }

    #[test]
    fn test_real_company_named_like_the_placeholder() {
        let mut conn = Connection::open_in_memory().unwrap();
        let migrator = Migrator::standard().unwrap();
        migrator.up(&mut conn, Some(1)).unwrap();
        conn.execute_batch(
            "INSERT INTO jobs (id, title, company) VALUES (1, 'a', '(unassigned)');
             INSERT INTO jobs (id, title, company) VALUES (2, 'b', NULL);",
        )
        .unwrap();
        migrator.up(&mut conn, Some(2)).unwrap();

        assert_eq!(company_of(&conn, 1).0, UNASSIGNED_COMPANY);
        assert_eq!(company_of(&conn, 2).0, format!("{} 2", UNASSIGNED_COMPANY));

        migrator.down(&mut conn, 1).unwrap();
        let company = |id: i64| -> Option<String> {
            conn.query_row("SELECT company FROM jobs WHERE id = ?1", [id], |r| r.get(0))
                .unwrap()
        };
        assert_eq!(company(1).as_deref(), Some(UNASSIGNED_COMPANY));
        assert_eq!(company(2), None);
    }

    #[test]
    fn test_empty_jobs_table_normalizes_cleanly() {
        let mut conn = Connection::open_in_memory().unwrap();
        let migrator = Migrator::standard().unwrap();
        migrator.up(&mut conn, Some(2)).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM companies", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
