use anyhow::{bail, Context, Result};
use rusqlite::{params, params_from_iter, Connection};
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::filters::{is_all, ALL};
use crate::migrate::Migrator;
use crate::models::{Book, Company, Gender, Job, NewJob};

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

/// Job list filter; every field set to [`ALL`] matches everything.
#[derive(Debug, Clone)]
pub struct JobFilter {
    pub job_type: String,
    pub status: String,
    pub gender: String,
    pub company: Option<String>,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            job_type: ALL.to_string(),
            status: ALL.to_string(),
            gender: ALL.to_string(),
            company: None,
        }
    }
}

const JOB_COLUMNS: &str = "j.id, j.title, j.companyId, c.name, j.job_type, j.status,
    j.duties_and_responsibilities, j.job_requirements, j.province_ids, j.contract_type,
    j.contract_duration, j.contract_extensible, j.probation_period, j.vacancy_count,
    j.salary_range, j.experience, j.gender, j.closing_date, j.posting_date,
    j.reference_number, j.createdAt, j.updatedAt";

impl Database {
    pub fn open(config: &AppConfig) -> Result<Self> {
        Self::open_at(&config.db_path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn ensure_migrated(&self, migrator: &Migrator) -> Result<()> {
        let pending = migrator.pending(&self.conn)?;
        if !pending.is_empty() {
            bail!(
                "Database schema is out of date ({} pending migrations). Run 'portal migrate up' first.",
                pending.len()
            );
        }
        Ok(())
    }

    // --- Company operations ---

    pub fn add_company(&self, name: &str, about: Option<&str>, logo: Option<&str>) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO companies (name, about, logo) VALUES (?1, ?2, ?3)",
                params![name, about, logo],
            )
            .with_context(|| format!("Failed to add company '{}'", name))?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_or_create_company(&self, name: &str) -> Result<i64> {
        match self.get_company_by_name(name)? {
            Some(company) => Ok(company.id),
            None => self.add_company(name, None, None),
        }
    }

    pub fn get_company_by_name(&self, name: &str) -> Result<Option<Company>> {
        let result = self.conn.query_row(
            "SELECT id, name, about, logo, createdAt, updatedAt FROM companies WHERE name = ?1",
            [name],
            Self::row_to_company,
        );
        match result {
            Ok(company) => Ok(Some(company)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_companies(&self) -> Result<Vec<Company>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, about, logo, createdAt, updatedAt FROM companies ORDER BY name",
        )?;
        let rows = stmt.query_map([], Self::row_to_company)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list companies")
    }

    fn row_to_company(row: &rusqlite::Row) -> rusqlite::Result<Company> {
        Ok(Company {
            id: row.get(0)?,
            name: row.get(1)?,
            about: row.get(2)?,
            logo: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    // --- Job operations ---

    pub fn add_job(&self, job: &NewJob) -> Result<i64> {
        if job.title.trim().is_empty() {
            bail!("Job title must not be empty");
        }
        let company_id = self.get_or_create_company(&job.company)?;
        let province_ids = serde_json::to_string(&job.province_ids)?;

        self.conn.execute(
            "INSERT INTO jobs (title, companyId, job_type, status, duties_and_responsibilities,
                job_requirements, province_ids, contract_type, contract_duration,
                contract_extensible, probation_period, vacancy_count, salary_range, experience,
                gender, closing_date, posting_date, reference_number)
             VALUES (?1, ?2, ?3, COALESCE(?4, 'active'), ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                COALESCE(?12, 1), ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                job.title,
                company_id,
                job.job_type,
                job.status,
                job.duties_and_responsibilities,
                job.job_requirements,
                province_ids,
                job.contract_type,
                job.contract_duration,
                job.contract_extensible,
                job.probation_period,
                job.vacancy_count,
                job.salary_range,
                job.experience,
                job.gender.as_str(),
                job.closing_date,
                job.posting_date,
                job.reference_number,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_job(&self, id: i64) -> Result<Option<Job>> {
        let sql = format!(
            "SELECT {} FROM jobs j JOIN companies c ON j.companyId = c.id WHERE j.id = ?1",
            JOB_COLUMNS
        );
        let result = self.conn.query_row(&sql, [id], Self::row_to_job);
        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let mut sql = format!(
            "SELECT {} FROM jobs j JOIN companies c ON j.companyId = c.id WHERE 1=1",
            JOB_COLUMNS
        );
        let mut params: Vec<String> = vec![];

        for (column, value) in [
            ("j.job_type", &filter.job_type),
            ("j.status", &filter.status),
            ("j.gender", &filter.gender),
        ] {
            if !is_all(value) {
                sql.push_str(&format!(" AND {} = ?{}", column, params.len() + 1));
                params.push(value.clone());
            }
        }

        if let Some(company) = &filter.company {
            sql.push_str(&format!(" AND LOWER(c.name) = LOWER(?{})", params.len() + 1));
            params.push(company.clone());
        }

        sql.push_str(" ORDER BY j.createdAt DESC, j.id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), Self::row_to_job)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list jobs")
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let province_ids: String = row.get(8)?;
        let province_ids: Vec<i64> = serde_json::from_str(&province_ids).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let gender: String = row.get(16)?;
        Ok(Job {
            id: row.get(0)?,
            title: row.get(1)?,
            company_id: row.get(2)?,
            company_name: row.get(3)?,
            job_type: row.get(4)?,
            status: row.get(5)?,
            duties_and_responsibilities: row.get(6)?,
            job_requirements: row.get(7)?,
            province_ids,
            contract_type: row.get(9)?,
            contract_duration: row.get(10)?,
            contract_extensible: row.get(11)?,
            probation_period: row.get(12)?,
            vacancy_count: row.get(13)?,
            salary_range: row.get(14)?,
            experience: row.get(15)?,
            gender: gender.parse().unwrap_or(Gender::Any),
            closing_date: row.get(17)?,
            posting_date: row.get(18)?,
            reference_number: row.get(19)?,
            created_at: row.get(20)?,
            updated_at: row.get(21)?,
        })
    }

    // --- Book operations ---

    pub fn add_book(
        &self,
        title: &str,
        author: Option<&str>,
        format: Option<&str>,
        language: Option<&str>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO books (title, author, format, language) VALUES (?1, ?2, ?3, ?4)",
            params![title, author, format, language],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_books(&self, status: &str) -> Result<Vec<Book>> {
        let mut sql = String::from(
            "SELECT id, title, author, format, language, status, createdAt, updatedAt FROM books",
        );
        if !is_all(status) {
            sql.push_str(" WHERE status = ?1");
        }
        sql.push_str(" ORDER BY title");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = if !is_all(status) {
            stmt.query_map([status], Self::row_to_book)?
        } else {
            stmt.query_map([], Self::row_to_book)?
        };
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list books")
    }

    fn row_to_book(row: &rusqlite::Row) -> rusqlite::Result<Book> {
        Ok(Book {
            id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            format: row.get(3)?,
            language: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}
