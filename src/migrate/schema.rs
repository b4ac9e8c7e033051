//! Column-level schema helpers over SQLite.
//!
//! SQLite can add, drop and rename columns in place, but changing a column's type,
//! nullability or foreign keys needs the table to be rebuilt; [`rebuild_table`] does
//! that while carrying data, defaults, the primary key, foreign keys and indexes.
//! CHECK constraints are not carried over by a rebuild.

use anyhow::{bail, Context, Result};
use rusqlite::Connection;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub table: String,
    pub to: String,
    pub on_delete: String,
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub info: ColumnInfo,
    /// Expression over the old table used to fill this column. `None` leaves the
    /// column to its default.
    pub copy_from: Option<String>,
}

impl ColumnDef {
    pub fn new(name: &str, decl_type: &str) -> Self {
        Self {
            info: ColumnInfo {
                name: name.to_string(),
                decl_type: decl_type.to_string(),
                not_null: false,
                default: None,
                primary_key: false,
            },
            copy_from: None,
        }
    }

    pub fn copy_from(mut self, expr: &str) -> Self {
        self.copy_from = Some(expr.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct TableDef {
    pub columns: Vec<ColumnDef>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableDef {
    pub fn column_mut(&mut self, name: &str) -> Result<&mut ColumnDef> {
        self.columns
            .iter_mut()
            .find(|c| c.info.name == name)
            .with_context(|| format!("No column named '{}'", name))
    }

    pub fn remove_column(&mut self, name: &str) {
        self.columns.retain(|c| c.info.name != name);
        self.foreign_keys.retain(|fk| fk.column != name);
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(
        r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid"#,
    )?;
    let rows = stmt.query_map([table], |row| {
        Ok(ColumnInfo {
            name: row.get(0)?,
            decl_type: row.get(1)?,
            not_null: row.get(2)?,
            default: row.get(3)?,
            primary_key: row.get::<_, i64>(4)? > 0,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read columns of {}", table))
}

pub fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    Ok(columns(conn, table)?.iter().any(|c| c.name == column))
}

pub fn foreign_keys(conn: &Connection, table: &str) -> Result<Vec<ForeignKey>> {
    let mut stmt = conn.prepare(
        r#"SELECT "from", "table", "to", on_delete FROM pragma_foreign_key_list(?1) ORDER BY id, seq"#,
    )?;
    let rows = stmt.query_map([table], |row| {
        Ok(ForeignKey {
            column: row.get(0)?,
            table: row.get(1)?,
            to: row.get::<_, Option<String>>(2)?.unwrap_or_else(|| "id".to_string()),
            on_delete: row.get(3)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read foreign keys of {}", table))
}

pub fn add_column(conn: &Connection, table: &str, column: &str, decl: &str) -> Result<()> {
    let sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(table),
        quote_ident(column),
        decl
    );
    conn.execute(&sql, [])
        .with_context(|| format!("Failed to add column {}.{}", table, column))?;
    Ok(())
}

pub fn drop_column(conn: &Connection, table: &str, column: &str) -> Result<()> {
    let sql = format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_ident(table),
        quote_ident(column)
    );
    conn.execute(&sql, [])
        .with_context(|| format!("Failed to drop column {}.{}", table, column))?;
    Ok(())
}

pub fn rename_column(conn: &Connection, table: &str, from: &str, to: &str) -> Result<()> {
    let sql = format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        quote_ident(table),
        quote_ident(from),
        quote_ident(to)
    );
    conn.execute(&sql, [])
        .with_context(|| format!("Failed to rename column {}.{} to {}", table, from, to))?;
    Ok(())
}

/// Recreate `table` with the definition produced by `edit`, copying rows across.
/// Foreign-key enforcement must be off while this runs.
pub fn rebuild_table<F>(conn: &Connection, table: &str, edit: F) -> Result<()>
where
    F: FnOnce(&mut TableDef) -> Result<()>,
{
    if !table_exists(conn, table)? {
        bail!("Cannot rebuild missing table {}", table);
    }

    let mut def = TableDef {
        columns: columns(conn, table)?
            .into_iter()
            .map(|info| {
                let copy = quote_ident(&info.name);
                ColumnDef {
                    info,
                    copy_from: Some(copy),
                }
            })
            .collect(),
        foreign_keys: foreign_keys(conn, table)?,
    };
    let indexes: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT sql FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL",
        )?;
        let rows = stmt.query_map([table], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    edit(&mut def)?;
    if def.columns.is_empty() {
        bail!("Rebuild of {} would leave it without columns", table);
    }

    let tmp = format!("{}__rebuild", table);
    conn.execute(&create_table_sql(&tmp, &def), [])
        .with_context(|| format!("Failed to create rebuilt table for {}", table))?;

    let copied: Vec<&ColumnDef> = def.columns.iter().filter(|c| c.copy_from.is_some()).collect();
    if !copied.is_empty() {
        let targets = copied
            .iter()
            .map(|c| quote_ident(&c.info.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sources = copied
            .iter()
            .filter_map(|c| c.copy_from.clone())
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            quote_ident(&tmp),
            targets,
            sources,
            quote_ident(table)
        );
        conn.execute(&sql, [])
            .with_context(|| format!("Failed to copy rows of {}", table))?;
    }

    conn.execute(&format!("DROP TABLE {}", quote_ident(table)), [])?;
    conn.execute(
        &format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_ident(&tmp),
            quote_ident(table)
        ),
        [],
    )?;

    for sql in indexes {
        conn.execute(&sql, [])
            .with_context(|| format!("Failed to recreate index on {}: {}", table, sql))?;
    }

    Ok(())
}

fn create_table_sql(table: &str, def: &TableDef) -> String {
    let mut parts: Vec<String> = def
        .columns
        .iter()
        .map(|c| {
            let mut col = format!("{} {}", quote_ident(&c.info.name), c.info.decl_type);
            if c.info.primary_key {
                col.push_str(" PRIMARY KEY");
            }
            if c.info.not_null {
                col.push_str(" NOT NULL");
            }
            if let Some(default) = &c.info.default {
                col.push_str(" DEFAULT ");
                col.push_str(&render_default(default));
            }
            col
        })
        .collect();

    for fk in &def.foreign_keys {
        parts.push(format!(
            "FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {}",
            quote_ident(&fk.column),
            quote_ident(&fk.table),
            quote_ident(&fk.to),
            fk.on_delete
        ));
    }

    format!("CREATE TABLE {} ({})", quote_ident(table), parts.join(", "))
}

// pragma_table_info strips the parentheses off expression defaults
fn render_default(default: &str) -> String {
    let upper = default.to_uppercase();
    let is_literal = default.starts_with('\'')
        || default.starts_with('"')
        || default.starts_with('(')
        || default.parse::<f64>().is_ok()
        || matches!(
            upper.as_str(),
            "NULL" | "TRUE" | "FALSE" | "CURRENT_TIMESTAMP" | "CURRENT_DATE" | "CURRENT_TIME"
        );
    if is_literal {
        default.to_string()
    } else {
        format!("({})", default)
    }
}
