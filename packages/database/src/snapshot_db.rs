//! `DuckDB` mirror of the snapshot files.
//!
//! Each run drops and recreates `raw.<entity>_<role>` with one `VARCHAR`
//! column per snapshot field. The database file is opened for the duration
//! of one write and closed again; a concurrent holder of the file makes the
//! open fail.

use std::path::Path;

use drift311_snapshot_models::{Role, Table};
use duckdb::Connection;

use crate::DbError;

/// Schema that holds the mirrored snapshot tables.
pub const RAW_SCHEMA: &str = "raw";

/// Number of rows per INSERT chunk.
const CHUNK_SIZE: usize = 1_000;

/// Opens (or creates) the analytical store.
///
/// # Errors
///
/// Returns [`DbError`] if the directory cannot be created or the file
/// cannot be opened (e.g. it is locked by another process).
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(&format!("CREATE SCHEMA IF NOT EXISTS {RAW_SCHEMA};"))?;
    Ok(conn)
}

/// Returns the unqualified table name for an entity and role.
///
/// # Errors
///
/// Returns [`DbError::InvalidIdentifier`] if `entity` is not a plain
/// identifier.
pub fn table_name(entity: &str, role: Role) -> Result<String, DbError> {
    let valid = !entity.is_empty()
        && entity
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(DbError::InvalidIdentifier {
            name: entity.to_string(),
        });
    }
    Ok(format!("{entity}_{role}"))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Drops and recreates `raw.<entity>_<role>` with the contents of `table`.
///
/// Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub fn replace_table(
    conn: &Connection,
    entity: &str,
    role: Role,
    table: &Table,
) -> Result<u64, DbError> {
    let name = table_name(entity, role)?;
    let qualified = format!("{RAW_SCHEMA}.{name}");
    let column_defs = table
        .columns()
        .iter()
        .map(|c| format!("{} VARCHAR", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");

    conn.execute_batch("BEGIN TRANSACTION")?;
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {qualified};
         CREATE TABLE {qualified} ({column_defs});"
    ))?;

    let width = table.columns().len();
    let placeholders = format!("({})", vec!["?"; width].join(", "));
    let mut total_inserted = 0u64;

    for chunk in table.rows().chunks(CHUNK_SIZE) {
        let mut sql = format!("INSERT INTO {qualified} VALUES ");
        for i in 0..chunk.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&placeholders);
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut param_idx = 1usize;
        for row in chunk {
            for cell in row {
                stmt.raw_bind_parameter(param_idx, cell.as_deref())?;
                param_idx += 1;
            }
        }

        let rows = stmt.raw_execute()?;
        total_inserted += u64::try_from(rows).unwrap_or(0);
    }

    conn.execute_batch("COMMIT")?;
    log::info!("Replaced {qualified} with {total_inserted} rows");
    Ok(total_inserted)
}

/// Reads a mirrored table back in insertion order.
///
/// # Errors
///
/// Returns [`DbError`] if the table does not exist or the query fails.
pub fn read_table(conn: &Connection, entity: &str, role: Role) -> Result<Table, DbError> {
    let name = table_name(entity, role)?;

    let mut stmt = conn.prepare(
        "SELECT column_name FROM information_schema.columns
         WHERE table_schema = ? AND table_name = ?
         ORDER BY ordinal_position",
    )?;
    let columns = stmt
        .query_map([RAW_SCHEMA, name.as_str()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    if columns.is_empty() {
        return Err(DbError::MissingTable {
            name: format!("{RAW_SCHEMA}.{name}"),
        });
    }

    let select_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {select_list} FROM {RAW_SCHEMA}.{name} ORDER BY rowid"
    ))?;
    let width = columns.len();
    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, Option<String>>(i))
                .collect::<Result<Vec<_>, _>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Table::new(columns, rows)?)
}

/// Opens the store at `path`, replaces one table per snapshot, and closes
/// the store again.
///
/// # Errors
///
/// Returns [`DbError`] if the store cannot be opened or any write fails.
pub fn mirror_tables(path: &Path, entity: &str, tables: &[(Role, &Table)]) -> Result<(), DbError> {
    let conn = open(path)?;
    for (role, table) in tables {
        replace_table(&conn, entity, *role, table)?;
    }
    drop(conn);
    log::info!("Wrote DuckDB at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(
            vec!["unique_key".into(), "borough".into(), "latitude".into()],
            vec![
                vec![Some("1".into()), Some("BRONX".into()), Some("40.8500".into())],
                vec![Some("2".into()), None, None],
            ],
        )
        .unwrap()
    }

    #[test]
    fn rejects_unsafe_entity_names() {
        assert!(table_name("nyc311", Role::Recent).is_ok());
        assert!(matches!(
            table_name("x; DROP TABLE y", Role::Hist),
            Err(DbError::InvalidIdentifier { .. })
        ));
        assert_eq!(table_name("nyc311", Role::Hist).unwrap(), "nyc311_hist");
    }

    #[test]
    fn replaces_rather_than_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duckdb").join("nyc.duckdb");

        mirror_tables(&path, "nyc311", &[(Role::Recent, &sample())]).unwrap();
        mirror_tables(&path, "nyc311", &[(Role::Recent, &sample())]).unwrap();

        let conn = open(&path).unwrap();
        let stored = read_table(&conn, "nyc311", Role::Recent).unwrap();
        assert_eq!(stored, sample());
    }

    #[test]
    fn roles_are_independent_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nyc.duckdb");
        let hist = Table::new(vec!["unique_key".into()], vec![vec![Some("9".into())]]).unwrap();

        mirror_tables(&path, "nyc311", &[(Role::Recent, &sample()), (Role::Hist, &hist)])
            .unwrap();

        let conn = open(&path).unwrap();
        assert_eq!(read_table(&conn, "nyc311", Role::Recent).unwrap().len(), 2);
        assert_eq!(read_table(&conn, "nyc311", Role::Hist).unwrap(), hist);
    }

    #[test]
    fn missing_table_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open(&dir.path().join("x.duckdb")).unwrap();
        assert!(matches!(
            read_table(&conn, "nyc311", Role::Recent),
            Err(DbError::MissingTable { .. })
        ));
    }
}
