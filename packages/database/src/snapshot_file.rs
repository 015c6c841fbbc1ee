//! Snapshot CSV files.
//!
//! One comma-delimited file per role with a header row of field names.
//! Null cells are written as empty fields and empty fields read back as
//! null. Every value is kept as text, so numeric-looking strings survive a
//! round trip unchanged.

use std::path::Path;

use drift311_snapshot_models::Table;

use crate::DbError;

/// Writes `table` to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`DbError`] if the directory cannot be created or the write
/// fails.
pub fn write_table(path: &Path, table: &Table) -> Result<(), DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }
    writer.flush()?;

    log::debug!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

/// Reads a snapshot file written by [`write_table`].
///
/// # Errors
///
/// Returns [`DbError::MissingSnapshot`] if the file does not exist, or
/// [`DbError`] if it cannot be parsed.
pub fn read_table(path: &Path) -> Result<Table, DbError> {
    if !path.exists() {
        return Err(DbError::MissingSnapshot {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect(),
        );
    }

    Ok(Table::new(columns, rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(
            vec![
                "unique_key".into(),
                "descriptor".into(),
                "latitude".into(),
                "borough".into(),
            ],
            vec![
                vec![
                    Some("00123".into()),
                    Some("Loud Music, Party".into()),
                    Some("40.70".into()),
                    None,
                ],
                vec![
                    Some("2".into()),
                    Some("quote \" inside".into()),
                    None,
                    Some("QUEENS".into()),
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn round_trips_rows_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("311_recent.csv");

        write_table(&path, &sample()).unwrap();
        let loaded = read_table(&path).unwrap();

        assert_eq!(loaded, sample());
        assert_eq!(loaded.record(0).unwrap().get("unique_key"), Some(Some("00123")));
        assert_eq!(loaded.record(0).unwrap().get("latitude"), Some(Some("40.70")));
    }

    #[test]
    fn header_only_file_is_an_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let empty = Table::empty(vec!["a".into(), "b".into()]).unwrap();

        write_table(&path, &empty).unwrap();
        let loaded = read_table(&path).unwrap();

        assert!(loaded.is_empty());
        assert_eq!(loaded.columns(), ["a", "b"]);
    }

    #[test]
    fn overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.csv");

        write_table(&path, &sample()).unwrap();
        let smaller = Table::new(vec!["a".into()], vec![vec![Some("x".into())]]).unwrap();
        write_table(&path, &smaller).unwrap();

        assert_eq!(read_table(&path).unwrap(), smaller);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_table(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, DbError::MissingSnapshot { .. }));
    }
}
