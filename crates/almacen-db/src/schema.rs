use almacen_common::{Error, Result};
use rusqlite::Connection;

/// One column of a live table, as reported by the SQLite catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub default_value: Option<String>,
    pub nullable: bool,
}

/// Whether `table` exists in the live schema.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.query_row(
        "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )
    .map_err(|e| Error::SchemaQuery(format!("table lookup for {table}: {e}")))
}

/// Whether an index named `name` exists.
pub fn index_exists(conn: &Connection, name: &str) -> Result<bool> {
    conn.query_row(
        "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'index' AND name = ?1",
        [name],
        |row| row.get(0),
    )
    .map_err(|e| Error::SchemaQuery(format!("index lookup for {name}: {e}")))
}

/// The live column set of `table`, freshly read from the catalog.
///
/// Errors if the table does not exist. Callers that expect the table to be
/// absent (a migration whose first action is creating it) must check
/// `table_exists` first.
pub fn columns_of(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn
        .prepare("SELECT name, type, \"notnull\", dflt_value FROM pragma_table_info(?1)")
        .map_err(|e| Error::SchemaQuery(format!("failed to prepare column query: {e}")))?;

    let rows = stmt
        .query_map([table], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                declared_type: row.get(1)?,
                nullable: row.get::<_, i64>(2)? == 0,
                default_value: row.get(3)?,
            })
        })
        .map_err(|e| Error::SchemaQuery(format!("failed to read columns of {table}: {e}")))?;

    let mut columns = Vec::new();
    for row in rows {
        columns
            .push(row.map_err(|e| Error::SchemaQuery(format!("failed to read column row: {e}")))?);
    }

    // pragma_table_info reports nothing at all for a missing table.
    if columns.is_empty() && !table_exists(conn, table)? {
        return Err(Error::SchemaQuery(format!("no such table: {table}")));
    }

    Ok(columns)
}

/// Whether `table` has a column named `column`. False if the table itself
/// is missing.
pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    if !table_exists(conn, table)? {
        return Ok(false);
    }
    Ok(columns_of(conn, table)?.iter().any(|c| c.name == column))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn_with_table() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE articulos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nombre TEXT NOT NULL,
                precio REAL DEFAULT 0.0
            );
            CREATE INDEX idx_articulos_nombre ON articulos(nombre);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn table_exists_reflects_catalog() {
        let conn = conn_with_table();
        assert!(table_exists(&conn, "articulos").unwrap());
        assert!(!table_exists(&conn, "no_such_table").unwrap());
    }

    #[test]
    fn index_exists_reflects_catalog() {
        let conn = conn_with_table();
        assert!(index_exists(&conn, "idx_articulos_nombre").unwrap());
        assert!(!index_exists(&conn, "idx_missing").unwrap());
    }

    #[test]
    fn columns_of_reports_names_types_and_defaults() {
        let conn = conn_with_table();
        let columns = columns_of(&conn, "articulos").unwrap();
        assert_eq!(columns.len(), 3);

        let nombre = columns.iter().find(|c| c.name == "nombre").unwrap();
        assert_eq!(nombre.declared_type, "TEXT");
        assert!(!nombre.nullable);
        assert!(nombre.default_value.is_none());

        let precio = columns.iter().find(|c| c.name == "precio").unwrap();
        assert!(precio.nullable);
        assert_eq!(precio.default_value.as_deref(), Some("0.0"));
    }

    #[test]
    fn columns_of_missing_table_is_an_error() {
        let conn = conn_with_table();
        let result = columns_of(&conn, "fantasma");
        assert!(matches!(result, Err(Error::SchemaQuery(_))));
    }

    #[test]
    fn column_exists_handles_missing_table_and_column() {
        let conn = conn_with_table();
        assert!(column_exists(&conn, "articulos", "nombre").unwrap());
        assert!(!column_exists(&conn, "articulos", "sku").unwrap());
        assert!(!column_exists(&conn, "fantasma", "nombre").unwrap());
    }
}
