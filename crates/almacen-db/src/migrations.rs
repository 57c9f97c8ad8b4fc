//! The migration registry: every schema change ever shipped, in order.
//!
//! Table and column names are inherited from the legacy application
//! (Spanish, camelCase columns). Databases written by that application must
//! keep working across upgrades, so shipped entries are append-only: never
//! renumbered, edited, or removed.

use almacen_common::{Error, Result};
use rusqlite::Connection;
use tracing::debug;

use crate::schema;

/// What an `up` did to the live schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// At least one DDL statement was issued.
    Applied,
    /// Every target change was already present; nothing was issued.
    AlreadyPresent,
}

pub type UpFn = fn(&Connection) -> Result<MigrationOutcome>;

/// The reverse operation of a migration.
#[derive(Debug, Clone, Copy)]
pub enum Down {
    /// An executable inverse.
    Run(fn(&Connection) -> Result<()>),
    /// Reverting is a logged no-op; the string states what a real revert
    /// would have removed. SQLite cannot drop columns from the shipped
    /// tables, and the base tables hold live inventory data.
    Unsupported(&'static str),
}

/// A named, versioned unit of schema change. The numeric prefix of `name`
/// is the ordinal fixing its position in the apply order.
#[derive(Debug, Clone)]
pub struct Migration {
    pub name: &'static str,
    pub up: UpFn,
    pub down: Down,
}

/// The complete shipped sequence. The runner orders by ordinal, so the
/// declaration order here carries no meaning.
pub fn registry() -> &'static [Migration] {
    &[
        Migration {
            name: "001_base_tables",
            up: base_tables_up,
            down: Down::Unsupported(
                "dropping usuarios and productos_offline would destroy live data",
            ),
        },
        Migration {
            name: "002_usuarios_limite_colaboradores",
            up: usuarios_limite_colaboradores_up,
            down: Down::Unsupported("SQLite cannot drop usuarios.limiteColaboradores"),
        },
        Migration {
            name: "003_productos_offline_tracking",
            up: productos_offline_tracking_up,
            down: Down::Unsupported(
                "SQLite cannot drop cantidad, sku, codigoBarras from productos_offline",
            ),
        },
        Migration {
            name: "004_movimientos",
            up: movimientos_up,
            down: Down::Unsupported("dropping movimientos would erase the stock audit trail"),
        },
        Migration {
            name: "005_productos_offline_sku_index",
            up: productos_offline_sku_index_up,
            down: Down::Unsupported("imports rely on sku uniqueness once it is enforced"),
        },
    ]
}

fn base_tables_up(conn: &Connection) -> Result<MigrationOutcome> {
    let mut changed = create_table_if_absent(
        conn,
        "usuarios",
        "CREATE TABLE usuarios (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            rol TEXT NOT NULL DEFAULT 'vendedor',
            creadoEn TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )?;
    changed |= create_table_if_absent(
        conn,
        "productos_offline",
        "CREATE TABLE productos_offline (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL
        )",
    )?;
    Ok(outcome(changed))
}

fn usuarios_limite_colaboradores_up(conn: &Connection) -> Result<MigrationOutcome> {
    let changed =
        add_column_if_absent(conn, "usuarios", "limiteColaboradores", "INTEGER DEFAULT 5")?;
    Ok(outcome(changed))
}

fn productos_offline_tracking_up(conn: &Connection) -> Result<MigrationOutcome> {
    let mut changed =
        add_column_if_absent(conn, "productos_offline", "cantidad", "INTEGER DEFAULT 1")?;
    changed |= add_column_if_absent(conn, "productos_offline", "sku", "TEXT")?;
    changed |= add_column_if_absent(conn, "productos_offline", "codigoBarras", "TEXT")?;
    Ok(outcome(changed))
}

fn movimientos_up(conn: &Connection) -> Result<MigrationOutcome> {
    let mut changed = create_table_if_absent(
        conn,
        "movimientos",
        "CREATE TABLE movimientos (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            productoId INTEGER NOT NULL REFERENCES productos_offline(id) ON DELETE CASCADE,
            tipo TEXT NOT NULL,
            cantidad INTEGER NOT NULL,
            creadoEn TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )?;
    changed |= create_index_if_absent(
        conn,
        "idx_movimientos_producto",
        "CREATE INDEX idx_movimientos_producto ON movimientos(productoId, creadoEn)",
    )?;
    Ok(outcome(changed))
}

fn productos_offline_sku_index_up(conn: &Connection) -> Result<MigrationOutcome> {
    let changed = create_index_if_absent(
        conn,
        "idx_productos_offline_sku",
        "CREATE UNIQUE INDEX idx_productos_offline_sku
         ON productos_offline(sku) WHERE sku IS NOT NULL",
    )?;
    Ok(outcome(changed))
}

fn outcome(changed: bool) -> MigrationOutcome {
    if changed {
        MigrationOutcome::Applied
    } else {
        MigrationOutcome::AlreadyPresent
    }
}

/// Create `table` unless the catalog already has it. Returns whether DDL ran.
pub fn create_table_if_absent(conn: &Connection, table: &str, ddl: &str) -> Result<bool> {
    if schema::table_exists(conn, table)? {
        debug!("table {table} already present");
        return Ok(false);
    }
    conn.execute(ddl, [])
        .map_err(|e| Error::Database(format!("failed to create table {table}: {e}")))?;
    Ok(true)
}

/// Add `column` to `table` unless it is already there. Returns whether DDL
/// ran.
///
/// Presence is probed through the catalog, never inferred from engine error
/// text. Caveat: a column of the same name added earlier for an unrelated
/// purpose would short-circuit this probe. The append-only registry makes
/// that a review-time concern, and the runner's ledger narrows the window.
pub fn add_column_if_absent(
    conn: &Connection,
    table: &str,
    column: &str,
    declaration: &str,
) -> Result<bool> {
    if !schema::table_exists(conn, table)? {
        return Err(Error::SchemaQuery(format!(
            "cannot add {column} to missing table {table}"
        )));
    }
    if schema::column_exists(conn, table, column)? {
        debug!("column {table}.{column} already present");
        return Ok(false);
    }
    conn.execute(
        &format!("ALTER TABLE {table} ADD COLUMN {column} {declaration}"),
        [],
    )
    .map_err(|e| Error::Database(format!("failed to add column {table}.{column}: {e}")))?;
    Ok(true)
}

/// Create an index unless the catalog already has one of that name.
/// Returns whether DDL ran.
pub fn create_index_if_absent(conn: &Connection, name: &str, ddl: &str) -> Result<bool> {
    if schema::index_exists(conn, name)? {
        debug!("index {name} already present");
        return Ok(false);
    }
    conn.execute(ddl, [])
        .map_err(|e| Error::Database(format!("failed to create index {name}: {e}")))?;
    Ok(true)
}
