//! Applies the migration registry to an open database handle.
//!
//! Runs once at process bootstrap, before anything can query the database.
//! The handle is constructed and owned by the caller and passed in
//! explicitly; the runner holds no state of its own.

use almacen_common::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::migrations::{Down, Migration, MigrationOutcome};
use crate::schema;

/// Summary of one full `apply_all` pass.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Migrations whose `up` issued DDL during this pass.
    pub applied: Vec<&'static str>,
    /// Migrations skipped because their changes were already present,
    /// whether recorded in the ledger or probed from the catalog.
    pub already_present: Vec<&'static str>,
}

/// Ledger view of one migration, for diagnostics.
#[derive(Debug)]
pub struct MigrationStatus {
    pub name: &'static str,
    pub recorded: bool,
}

const LEDGER_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    name TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

/// Apply every pending migration in ascending ordinal order.
///
/// Safe to run on every process start: each `up` probes the catalog before
/// issuing DDL, and the ledger short-circuits migrations recorded by an
/// earlier pass. Databases written by the legacy application carry no
/// ledger; their first pass falls through to the structural probes.
///
/// The first failing migration aborts the rest with no rollback (SQLite
/// cannot reliably roll back DDL), leaving the database partially migrated.
/// Fixing the cause and restarting re-enters the sequence from the top.
pub fn apply_all(conn: &Connection, migrations: &[Migration]) -> Result<RunReport> {
    let ordered = ordered(migrations)?;

    conn.execute(LEDGER_DDL, [])
        .map_err(|e| Error::Database(format!("failed to ensure migration ledger: {e}")))?;

    let mut report = RunReport::default();
    for migration in ordered {
        if is_recorded(conn, migration.name)? {
            debug!("migration {} recorded in ledger, skipping", migration.name);
            report.already_present.push(migration.name);
            continue;
        }

        match (migration.up)(conn) {
            Ok(MigrationOutcome::Applied) => {
                info!("applied migration {}", migration.name);
                report.applied.push(migration.name);
            }
            Ok(MigrationOutcome::AlreadyPresent) => {
                debug!("migration {} already present in schema", migration.name);
                report.already_present.push(migration.name);
            }
            Err(e @ Error::SchemaQuery(_)) => return Err(e),
            Err(e) => {
                return Err(Error::MigrationFailed {
                    name: migration.name.to_string(),
                    cause: e.to_string(),
                });
            }
        }

        record(conn, migration.name)?;
    }

    info!(
        "schema up to date: {} applied, {} already present",
        report.applied.len(),
        report.already_present.len()
    );
    Ok(report)
}

/// Order migrations by the ordinal embedded in their names, rejecting
/// malformed names and duplicate ordinals before anything is applied.
pub fn ordered<'a>(migrations: &'a [Migration]) -> Result<Vec<&'a Migration>> {
    let mut with_ordinals = Vec::with_capacity(migrations.len());
    for migration in migrations {
        with_ordinals.push((ordinal_of(migration.name)?, migration));
    }
    with_ordinals.sort_by_key(|(ordinal, _)| *ordinal);

    for pair in with_ordinals.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(Error::Registry(format!(
                "duplicate ordinal {} in {} and {}",
                pair[0].0, pair[0].1.name, pair[1].1.name
            )));
        }
    }

    Ok(with_ordinals.into_iter().map(|(_, m)| m).collect())
}

/// Ledger view of the registry. Reads only; applies nothing.
pub fn status(conn: &Connection, migrations: &[Migration]) -> Result<Vec<MigrationStatus>> {
    let have_ledger = schema::table_exists(conn, "schema_migrations")?;

    ordered(migrations)?
        .into_iter()
        .map(|migration| {
            let recorded = have_ledger && is_recorded(conn, migration.name)?;
            Ok(MigrationStatus {
                name: migration.name,
                recorded,
            })
        })
        .collect()
}

/// Execute a migration's `down`. Never called by `apply_all`; reverting is
/// an explicit operator action.
///
/// An `Ok` return does not imply the schema changed: `Down::Unsupported`
/// logs the limitation and leaves the database untouched.
pub fn revert(conn: &Connection, migration: &Migration) -> Result<()> {
    match migration.down {
        Down::Run(down) => {
            info!("reverting migration {}", migration.name);
            down(conn)?;
            unrecord(conn, migration.name)
        }
        Down::Unsupported(reason) => {
            warn!(
                "migration {} cannot be reverted: {}",
                migration.name, reason
            );
            Ok(())
        }
    }
}

fn ordinal_of(name: &str) -> Result<u32> {
    name.split('_')
        .next()
        .unwrap_or(name)
        .parse()
        .map_err(|_| {
            Error::Registry(format!(
                "migration name {name} does not start with a numeric ordinal"
            ))
        })
}

fn is_recorded(conn: &Connection, name: &str) -> Result<bool> {
    conn.query_row(
        "SELECT count(*) > 0 FROM schema_migrations WHERE name = ?1",
        [name],
        |row| row.get(0),
    )
    .map_err(|e| Error::Database(format!("failed to read migration ledger: {e}")))
}

fn record(conn: &Connection, name: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (name) VALUES (?1)",
        [name],
    )
    .map_err(|e| Error::Database(format!("failed to record migration {name}: {e}")))?;
    Ok(())
}

fn unrecord(conn: &Connection, name: &str) -> Result<()> {
    if schema::table_exists(conn, "schema_migrations")? {
        conn.execute("DELETE FROM schema_migrations WHERE name = ?1", [name])
            .map_err(|e| Error::Database(format!("failed to unrecord migration {name}: {e}")))?;
    }
    Ok(())
}
