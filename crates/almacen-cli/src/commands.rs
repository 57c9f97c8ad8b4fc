use std::path::Path;

use almacen_db::{migrations, runner, store};
use anyhow::{Context, Result};
use tracing::info;

/// Apply every pending migration, creating the database file if needed.
pub fn migrate(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create data directory {}", parent.display()))?;
    }

    let conn = store::open_database(db_path)?;
    let report = runner::apply_all(&conn, migrations::registry())?;

    info!("database at {} is up to date", db_path.display());
    for name in &report.applied {
        println!("applied {name}");
    }
    println!(
        "{} applied, {} already present",
        report.applied.len(),
        report.already_present.len()
    );
    Ok(())
}

/// Ledger state of every known migration, without applying anything.
pub fn status(db_path: &Path) -> Result<()> {
    let conn = store::open_database(db_path)?;

    for st in runner::status(&conn, migrations::registry())? {
        let marker = if st.recorded { "applied" } else { "pending" };
        println!("{:<44} {marker}", st.name);
    }
    Ok(())
}

/// Live column set of one table, straight from the catalog.
pub fn schema(db_path: &Path, table: &str) -> Result<()> {
    let conn = store::open_database(db_path)?;
    let columns = almacen_db::schema::columns_of(&conn, table)
        .with_context(|| format!("failed to inspect table {table}"))?;

    for column in columns {
        let null = if column.nullable { "NULL" } else { "NOT NULL" };
        let default = column
            .default_value
            .map(|d| format!(" DEFAULT {d}"))
            .unwrap_or_default();
        println!(
            "{:<24} {:<12} {null}{default}",
            column.name, column.declared_type
        );
    }
    Ok(())
}

/// Run one migration's down operation. For the shipped registry this logs
/// the engine limitation and leaves the schema untouched.
pub fn revert(db_path: &Path, name: &str) -> Result<()> {
    let conn = store::open_database(db_path)?;
    let migration = migrations::registry()
        .iter()
        .find(|m| m.name == name)
        .with_context(|| format!("unknown migration {name}"))?;

    runner::revert(&conn, migration)?;
    println!("revert of {name} finished; see the log for whether the schema changed");
    Ok(())
}
