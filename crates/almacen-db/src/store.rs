use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use almacen_common::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::migrations;
use crate::runner;

/// Persistent storage for the inventory: products, users, and the stock
/// movement log. Owns the database handle for the process lifetime and
/// brings the schema up to date before exposing any query.
pub struct InventoryStore {
    conn: Mutex<Connection>,
}

/// A product row (`productos_offline`; the table name is inherited from
/// the legacy application's schema).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub quantity: i64,
    pub sku: Option<String>,
    pub barcode: Option<String>,
}

/// A user row (`usuarios`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub collaborator_limit: i64,
    pub created_at: DateTime<Utc>,
}

/// One stock movement (`movimientos`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: i64,
    pub product_id: i64,
    pub kind: MovementKind,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Entrada,
    Salida,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Entrada => "entrada",
            MovementKind::Salida => "salida",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value {
            "entrada" => Ok(MovementKind::Entrada),
            "salida" => Ok(MovementKind::Salida),
            other => Err(Error::Database(format!("unknown movement kind: {other}"))),
        }
    }
}

/// Open the database file and set the connection pragmas, without touching
/// the schema. The migration pass and the CLI diagnostics share this so
/// every handle behaves the same.
pub fn open_database(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

    Ok(conn)
}

impl InventoryStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening inventory store at {}", db_path.display());
        let conn = open_database(db_path)?;
        runner::apply_all(&conn, migrations::registry())?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        runner::apply_all(&conn, migrations::registry())?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("inventory store lock poisoned".into()))
    }

    pub fn create_product(
        &self,
        name: &str,
        quantity: i64,
        sku: Option<&str>,
        barcode: Option<&str>,
    ) -> Result<i64> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO productos_offline (nombre, cantidad, sku, codigoBarras)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, quantity, sku, barcode],
        )
        .map_err(|e| Error::Database(format!("failed to create product: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn product(&self, id: i64) -> Result<Option<Product>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, nombre, cantidad, sku, codigoBarras
                 FROM productos_offline WHERE id = ?1",
            )
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let result = stmt.query_row(params![id], read_product).ok();
        Ok(result)
    }

    pub fn product_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, nombre, cantidad, sku, codigoBarras
                 FROM productos_offline WHERE sku = ?1",
            )
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let result = stmt.query_row(params![sku], read_product).ok();
        Ok(result)
    }

    pub fn list_products(&self) -> Result<Vec<Product>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, nombre, cantidad, sku, codigoBarras
                 FROM productos_offline ORDER BY nombre ASC",
            )
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], read_product)
            .map_err(|e| Error::Database(format!("failed to query products: {e}")))?;

        let mut products = Vec::new();
        for row in rows {
            products
                .push(row.map_err(|e| Error::Database(format!("failed to read product row: {e}")))?);
        }
        Ok(products)
    }

    /// Apply a stock movement and return the new quantity. The movement is
    /// recorded in `movimientos` so the audit trail matches the balance.
    pub fn adjust_stock(&self, product_id: i64, kind: MovementKind, amount: i64) -> Result<i64> {
        if amount <= 0 {
            return Err(Error::Other(format!(
                "movement amount must be positive, got {amount}"
            )));
        }

        let conn = self.connection()?;
        let current: Option<i64> = conn
            .query_row(
                "SELECT cantidad FROM productos_offline WHERE id = ?1",
                params![product_id],
                |row| row.get(0),
            )
            .ok();

        let Some(current) = current else {
            return Err(Error::NotFound(format!("product {product_id}")));
        };

        let updated = match kind {
            MovementKind::Entrada => current + amount,
            MovementKind::Salida => current - amount,
        };
        if updated < 0 {
            return Err(Error::Other(format!(
                "insufficient stock for product {product_id}: have {current}, need {amount}"
            )));
        }

        conn.execute(
            "UPDATE productos_offline SET cantidad = ?1 WHERE id = ?2",
            params![updated, product_id],
        )
        .map_err(|e| Error::Database(format!("failed to update stock: {e}")))?;

        conn.execute(
            "INSERT INTO movimientos (productoId, tipo, cantidad) VALUES (?1, ?2, ?3)",
            params![product_id, kind.as_str(), amount],
        )
        .map_err(|e| Error::Database(format!("failed to record movement: {e}")))?;

        Ok(updated)
    }

    pub fn delete_product(&self, id: i64) -> Result<()> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM productos_offline WHERE id = ?1", params![id])
            .map_err(|e| Error::Database(format!("failed to delete product: {e}")))?;
        Ok(())
    }

    pub fn movements_for(&self, product_id: i64) -> Result<Vec<StockMovement>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, productoId, tipo, cantidad, creadoEn
                 FROM movimientos
                 WHERE productoId = ?1
                 ORDER BY creadoEn ASC, id ASC",
            )
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map(params![product_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|e| Error::Database(format!("failed to query movements: {e}")))?;

        let mut movements = Vec::new();
        for row in rows {
            let (id, product_id, kind, quantity, created_at) =
                row.map_err(|e| Error::Database(format!("failed to read movement row: {e}")))?;
            movements.push(StockMovement {
                id,
                product_id,
                kind: MovementKind::parse(&kind)?,
                quantity,
                created_at: parse_datetime(created_at),
            });
        }
        Ok(movements)
    }

    pub fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<i64> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO usuarios (nombre, email, password, rol) VALUES (?1, ?2, ?3, ?4)",
            params![name, email, password_hash, role],
        )
        .map_err(|e| Error::Database(format!("failed to create user: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, nombre, email, rol, limiteColaboradores, creadoEn
                 FROM usuarios WHERE email = ?1",
            )
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let result = stmt
            .query_row(params![email], |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    role: row.get(3)?,
                    collaborator_limit: row.get(4)?,
                    created_at: parse_datetime(row.get::<_, String>(5)?),
                })
            })
            .ok();

        Ok(result)
    }

    pub fn set_collaborator_limit(&self, user_id: i64, limit: i64) -> Result<()> {
        let conn = self.connection()?;
        let changed = conn
            .execute(
                "UPDATE usuarios SET limiteColaboradores = ?1 WHERE id = ?2",
                params![limit, user_id],
            )
            .map_err(|e| Error::Database(format!("failed to update collaborator limit: {e}")))?;
        if changed == 0 {
            return Err(Error::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }
}

fn read_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        quantity: row.get(2)?,
        sku: row.get(3)?,
        barcode: row.get(4)?,
    })
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime('now') produces "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}
