use crate::domain::model::CardRow;
use crate::utils::error::{BlingError, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::fs;
use std::path::Path;

const CREATE_TABLE_SQL: &str = "
CREATE TABLE IF NOT EXISTS cards (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    real_name TEXT NOT NULL,
    set_code TEXT NOT NULL,
    collector_number TEXT NOT NULL,
    image_uri_normal TEXT,
    scryfall_uri TEXT NOT NULL,
    price_usd REAL,
    price_foil REAL
);
CREATE INDEX IF NOT EXISTS idx_card_name_real_name
    ON cards(name COLLATE NOCASE, real_name COLLATE NOCASE);
";

const INSERT_SQL: &str = "INSERT OR IGNORE INTO cards (
    id, name, real_name, set_code, collector_number, image_uri_normal, scryfall_uri, price_usd, price_foil
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

/// Writes `rows` into a fresh database at `path`, replacing any existing file.
///
/// Rows are inserted in one transaction, `batch_size` at a time; duplicate
/// ids are ignored. Returns the number of rows actually inserted.
pub fn write_card_database(path: &Path, rows: &[CardRow], batch_size: usize) -> Result<usize> {
    if path.exists() {
        tracing::info!("Database already exists. Deleting it to rebuild with latest data.");
        fs::remove_file(path)?;
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut conn = Connection::open(path)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode=DELETE;
        PRAGMA synchronous=OFF;
        PRAGMA temp_store=MEMORY;
        ",
    )?;
    conn.execute_batch(CREATE_TABLE_SQL)?;
    tracing::info!("Database structure created successfully.");

    let tx = conn.transaction()?;
    let mut inserted = 0usize;
    {
        let mut stmt = tx.prepare(INSERT_SQL)?;
        for (batch_no, batch) in rows.chunks(batch_size.max(1)).enumerate() {
            for row in batch {
                inserted += stmt.execute(params![
                    row.id,
                    row.name,
                    row.real_name,
                    row.set_code,
                    row.collector_number,
                    row.image_uri_normal,
                    row.scryfall_uri,
                    row.price_usd,
                    row.price_foil,
                ])?;
            }
            tracing::debug!("Inserted batch {} ({} rows)", batch_no + 1, batch.len());
        }
    }
    tx.commit()?;

    Ok(inserted)
}

/// Read-only view over the card database artifact.
pub struct CardStore {
    conn: Connection,
}

impl CardStore {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::error!(
                "FATAL: Database not found at {}. Ensure the database is built before running.",
                path.display()
            );
            return Err(BlingError::DatabaseMissing {
                path: path.display().to_string(),
            });
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Canonical name for `name`, which may be an alternate printed name.
    pub fn resolve_canonical_name(&self, name: &str) -> Result<Option<String>> {
        let real_name = self
            .conn
            .query_row(
                "SELECT real_name FROM cards WHERE name = ?1 LIMIT 1",
                params![name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(real_name.filter(|n| !n.is_empty()))
    }

    /// Every stored printing of `real_name`, cheapest USD first.
    pub fn printings_of(&self, real_name: &str) -> Result<Vec<CardRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, name, real_name, set_code, collector_number, image_uri_normal,
                    scryfall_uri, price_usd, price_foil
             FROM cards WHERE real_name = ?1 ORDER BY price_usd ASC",
        )?;
        let rows = stmt
            .query_map(params![real_name], card_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<CardRow> {
    Ok(CardRow {
        id: row.get(0)?,
        name: row.get(1)?,
        real_name: row.get(2)?,
        set_code: row.get(3)?,
        collector_number: row.get(4)?,
        image_uri_normal: row.get(5)?,
        scryfall_uri: row.get(6)?,
        price_usd: row.get(7)?,
        price_foil: row.get(8)?,
    })
}
