// Record store - SQLite persistence for cards and their price journal

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;

use crate::error::Result;
use crate::models::{Card, NewCard, PriceHistory, SortKey};

/// Explicit handle to the collection database.
///
/// Every operation receives the store it works on; there is no shared global
/// connection. Mutations open one SQLite transaction each.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        log::info!("Card DB: {}", path.display());
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Fresh private database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(Store { conn })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    /// Look up a single card
    pub fn get_card(&self, card_id: i64) -> Result<Option<Card>> {
        get_card(&self.conn, card_id)
    }

    /// All cards in the given display order
    pub fn cards(&self, sort: SortKey) -> Result<Vec<Card>> {
        let sql = format!(
            "SELECT id, card_code, name, set_name, price, image_url
             FROM cards
             ORDER BY {}",
            sort.order_by()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let cards = stmt
            .query_map([], card_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    /// All cards in creation order
    pub fn cards_by_id(&self) -> Result<Vec<Card>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, card_code, name, set_name, price, image_url
             FROM cards
             ORDER BY id ASC",
        )?;
        let cards = stmt
            .query_map([], card_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    /// Newest `limit` history entries of a card, newest first.
    ///
    /// Entries recorded at the same instant are ordered by id, highest first.
    pub fn recent_history(&self, card_id: i64, limit: usize) -> Result<Vec<PriceHistory>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, card_id, price, created_at
             FROM price_history
             WHERE card_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let entries = stmt
            .query_map(params![card_id, limit], history_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    #[cfg(test)]
    pub(crate) fn count_cards(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Total number of price observations recorded for a card
    pub fn count_history(&self, card_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM price_history WHERE card_id = ?1",
            [card_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; foreign keys for the history cascade
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            card_code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            set_name TEXT NOT NULL,
            price REAL NOT NULL,
            image_url TEXT,
            CONSTRAINT uq_card_name_edition UNIQUE (name, set_name)
        );

        CREATE TABLE IF NOT EXISTS price_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            card_id INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
            price REAL NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_cards_name ON cards(name);
        CREATE INDEX IF NOT EXISTS idx_history_card ON price_history(card_id, created_at);",
    )?;

    Ok(())
}

// ============================================================================
// ROW-LEVEL HELPERS (shared by the store and by mutations inside a transaction)
// ============================================================================

pub(crate) fn get_card(conn: &Connection, card_id: i64) -> Result<Option<Card>> {
    let card = conn
        .query_row(
            "SELECT id, card_code, name, set_name, price, image_url
             FROM cards
             WHERE id = ?1",
            [card_id],
            card_from_row,
        )
        .optional()?;
    Ok(card)
}

/// Existing card with the same code, or the same name in the same edition
pub(crate) fn find_conflict(conn: &Connection, card: &NewCard) -> Result<Option<Card>> {
    let existing = conn
        .query_row(
            "SELECT id, card_code, name, set_name, price, image_url
             FROM cards
             WHERE card_code = ?1 OR (name = ?2 AND set_name = ?3)
             ORDER BY id ASC
             LIMIT 1",
            params![card.card_code, card.name, card.set_name],
            card_from_row,
        )
        .optional()?;
    Ok(existing)
}

pub(crate) fn insert_card(conn: &Connection, card: &NewCard) -> Result<i64> {
    conn.execute(
        "INSERT INTO cards (card_code, name, set_name, price, image_url)
         VALUES (?1, ?2, ?3, ?4, NULL)",
        params![card.card_code, card.name, card.set_name, card.price],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn set_price(conn: &Connection, card_id: i64, price: f64) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE cards SET price = ?1 WHERE id = ?2",
        params![price, card_id],
    )?;
    Ok(changed)
}

pub(crate) fn insert_history(
    conn: &Connection,
    card_id: i64,
    price: f64,
    created_at: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO price_history (card_id, price, created_at) VALUES (?1, ?2, ?3)",
        params![card_id, price, format_timestamp(created_at)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn delete_history(conn: &Connection, card_id: i64) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM price_history WHERE card_id = ?1", [card_id])?;
    Ok(deleted)
}

pub(crate) fn delete_card_row(conn: &Connection, card_id: i64) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM cards WHERE id = ?1", [card_id])?;
    Ok(deleted)
}

/// Fixed-width RFC 3339 so text order equals time order
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        card_code: row.get(1)?,
        name: row.get(2)?,
        set_name: row.get(3)?,
        price: row.get(4)?,
        image_url: row.get(5)?,
    })
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<PriceHistory> {
    let created_at_str: String = row.get(3)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?
        .with_timezone(&Utc);

    Ok(PriceHistory {
        id: row.get(0)?,
        card_id: row.get(1)?,
        price: row.get(2)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_card(code: &str, name: &str, price: f64) -> NewCard {
        NewCard::parse(name, price, code).unwrap()
    }

    #[test]
    fn test_setup_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        setup_database(store.connection()).unwrap();
        assert_eq!(store.count_cards().unwrap(), 0);
    }

    #[test]
    fn test_unique_constraints() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();

        insert_card(conn, &new_card("OP13-118", "Luffy", 5.0)).unwrap();

        // Same code
        assert!(insert_card(conn, &new_card("OP13-118", "Zoro", 1.0)).is_err());
        // Same name and edition
        assert!(insert_card(conn, &new_card("OP13-001", "Luffy", 1.0)).is_err());
        // Same name, other edition is fine
        insert_card(conn, &new_card("OP12-001", "Luffy", 1.0)).unwrap();

        assert_eq!(store.count_cards().unwrap(), 2);
    }

    #[test]
    fn test_find_conflict() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        insert_card(conn, &new_card("OP13-118", "Luffy", 5.0)).unwrap();

        assert!(find_conflict(conn, &new_card("OP13-118", "Other", 1.0)).unwrap().is_some());
        assert!(find_conflict(conn, &new_card("OP13-999", "Luffy", 1.0)).unwrap().is_some());
        assert!(find_conflict(conn, &new_card("OP14-118", "Luffy", 1.0)).unwrap().is_none());
    }

    #[test]
    fn test_recent_history_order_and_limit() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        let card_id = insert_card(conn, &new_card("OP13-118", "Luffy", 1.0)).unwrap();

        let base = Utc::now();
        for (i, price) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            insert_history(conn, card_id, *price, base + Duration::seconds(i as i64)).unwrap();
        }

        let recent = store.recent_history(card_id, 3).unwrap();
        let prices: Vec<f64> = recent.iter().map(|h| h.price).collect();
        assert_eq!(prices, vec![4.0, 3.0, 2.0]);
    }

    #[test]
    fn test_recent_history_same_timestamp_uses_id() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        let card_id = insert_card(conn, &new_card("OP13-118", "Luffy", 1.0)).unwrap();

        let now = Utc::now();
        insert_history(conn, card_id, 10.0, now).unwrap();
        insert_history(conn, card_id, 20.0, now).unwrap();

        let recent = store.recent_history(card_id, 5).unwrap();
        assert_eq!(recent[0].price, 20.0);
        assert_eq!(recent[1].price, 10.0);
    }

    #[test]
    fn test_card_delete_cascades_history() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        let card_id = insert_card(conn, &new_card("OP13-118", "Luffy", 1.0)).unwrap();
        insert_history(conn, card_id, 1.0, Utc::now()).unwrap();

        delete_card_row(conn, card_id).unwrap();
        assert_eq!(store.count_history(card_id).unwrap(), 0);
    }

    #[test]
    fn test_open_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tcg.db");

        {
            let store = Store::open(&path).unwrap();
            insert_card(store.connection(), &new_card("OP13-118", "Luffy", 5.0)).unwrap();
        }

        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.count_cards().unwrap(), 1);
    }
}
