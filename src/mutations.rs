// Mutation operations - add, reprice and delete cards
//
// Each operation validates first, then runs as one SQLite transaction so a
// card and its price journal never disagree.

use chrono::Utc;
use rusqlite::ErrorCode;

use crate::db::{self, Store};
use crate::error::{Result, TrackerError};
use crate::models::{validate_price, Card, NewCard};

/// Result of a price update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(Card),

    /// No card with that id. Reported as success: callers treat a stale id
    /// as nothing to do rather than an error.
    CardNotFound,
}

impl UpdateOutcome {
    pub fn card(&self) -> Option<&Card> {
        match self {
            UpdateOutcome::Updated(card) => Some(card),
            UpdateOutcome::CardNotFound => None,
        }
    }
}

/// Add a card and record its first price.
///
/// Fails with a validation error before anything is written; on success the
/// card and its first history entry are committed together.
pub fn add_card(store: &mut Store, name: &str, price: f64, card_code: &str) -> Result<Card> {
    let new_card = match NewCard::parse(name, price, card_code) {
        Ok(card) => card,
        Err(e) => {
            log::warn!("Rejected card '{}': {}", card_code.trim(), e);
            return Err(e);
        }
    };

    let tx = store.transaction()?;

    if let Some(existing) = db::find_conflict(&tx, &new_card)? {
        log::warn!(
            "Rejected duplicate {} '{}' (conflicts with #{} {})",
            new_card.card_code,
            new_card.name,
            existing.id,
            existing.card_code
        );
        return Err(TrackerError::Duplicate(new_card.card_code));
    }

    let card_id = match db::insert_card(&tx, &new_card) {
        Ok(id) => id,
        Err(TrackerError::Storage(rusqlite::Error::SqliteFailure(err, _)))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            return Err(TrackerError::Duplicate(new_card.card_code));
        }
        Err(e) => return Err(e),
    };
    db::insert_history(&tx, card_id, new_card.price, Utc::now())?;
    tx.commit()?;

    log::info!(
        "Added card #{} {} '{}' at {:.2}",
        card_id,
        new_card.card_code,
        new_card.name,
        new_card.price
    );

    Ok(Card {
        id: card_id,
        card_code: new_card.card_code,
        name: new_card.name,
        set_name: new_card.set_name,
        price: new_card.price,
        image_url: None,
    })
}

/// Set a new price and append it to the card's history
pub fn update_price(store: &mut Store, card_id: i64, new_price: f64) -> Result<UpdateOutcome> {
    validate_price(new_price)?;

    let tx = store.transaction()?;

    let Some(mut card) = db::get_card(&tx, card_id)? else {
        log::debug!("Price update for unknown card #{} ignored", card_id);
        return Ok(UpdateOutcome::CardNotFound);
    };

    db::set_price(&tx, card_id, new_price)?;
    db::insert_history(&tx, card_id, new_price, Utc::now())?;
    tx.commit()?;

    log::info!(
        "Repriced card #{} {}: {:.2} -> {:.2}",
        card_id,
        card.card_code,
        card.price,
        new_price
    );

    card.price = new_price;
    Ok(UpdateOutcome::Updated(card))
}

/// Delete a card together with its whole price history.
///
/// Returns whether a card was removed; an unknown id is a no-op.
pub fn delete_card(store: &mut Store, card_id: i64) -> Result<bool> {
    let tx = store.transaction()?;
    let history_rows = db::delete_history(&tx, card_id)?;
    let card_rows = db::delete_card_row(&tx, card_id)?;
    tx.commit()?;

    if card_rows > 0 {
        log::info!("Deleted card #{} and {} history entries", card_id, history_rows);
    } else {
        log::debug!("Delete for unknown card #{} ignored", card_id);
    }

    Ok(card_rows > 0)
}
