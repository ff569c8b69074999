// Domain model - cards, their price journal and the derived values

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Separates the edition prefix from the local number in a card code
pub const CODE_SEPARATOR: char = '-';

/// Longest accepted card name, in characters
pub const MAX_NAME_LEN: usize = 60;

/// Number of history entries loaded per card by default
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

// ============================================================================
// CARD
// ============================================================================

/// One tracked collectible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,

    /// Uppercase code such as `OP13-118`, unique across the collection
    pub card_code: String,

    pub name: String,

    /// Edition, always `derive_set_name(card_code)`
    pub set_name: String,

    pub price: f64,

    /// Externally managed asset location, never written by the tracker
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// One price observation of a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub id: i64,
    pub card_id: i64,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new card
#[derive(Debug, Clone, PartialEq)]
pub struct NewCard {
    pub card_code: String,
    pub name: String,
    pub set_name: String,
    pub price: f64,
}

impl NewCard {
    /// Normalize and validate raw caller input.
    ///
    /// Checks run in a fixed order and the first failure wins:
    /// separator, price, empty fields, name length. Uniqueness needs the
    /// store and is checked by `mutations::add_card`.
    pub fn parse(name: &str, price: f64, card_code: &str) -> Result<Self> {
        let card_code = normalize_code(card_code);
        let name = name.trim().to_string();

        let set_name = derive_set_name(&card_code)
            .ok_or_else(|| TrackerError::CodeFormat(card_code.clone()))?
            .to_string();

        validate_price(price)?;

        if name.is_empty() {
            return Err(TrackerError::EmptyField("name"));
        }
        // Unreachable after the separator check: a blank code fails as CodeFormat
        if card_code.is_empty() {
            return Err(TrackerError::EmptyField("card_code"));
        }

        let len = name.chars().count();
        if len > MAX_NAME_LEN {
            return Err(TrackerError::NameTooLong(len));
        }

        Ok(NewCard {
            card_code,
            name,
            set_name,
            price,
        })
    }
}

/// Trim and uppercase a card code
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Edition prefix of a normalized card code: `OP13-118` -> `OP13`.
///
/// Returns `None` when the code has no separator. This is the only place the
/// edition is computed; callers never supply it.
pub fn derive_set_name(card_code: &str) -> Option<&str> {
    card_code
        .split_once(CODE_SEPARATOR)
        .map(|(prefix, _)| prefix)
}

/// Prices must be finite and non-negative
pub fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(TrackerError::InvalidPrice(price));
    }
    Ok(())
}

// ============================================================================
// SORTING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    PriceDesc,
    PriceAsc,
    NameAsc,
    /// Most recently created first
    #[default]
    Newest,
}

impl SortKey {
    /// Unknown or empty keys fall back to `Newest`
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "price_desc" => SortKey::PriceDesc,
            "price_asc" => SortKey::PriceAsc,
            "name_asc" => SortKey::NameAsc,
            _ => SortKey::Newest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::PriceDesc => "price_desc",
            SortKey::PriceAsc => "price_asc",
            SortKey::NameAsc => "name_asc",
            SortKey::Newest => "newest",
        }
    }

    /// ORDER BY clause; ties always resolve newest first
    pub(crate) fn order_by(&self) -> &'static str {
        match self {
            SortKey::PriceDesc => "price DESC, id DESC",
            SortKey::PriceAsc => "price ASC, id DESC",
            SortKey::NameAsc => "name ASC, id DESC",
            SortKey::Newest => "id DESC",
        }
    }
}

// ============================================================================
// TREND
// ============================================================================

/// Direction of the latest price change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Same,
    /// Fewer than two observations
    None,
}

impl Trend {
    /// Compare the two most recent entries of a newest-first history
    pub fn from_history(history: &[PriceHistory]) -> Self {
        match history {
            [latest, previous, ..] => {
                if latest.price > previous.price {
                    Trend::Up
                } else if latest.price < previous.price {
                    Trend::Down
                } else {
                    Trend::Same
                }
            }
            _ => Trend::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Same => "same",
            Trend::None => "none",
        }
    }
}

/// Latest change between the two newest entries, if there are two
pub fn latest_diff(history: &[PriceHistory]) -> Option<f64> {
    match history {
        [latest, previous, ..] => Some(latest.price - previous.price),
        _ => None,
    }
}
