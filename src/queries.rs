// Query & ranking engine - search, trends and dashboard figures

use serde::Serialize;
use std::collections::HashMap;

use crate::db::Store;
use crate::error::Result;
use crate::models::{latest_diff, Card, PriceHistory, SortKey, Trend};

/// Recent history of one card with its derived trend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardTrend {
    /// Newest first
    pub history: Vec<PriceHistory>,
    pub trend: Trend,
}

/// A card together with its latest price change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mover {
    pub card: Card,
    pub diff: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub card_count: usize,
    pub total_value: f64,
    pub top_gainer: Option<Mover>,
    pub top_loser: Option<Mover>,
}

/// Everything the collection overview page shows
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub cards: Vec<Card>,
    pub trends: HashMap<i64, CardTrend>,
    pub summary: DashboardSummary,
}

/// Cards matching `query_text` (name or code, case-insensitive) in the
/// requested order. An empty query returns every card.
pub fn list_cards(store: &Store, query_text: &str, sort: SortKey) -> Result<Vec<Card>> {
    let needle = query_text.trim().to_lowercase();
    let mut cards = store.cards(sort)?;

    if !needle.is_empty() {
        cards.retain(|card| {
            card.name.to_lowercase().contains(&needle)
                || card.card_code.to_lowercase().contains(&needle)
        });
    }

    log::debug!(
        "Listed {} cards (query '{}', sort {})",
        cards.len(),
        needle,
        sort.as_str()
    );
    Ok(cards)
}

/// Newest `limit` history entries for every card, keyed by card id
pub fn load_histories(
    store: &Store,
    cards: &[Card],
    limit: usize,
) -> Result<HashMap<i64, Vec<PriceHistory>>> {
    let mut histories = HashMap::with_capacity(cards.len());
    for card in cards {
        histories.insert(card.id, store.recent_history(card.id, limit)?);
    }
    Ok(histories)
}

/// Trends and movers compare the two newest entries, so at least this many
/// are always loaded whatever the display limit is
const MIN_COMPARED_ENTRIES: usize = 2;

/// Recent history and trend label per card.
///
/// The trend always compares the two newest prices; `limit` only caps the
/// returned history slice.
pub fn trends(store: &Store, cards: &[Card], limit: usize) -> Result<HashMap<i64, CardTrend>> {
    let histories = load_histories(store, cards, limit.max(MIN_COMPARED_ENTRIES))?;
    Ok(label_trends(histories, limit))
}

fn label_trends(histories: HashMap<i64, Vec<PriceHistory>>, limit: usize) -> HashMap<i64, CardTrend> {
    histories
        .into_iter()
        .map(|(card_id, mut history)| {
            let trend = Trend::from_history(&history);
            history.truncate(limit);
            (card_id, CardTrend { history, trend })
        })
        .collect()
}

/// Count, total value and the biggest latest movers.
///
/// Only cards with at least two history entries compete for gainer and
/// loser. On equal diffs the card that comes first in `cards` keeps the spot.
pub fn dashboard(cards: &[Card], histories: &HashMap<i64, Vec<PriceHistory>>) -> DashboardSummary {
    let total_value = cards.iter().map(|c| c.price).sum();

    let mut top_gainer: Option<Mover> = None;
    let mut top_loser: Option<Mover> = None;

    for card in cards {
        let Some(diff) = histories.get(&card.id).and_then(|h| latest_diff(h)) else {
            continue;
        };

        if top_gainer.as_ref().map_or(true, |best| diff > best.diff) {
            top_gainer = Some(Mover {
                card: card.clone(),
                diff,
            });
        }
        if top_loser.as_ref().map_or(true, |worst| diff < worst.diff) {
            top_loser = Some(Mover {
                card: card.clone(),
                diff,
            });
        }
    }

    DashboardSummary {
        card_count: cards.len(),
        total_value,
        top_gainer,
        top_loser,
    }
}

/// Search, trends and dashboard in one read
pub fn overview(store: &Store, query_text: &str, sort: SortKey, limit: usize) -> Result<Overview> {
    let cards = list_cards(store, query_text, sort)?;
    let histories = load_histories(store, &cards, limit.max(MIN_COMPARED_ENTRIES))?;
    let summary = dashboard(&cards, &histories);

    Ok(Overview {
        cards,
        trends: label_trends(histories, limit),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_HISTORY_LIMIT;
    use crate::mutations::{add_card, update_price};
    use chrono::Utc;

    fn seeded() -> Store {
        let mut store = Store::open_in_memory().unwrap();
        add_card(&mut store, "Monkey D. Luffy", 5.0, "OP13-118").unwrap();
        add_card(&mut store, "Roronoa Zoro", 12.0, "OP01-025").unwrap();
        add_card(&mut store, "Nami", 1.5, "ST01-007").unwrap();
        store
    }

    fn codes(cards: &[Card]) -> Vec<&str> {
        cards.iter().map(|c| c.card_code.as_str()).collect()
    }

    fn history(card_id: i64, prices: &[f64]) -> Vec<PriceHistory> {
        // Newest first, as the store returns it
        prices
            .iter()
            .enumerate()
            .map(|(i, price)| PriceHistory {
                id: (prices.len() - i) as i64,
                card_id,
                price: *price,
                created_at: Utc::now(),
            })
            .collect()
    }

    fn card(id: i64, price: f64) -> Card {
        Card {
            id,
            card_code: format!("OP01-{:03}", id),
            name: format!("Card {}", id),
            set_name: "OP01".to_string(),
            price,
            image_url: None,
        }
    }

    #[test]
    fn test_list_cards_sort_orders() {
        let store = seeded();

        let newest = list_cards(&store, "", SortKey::Newest).unwrap();
        assert_eq!(codes(&newest), vec!["ST01-007", "OP01-025", "OP13-118"]);

        let by_price = list_cards(&store, "", SortKey::PriceDesc).unwrap();
        assert_eq!(codes(&by_price), vec!["OP01-025", "OP13-118", "ST01-007"]);

        let cheap_first = list_cards(&store, "", SortKey::PriceAsc).unwrap();
        assert_eq!(codes(&cheap_first), vec!["ST01-007", "OP13-118", "OP01-025"]);

        let by_name = list_cards(&store, "", SortKey::NameAsc).unwrap();
        assert_eq!(codes(&by_name), vec!["OP13-118", "ST01-007", "OP01-025"]);
    }

    #[test]
    fn test_list_cards_search_name_and_code() {
        let store = seeded();

        let by_name = list_cards(&store, "  luffy ", SortKey::Newest).unwrap();
        assert_eq!(codes(&by_name), vec!["OP13-118"]);

        let by_code = list_cards(&store, "op", SortKey::Newest).unwrap();
        assert_eq!(codes(&by_code), vec!["OP01-025", "OP13-118"]);

        assert!(list_cards(&store, "charizard", SortKey::Newest).unwrap().is_empty());
    }

    #[test]
    fn test_list_cards_search_is_literal() {
        let store = seeded();
        assert!(list_cards(&store, "%", SortKey::Newest).unwrap().is_empty());
    }

    #[test]
    fn test_list_cards_is_idempotent() {
        let store = seeded();
        let first = list_cards(&store, "o", SortKey::PriceAsc).unwrap();
        let second = list_cards(&store, "o", SortKey::PriceAsc).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_new_card_listed_once_with_no_trend() {
        let mut store = Store::open_in_memory().unwrap();
        let card = add_card(&mut store, "Luffy", 5.0, "OP13-118").unwrap();

        let cards = list_cards(&store, "", SortKey::Newest).unwrap();
        assert_eq!(cards.iter().filter(|c| c.id == card.id).count(), 1);

        let trends = trends(&store, &cards, DEFAULT_HISTORY_LIMIT).unwrap();
        assert_eq!(trends[&card.id].trend, Trend::None);
        assert_eq!(trends[&card.id].history.len(), 1);
    }

    #[test]
    fn test_trend_down_after_drop() {
        let mut store = Store::open_in_memory().unwrap();
        let card = add_card(&mut store, "Luffy", 10.0, "OP13-118").unwrap();
        update_price(&mut store, card.id, 15.0).unwrap();
        update_price(&mut store, card.id, 12.0).unwrap();

        let cards = list_cards(&store, "", SortKey::Newest).unwrap();
        let trends = trends(&store, &cards, DEFAULT_HISTORY_LIMIT).unwrap();
        let prices: Vec<f64> = trends[&card.id].history.iter().map(|h| h.price).collect();

        assert_eq!(trends[&card.id].trend, Trend::Down);
        assert_eq!(prices, vec![12.0, 15.0, 10.0]);
    }

    #[test]
    fn test_trends_respect_limit() {
        let mut store = Store::open_in_memory().unwrap();
        let card = add_card(&mut store, "Luffy", 1.0, "OP13-118").unwrap();
        for price in 2..=8 {
            update_price(&mut store, card.id, price as f64).unwrap();
        }

        let trends = trends(&store, &[card.clone()], 5).unwrap();
        let prices: Vec<f64> = trends[&card.id].history.iter().map(|h| h.price).collect();
        assert_eq!(prices, vec![8.0, 7.0, 6.0, 5.0, 4.0]);
        assert_eq!(trends[&card.id].trend, Trend::Up);
    }

    #[test]
    fn test_dashboard_movers() {
        let cards = vec![card(1, 12.0), card(2, 4.0), card(3, 7.0)];
        let mut histories = HashMap::new();
        histories.insert(1, history(1, &[12.0, 15.0, 10.0]));
        histories.insert(2, history(2, &[4.0, 2.0]));
        histories.insert(3, history(3, &[7.0]));

        let summary = dashboard(&cards, &histories);

        assert_eq!(summary.card_count, 3);
        assert_eq!(summary.total_value, 23.0);

        let gainer = summary.top_gainer.unwrap();
        assert_eq!(gainer.card.id, 2);
        assert_eq!(gainer.diff, 2.0);

        let loser = summary.top_loser.unwrap();
        assert_eq!(loser.card.id, 1);
        assert_eq!(loser.diff, -3.0);
    }

    #[test]
    fn test_dashboard_single_entry_cards_are_excluded() {
        let cards = vec![card(1, 5.0), card(2, 6.0)];
        let mut histories = HashMap::new();
        histories.insert(1, history(1, &[5.0]));

        let summary = dashboard(&cards, &histories);
        assert_eq!(summary.card_count, 2);
        assert_eq!(summary.total_value, 11.0);
        assert!(summary.top_gainer.is_none());
        assert!(summary.top_loser.is_none());
    }

    #[test]
    fn test_dashboard_ties_keep_first_card() {
        let cards = vec![card(7, 3.0), card(8, 3.0)];
        let mut histories = HashMap::new();
        histories.insert(7, history(7, &[3.0, 1.0]));
        histories.insert(8, history(8, &[3.0, 1.0]));

        let summary = dashboard(&cards, &histories);
        assert_eq!(summary.top_gainer.unwrap().card.id, 7);
        assert_eq!(summary.top_loser.unwrap().card.id, 7);
    }

    #[test]
    fn test_dashboard_empty() {
        let summary = dashboard(&[], &HashMap::new());
        assert_eq!(summary.card_count, 0);
        assert_eq!(summary.total_value, 0.0);
        assert!(summary.top_gainer.is_none());
    }

    #[test]
    fn test_overview_combines_views() {
        let mut store = Store::open_in_memory().unwrap();
        let luffy = add_card(&mut store, "Luffy", 10.0, "OP13-118").unwrap();
        add_card(&mut store, "Zoro", 2.0, "OP13-002").unwrap();
        update_price(&mut store, luffy.id, 15.0).unwrap();
        update_price(&mut store, luffy.id, 12.0).unwrap();

        let view = overview(&store, "", SortKey::Newest, DEFAULT_HISTORY_LIMIT).unwrap();

        assert_eq!(view.cards.len(), 2);
        assert_eq!(view.trends[&luffy.id].trend, Trend::Down);
        assert_eq!(view.summary.total_value, 14.0);

        let loser = view.summary.top_loser.unwrap();
        assert_eq!(loser.card.id, luffy.id);
        assert_eq!(loser.diff, -3.0);
    }

    #[test]
    fn test_overview_short_limit_still_finds_movers() {
        let mut store = Store::open_in_memory().unwrap();
        let luffy = add_card(&mut store, "Luffy", 10.0, "OP13-118").unwrap();
        update_price(&mut store, luffy.id, 15.0).unwrap();

        let view = overview(&store, "", SortKey::Newest, 1).unwrap();

        let gainer = view.summary.top_gainer.unwrap();
        assert_eq!(gainer.card.id, luffy.id);
        assert_eq!(gainer.diff, 5.0);
        assert_eq!(view.trends[&luffy.id].trend, Trend::Up);
        assert_eq!(view.trends[&luffy.id].history.len(), 1);
        assert_eq!(view.trends[&luffy.id].history[0].price, 15.0);
    }

    #[test]
    fn test_trends_short_limit_still_compares_two_prices() {
        let mut store = Store::open_in_memory().unwrap();
        let card = add_card(&mut store, "Luffy", 10.0, "OP13-118").unwrap();
        update_price(&mut store, card.id, 8.0).unwrap();

        let trends = trends(&store, &[card.clone()], 1).unwrap();
        assert_eq!(trends[&card.id].trend, Trend::Down);
        assert_eq!(trends[&card.id].history.len(), 1);
    }
}
