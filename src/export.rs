// Export formatter - the collection as semicolon-separated text

use chrono::{DateTime, Local};
use std::io::Write;

use crate::db::Store;
use crate::error::Result;

pub const EXPORT_HEADER: [&str; 5] = ["id", "card_code", "name", "edition", "price"];

/// Write every card in creation order, one `;`-separated record per card.
///
/// Records end with CRLF, which spreadsheet tools expect.
pub fn write_csv<W: Write>(store: &Store, writer: W) -> Result<usize> {
    let cards = store.cards_by_id()?;

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .terminator(csv::Terminator::CRLF)
        .from_writer(writer);

    wtr.write_record(EXPORT_HEADER)?;
    for card in &cards {
        wtr.write_record([
            card.id.to_string(),
            card.card_code.clone(),
            card.name.clone(),
            card.set_name.clone(),
            format!("{:.2}", card.price),
        ])?;
    }
    wtr.flush()?;

    log::info!("Exported {} cards", cards.len());
    Ok(cards.len())
}

/// Whole export as UTF-8 bytes
pub fn export_csv(store: &Store) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_csv(store, &mut buffer)?;
    Ok(buffer)
}

/// `tcg_export_<YYYY-MM-DD_HH-MM>.csv` for the given export time
pub fn export_filename(now: DateTime<Local>) -> String {
    format!("tcg_export_{}.csv", now.format("%Y-%m-%d_%H-%M"))
}
