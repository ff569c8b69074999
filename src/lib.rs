// TCG Tracker - Core Library
// Card collection store, price journal, dashboard and export.
// Used by the CLI, the web server and the tests.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod mutations;
pub mod queries;

// Re-export commonly used types
pub use config::Config;
pub use db::{setup_database, Store};
pub use error::{Result, TrackerError};
pub use export::{export_csv, export_filename, write_csv, EXPORT_HEADER};
pub use models::{
    derive_set_name, normalize_code, Card, NewCard, PriceHistory, SortKey, Trend,
    DEFAULT_HISTORY_LIMIT, MAX_NAME_LEN,
};
pub use mutations::{add_card, delete_card, update_price, UpdateOutcome};
pub use queries::{
    dashboard, list_cards, load_histories, overview, trends, CardTrend, DashboardSummary, Mover,
    Overview,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
