//! Card lookup: decklist parsing, the SQLite card database and the Scryfall
//! client used both to build it and as a live fallback.

pub mod analyze;
pub mod parser;
pub mod scryfall;
pub mod service;
pub mod store;

pub use analyze::{analyze_decklist, AnalysisReport, CardAnalysis};
pub use parser::{parse_decklist, DeckEntry};
pub use scryfall::ScryfallClient;
pub use service::CardService;
pub use store::CardStore;
