//! Ledger store, journal entry engine, and chart of accounts

pub mod chart;
pub mod journal;
pub mod store;

pub use chart::ChartManager;
pub use journal::{JournalEngine, JournalEntryUpdate, NewJournalEntry};
pub use store::LedgerLine;
