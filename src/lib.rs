//! # Books Core
//!
//! A double-entry accounting core providing ledger posting, a journal entry
//! engine, document workflows, and financial reporting.
//!
//! ## Features
//!
//! - **Double-entry bookkeeping**: Balanced journal entries mirrored into an
//!   append-only ledger with running account balances
//! - **Document workflows**: Invoice and bill state machines whose approval
//!   transition posts the books atomically
//! - **Payments**: Customer and vendor payments that settle documents and
//!   relieve receivables and payables
//! - **Fiscal years**: Locked-period enforcement and year-end closing to
//!   retained earnings
//! - **Financial reporting**: Trial balance, profit and loss, and balance
//!   sheet from ledger activity
//! - **Storage abstraction**: Database-agnostic design with trait-based
//!   transactional storage
//!
//! ## Quick Start
//!
//! ```rust
//! use books_core::{Actor, Books, MemoryStorage, Role};
//!
//! # async fn demo() -> books_core::CoreResult<()> {
//! let books = Books::new(MemoryStorage::new());
//! let admin = Actor::new("admin", Role::Admin);
//! books.chart().setup_standard_chart(&admin).await?;
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod books;
pub mod documents;
pub mod ledger;
pub mod posting;
pub mod reports;
pub mod tax;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use books::Books;
pub use documents::*;
pub use ledger::*;
pub use reports::{BalanceSheet, ProfitAndLoss, ReportLine, Reports, TrialBalance, TrialBalanceRow};
pub use traits::*;
pub use types::*;
pub use utils::MemoryStorage;
