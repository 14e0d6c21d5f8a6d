//! Storage abstraction for the posting engine
//!
//! The engine is database-agnostic: any backend (PostgreSQL, SQLite,
//! in-memory, ...) plugs in by implementing [`Storage`] and [`StorageTx`].
//! Every multi-step operation in the crate runs inside exactly one
//! transaction: `begin` hands out a unit of work, writes are staged against
//! it, and `commit` makes them visible atomically. Dropping a transaction
//! without committing discards every staged write.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::*;

/// Entry point into a storage backend.
#[async_trait]
pub trait Storage: Send + Sync {
    type Tx: StorageTx;

    /// Open a unit of work. Implementations must guarantee that the writes
    /// staged on the returned transaction become visible all-or-nothing.
    async fn begin(&self) -> CoreResult<Self::Tx>;
}

/// A single unit of work against the backing store.
///
/// Reads performed through a transaction observe a consistent snapshot that
/// includes the transaction's own staged writes.
#[async_trait]
pub trait StorageTx: Send {
    // Accounts
    async fn account(&self, code: &str) -> CoreResult<Option<Account>>;
    async fn list_accounts(
        &self,
        category: Option<AccountCategory>,
    ) -> CoreResult<Vec<Account>>;
    async fn save_account(&mut self, account: &Account) -> CoreResult<()>;

    // Journal entries
    async fn journal_entry(&self, id: &str) -> CoreResult<Option<JournalEntry>>;
    async fn save_journal_entry(&mut self, entry: &JournalEntry) -> CoreResult<()>;
    async fn delete_journal_entry(&mut self, id: &str) -> CoreResult<()>;

    // Ledger, append-only
    async fn append_ledger_entry(&mut self, entry: &LedgerEntry) -> CoreResult<()>;
    /// Entries for one account ordered by date, then insertion order.
    async fn ledger_entries(
        &self,
        account_code: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> CoreResult<Vec<LedgerEntry>>;
    /// Next value of the monotonic ledger insertion sequence.
    async fn next_ledger_seq(&mut self) -> CoreResult<u64>;

    // Invoices
    async fn invoice(&self, id: &str) -> CoreResult<Option<Invoice>>;
    async fn save_invoice(&mut self, invoice: &Invoice) -> CoreResult<()>;
    async fn delete_invoice(&mut self, id: &str) -> CoreResult<()>;

    // Bills
    async fn bill(&self, id: &str) -> CoreResult<Option<Bill>>;
    async fn save_bill(&mut self, bill: &Bill) -> CoreResult<()>;
    async fn delete_bill(&mut self, id: &str) -> CoreResult<()>;

    // Payments
    async fn payment(&self, id: &str) -> CoreResult<Option<Payment>>;
    async fn save_payment(&mut self, payment: &Payment) -> CoreResult<()>;
    async fn payments_for_invoice(&self, invoice_id: &str) -> CoreResult<Vec<Payment>>;

    // Master data read/write needed by posting and workflows
    async fn customer(&self, id: &str) -> CoreResult<Option<Customer>>;
    async fn save_customer(&mut self, customer: &Customer) -> CoreResult<()>;
    async fn vendor(&self, id: &str) -> CoreResult<Option<Vendor>>;
    async fn save_vendor(&mut self, vendor: &Vendor) -> CoreResult<()>;
    async fn tax_code(&self, id: &str) -> CoreResult<Option<TaxCode>>;
    async fn save_tax_code(&mut self, tax_code: &TaxCode) -> CoreResult<()>;

    // Fiscal years (owned by external master data; read for lock gating)
    async fn fiscal_year(&self, id: &str) -> CoreResult<Option<FiscalYear>>;
    /// All fiscal years ordered by start date.
    async fn fiscal_years(&self) -> CoreResult<Vec<FiscalYear>>;
    async fn fiscal_year_containing(&self, date: NaiveDate) -> CoreResult<Option<FiscalYear>>;
    async fn save_fiscal_year(&mut self, fiscal_year: &FiscalYear) -> CoreResult<()>;

    /// Atomically advance and return the sequence counter for `key`
    /// (e.g. "JE2026"). Counters commit with the transaction, which is what
    /// keeps business numbers gap-free and collision-free under concurrency.
    async fn next_number(&mut self, key: &str) -> CoreResult<u64>;

    /// Commit every staged write. Consumes the transaction.
    async fn commit(self) -> CoreResult<()>;
}

/// Fetch an account or fail with [`CoreError::AccountNotFound`].
pub async fn require_account<T: StorageTx>(tx: &T, code: &str) -> CoreResult<Account> {
    tx.account(code)
        .await?
        .ok_or_else(|| CoreError::AccountNotFound(code.to_string()))
}

/// Draw the next year-scoped business number, e.g. `JE2026000042`.
pub async fn next_document_number<T: StorageTx>(
    tx: &mut T,
    prefix: &str,
    year: i32,
) -> CoreResult<String> {
    let key = format!("{prefix}{year}");
    let seq = tx.next_number(&key).await?;
    Ok(format!("{key}{seq:06}"))
}
