//! Core types and data structures for the posting engine

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Round a monetary amount to two decimal places, half-up.
///
/// Every amount that enters storage goes through this, so balance checks
/// downstream can compare values exactly instead of within an epsilon.
pub fn round2(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(2, RoundingMode::HalfUp)
}

/// Account categories following standard accounting principles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountCategory {
    /// Assets - what the business owns (Cash, Bank, Receivables, etc.)
    Asset,
    /// Liabilities - what the business owes (Payables, Tax Payable, etc.)
    Liability,
    /// Equity - owner's interest in the business
    Equity,
    /// Revenue - money earned by the business
    Revenue,
    /// Expenses - costs incurred by the business
    Expense,
}

impl AccountCategory {
    /// Assets and Expenses carry debit-normal balances; Liabilities, Equity,
    /// and Revenue carry credit-normal balances.
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, AccountCategory::Asset | AccountCategory::Expense)
    }
}

/// An account in the chart of accounts.
///
/// The `code` (e.g. "1000") is the unique, stable identifier used everywhere
/// a journal line or ledger entry references an account. `balance` is the
/// running sum of (debit - credit) over all ledger entries ever posted to the
/// account and is written exclusively by the ledger store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub code: String,
    pub name: String,
    pub category: AccountCategory,
    /// Optional parent code for hierarchical chart display; not consulted by
    /// posting logic. Self-reference and cycles are rejected at write time.
    pub parent_code: Option<String>,
    pub balance: BigDecimal,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Account {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        category: AccountCategory,
        parent_code: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            code: code.into(),
            name: name.into(),
            category,
            parent_code,
            balance: BigDecimal::from(0),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lifecycle of a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalStatus {
    Draft,
    Posted,
}

impl JournalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalStatus::Draft => "DRAFT",
            JournalStatus::Posted => "POSTED",
        }
    }
}

/// One line of a journal entry. Exactly one of `debit`/`credit` is positive;
/// the other side is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account_code: String,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
    pub description: Option<String>,
}

impl JournalLine {
    /// Create a debit line
    pub fn debit(
        account_code: impl Into<String>,
        amount: BigDecimal,
        description: Option<String>,
    ) -> Self {
        Self {
            account_code: account_code.into(),
            debit: round2(&amount),
            credit: BigDecimal::from(0),
            description,
        }
    }

    /// Create a credit line
    pub fn credit(
        account_code: impl Into<String>,
        amount: BigDecimal,
        description: Option<String>,
    ) -> Self {
        Self {
            account_code: account_code.into(),
            debit: BigDecimal::from(0),
            credit: round2(&amount),
            description,
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        let zero = BigDecimal::from(0);
        if self.debit < zero || self.credit < zero {
            return Err(CoreError::Validation(
                "journal line amounts cannot be negative".to_string(),
            ));
        }
        if self.debit > zero && self.credit > zero {
            return Err(CoreError::Validation(
                "a journal line cannot carry both a debit and a credit".to_string(),
            ));
        }
        if self.debit == zero && self.credit == zero {
            return Err(CoreError::Validation(
                "a journal line must carry a debit or a credit amount".to_string(),
            ));
        }
        Ok(())
    }
}

/// A balanced set of journal lines with a human-readable entry number.
///
/// Draft entries may be edited or deleted; once posted an entry is immutable
/// and its lines are mirrored in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    /// Sequential number such as `JE2026000042`, assigned at creation
    pub number: String,
    pub date: NaiveDate,
    pub description: String,
    pub reference: Option<String>,
    pub status: JournalStatus,
    pub lines: Vec<JournalLine>,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub posted_at: Option<NaiveDateTime>,
}

impl JournalEntry {
    pub fn total_debits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.debit).sum()
    }

    pub fn total_credits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.credit).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debits() == self.total_credits()
    }

    /// Validate line count, per-line amounts, and the debit = credit invariant.
    pub fn validate(&self) -> CoreResult<()> {
        if self.lines.len() < 2 {
            return Err(CoreError::InsufficientLines(self.lines.len()));
        }
        for line in &self.lines {
            line.validate()?;
        }
        if !self.is_balanced() {
            return Err(CoreError::UnbalancedEntry {
                debits: self.total_debits(),
                credits: self.total_credits(),
            });
        }
        Ok(())
    }
}

/// One immutable ledger row, created exclusively by the posting operation.
///
/// `balance` is the account's running balance immediately after this entry;
/// replaying (debit - credit) over an account's entries in `seq` order must
/// reproduce the account's stored balance exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    /// Monotonic insertion order, the tie-breaker for same-date entries
    pub seq: u64,
    pub account_code: String,
    pub journal_entry_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub reference: Option<String>,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
    pub balance: BigDecimal,
    pub created_at: NaiveDateTime,
}

/// Invoice workflow states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Draft,
    Verified,
    Approved,
    PartiallyPaid,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Verified => "VERIFIED",
            InvoiceStatus::Approved => "APPROVED",
            InvoiceStatus::PartiallyPaid => "PARTIALLY_PAID",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }

    /// True once the invoice's journal entry has been posted: the financial
    /// fact is permanent and the document can no longer be rejected.
    pub fn is_posted(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Approved | InvoiceStatus::PartiallyPaid | InvoiceStatus::Paid
        )
    }
}

/// Bill (vendor purchase) workflow states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillStatus {
    Draft,
    Verified,
    Posted,
    Cancelled,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Draft => "DRAFT",
            BillStatus::Verified => "VERIFIED",
            BillStatus::Posted => "POSTED",
            BillStatus::Cancelled => "CANCELLED",
        }
    }
}

/// A single invoice or bill line with its computed tax and total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub tax_code_id: Option<String>,
    pub tax_amount: BigDecimal,
    pub total: BigDecimal,
}

/// Customer invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub number: String,
    pub customer_id: String,
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<LineItem>,
    pub subtotal: BigDecimal,
    pub tax_amount: BigDecimal,
    pub discount: BigDecimal,
    /// subtotal + tax - discount
    pub total: BigDecimal,
    pub paid_amount: BigDecimal,
    /// total - paid_amount, kept consistent after every mutation
    pub balance_due: BigDecimal,
    pub status: InvoiceStatus,
    pub verified_by: Option<String>,
    pub verified_at: Option<NaiveDateTime>,
    pub approved_by: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
    /// The journal entry created when the invoice was approved
    pub journal_entry_id: Option<String>,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Invoice {
    /// Fold a payment into the paid amount and the balance due.
    pub fn register_payment(&mut self, amount: &BigDecimal) {
        self.paid_amount = round2(&(&self.paid_amount + amount));
        self.balance_due = round2(&(&self.total - &self.paid_amount));
        self.updated_at = chrono::Utc::now().naive_utc();
    }
}

/// Vendor purchase bill; the mirror image of an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub number: String,
    pub vendor_id: String,
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<LineItem>,
    pub subtotal: BigDecimal,
    pub tax_amount: BigDecimal,
    pub total: BigDecimal,
    pub paid_amount: BigDecimal,
    pub balance_due: BigDecimal,
    pub status: BillStatus,
    pub verified_by: Option<String>,
    pub verified_at: Option<NaiveDateTime>,
    pub approved_by: Option<String>,
    pub approved_at: Option<NaiveDateTime>,
    pub journal_entry_id: Option<String>,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Bill {
    pub fn register_payment(&mut self, amount: &BigDecimal) {
        self.paid_amount = round2(&(&self.paid_amount + amount));
        self.balance_due = round2(&(&self.total - &self.paid_amount));
        self.updated_at = chrono::Utc::now().naive_utc();
    }
}

/// How a payment was settled. A closed enumeration: every variant maps to a
/// settlement account through `posting::settlement_account_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Online,
    Check,
    CreditCard,
    Other,
}

/// Direction of a payment relative to the business
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentKind {
    /// Money in, from a customer against an invoice
    Received,
    /// Money out, to a vendor against a bill
    Made,
}

/// A recorded money movement, linked to the journal entry it generated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub number: String,
    pub kind: PaymentKind,
    /// Customer id for received payments, vendor id for made payments
    pub counterparty_id: String,
    pub invoice_id: Option<String>,
    pub bill_id: Option<String>,
    pub date: NaiveDate,
    pub amount: BigDecimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub journal_entry_id: Option<String>,
    pub created_by: String,
    pub created_at: NaiveDateTime,
}

/// Customer master record; `balance` is the outstanding receivable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub balance: BigDecimal,
}

/// Vendor master record; `balance` is the outstanding payable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: String,
    pub name: String,
    pub balance: BigDecimal,
}

/// Tax rate effective over a date window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRate {
    /// Percentage, e.g. 15.0 for 15% VAT
    pub rate: BigDecimal,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

/// A named tax code with its rate history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxCode {
    pub id: String,
    pub name: String,
    pub rates: Vec<TaxRate>,
}

/// Fiscal year window. Locked years reject any posting dated inside them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalYear {
    pub id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_closed: bool,
    pub is_locked: bool,
}

impl FiscalYear {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Roles supplied by the authentication collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Manager,
    Accountant,
    Viewer,
}

impl Role {
    /// Verification needs an elevated role
    pub fn can_verify(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }

    /// Approval is stricter than verification
    pub fn can_approve(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Authenticated user identity acting on the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

/// Errors raised by the posting engine
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("journal entry is not balanced: debits = {debits}, credits = {credits}")]
    UnbalancedEntry {
        debits: BigDecimal,
        credits: BigDecimal,
    },
    #[error("journal entry must have at least two lines, got {0}")]
    InsufficientLines(usize),
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("cannot {action}: requires status {required}, current status is {actual}")]
    InvalidStateTransition {
        action: &'static str,
        required: &'static str,
        actual: String,
    },
    #[error("journal entry {0} is already posted")]
    AlreadyPosted(String),
    #[error("journal entry {0} is posted and can no longer be modified")]
    EntryLocked(String),
    #[error("fiscal year {0} is locked; postings dated inside it are rejected")]
    LockedFiscalYear(String),
    #[error("required account {0} is missing from the chart of accounts")]
    RequiredAccountsMissing(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl CoreError {
    /// Stable machine-readable code for the HTTP layer's status mapping.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Storage(_) => "STORAGE",
            CoreError::Validation(_) => "VALIDATION",
            CoreError::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            CoreError::InsufficientLines(_) => "INSUFFICIENT_LINES",
            CoreError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            CoreError::AlreadyPosted(_) => "ALREADY_POSTED",
            CoreError::EntryLocked(_) => "ENTRY_LOCKED",
            CoreError::LockedFiscalYear(_) => "LOCKED_FISCAL_YEAR",
            CoreError::RequiredAccountsMissing(_) => "REQUIRED_ACCOUNTS_MISSING",
            CoreError::Forbidden(_) => "FORBIDDEN",
        }
    }
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
