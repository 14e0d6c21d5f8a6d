//! In-memory storage implementation for testing and development
//!
//! Transactions take an owned lock over the whole store, stage their writes
//! against a cloned working copy, and swap it in on commit. Dropping a
//! transaction without committing leaves the store untouched. Serializing
//! transactions this way makes posting atomicity and gap-free numbering hold
//! by construction; a database backend would get the same guarantees from its
//! own transactions.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::traits::{Storage, StorageTx};
use crate::types::*;

#[derive(Debug, Clone, Default)]
struct State {
    accounts: HashMap<String, Account>,
    journal_entries: HashMap<String, JournalEntry>,
    ledger: Vec<LedgerEntry>,
    invoices: HashMap<String, Invoice>,
    bills: HashMap<String, Bill>,
    payments: HashMap<String, Payment>,
    customers: HashMap<String, Customer>,
    vendors: HashMap<String, Vendor>,
    tax_codes: HashMap<String, TaxCode>,
    fiscal_years: HashMap<String, FiscalYear>,
    counters: HashMap<String, u64>,
    ledger_seq: u64,
}

/// In-memory [`Storage`] backend
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<State>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A unit of work against [`MemoryStorage`]
pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    working: State,
}

#[async_trait]
impl Storage for MemoryStorage {
    type Tx = MemoryTx;

    async fn begin(&self) -> CoreResult<MemoryTx> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx { guard, working })
    }
}

#[async_trait]
impl StorageTx for MemoryTx {
    async fn account(&self, code: &str) -> CoreResult<Option<Account>> {
        Ok(self.working.accounts.get(code).cloned())
    }

    async fn list_accounts(
        &self,
        category: Option<AccountCategory>,
    ) -> CoreResult<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .working
            .accounts
            .values()
            .filter(|a| category.map_or(true, |c| a.category == c))
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    async fn save_account(&mut self, account: &Account) -> CoreResult<()> {
        self.working
            .accounts
            .insert(account.code.clone(), account.clone());
        Ok(())
    }

    async fn journal_entry(&self, id: &str) -> CoreResult<Option<JournalEntry>> {
        Ok(self.working.journal_entries.get(id).cloned())
    }

    async fn save_journal_entry(&mut self, entry: &JournalEntry) -> CoreResult<()> {
        self.working
            .journal_entries
            .insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn delete_journal_entry(&mut self, id: &str) -> CoreResult<()> {
        if self.working.journal_entries.remove(id).is_some() {
            Ok(())
        } else {
            Err(CoreError::NotFound {
                entity: "journal entry",
                id: id.to_string(),
            })
        }
    }

    async fn append_ledger_entry(&mut self, entry: &LedgerEntry) -> CoreResult<()> {
        self.working.ledger.push(entry.clone());
        Ok(())
    }

    async fn ledger_entries(
        &self,
        account_code: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> CoreResult<Vec<LedgerEntry>> {
        let mut entries: Vec<LedgerEntry> = self
            .working
            .ledger
            .iter()
            .filter(|e| e.account_code == account_code)
            .filter(|e| start_date.map_or(true, |s| e.date >= s))
            .filter(|e| end_date.map_or(true, |end| e.date <= end))
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.date.cmp(&b.date).then(a.seq.cmp(&b.seq)));
        Ok(entries)
    }

    async fn next_ledger_seq(&mut self) -> CoreResult<u64> {
        self.working.ledger_seq += 1;
        Ok(self.working.ledger_seq)
    }

    async fn invoice(&self, id: &str) -> CoreResult<Option<Invoice>> {
        Ok(self.working.invoices.get(id).cloned())
    }

    async fn save_invoice(&mut self, invoice: &Invoice) -> CoreResult<()> {
        self.working
            .invoices
            .insert(invoice.id.clone(), invoice.clone());
        Ok(())
    }

    async fn delete_invoice(&mut self, id: &str) -> CoreResult<()> {
        if self.working.invoices.remove(id).is_some() {
            Ok(())
        } else {
            Err(CoreError::NotFound {
                entity: "invoice",
                id: id.to_string(),
            })
        }
    }

    async fn bill(&self, id: &str) -> CoreResult<Option<Bill>> {
        Ok(self.working.bills.get(id).cloned())
    }

    async fn save_bill(&mut self, bill: &Bill) -> CoreResult<()> {
        self.working.bills.insert(bill.id.clone(), bill.clone());
        Ok(())
    }

    async fn delete_bill(&mut self, id: &str) -> CoreResult<()> {
        if self.working.bills.remove(id).is_some() {
            Ok(())
        } else {
            Err(CoreError::NotFound {
                entity: "bill",
                id: id.to_string(),
            })
        }
    }

    async fn payment(&self, id: &str) -> CoreResult<Option<Payment>> {
        Ok(self.working.payments.get(id).cloned())
    }

    async fn save_payment(&mut self, payment: &Payment) -> CoreResult<()> {
        self.working
            .payments
            .insert(payment.id.clone(), payment.clone());
        Ok(())
    }

    async fn payments_for_invoice(&self, invoice_id: &str) -> CoreResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .working
            .payments
            .values()
            .filter(|p| p.invoice_id.as_deref() == Some(invoice_id))
            .cloned()
            .collect();
        payments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(payments)
    }

    async fn customer(&self, id: &str) -> CoreResult<Option<Customer>> {
        Ok(self.working.customers.get(id).cloned())
    }

    async fn save_customer(&mut self, customer: &Customer) -> CoreResult<()> {
        self.working
            .customers
            .insert(customer.id.clone(), customer.clone());
        Ok(())
    }

    async fn vendor(&self, id: &str) -> CoreResult<Option<Vendor>> {
        Ok(self.working.vendors.get(id).cloned())
    }

    async fn save_vendor(&mut self, vendor: &Vendor) -> CoreResult<()> {
        self.working
            .vendors
            .insert(vendor.id.clone(), vendor.clone());
        Ok(())
    }

    async fn tax_code(&self, id: &str) -> CoreResult<Option<TaxCode>> {
        Ok(self.working.tax_codes.get(id).cloned())
    }

    async fn save_tax_code(&mut self, tax_code: &TaxCode) -> CoreResult<()> {
        self.working
            .tax_codes
            .insert(tax_code.id.clone(), tax_code.clone());
        Ok(())
    }

    async fn fiscal_year(&self, id: &str) -> CoreResult<Option<FiscalYear>> {
        Ok(self.working.fiscal_years.get(id).cloned())
    }

    async fn fiscal_years(&self) -> CoreResult<Vec<FiscalYear>> {
        let mut years: Vec<FiscalYear> = self.working.fiscal_years.values().cloned().collect();
        years.sort_by(|a, b| a.start_date.cmp(&b.start_date));
        Ok(years)
    }

    async fn fiscal_year_containing(&self, date: NaiveDate) -> CoreResult<Option<FiscalYear>> {
        Ok(self
            .working
            .fiscal_years
            .values()
            .find(|fy| fy.contains(date))
            .cloned())
    }

    async fn save_fiscal_year(&mut self, fiscal_year: &FiscalYear) -> CoreResult<()> {
        self.working
            .fiscal_years
            .insert(fiscal_year.id.clone(), fiscal_year.clone());
        Ok(())
    }

    async fn next_number(&mut self, key: &str) -> CoreResult<u64> {
        let counter = self.working.counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn commit(mut self) -> CoreResult<()> {
        *self.guard = self.working;
        Ok(())
    }
}
