//! Top-level facade that wires every component over one storage backend

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::sync::Arc;

use crate::audit::{emit, AuditAction, AuditEvent, AuditSink, NoopAuditSink};
use crate::documents::{BillWorkflow, InvoiceWorkflow, PaymentProcessor};
use crate::ledger::{store, ChartManager, JournalEngine, LedgerLine};
use crate::posting;
use crate::reports::Reports;
use crate::traits::{Storage, StorageTx};
use crate::types::*;

/// The whole accounting core over one storage backend.
///
/// Owns one instance of each component, all sharing the same storage and
/// audit sink, and carries the operations that span components, such as
/// year-end closing.
pub struct Books<S: Storage + Clone> {
    storage: S,
    audit: Arc<dyn AuditSink>,
    chart: ChartManager<S>,
    journal: JournalEngine<S>,
    invoices: InvoiceWorkflow<S>,
    bills: BillWorkflow<S>,
    payments: PaymentProcessor<S>,
    reports: Reports<S>,
}

impl<S: Storage + Clone> Books<S> {
    pub fn new(storage: S) -> Self {
        Self::with_audit(storage, Arc::new(NoopAuditSink))
    }

    pub fn with_audit(storage: S, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            chart: ChartManager::with_audit(storage.clone(), Arc::clone(&audit)),
            journal: JournalEngine::with_audit(storage.clone(), Arc::clone(&audit)),
            invoices: InvoiceWorkflow::with_audit(storage.clone(), Arc::clone(&audit)),
            bills: BillWorkflow::with_audit(storage.clone(), Arc::clone(&audit)),
            payments: PaymentProcessor::with_audit(storage.clone(), Arc::clone(&audit)),
            reports: Reports::new(storage.clone()),
            storage,
            audit,
        }
    }

    pub fn chart(&self) -> &ChartManager<S> {
        &self.chart
    }

    pub fn journal(&self) -> &JournalEngine<S> {
        &self.journal
    }

    pub fn invoices(&self) -> &InvoiceWorkflow<S> {
        &self.invoices
    }

    pub fn bills(&self) -> &BillWorkflow<S> {
        &self.bills
    }

    pub fn payments(&self) -> &PaymentProcessor<S> {
        &self.payments
    }

    pub fn reports(&self) -> &Reports<S> {
        &self.reports
    }

    /// Current balance of an account.
    pub async fn account_balance(&self, code: &str) -> CoreResult<BigDecimal> {
        let tx = self.storage.begin().await?;
        store::account_balance(&tx, code).await
    }

    /// Ledger rows for an account with a running balance over the window.
    pub async fn account_ledger(
        &self,
        code: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> CoreResult<Vec<LedgerLine>> {
        let tx = self.storage.begin().await?;
        store::account_ledger(&tx, code, start_date, end_date).await
    }

    /// Open a fiscal year window.
    pub async fn open_fiscal_year(
        &self,
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> CoreResult<FiscalYear> {
        if start_date > end_date {
            return Err(CoreError::Validation(
                "fiscal year start date must not be after its end date".to_string(),
            ));
        }

        let fy = FiscalYear {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            start_date,
            end_date,
            is_closed: false,
            is_locked: false,
        };

        let mut tx = self.storage.begin().await?;
        // any range intersection conflicts, not just an enclosed start date
        for existing in tx.fiscal_years().await? {
            if existing.start_date <= end_date && start_date <= existing.end_date {
                return Err(CoreError::Conflict(format!(
                    "fiscal year {} overlaps existing fiscal year {}",
                    fy.name, existing.name
                )));
            }
        }
        tx.save_fiscal_year(&fy).await?;
        tx.commit().await?;
        Ok(fy)
    }

    pub async fn fiscal_year(&self, id: &str) -> CoreResult<Option<FiscalYear>> {
        let tx = self.storage.begin().await?;
        tx.fiscal_year(id).await
    }

    /// Close a fiscal year: post the closing entry that zeroes revenue and
    /// expense activity into Retained Earnings, then lock the year. Requires
    /// an admin role. A year with no activity is locked without an entry.
    pub async fn close_fiscal_year(
        &self,
        actor: &Actor,
        fiscal_year_id: &str,
    ) -> CoreResult<Option<JournalEntry>> {
        if !actor.role.can_approve() {
            return Err(CoreError::Forbidden(format!(
                "role {:?} cannot close fiscal years",
                actor.role
            )));
        }

        let mut tx = self.storage.begin().await?;
        let (fy, entry) = posting::close_fiscal_year_in_tx(&mut tx, actor, fiscal_year_id).await?;
        tx.commit().await?;

        log::info!(
            "closed fiscal year {} ({})",
            fy.name,
            entry
                .as_ref()
                .map(|e| e.number.as_str())
                .unwrap_or("no activity")
        );
        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::StatusChanged,
                "fiscal_year",
                fy.id.clone(),
                Some("OPEN".to_string()),
                Some("CLOSED".to_string()),
            ),
        );
        Ok(entry)
    }
}
