//! Invoice workflow
//!
//! State machine: `DRAFT -> VERIFIED -> APPROVED -> PARTIALLY_PAID -> PAID`,
//! with `REJECT` returning a verified invoice to draft and `CANCEL` retiring
//! a draft. Approval is the posting transition: it creates and posts the
//! revenue journal entry, so everything from APPROVED onward is financially
//! permanent.

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::{emit, AuditAction, AuditEvent, AuditSink, NoopAuditSink};
use crate::documents::{build_line_items, require_customer, require_invoice, NewLineItem};
use crate::ledger::journal::{create_posted_in_tx, NewJournalEntry};
use crate::posting;
use crate::traits::{next_document_number, Storage, StorageTx};
use crate::types::*;

/// Input for creating an invoice
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub customer_id: String,
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub discount: Option<BigDecimal>,
    pub items: Vec<NewLineItem>,
}

/// Fields that may change while an invoice is still a draft. Supplying
/// `items` replaces the lines wholesale and re-prices the invoice.
#[derive(Debug, Clone, Default)]
pub struct InvoiceUpdate {
    pub date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub discount: Option<BigDecimal>,
    pub items: Option<Vec<NewLineItem>>,
}

/// Drives invoices through their lifecycle
#[derive(Clone)]
pub struct InvoiceWorkflow<S: Storage> {
    storage: S,
    audit: Arc<dyn AuditSink>,
}

impl<S: Storage> InvoiceWorkflow<S> {
    pub fn new(storage: S) -> Self {
        Self::with_audit(storage, Arc::new(NoopAuditSink))
    }

    pub fn with_audit(storage: S, audit: Arc<dyn AuditSink>) -> Self {
        Self { storage, audit }
    }

    /// Create an invoice in DRAFT, pricing its lines against the tax rates
    /// effective on the invoice date.
    pub async fn create(&self, actor: &Actor, new: NewInvoice) -> CoreResult<Invoice> {
        let mut tx = self.storage.begin().await?;
        require_customer(&tx, &new.customer_id).await?;

        let (items, subtotal, tax_amount) = build_line_items(&tx, new.date, &new.items).await?;
        let discount = normalize_discount(new.discount, &subtotal)?;
        let total = round2(&(&subtotal + &tax_amount - &discount));

        let now = chrono::Utc::now().naive_utc();
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            number: next_document_number(&mut tx, "INV", new.date.year()).await?,
            customer_id: new.customer_id,
            date: new.date,
            due_date: new.due_date,
            reference: new.reference,
            notes: new.notes,
            items,
            subtotal,
            tax_amount,
            discount,
            balance_due: total.clone(),
            total,
            paid_amount: BigDecimal::from(0),
            status: InvoiceStatus::Draft,
            verified_by: None,
            verified_at: None,
            approved_by: None,
            approved_at: None,
            journal_entry_id: None,
            created_by: actor.user_id.clone(),
            created_at: now,
            updated_at: now,
        };

        tx.save_invoice(&invoice).await?;
        tx.commit().await?;

        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::Created,
                "invoice",
                invoice.id.clone(),
                None,
                Some(invoice.number.clone()),
            ),
        );
        Ok(invoice)
    }

    /// Update a draft invoice, re-pricing when lines or discount change.
    pub async fn update(
        &self,
        actor: &Actor,
        invoice_id: &str,
        update: InvoiceUpdate,
    ) -> CoreResult<Invoice> {
        let mut tx = self.storage.begin().await?;
        let mut invoice = require_invoice(&tx, invoice_id).await?;

        if invoice.status != InvoiceStatus::Draft {
            return Err(CoreError::InvalidStateTransition {
                action: "update invoice",
                required: InvoiceStatus::Draft.as_str(),
                actual: invoice.status.as_str().to_string(),
            });
        }

        if let Some(date) = update.date {
            invoice.date = date;
        }
        if let Some(due_date) = update.due_date {
            invoice.due_date = due_date;
        }
        if update.reference.is_some() {
            invoice.reference = update.reference;
        }
        if update.notes.is_some() {
            invoice.notes = update.notes;
        }
        if let Some(items) = update.items {
            let (items, subtotal, tax_amount) =
                build_line_items(&tx, invoice.date, &items).await?;
            invoice.items = items;
            invoice.subtotal = subtotal;
            invoice.tax_amount = tax_amount;
        }
        // the kept discount is re-checked against the possibly new subtotal
        let discount = update.discount.unwrap_or_else(|| invoice.discount.clone());
        invoice.discount = normalize_discount(Some(discount), &invoice.subtotal)?;

        invoice.total = round2(&(&invoice.subtotal + &invoice.tax_amount - &invoice.discount));
        // payments already recorded put a floor under any re-pricing; a total
        // below them would drive the balance due negative
        if invoice.total < invoice.paid_amount {
            return Err(CoreError::Validation(format!(
                "new total of {} is below the {} already paid",
                invoice.total, invoice.paid_amount
            )));
        }
        invoice.balance_due = round2(&(&invoice.total - &invoice.paid_amount));
        invoice.updated_at = chrono::Utc::now().naive_utc();

        tx.save_invoice(&invoice).await?;
        tx.commit().await?;

        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::Updated,
                "invoice",
                invoice.id.clone(),
                None,
                Some(invoice.number.clone()),
            ),
        );
        Ok(invoice)
    }

    /// Delete a draft invoice.
    pub async fn delete(&self, actor: &Actor, invoice_id: &str) -> CoreResult<()> {
        let mut tx = self.storage.begin().await?;
        let invoice = require_invoice(&tx, invoice_id).await?;

        if invoice.status != InvoiceStatus::Draft {
            return Err(CoreError::InvalidStateTransition {
                action: "delete invoice",
                required: InvoiceStatus::Draft.as_str(),
                actual: invoice.status.as_str().to_string(),
            });
        }

        tx.delete_invoice(invoice_id).await?;
        tx.commit().await?;

        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::Deleted,
                "invoice",
                invoice.id,
                Some(invoice.number),
                None,
            ),
        );
        Ok(())
    }

    /// Verify a draft invoice. Requires a manager-level role.
    pub async fn verify(&self, actor: &Actor, invoice_id: &str) -> CoreResult<Invoice> {
        if !actor.role.can_verify() {
            return Err(CoreError::Forbidden(format!(
                "role {:?} cannot verify invoices",
                actor.role
            )));
        }

        let mut tx = self.storage.begin().await?;
        let mut invoice = require_invoice(&tx, invoice_id).await?;

        if invoice.status != InvoiceStatus::Draft {
            return Err(CoreError::InvalidStateTransition {
                action: "verify invoice",
                required: InvoiceStatus::Draft.as_str(),
                actual: invoice.status.as_str().to_string(),
            });
        }

        let before = invoice.status;
        let now = chrono::Utc::now().naive_utc();
        invoice.status = InvoiceStatus::Verified;
        invoice.verified_by = Some(actor.user_id.clone());
        invoice.verified_at = Some(now);
        invoice.updated_at = now;

        tx.save_invoice(&invoice).await?;
        tx.commit().await?;

        self.emit_status_change(actor, &invoice, before);
        Ok(invoice)
    }

    /// Approve a verified invoice: create and post the revenue entry, move
    /// the customer balance, and settle the final status from how much of the
    /// invoice is already paid. Requires an admin role.
    ///
    /// Revenue is recognized here, exactly once. Payments recorded before
    /// approval show up as settlement debits in this entry; payments recorded
    /// after it post their own cash-against-receivable entries.
    pub async fn approve(&self, actor: &Actor, invoice_id: &str) -> CoreResult<Invoice> {
        if !actor.role.can_approve() {
            return Err(CoreError::Forbidden(format!(
                "role {:?} cannot approve invoices",
                actor.role
            )));
        }

        let mut tx = self.storage.begin().await?;
        let mut invoice = require_invoice(&tx, invoice_id).await?;

        if invoice.status != InvoiceStatus::Verified {
            return Err(CoreError::InvalidStateTransition {
                action: "approve invoice",
                required: InvoiceStatus::Verified.as_str(),
                actual: invoice.status.as_str().to_string(),
            });
        }

        let mut customer = require_customer(&tx, &invoice.customer_id).await?;
        let payments = tx.payments_for_invoice(&invoice.id).await?;
        let lines = posting::invoice_approval_lines(&tx, &invoice, &payments, &customer).await?;

        let entry = create_posted_in_tx(
            &mut tx,
            actor,
            NewJournalEntry {
                date: invoice.date,
                description: format!("Invoice {} - {}", invoice.number, customer.name),
                reference: Some(invoice.number.clone()),
                lines,
            },
        )
        .await?;

        let before = invoice.status;
        let zero = BigDecimal::from(0);
        invoice.status = if invoice.balance_due == zero {
            InvoiceStatus::Paid
        } else if invoice.paid_amount > zero {
            InvoiceStatus::PartiallyPaid
        } else {
            InvoiceStatus::Approved
        };
        let now = chrono::Utc::now().naive_utc();
        invoice.approved_by = Some(actor.user_id.clone());
        invoice.approved_at = Some(now);
        invoice.journal_entry_id = Some(entry.id.clone());
        invoice.updated_at = now;
        tx.save_invoice(&invoice).await?;

        customer.balance = round2(&(&customer.balance + &invoice.balance_due));
        tx.save_customer(&customer).await?;

        tx.commit().await?;

        log::info!(
            "approved invoice {} with journal entry {}",
            invoice.number,
            entry.number
        );
        self.emit_status_change(actor, &invoice, before);
        Ok(invoice)
    }

    /// Reject an invoice back to DRAFT, clearing verification metadata.
    /// Once posted the financial fact is permanent and rejection is refused;
    /// cancellation is likewise final.
    pub async fn reject(&self, actor: &Actor, invoice_id: &str) -> CoreResult<Invoice> {
        if !actor.role.can_verify() {
            return Err(CoreError::Forbidden(format!(
                "role {:?} cannot reject invoices",
                actor.role
            )));
        }

        let mut tx = self.storage.begin().await?;
        let mut invoice = require_invoice(&tx, invoice_id).await?;

        if !matches!(
            invoice.status,
            InvoiceStatus::Draft | InvoiceStatus::Verified
        ) {
            return Err(CoreError::InvalidStateTransition {
                action: "reject invoice",
                required: "DRAFT or VERIFIED",
                actual: invoice.status.as_str().to_string(),
            });
        }

        let before = invoice.status;
        invoice.status = InvoiceStatus::Draft;
        invoice.verified_by = None;
        invoice.verified_at = None;
        invoice.updated_at = chrono::Utc::now().naive_utc();

        tx.save_invoice(&invoice).await?;
        tx.commit().await?;

        self.emit_status_change(actor, &invoice, before);
        Ok(invoice)
    }

    /// Cancel a draft invoice. Verified invoices must be rejected first;
    /// posted invoices cannot be cancelled at all.
    pub async fn cancel(&self, actor: &Actor, invoice_id: &str) -> CoreResult<Invoice> {
        let mut tx = self.storage.begin().await?;
        let mut invoice = require_invoice(&tx, invoice_id).await?;

        if invoice.status != InvoiceStatus::Draft {
            return Err(CoreError::InvalidStateTransition {
                action: "cancel invoice",
                required: InvoiceStatus::Draft.as_str(),
                actual: invoice.status.as_str().to_string(),
            });
        }

        let before = invoice.status;
        invoice.status = InvoiceStatus::Cancelled;
        invoice.updated_at = chrono::Utc::now().naive_utc();

        tx.save_invoice(&invoice).await?;
        tx.commit().await?;

        self.emit_status_change(actor, &invoice, before);
        Ok(invoice)
    }

    pub async fn get(&self, invoice_id: &str) -> CoreResult<Option<Invoice>> {
        let tx = self.storage.begin().await?;
        tx.invoice(invoice_id).await
    }

    fn emit_status_change(&self, actor: &Actor, invoice: &Invoice, before: InvoiceStatus) {
        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::StatusChanged,
                "invoice",
                invoice.id.clone(),
                Some(before.as_str().to_string()),
                Some(invoice.status.as_str().to_string()),
            ),
        );
    }
}

fn normalize_discount(
    discount: Option<BigDecimal>,
    subtotal: &BigDecimal,
) -> CoreResult<BigDecimal> {
    let discount = discount.unwrap_or_else(|| BigDecimal::from(0));
    if discount < BigDecimal::from(0) {
        return Err(CoreError::Validation(
            "discount cannot be negative".to_string(),
        ));
    }
    if &discount > subtotal {
        return Err(CoreError::Validation(
            "discount cannot exceed the invoice subtotal".to_string(),
        ));
    }
    Ok(round2(&discount))
}
