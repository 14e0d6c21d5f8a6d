//! Bill (vendor purchase) workflow
//!
//! The purchasing mirror of the invoice workflow with a shorter tail:
//! `DRAFT -> VERIFIED -> POSTED`, plus REJECT back to draft and CANCEL for
//! drafts. Posting books the expense and the payable; payments made against
//! the bill reduce its balance without further status changes.

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::{emit, AuditAction, AuditEvent, AuditSink, NoopAuditSink};
use crate::documents::{build_line_items, require_bill, require_vendor, NewLineItem};
use crate::ledger::journal::{create_posted_in_tx, NewJournalEntry};
use crate::posting;
use crate::traits::{next_document_number, Storage, StorageTx};
use crate::types::*;

/// Input for creating a bill
#[derive(Debug, Clone)]
pub struct NewBill {
    pub vendor_id: String,
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<NewLineItem>,
}

/// Draft-only bill changes; `items` replaces the lines wholesale
#[derive(Debug, Clone, Default)]
pub struct BillUpdate {
    pub date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub items: Option<Vec<NewLineItem>>,
}

/// Drives bills through their lifecycle
#[derive(Clone)]
pub struct BillWorkflow<S: Storage> {
    storage: S,
    audit: Arc<dyn AuditSink>,
}

impl<S: Storage> BillWorkflow<S> {
    pub fn new(storage: S) -> Self {
        Self::with_audit(storage, Arc::new(NoopAuditSink))
    }

    pub fn with_audit(storage: S, audit: Arc<dyn AuditSink>) -> Self {
        Self { storage, audit }
    }

    pub async fn create(&self, actor: &Actor, new: NewBill) -> CoreResult<Bill> {
        let mut tx = self.storage.begin().await?;
        require_vendor(&tx, &new.vendor_id).await?;

        let (items, subtotal, tax_amount) = build_line_items(&tx, new.date, &new.items).await?;
        let total = round2(&(&subtotal + &tax_amount));

        let now = chrono::Utc::now().naive_utc();
        let bill = Bill {
            id: Uuid::new_v4().to_string(),
            number: next_document_number(&mut tx, "BILL", new.date.year()).await?,
            vendor_id: new.vendor_id,
            date: new.date,
            due_date: new.due_date,
            reference: new.reference,
            notes: new.notes,
            items,
            subtotal,
            tax_amount,
            balance_due: total.clone(),
            total,
            paid_amount: BigDecimal::from(0),
            status: BillStatus::Draft,
            verified_by: None,
            verified_at: None,
            approved_by: None,
            approved_at: None,
            journal_entry_id: None,
            created_by: actor.user_id.clone(),
            created_at: now,
            updated_at: now,
        };

        tx.save_bill(&bill).await?;
        tx.commit().await?;

        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::Created,
                "bill",
                bill.id.clone(),
                None,
                Some(bill.number.clone()),
            ),
        );
        Ok(bill)
    }

    pub async fn update(&self, actor: &Actor, bill_id: &str, update: BillUpdate) -> CoreResult<Bill> {
        let mut tx = self.storage.begin().await?;
        let mut bill = require_bill(&tx, bill_id).await?;

        if bill.status != BillStatus::Draft {
            return Err(CoreError::InvalidStateTransition {
                action: "update bill",
                required: BillStatus::Draft.as_str(),
                actual: bill.status.as_str().to_string(),
            });
        }

        if let Some(date) = update.date {
            bill.date = date;
        }
        if let Some(due_date) = update.due_date {
            bill.due_date = due_date;
        }
        if update.reference.is_some() {
            bill.reference = update.reference;
        }
        if update.notes.is_some() {
            bill.notes = update.notes;
        }
        if let Some(items) = update.items {
            let (items, subtotal, tax_amount) = build_line_items(&tx, bill.date, &items).await?;
            bill.items = items;
            bill.subtotal = subtotal;
            bill.tax_amount = tax_amount;
        }

        bill.total = round2(&(&bill.subtotal + &bill.tax_amount));
        bill.balance_due = round2(&(&bill.total - &bill.paid_amount));
        bill.updated_at = chrono::Utc::now().naive_utc();

        tx.save_bill(&bill).await?;
        tx.commit().await?;

        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::Updated,
                "bill",
                bill.id.clone(),
                None,
                Some(bill.number.clone()),
            ),
        );
        Ok(bill)
    }

    pub async fn delete(&self, actor: &Actor, bill_id: &str) -> CoreResult<()> {
        let mut tx = self.storage.begin().await?;
        let bill = require_bill(&tx, bill_id).await?;

        if bill.status != BillStatus::Draft {
            return Err(CoreError::InvalidStateTransition {
                action: "delete bill",
                required: BillStatus::Draft.as_str(),
                actual: bill.status.as_str().to_string(),
            });
        }

        tx.delete_bill(bill_id).await?;
        tx.commit().await?;

        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::Deleted,
                "bill",
                bill.id,
                Some(bill.number),
                None,
            ),
        );
        Ok(())
    }

    /// Verify a draft bill. Requires a manager-level role.
    pub async fn verify(&self, actor: &Actor, bill_id: &str) -> CoreResult<Bill> {
        if !actor.role.can_verify() {
            return Err(CoreError::Forbidden(format!(
                "role {:?} cannot verify bills",
                actor.role
            )));
        }

        let mut tx = self.storage.begin().await?;
        let mut bill = require_bill(&tx, bill_id).await?;

        if bill.status != BillStatus::Draft {
            return Err(CoreError::InvalidStateTransition {
                action: "verify bill",
                required: BillStatus::Draft.as_str(),
                actual: bill.status.as_str().to_string(),
            });
        }

        let before = bill.status;
        let now = chrono::Utc::now().naive_utc();
        bill.status = BillStatus::Verified;
        bill.verified_by = Some(actor.user_id.clone());
        bill.verified_at = Some(now);
        bill.updated_at = now;

        tx.save_bill(&bill).await?;
        tx.commit().await?;

        self.emit_status_change(actor, &bill, before);
        Ok(bill)
    }

    /// Post a verified bill: book the expense against the payable and move
    /// the vendor balance. Requires an admin role.
    pub async fn approve(&self, actor: &Actor, bill_id: &str) -> CoreResult<Bill> {
        if !actor.role.can_approve() {
            return Err(CoreError::Forbidden(format!(
                "role {:?} cannot post bills",
                actor.role
            )));
        }

        let mut tx = self.storage.begin().await?;
        let mut bill = require_bill(&tx, bill_id).await?;

        if bill.status != BillStatus::Verified {
            return Err(CoreError::InvalidStateTransition {
                action: "post bill",
                required: BillStatus::Verified.as_str(),
                actual: bill.status.as_str().to_string(),
            });
        }

        let mut vendor = require_vendor(&tx, &bill.vendor_id).await?;
        let lines = posting::bill_posting_lines(&tx, &bill, &vendor).await?;

        let entry = create_posted_in_tx(
            &mut tx,
            actor,
            NewJournalEntry {
                date: bill.date,
                description: format!("Bill {} - {}", bill.number, vendor.name),
                reference: Some(bill.number.clone()),
                lines,
            },
        )
        .await?;

        let before = bill.status;
        let now = chrono::Utc::now().naive_utc();
        bill.status = BillStatus::Posted;
        bill.approved_by = Some(actor.user_id.clone());
        bill.approved_at = Some(now);
        bill.journal_entry_id = Some(entry.id.clone());
        bill.updated_at = now;
        tx.save_bill(&bill).await?;

        vendor.balance = round2(&(&vendor.balance + &bill.total));
        tx.save_vendor(&vendor).await?;

        tx.commit().await?;

        log::info!(
            "posted bill {} with journal entry {}",
            bill.number,
            entry.number
        );
        self.emit_status_change(actor, &bill, before);
        Ok(bill)
    }

    /// Reject a bill back to DRAFT, clearing verification metadata. Posted
    /// and cancelled bills cannot be rejected.
    pub async fn reject(&self, actor: &Actor, bill_id: &str) -> CoreResult<Bill> {
        if !actor.role.can_verify() {
            return Err(CoreError::Forbidden(format!(
                "role {:?} cannot reject bills",
                actor.role
            )));
        }

        let mut tx = self.storage.begin().await?;
        let mut bill = require_bill(&tx, bill_id).await?;

        if !matches!(bill.status, BillStatus::Draft | BillStatus::Verified) {
            return Err(CoreError::InvalidStateTransition {
                action: "reject bill",
                required: "DRAFT or VERIFIED",
                actual: bill.status.as_str().to_string(),
            });
        }

        let before = bill.status;
        bill.status = BillStatus::Draft;
        bill.verified_by = None;
        bill.verified_at = None;
        bill.updated_at = chrono::Utc::now().naive_utc();

        tx.save_bill(&bill).await?;
        tx.commit().await?;

        self.emit_status_change(actor, &bill, before);
        Ok(bill)
    }

    /// Cancel a draft bill.
    pub async fn cancel(&self, actor: &Actor, bill_id: &str) -> CoreResult<Bill> {
        let mut tx = self.storage.begin().await?;
        let mut bill = require_bill(&tx, bill_id).await?;

        if bill.status != BillStatus::Draft {
            return Err(CoreError::InvalidStateTransition {
                action: "cancel bill",
                required: BillStatus::Draft.as_str(),
                actual: bill.status.as_str().to_string(),
            });
        }

        let before = bill.status;
        bill.status = BillStatus::Cancelled;
        bill.updated_at = chrono::Utc::now().naive_utc();

        tx.save_bill(&bill).await?;
        tx.commit().await?;

        self.emit_status_change(actor, &bill, before);
        Ok(bill)
    }

    pub async fn get(&self, bill_id: &str) -> CoreResult<Option<Bill>> {
        let tx = self.storage.begin().await?;
        tx.bill(bill_id).await
    }

    fn emit_status_change(&self, actor: &Actor, bill: &Bill, before: BillStatus) {
        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::StatusChanged,
                "bill",
                bill.id.clone(),
                Some(before.as_str().to_string()),
                Some(bill.status.as_str().to_string()),
            ),
        );
    }
}
