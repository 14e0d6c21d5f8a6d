//! Payment recording
//!
//! Payments are cash-side events. A payment received against a posted
//! invoice posts debit settlement / credit receivable; revenue was already
//! recognized at approval, so partial payments never touch the revenue
//! account. Payments received before approval only move the invoice's paid
//! amount; the approval entry picks them up as settlement debits.
//!
//! Payments made require a posted bill: there is no payable to relieve until
//! the bill has been booked.

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::{emit, AuditAction, AuditEvent, AuditSink, NoopAuditSink};
use crate::documents::{require_bill, require_customer, require_invoice, require_vendor};
use crate::ledger::journal::{create_posted_in_tx, NewJournalEntry};
use crate::posting;
use crate::traits::{next_document_number, Storage, StorageTx};
use crate::types::*;
use crate::utils::validation::validate_positive_amount;

/// Input for a payment received from a customer against an invoice
#[derive(Debug, Clone)]
pub struct NewPaymentReceived {
    pub invoice_id: String,
    pub date: NaiveDate,
    pub amount: BigDecimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Input for a payment made to a vendor against a bill
#[derive(Debug, Clone)]
pub struct NewPaymentMade {
    pub bill_id: String,
    pub date: NaiveDate,
    pub amount: BigDecimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Records customer and vendor payments against their documents
#[derive(Clone)]
pub struct PaymentProcessor<S: Storage> {
    storage: S,
    audit: Arc<dyn AuditSink>,
}

impl<S: Storage> PaymentProcessor<S> {
    pub fn new(storage: S) -> Self {
        Self::with_audit(storage, Arc::new(NoopAuditSink))
    }

    pub fn with_audit(storage: S, audit: Arc<dyn AuditSink>) -> Self {
        Self { storage, audit }
    }

    /// Record a payment received against an invoice.
    ///
    /// Overpayment is rejected outright: a payment may never exceed the
    /// invoice's remaining balance. When the invoice is already posted the
    /// payment posts its own journal entry and settles the invoice status;
    /// before posting it only accumulates into the paid amount.
    pub async fn record_received(
        &self,
        actor: &Actor,
        new: NewPaymentReceived,
    ) -> CoreResult<Payment> {
        validate_positive_amount(&new.amount)?;
        let amount = round2(&new.amount);

        let mut tx = self.storage.begin().await?;
        let mut invoice = require_invoice(&tx, &new.invoice_id).await?;

        if invoice.status == InvoiceStatus::Cancelled {
            return Err(CoreError::InvalidStateTransition {
                action: "record payment",
                required: "an uncancelled invoice",
                actual: invoice.status.as_str().to_string(),
            });
        }
        if amount > invoice.balance_due {
            return Err(CoreError::Validation(format!(
                "payment of {} exceeds the remaining balance of {}",
                amount, invoice.balance_due
            )));
        }

        let mut customer = require_customer(&tx, &invoice.customer_id).await?;
        let mut payment = Payment {
            id: Uuid::new_v4().to_string(),
            number: next_document_number(&mut tx, "PAY", new.date.year()).await?,
            kind: PaymentKind::Received,
            counterparty_id: invoice.customer_id.clone(),
            invoice_id: Some(invoice.id.clone()),
            bill_id: None,
            date: new.date,
            amount: amount.clone(),
            method: new.method,
            reference: new.reference,
            notes: new.notes,
            journal_entry_id: None,
            created_by: actor.user_id.clone(),
            created_at: chrono::Utc::now().naive_utc(),
        };

        invoice.register_payment(&amount);

        if invoice.status.is_posted() {
            let lines = posting::payment_received_lines(&tx, &payment, &customer).await?;
            let entry = create_posted_in_tx(
                &mut tx,
                actor,
                NewJournalEntry {
                    date: payment.date,
                    description: format!("Payment {} - {}", payment.number, customer.name),
                    reference: Some(payment.number.clone()),
                    lines,
                },
            )
            .await?;
            payment.journal_entry_id = Some(entry.id.clone());

            invoice.status = if invoice.balance_due == BigDecimal::from(0) {
                InvoiceStatus::Paid
            } else {
                InvoiceStatus::PartiallyPaid
            };

            customer.balance = round2(&(&customer.balance - &amount));
            tx.save_customer(&customer).await?;
        }

        tx.save_invoice(&invoice).await?;
        tx.save_payment(&payment).await?;
        tx.commit().await?;

        log::info!(
            "recorded payment {} of {} against invoice {}",
            payment.number,
            payment.amount,
            invoice.number
        );
        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::Created,
                "payment",
                payment.id.clone(),
                None,
                Some(payment.number.clone()),
            ),
        );
        Ok(payment)
    }

    /// Record a payment made against a posted bill: relieve the payable and
    /// credit the settlement account.
    pub async fn record_made(&self, actor: &Actor, new: NewPaymentMade) -> CoreResult<Payment> {
        validate_positive_amount(&new.amount)?;
        let amount = round2(&new.amount);

        let mut tx = self.storage.begin().await?;
        let mut bill = require_bill(&tx, &new.bill_id).await?;

        if bill.status != BillStatus::Posted {
            return Err(CoreError::InvalidStateTransition {
                action: "record payment",
                required: BillStatus::Posted.as_str(),
                actual: bill.status.as_str().to_string(),
            });
        }
        if amount > bill.balance_due {
            return Err(CoreError::Validation(format!(
                "payment of {} exceeds the remaining balance of {}",
                amount, bill.balance_due
            )));
        }

        let mut vendor = require_vendor(&tx, &bill.vendor_id).await?;
        let mut payment = Payment {
            id: Uuid::new_v4().to_string(),
            number: next_document_number(&mut tx, "PAY", new.date.year()).await?,
            kind: PaymentKind::Made,
            counterparty_id: bill.vendor_id.clone(),
            invoice_id: None,
            bill_id: Some(bill.id.clone()),
            date: new.date,
            amount: amount.clone(),
            method: new.method,
            reference: new.reference,
            notes: new.notes,
            journal_entry_id: None,
            created_by: actor.user_id.clone(),
            created_at: chrono::Utc::now().naive_utc(),
        };

        let lines = posting::payment_made_lines(&tx, &payment, &vendor).await?;
        let entry = create_posted_in_tx(
            &mut tx,
            actor,
            NewJournalEntry {
                date: payment.date,
                description: format!("Payment {} - {}", payment.number, vendor.name),
                reference: Some(payment.number.clone()),
                lines,
            },
        )
        .await?;
        payment.journal_entry_id = Some(entry.id.clone());

        bill.register_payment(&amount);
        vendor.balance = round2(&(&vendor.balance - &amount));

        tx.save_bill(&bill).await?;
        tx.save_vendor(&vendor).await?;
        tx.save_payment(&payment).await?;
        tx.commit().await?;

        log::info!(
            "recorded payment {} of {} against bill {}",
            payment.number,
            payment.amount,
            bill.number
        );
        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::Created,
                "payment",
                payment.id.clone(),
                None,
                Some(payment.number.clone()),
            ),
        );
        Ok(payment)
    }

    pub async fn get(&self, payment_id: &str) -> CoreResult<Option<Payment>> {
        let tx = self.storage.begin().await?;
        tx.payment(payment_id).await
    }

    pub async fn for_invoice(&self, invoice_id: &str) -> CoreResult<Vec<Payment>> {
        let tx = self.storage.begin().await?;
        tx.payments_for_invoice(invoice_id).await
    }
}
