//! Document workflows: invoices, bills, and payments.
//!
//! Each workflow drives a document through its state machine and, at the
//! posting transition, asks the posting rules for journal lines and creates
//! the entry in the same transaction as the document update.

pub mod bill;
pub mod invoice;
pub mod payment;

pub use bill::{BillUpdate, BillWorkflow, NewBill};
pub use invoice::{InvoiceUpdate, InvoiceWorkflow, NewInvoice};
pub use payment::{NewPaymentMade, NewPaymentReceived, PaymentProcessor};

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::tax::line_tax;
use crate::traits::StorageTx;
use crate::types::*;
use crate::utils::validation::validate_positive_amount;

/// Input for one invoice or bill line. Tax is computed from the tax code's
/// rate effective on the document date, never supplied by the caller.
#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub description: String,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub tax_code_id: Option<String>,
}

/// Price out a set of document lines: (items, subtotal, tax_amount).
///
/// A tax code with no rate effective on the document date contributes zero
/// tax rather than failing; rates simply have no coverage for that date.
pub(crate) async fn build_line_items<T: StorageTx>(
    tx: &T,
    date: NaiveDate,
    items: &[NewLineItem],
) -> CoreResult<(Vec<LineItem>, BigDecimal, BigDecimal)> {
    if items.is_empty() {
        return Err(CoreError::Validation(
            "a document needs at least one line item".to_string(),
        ));
    }

    let zero = BigDecimal::from(0);
    let mut built = Vec::with_capacity(items.len());
    let mut subtotal = BigDecimal::from(0);
    let mut tax_total = BigDecimal::from(0);

    for item in items {
        validate_positive_amount(&item.quantity)?;
        validate_positive_amount(&item.unit_price)?;

        let base = round2(&(&item.quantity * &item.unit_price));
        let tax = match &item.tax_code_id {
            Some(id) => {
                let code = tx.tax_code(id).await?.ok_or_else(|| CoreError::NotFound {
                    entity: "tax code",
                    id: id.clone(),
                })?;
                match code.effective_rate(date) {
                    Some(rate) => line_tax(&base, &rate.rate),
                    None => zero.clone(),
                }
            }
            None => zero.clone(),
        };

        subtotal = round2(&(&subtotal + &base));
        tax_total = round2(&(&tax_total + &tax));
        built.push(LineItem {
            description: item.description.clone(),
            quantity: item.quantity.clone(),
            unit_price: item.unit_price.clone(),
            tax_code_id: item.tax_code_id.clone(),
            tax_amount: tax.clone(),
            total: round2(&(&base + &tax)),
        });
    }

    Ok((built, subtotal, tax_total))
}

pub(crate) async fn require_invoice<T: StorageTx>(tx: &T, id: &str) -> CoreResult<Invoice> {
    tx.invoice(id).await?.ok_or(CoreError::NotFound {
        entity: "invoice",
        id: id.to_string(),
    })
}

pub(crate) async fn require_bill<T: StorageTx>(tx: &T, id: &str) -> CoreResult<Bill> {
    tx.bill(id).await?.ok_or(CoreError::NotFound {
        entity: "bill",
        id: id.to_string(),
    })
}

pub(crate) async fn require_customer<T: StorageTx>(tx: &T, id: &str) -> CoreResult<Customer> {
    tx.customer(id).await?.ok_or(CoreError::NotFound {
        entity: "customer",
        id: id.to_string(),
    })
}

pub(crate) async fn require_vendor<T: StorageTx>(tx: &T, id: &str) -> CoreResult<Vendor> {
    tx.vendor(id).await?.ok_or(CoreError::NotFound {
        entity: "vendor",
        id: id.to_string(),
    })
}
