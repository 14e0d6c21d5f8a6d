//! Document posting rules
//!
//! Translates business events (invoice approval, bill posting, payments,
//! year-end closing) into balanced journal lines, selecting accounts by
//! well-known chart-of-accounts codes. A missing code is a configuration
//! fault (`RequiredAccountsMissing`), not something the rules recover from.

use bigdecimal::BigDecimal;

use crate::ledger::journal::{create_posted_in_tx, NewJournalEntry};
use crate::ledger::store;
use crate::traits::StorageTx;
use crate::types::*;

/// Well-known chart-of-accounts codes the posting rules resolve against
pub mod codes {
    pub const CASH: &str = "1000";
    pub const BANK: &str = "1100";
    pub const ACCOUNTS_RECEIVABLE: &str = "1200";
    pub const TAX_PAID: &str = "1300";
    pub const ACCOUNTS_PAYABLE: &str = "2000";
    pub const TAX_PAYABLE: &str = "2100";
    pub const RETAINED_EARNINGS: &str = "3100";
    pub const SALES_REVENUE: &str = "4000";
    pub const SALES_DISCOUNTS: &str = "4300";
    pub const EXPENSES: &str = "5000";
}

/// The settlement account for a payment method. A closed mapping: card,
/// check, and miscellaneous settlements clear through Cash, electronic ones
/// through Bank.
pub fn settlement_account_code(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => codes::CASH,
        PaymentMethod::BankTransfer | PaymentMethod::Online => codes::BANK,
        PaymentMethod::Check | PaymentMethod::CreditCard | PaymentMethod::Other => codes::CASH,
    }
}

/// Resolve a well-known account code, failing with
/// [`CoreError::RequiredAccountsMissing`] when the chart is incomplete.
pub async fn required_account<T: StorageTx>(tx: &T, code: &str) -> CoreResult<Account> {
    tx.account(code)
        .await?
        .ok_or_else(|| CoreError::RequiredAccountsMissing(code.to_string()))
}

/// Journal lines for an invoice approval.
///
/// One debit per recorded payment against its settlement account, a debit
/// against Accounts Receivable for any remaining balance, a debit against
/// Sales Discounts for any discount, then credits against Revenue for the
/// subtotal and Tax Payable for the tax. The split lets the same entry cover
/// "fully paid at issue", "partially paid", and "issued on credit".
pub(crate) async fn invoice_approval_lines<T: StorageTx>(
    tx: &T,
    invoice: &Invoice,
    payments: &[Payment],
    customer: &Customer,
) -> CoreResult<Vec<JournalLine>> {
    let zero = BigDecimal::from(0);
    let mut lines = Vec::new();

    for payment in payments {
        let account = required_account(tx, settlement_account_code(payment.method)).await?;
        lines.push(JournalLine::debit(
            account.code,
            payment.amount.clone(),
            Some(format!("Payment {} from {}", payment.number, customer.name)),
        ));
    }

    if invoice.balance_due > zero {
        let ar = required_account(tx, codes::ACCOUNTS_RECEIVABLE).await?;
        lines.push(JournalLine::debit(
            ar.code,
            invoice.balance_due.clone(),
            Some(format!("Accounts receivable from {}", customer.name)),
        ));
    }

    if invoice.discount > zero {
        let discounts = required_account(tx, codes::SALES_DISCOUNTS).await?;
        lines.push(JournalLine::debit(
            discounts.code,
            invoice.discount.clone(),
            Some(format!("Sales discount for invoice {}", invoice.number)),
        ));
    }

    let revenue = required_account(tx, codes::SALES_REVENUE).await?;
    lines.push(JournalLine::credit(
        revenue.code,
        invoice.subtotal.clone(),
        Some(format!("Revenue from invoice {}", invoice.number)),
    ));

    if invoice.tax_amount > zero {
        let tax = required_account(tx, codes::TAX_PAYABLE).await?;
        lines.push(JournalLine::credit(
            tax.code,
            invoice.tax_amount.clone(),
            Some(format!("Tax on invoice {}", invoice.number)),
        ));
    }

    Ok(lines)
}

/// Journal lines for posting a bill: debit Expense (and Tax Paid when
/// applicable), credit Accounts Payable for the total.
pub(crate) async fn bill_posting_lines<T: StorageTx>(
    tx: &T,
    bill: &Bill,
    vendor: &Vendor,
) -> CoreResult<Vec<JournalLine>> {
    let zero = BigDecimal::from(0);
    let mut lines = Vec::new();

    let expense = required_account(tx, codes::EXPENSES).await?;
    lines.push(JournalLine::debit(
        expense.code,
        bill.subtotal.clone(),
        Some(format!("Bill {}", bill.number)),
    ));

    if bill.tax_amount > zero {
        let tax = required_account(tx, codes::TAX_PAID).await?;
        lines.push(JournalLine::debit(
            tax.code,
            bill.tax_amount.clone(),
            Some(format!("Tax on bill {}", bill.number)),
        ));
    }

    let ap = required_account(tx, codes::ACCOUNTS_PAYABLE).await?;
    lines.push(JournalLine::credit(
        ap.code,
        bill.total.clone(),
        Some(format!("Payable to {}", vendor.name)),
    ));

    Ok(lines)
}

/// Journal lines for a payment received against a posted invoice:
/// debit the settlement account, credit Accounts Receivable.
///
/// Revenue is recognized exactly once, at invoice approval; payments are
/// pure cash/receivable movements, so repeated partial payments never
/// re-recognize revenue.
pub(crate) async fn payment_received_lines<T: StorageTx>(
    tx: &T,
    payment: &Payment,
    customer: &Customer,
) -> CoreResult<Vec<JournalLine>> {
    let settlement = required_account(tx, settlement_account_code(payment.method)).await?;
    let ar = required_account(tx, codes::ACCOUNTS_RECEIVABLE).await?;

    Ok(vec![
        JournalLine::debit(
            settlement.code,
            payment.amount.clone(),
            Some(format!("Payment {} from {}", payment.number, customer.name)),
        ),
        JournalLine::credit(
            ar.code,
            payment.amount.clone(),
            Some(format!("Receivable settled by {}", payment.number)),
        ),
    ])
}

/// Journal lines for a payment made against a posted bill:
/// debit Accounts Payable, credit the settlement account.
pub(crate) async fn payment_made_lines<T: StorageTx>(
    tx: &T,
    payment: &Payment,
    vendor: &Vendor,
) -> CoreResult<Vec<JournalLine>> {
    let ap = required_account(tx, codes::ACCOUNTS_PAYABLE).await?;
    let settlement = required_account(tx, settlement_account_code(payment.method)).await?;

    Ok(vec![
        JournalLine::debit(
            ap.code,
            payment.amount.clone(),
            Some(format!("Payment {} to {}", payment.number, vendor.name)),
        ),
        JournalLine::credit(
            settlement.code,
            payment.amount.clone(),
            Some(format!("Settled by {}", payment.number)),
        ),
    ])
}

/// Close a fiscal year inside an existing transaction.
///
/// Sums each revenue account's (credit - debit) and each expense account's
/// (debit - credit) activity within the year, emits closing lines that zero
/// the period activity against Retained Earnings, posts the closing entry
/// dated at the year end, then marks the year closed and locked. Returns the
/// closing entry, or `None` for a year with no activity.
pub(crate) async fn close_fiscal_year_in_tx<T: StorageTx>(
    tx: &mut T,
    actor: &Actor,
    fiscal_year_id: &str,
) -> CoreResult<(FiscalYear, Option<JournalEntry>)> {
    let mut fy = tx
        .fiscal_year(fiscal_year_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "fiscal year",
            id: fiscal_year_id.to_string(),
        })?;

    if fy.is_closed {
        return Err(CoreError::Conflict(format!(
            "fiscal year {} is already closed",
            fy.name
        )));
    }

    let retained = required_account(tx, codes::RETAINED_EARNINGS).await?;
    let zero = BigDecimal::from(0);
    let mut lines = Vec::new();

    for account in tx.list_accounts(Some(AccountCategory::Revenue)).await? {
        let net_debit = store::movement(
            tx,
            &account.code,
            Some(fy.start_date),
            Some(fy.end_date),
        )
        .await?;
        let net_credit = -net_debit;
        if net_credit > zero {
            lines.push(JournalLine::debit(
                account.code.clone(),
                net_credit,
                Some(format!("Closing {}", account.name)),
            ));
        } else if net_credit < zero {
            lines.push(JournalLine::credit(
                account.code.clone(),
                net_credit.abs(),
                Some(format!("Closing {}", account.name)),
            ));
        }
    }

    for account in tx.list_accounts(Some(AccountCategory::Expense)).await? {
        let net_debit = store::movement(
            tx,
            &account.code,
            Some(fy.start_date),
            Some(fy.end_date),
        )
        .await?;
        if net_debit > zero {
            lines.push(JournalLine::credit(
                account.code.clone(),
                net_debit,
                Some(format!("Closing {}", account.name)),
            ));
        } else if net_debit < zero {
            lines.push(JournalLine::debit(
                account.code.clone(),
                net_debit.abs(),
                Some(format!("Closing {}", account.name)),
            ));
        }
    }

    let entry = if lines.is_empty() {
        None
    } else {
        // retained-earnings line absorbs the net income so the entry balances
        let debits: BigDecimal = lines.iter().map(|l| &l.debit).sum();
        let credits: BigDecimal = lines.iter().map(|l| &l.credit).sum();
        let net_income = round2(&(&debits - &credits));
        if net_income > zero {
            lines.push(JournalLine::credit(
                retained.code.clone(),
                net_income,
                Some("Year-end closing - net income".to_string()),
            ));
        } else if net_income < zero {
            lines.push(JournalLine::debit(
                retained.code.clone(),
                net_income.abs(),
                Some("Year-end closing - net loss".to_string()),
            ));
        }

        Some(
            create_posted_in_tx(
                tx,
                actor,
                NewJournalEntry {
                    date: fy.end_date,
                    description: format!("Year-end closing for {}", fy.name),
                    reference: Some(fy.name.clone()),
                    lines,
                },
            )
            .await?,
        )
    };

    fy.is_closed = true;
    fy.is_locked = true;
    tx.save_fiscal_year(&fy).await?;

    Ok((fy, entry))
}
