//! Walks one invoice through its whole life: draft, verification, approval
//! with its posted journal entry, a partial and then a final payment, and
//! the reports afterwards.
//!
//! Run with: cargo run --example invoice_lifecycle

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;

use books_core::documents::{NewInvoice, NewLineItem, NewPaymentReceived};
use books_core::posting::codes;
use books_core::{
    Actor, Books, CoreResult, Customer, MemoryStorage, PaymentMethod, Role, Storage, StorageTx,
    TaxCode, TaxRate,
};

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).expect("literal decimal")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("literal date")
}

#[tokio::main]
async fn main() -> CoreResult<()> {
    let storage = MemoryStorage::new();
    let books = Books::new(storage.clone());

    let admin = Actor::new("alice", Role::Admin);
    let manager = Actor::new("bob", Role::Manager);

    books.chart().setup_standard_chart(&admin).await?;
    println!("chart of accounts ready");

    let mut tx = storage.begin().await?;
    tx.save_tax_code(&TaxCode {
        id: "vat".to_string(),
        name: "VAT 15%".to_string(),
        rates: vec![TaxRate {
            rate: dec("15"),
            effective_from: date(2020, 1, 1),
            effective_to: None,
        }],
    })
    .await?;
    tx.save_customer(&Customer {
        id: "acme".to_string(),
        name: "Acme Ltd".to_string(),
        balance: BigDecimal::from(0),
    })
    .await?;
    tx.commit().await?;

    let invoice = books
        .invoices()
        .create(
            &admin,
            NewInvoice {
                customer_id: "acme".to_string(),
                date: date(2026, 2, 1),
                due_date: date(2026, 3, 1),
                reference: Some("PO-4711".to_string()),
                notes: None,
                discount: None,
                items: vec![
                    NewLineItem {
                        description: "Consulting".to_string(),
                        quantity: dec("8"),
                        unit_price: dec("120"),
                        tax_code_id: Some("vat".to_string()),
                    },
                    NewLineItem {
                        description: "Travel".to_string(),
                        quantity: dec("1"),
                        unit_price: dec("40"),
                        tax_code_id: None,
                    },
                ],
            },
        )
        .await?;
    println!(
        "created {}: subtotal {} tax {} total {}",
        invoice.number, invoice.subtotal, invoice.tax_amount, invoice.total
    );

    books.invoices().verify(&manager, &invoice.id).await?;
    let approved = books.invoices().approve(&admin, &invoice.id).await?;
    let entry = books
        .journal()
        .get(approved.journal_entry_id.as_deref().unwrap_or_default())
        .await?
        .expect("approval entry");
    println!("approved {} with journal entry {}:", approved.number, entry.number);
    for line in &entry.lines {
        println!(
            "  {:<6} Dr {:>10} Cr {:>10}",
            line.account_code, line.debit, line.credit
        );
    }

    let settle_rest = approved.balance_due.to_string();
    for amount in ["500", settle_rest.as_str()] {
        let remaining = books
            .invoices()
            .get(&invoice.id)
            .await?
            .expect("invoice")
            .balance_due;
        let amount = dec(amount).min(remaining);
        if amount == BigDecimal::from(0) {
            break;
        }
        let payment = books
            .payments()
            .record_received(
                &admin,
                NewPaymentReceived {
                    invoice_id: invoice.id.clone(),
                    date: date(2026, 2, 15),
                    amount,
                    method: PaymentMethod::BankTransfer,
                    reference: None,
                    notes: None,
                },
            )
            .await?;
        let after = books.invoices().get(&invoice.id).await?.expect("invoice");
        println!(
            "payment {} of {} -> status {:?}, balance due {}",
            payment.number, payment.amount, after.status, after.balance_due
        );
    }

    let tb = books.reports().trial_balance().await?;
    println!("\ntrial balance (debits {} / credits {}):", tb.total_debits, tb.total_credits);
    for row in &tb.rows {
        println!(
            "  {:<6} {:<22} Dr {:>10} Cr {:>10}",
            row.account_code, row.account_name, row.debit, row.credit
        );
    }

    let bank = books.account_ledger(codes::BANK, None, None).await?;
    println!("\nbank ledger:");
    for line in &bank {
        println!(
            "  {} {:<28} Dr {:>8} Cr {:>8} balance {:>10}",
            line.entry.date,
            line.entry.description,
            line.entry.debit,
            line.entry.credit,
            line.running_balance
        );
    }

    Ok(())
}
