//! End-to-end tests driving the full accounting cycle through the facade:
//! chart setup, invoice and bill lifecycles, payments, fiscal year closing,
//! and the reports that tie it all together.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;
use std::sync::Arc;

use books_core::audit::MemoryAuditSink;
use books_core::documents::{NewBill, NewInvoice, NewLineItem, NewPaymentMade, NewPaymentReceived};
use books_core::ledger::NewJournalEntry;
use books_core::posting::codes;
use books_core::{
    Account, AccountCategory, Actor, BillStatus, Books, CoreError, Customer, FiscalYear,
    InvoiceStatus, JournalLine, MemoryStorage, PaymentMethod, Role, Storage, StorageTx, TaxCode,
    TaxRate, Vendor,
};

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn admin() -> Actor {
    Actor::new("u-admin", Role::Admin)
}

fn manager() -> Actor {
    Actor::new("u-manager", Role::Manager)
}

fn accountant() -> Actor {
    Actor::new("u-accountant", Role::Accountant)
}

/// Standard chart, a 15% VAT code, one customer, and one vendor.
async fn setup() -> (Books<MemoryStorage>, MemoryStorage) {
    let storage = MemoryStorage::new();
    let books = Books::new(storage.clone());
    books.chart().setup_standard_chart(&admin()).await.unwrap();

    let mut tx = storage.begin().await.unwrap();
    tx.save_tax_code(&TaxCode {
        id: "vat".to_string(),
        name: "VAT 15%".to_string(),
        rates: vec![TaxRate {
            rate: dec("15"),
            effective_from: date(2020, 1, 1),
            effective_to: None,
        }],
    })
    .await
    .unwrap();
    tx.save_customer(&Customer {
        id: "c1".to_string(),
        name: "Acme Ltd".to_string(),
        balance: BigDecimal::from(0),
    })
    .await
    .unwrap();
    tx.save_vendor(&Vendor {
        id: "v1".to_string(),
        name: "Supply Co".to_string(),
        balance: BigDecimal::from(0),
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    (books, storage)
}

fn invoice_input(date_: NaiveDate) -> NewInvoice {
    NewInvoice {
        customer_id: "c1".to_string(),
        date: date_,
        due_date: date_ + chrono::Duration::days(30),
        reference: None,
        notes: None,
        discount: None,
        items: vec![NewLineItem {
            description: "Consulting".to_string(),
            quantity: dec("1"),
            unit_price: dec("1000"),
            tax_code_id: Some("vat".to_string()),
        }],
    }
}

#[tokio::test]
async fn invoice_totals_computed_from_items_and_tax() {
    let (books, _storage) = setup().await;

    let invoice = books
        .invoices()
        .create(&admin(), invoice_input(date(2026, 2, 1)))
        .await
        .unwrap();

    assert_eq!(invoice.status, InvoiceStatus::Draft);
    assert_eq!(invoice.number, "INV2026000001");
    assert_eq!(invoice.subtotal, dec("1000.00"));
    assert_eq!(invoice.tax_amount, dec("150.00"));
    assert_eq!(invoice.total, dec("1150.00"));
    assert_eq!(invoice.balance_due, dec("1150.00"));
}

#[tokio::test]
async fn approval_posts_receivable_against_revenue_and_tax() {
    let (books, _storage) = setup().await;

    let invoice = books
        .invoices()
        .create(&admin(), invoice_input(date(2026, 2, 1)))
        .await
        .unwrap();
    books.invoices().verify(&manager(), &invoice.id).await.unwrap();
    let approved = books.invoices().approve(&admin(), &invoice.id).await.unwrap();

    assert_eq!(approved.status, InvoiceStatus::Approved);
    let entry_id = approved.journal_entry_id.clone().unwrap();
    let entry = books.journal().get(&entry_id).await.unwrap().unwrap();
    assert_eq!(entry.lines.len(), 3);
    assert!(entry.is_balanced());

    assert_eq!(
        books.account_balance(codes::ACCOUNTS_RECEIVABLE).await.unwrap(),
        dec("1150.00")
    );
    assert_eq!(
        books.account_balance(codes::SALES_REVENUE).await.unwrap(),
        dec("-1000.00")
    );
    assert_eq!(
        books.account_balance(codes::TAX_PAYABLE).await.unwrap(),
        dec("-150.00")
    );
}

#[tokio::test]
async fn full_payment_settles_the_invoice() {
    let (books, storage) = setup().await;

    let invoice = books
        .invoices()
        .create(&admin(), invoice_input(date(2026, 2, 1)))
        .await
        .unwrap();
    books.invoices().verify(&manager(), &invoice.id).await.unwrap();
    books.invoices().approve(&admin(), &invoice.id).await.unwrap();

    let payment = books
        .payments()
        .record_received(
            &admin(),
            NewPaymentReceived {
                invoice_id: invoice.id.clone(),
                date: date(2026, 2, 10),
                amount: dec("1150"),
                method: PaymentMethod::Cash,
                reference: None,
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(payment.number, "PAY2026000001");
    assert!(payment.journal_entry_id.is_some());

    let invoice = books.invoices().get(&invoice.id).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert_eq!(invoice.balance_due, dec("0.00"));

    assert_eq!(books.account_balance(codes::CASH).await.unwrap(), dec("1150.00"));
    assert_eq!(
        books.account_balance(codes::ACCOUNTS_RECEIVABLE).await.unwrap(),
        dec("0.00")
    );

    let tx = storage.begin().await.unwrap();
    let customer = tx.customer("c1").await.unwrap().unwrap();
    assert_eq!(customer.balance, dec("0.00"));
}

#[tokio::test]
async fn partial_payment_leaves_a_balance() {
    let (books, _storage) = setup().await;

    let invoice = books
        .invoices()
        .create(&admin(), invoice_input(date(2026, 2, 1)))
        .await
        .unwrap();
    books.invoices().verify(&manager(), &invoice.id).await.unwrap();
    books.invoices().approve(&admin(), &invoice.id).await.unwrap();

    books
        .payments()
        .record_received(
            &admin(),
            NewPaymentReceived {
                invoice_id: invoice.id.clone(),
                date: date(2026, 2, 10),
                amount: dec("500"),
                method: PaymentMethod::BankTransfer,
                reference: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let invoice = books.invoices().get(&invoice.id).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::PartiallyPaid);
    assert_eq!(invoice.paid_amount, dec("500.00"));
    assert_eq!(invoice.balance_due, dec("650.00"));

    // bank transfers clear through the bank account
    assert_eq!(books.account_balance(codes::BANK).await.unwrap(), dec("500.00"));
    assert_eq!(
        books.account_balance(codes::ACCOUNTS_RECEIVABLE).await.unwrap(),
        dec("650.00")
    );
    // a second partial payment must not touch revenue again
    assert_eq!(
        books.account_balance(codes::SALES_REVENUE).await.unwrap(),
        dec("-1000.00")
    );
}

#[tokio::test]
async fn payment_before_approval_folds_into_the_approval_entry() {
    let (books, _storage) = setup().await;

    let invoice = books
        .invoices()
        .create(&admin(), invoice_input(date(2026, 2, 1)))
        .await
        .unwrap();

    // recorded while still a draft: no journal entry yet
    let payment = books
        .payments()
        .record_received(
            &admin(),
            NewPaymentReceived {
                invoice_id: invoice.id.clone(),
                date: date(2026, 2, 2),
                amount: dec("500"),
                method: PaymentMethod::Cash,
                reference: None,
                notes: None,
            },
        )
        .await
        .unwrap();
    assert!(payment.journal_entry_id.is_none());
    assert_eq!(books.account_balance(codes::CASH).await.unwrap(), dec("0"));

    books.invoices().verify(&manager(), &invoice.id).await.unwrap();
    let approved = books.invoices().approve(&admin(), &invoice.id).await.unwrap();
    assert_eq!(approved.status, InvoiceStatus::PartiallyPaid);

    // Dr Cash 500, Dr A/R 650, Cr Revenue 1000, Cr Tax Payable 150
    let entry_id = approved.journal_entry_id.unwrap();
    let entry = books.journal().get(&entry_id).await.unwrap().unwrap();
    assert_eq!(entry.lines.len(), 4);
    assert!(entry.is_balanced());
    assert_eq!(books.account_balance(codes::CASH).await.unwrap(), dec("500.00"));
    assert_eq!(
        books.account_balance(codes::ACCOUNTS_RECEIVABLE).await.unwrap(),
        dec("650.00")
    );
}

#[tokio::test]
async fn overpayment_is_rejected() {
    let (books, _storage) = setup().await;

    let invoice = books
        .invoices()
        .create(&admin(), invoice_input(date(2026, 2, 1)))
        .await
        .unwrap();
    books.invoices().verify(&manager(), &invoice.id).await.unwrap();
    books.invoices().approve(&admin(), &invoice.id).await.unwrap();

    let result = books
        .payments()
        .record_received(
            &admin(),
            NewPaymentReceived {
                invoice_id: invoice.id.clone(),
                date: date(2026, 2, 10),
                amount: dec("2000"),
                method: PaymentMethod::Cash,
                reference: None,
                notes: None,
            },
        )
        .await;
    assert!(matches!(result, Err(CoreError::Validation(_))));

    let invoice = books.invoices().get(&invoice.id).await.unwrap().unwrap();
    assert_eq!(invoice.paid_amount, dec("0"));
    assert_eq!(books.account_balance(codes::CASH).await.unwrap(), dec("0"));
}

#[tokio::test]
async fn repricing_below_the_paid_amount_is_rejected() {
    let (books, _storage) = setup().await;

    let invoice = books
        .invoices()
        .create(&admin(), invoice_input(date(2026, 2, 1)))
        .await
        .unwrap();
    books
        .payments()
        .record_received(
            &admin(),
            NewPaymentReceived {
                invoice_id: invoice.id.clone(),
                date: date(2026, 2, 2),
                amount: dec("500"),
                method: PaymentMethod::Cash,
                reference: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    // shrinking the draft to 100 would leave a negative balance due
    let result = books
        .invoices()
        .update(
            &admin(),
            &invoice.id,
            books_core::documents::InvoiceUpdate {
                items: Some(vec![NewLineItem {
                    description: "Consulting".to_string(),
                    quantity: dec("1"),
                    unit_price: dec("100"),
                    tax_code_id: None,
                }]),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(CoreError::Validation(_))));

    // invoice is untouched and the lifecycle still completes
    let invoice = books.invoices().get(&invoice.id).await.unwrap().unwrap();
    assert_eq!(invoice.total, dec("1150.00"));
    assert_eq!(invoice.balance_due, dec("650.00"));

    books.invoices().verify(&manager(), &invoice.id).await.unwrap();
    let approved = books.invoices().approve(&admin(), &invoice.id).await.unwrap();
    assert_eq!(approved.status, InvoiceStatus::PartiallyPaid);
}

#[tokio::test]
async fn approving_a_draft_invoice_fails() {
    let (books, _storage) = setup().await;

    let invoice = books
        .invoices()
        .create(&admin(), invoice_input(date(2026, 2, 1)))
        .await
        .unwrap();

    let result = books.invoices().approve(&admin(), &invoice.id).await;
    assert!(matches!(
        result,
        Err(CoreError::InvalidStateTransition { action: "approve invoice", .. })
    ));
}

#[tokio::test]
async fn verification_and_approval_are_role_gated() {
    let (books, _storage) = setup().await;

    let invoice = books
        .invoices()
        .create(&accountant(), invoice_input(date(2026, 2, 1)))
        .await
        .unwrap();

    let verify = books.invoices().verify(&accountant(), &invoice.id).await;
    assert!(matches!(verify, Err(CoreError::Forbidden(_))));

    books.invoices().verify(&manager(), &invoice.id).await.unwrap();

    // managers can verify but not approve
    let approve = books.invoices().approve(&manager(), &invoice.id).await;
    assert!(matches!(approve, Err(CoreError::Forbidden(_))));
}

#[tokio::test]
async fn rejected_invoice_can_be_reverified_and_approved() {
    let (books, _storage) = setup().await;

    let invoice = books
        .invoices()
        .create(&admin(), invoice_input(date(2026, 2, 1)))
        .await
        .unwrap();
    books.invoices().verify(&manager(), &invoice.id).await.unwrap();

    let rejected = books.invoices().reject(&manager(), &invoice.id).await.unwrap();
    assert_eq!(rejected.status, InvoiceStatus::Draft);
    assert!(rejected.verified_by.is_none());

    books.invoices().verify(&manager(), &invoice.id).await.unwrap();
    let approved = books.invoices().approve(&admin(), &invoice.id).await.unwrap();
    assert_eq!(approved.status, InvoiceStatus::Approved);
    assert_eq!(
        books.account_balance(codes::ACCOUNTS_RECEIVABLE).await.unwrap(),
        dec("1150.00")
    );
}

#[tokio::test]
async fn cancelled_invoice_stays_cancelled() {
    let (books, _storage) = setup().await;

    let invoice = books
        .invoices()
        .create(&admin(), invoice_input(date(2026, 2, 1)))
        .await
        .unwrap();
    books.invoices().cancel(&admin(), &invoice.id).await.unwrap();

    let result = books.invoices().reject(&manager(), &invoice.id).await;
    assert!(matches!(
        result,
        Err(CoreError::InvalidStateTransition { action: "reject invoice", .. })
    ));

    let invoice = books.invoices().get(&invoice.id).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Cancelled);
}

#[tokio::test]
async fn overlapping_fiscal_years_conflict() {
    let (books, _storage) = setup().await;
    books
        .open_fiscal_year("FY2025-26", date(2025, 7, 1), date(2026, 6, 30))
        .await
        .unwrap();

    // starts before the existing year but overlaps its range
    let straddling = books
        .open_fiscal_year("CY2026", date(2026, 1, 1), date(2026, 12, 31))
        .await;
    assert!(matches!(straddling, Err(CoreError::Conflict(_))));

    // fully enclosing an existing year conflicts too
    let enclosing = books
        .open_fiscal_year("Long", date(2025, 1, 1), date(2027, 12, 31))
        .await;
    assert!(matches!(enclosing, Err(CoreError::Conflict(_))));

    // a disjoint year is fine
    books
        .open_fiscal_year("FY2026-27", date(2026, 7, 1), date(2027, 6, 30))
        .await
        .unwrap();
}

#[tokio::test]
async fn locked_fiscal_year_blocks_invoice_approval() {
    let (books, storage) = setup().await;
    {
        let mut tx = storage.begin().await.unwrap();
        tx.save_fiscal_year(&FiscalYear {
            id: "fy2024".to_string(),
            name: "FY2024".to_string(),
            start_date: date(2024, 1, 1),
            end_date: date(2024, 12, 31),
            is_closed: true,
            is_locked: true,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    let invoice = books
        .invoices()
        .create(&admin(), invoice_input(date(2024, 6, 15)))
        .await
        .unwrap();
    books.invoices().verify(&manager(), &invoice.id).await.unwrap();

    let result = books.invoices().approve(&admin(), &invoice.id).await;
    assert!(matches!(result, Err(CoreError::LockedFiscalYear(_))));

    // nothing moved and the invoice is still verified
    let invoice = books.invoices().get(&invoice.id).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Verified);
    assert!(invoice.journal_entry_id.is_none());
    assert_eq!(
        books.account_balance(codes::ACCOUNTS_RECEIVABLE).await.unwrap(),
        dec("0")
    );
    assert_eq!(
        books.account_balance(codes::SALES_REVENUE).await.unwrap(),
        dec("0")
    );
}

#[tokio::test]
async fn bill_lifecycle_books_expense_and_relieves_payable() {
    let (books, storage) = setup().await;

    let bill = books
        .bills()
        .create(
            &admin(),
            NewBill {
                vendor_id: "v1".to_string(),
                date: date(2026, 3, 1),
                due_date: date(2026, 3, 31),
                reference: None,
                notes: None,
                items: vec![NewLineItem {
                    description: "Materials".to_string(),
                    quantity: dec("2"),
                    unit_price: dec("400"),
                    tax_code_id: Some("vat".to_string()),
                }],
            },
        )
        .await
        .unwrap();
    assert_eq!(bill.number, "BILL2026000001");
    assert_eq!(bill.total, dec("920.00"));

    books.bills().verify(&manager(), &bill.id).await.unwrap();
    let posted = books.bills().approve(&admin(), &bill.id).await.unwrap();
    assert_eq!(posted.status, BillStatus::Posted);

    assert_eq!(
        books.account_balance(codes::EXPENSES).await.unwrap(),
        dec("800.00")
    );
    assert_eq!(
        books.account_balance(codes::TAX_PAID).await.unwrap(),
        dec("120.00")
    );
    assert_eq!(
        books.account_balance(codes::ACCOUNTS_PAYABLE).await.unwrap(),
        dec("-920.00")
    );
    {
        let tx = storage.begin().await.unwrap();
        assert_eq!(tx.vendor("v1").await.unwrap().unwrap().balance, dec("920.00"));
    }

    books
        .payments()
        .record_made(
            &admin(),
            NewPaymentMade {
                bill_id: bill.id.clone(),
                date: date(2026, 3, 10),
                amount: dec("920"),
                method: PaymentMethod::BankTransfer,
                reference: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    let bill = books.bills().get(&bill.id).await.unwrap().unwrap();
    assert_eq!(bill.balance_due, dec("0.00"));
    assert_eq!(
        books.account_balance(codes::ACCOUNTS_PAYABLE).await.unwrap(),
        dec("0.00")
    );
    assert_eq!(books.account_balance(codes::BANK).await.unwrap(), dec("-920.00"));
    {
        let tx = storage.begin().await.unwrap();
        assert_eq!(tx.vendor("v1").await.unwrap().unwrap().balance, dec("0.00"));
    }
}

#[tokio::test]
async fn paying_an_unposted_bill_fails() {
    let (books, _storage) = setup().await;

    let bill = books
        .bills()
        .create(
            &admin(),
            NewBill {
                vendor_id: "v1".to_string(),
                date: date(2026, 3, 1),
                due_date: date(2026, 3, 31),
                reference: None,
                notes: None,
                items: vec![NewLineItem {
                    description: "Materials".to_string(),
                    quantity: dec("1"),
                    unit_price: dec("100"),
                    tax_code_id: None,
                }],
            },
        )
        .await
        .unwrap();

    let result = books
        .payments()
        .record_made(
            &admin(),
            NewPaymentMade {
                bill_id: bill.id,
                date: date(2026, 3, 10),
                amount: dec("100"),
                method: PaymentMethod::Cash,
                reference: None,
                notes: None,
            },
        )
        .await;
    assert!(matches!(
        result,
        Err(CoreError::InvalidStateTransition { action: "record payment", .. })
    ));
}

#[tokio::test]
async fn year_end_closing_rolls_into_retained_earnings() {
    let (books, _storage) = setup().await;
    let fy = books
        .open_fiscal_year("FY2026", date(2026, 1, 1), date(2026, 12, 31))
        .await
        .unwrap();

    // revenue 1000 + 150 tax, expense 300
    let invoice = books
        .invoices()
        .create(&admin(), invoice_input(date(2026, 2, 1)))
        .await
        .unwrap();
    books.invoices().verify(&manager(), &invoice.id).await.unwrap();
    books.invoices().approve(&admin(), &invoice.id).await.unwrap();

    let expense = books
        .journal()
        .create(
            &admin(),
            NewJournalEntry {
                date: date(2026, 5, 1),
                description: "Office supplies".to_string(),
                reference: None,
                lines: vec![
                    JournalLine::debit(codes::EXPENSES, dec("300"), None),
                    JournalLine::credit(codes::CASH, dec("300"), None),
                ],
            },
        )
        .await
        .unwrap();
    books.journal().post(&admin(), &expense.id).await.unwrap();

    let closing = books
        .close_fiscal_year(&admin(), &fy.id)
        .await
        .unwrap()
        .expect("closing entry");
    // Dr Revenue 1000, Cr Expenses 300, Cr Retained Earnings 700
    assert_eq!(closing.date, date(2026, 12, 31));
    assert_eq!(closing.lines.len(), 3);
    assert!(closing.is_balanced());

    assert_eq!(
        books.account_balance(codes::SALES_REVENUE).await.unwrap(),
        dec("0.00")
    );
    assert_eq!(books.account_balance(codes::EXPENSES).await.unwrap(), dec("0.00"));
    assert_eq!(
        books.account_balance(codes::RETAINED_EARNINGS).await.unwrap(),
        dec("-700.00")
    );

    let fy_after = books.fiscal_year(&fy.id).await.unwrap().unwrap();
    assert!(fy_after.is_closed);
    assert!(fy_after.is_locked);

    // closing twice conflicts, and the locked year rejects new postings
    let again = books.close_fiscal_year(&admin(), &fy.id).await;
    assert!(matches!(again, Err(CoreError::Conflict(_))));

    let backdated = books
        .journal()
        .create(
            &admin(),
            NewJournalEntry {
                date: date(2026, 6, 1),
                description: "Late entry".to_string(),
                reference: None,
                lines: vec![
                    JournalLine::debit(codes::CASH, dec("10"), None),
                    JournalLine::credit(codes::SALES_REVENUE, dec("10"), None),
                ],
            },
        )
        .await
        .unwrap();
    let post = books.journal().post(&admin(), &backdated.id).await;
    assert!(matches!(post, Err(CoreError::LockedFiscalYear(_))));
}

#[tokio::test]
async fn closing_a_quiet_year_locks_without_an_entry() {
    let (books, _storage) = setup().await;
    let fy = books
        .open_fiscal_year("FY2025", date(2025, 1, 1), date(2025, 12, 31))
        .await
        .unwrap();

    let closing = books.close_fiscal_year(&admin(), &fy.id).await.unwrap();
    assert!(closing.is_none());

    let fy_after = books.fiscal_year(&fy.id).await.unwrap().unwrap();
    assert!(fy_after.is_closed);
    assert!(fy_after.is_locked);
}

#[tokio::test]
async fn ledger_replay_matches_stored_balances() {
    let (books, _storage) = setup().await;

    let invoice = books
        .invoices()
        .create(&admin(), invoice_input(date(2026, 2, 1)))
        .await
        .unwrap();
    books.invoices().verify(&manager(), &invoice.id).await.unwrap();
    books.invoices().approve(&admin(), &invoice.id).await.unwrap();
    books
        .payments()
        .record_received(
            &admin(),
            NewPaymentReceived {
                invoice_id: invoice.id.clone(),
                date: date(2026, 2, 10),
                amount: dec("400"),
                method: PaymentMethod::Cash,
                reference: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    for code in [codes::CASH, codes::ACCOUNTS_RECEIVABLE, codes::SALES_REVENUE] {
        let lines = books.account_ledger(code, None, None).await.unwrap();
        let replayed = lines
            .last()
            .map(|l| l.running_balance.clone())
            .unwrap_or_else(|| BigDecimal::from(0));
        assert_eq!(replayed, books.account_balance(code).await.unwrap());
    }
}

#[tokio::test]
async fn reports_tie_out_after_a_full_cycle() {
    let (books, _storage) = setup().await;

    let invoice = books
        .invoices()
        .create(&admin(), invoice_input(date(2026, 2, 1)))
        .await
        .unwrap();
    books.invoices().verify(&manager(), &invoice.id).await.unwrap();
    books.invoices().approve(&admin(), &invoice.id).await.unwrap();

    let tb = books.reports().trial_balance().await.unwrap();
    assert!(tb.is_balanced());
    assert_eq!(tb.total_debits, dec("1150.00"));

    let pnl = books
        .reports()
        .profit_and_loss(Some(date(2026, 1, 1)), Some(date(2026, 12, 31)))
        .await
        .unwrap();
    assert_eq!(pnl.total_revenue, dec("1000.00"));
    assert_eq!(pnl.net_income, dec("1000.00"));

    let sheet = books.reports().balance_sheet(date(2026, 12, 31)).await.unwrap();
    assert!(sheet.is_balanced());
}

#[tokio::test]
async fn audit_sink_sees_the_document_lifecycle() {
    let storage = MemoryStorage::new();
    let sink = MemoryAuditSink::new();
    let books = Books::with_audit(storage.clone(), Arc::new(sink.clone()));
    books.chart().setup_standard_chart(&admin()).await.unwrap();
    {
        let mut tx = storage.begin().await.unwrap();
        tx.save_customer(&Customer {
            id: "c1".to_string(),
            name: "Acme Ltd".to_string(),
            balance: BigDecimal::from(0),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    let invoice = books
        .invoices()
        .create(
            &admin(),
            NewInvoice {
                customer_id: "c1".to_string(),
                date: date(2026, 2, 1),
                due_date: date(2026, 3, 1),
                reference: None,
                notes: None,
                discount: None,
                items: vec![NewLineItem {
                    description: "Consulting".to_string(),
                    quantity: dec("1"),
                    unit_price: dec("1000"),
                    tax_code_id: None,
                }],
            },
        )
        .await
        .unwrap();
    books.invoices().verify(&manager(), &invoice.id).await.unwrap();
    books.invoices().approve(&admin(), &invoice.id).await.unwrap();

    let events = sink.events();
    let invoice_events: Vec<_> = events
        .iter()
        .filter(|e| e.entity_kind == "invoice")
        .collect();
    assert_eq!(invoice_events.len(), 3);
    assert_eq!(invoice_events[1].before.as_deref(), Some("DRAFT"));
    assert_eq!(invoice_events[1].after.as_deref(), Some("VERIFIED"));
    assert_eq!(invoice_events[2].after.as_deref(), Some("APPROVED"));
}

#[tokio::test]
async fn discounts_post_against_the_discount_account() {
    let (books, _storage) = setup().await;

    let mut input = invoice_input(date(2026, 2, 1));
    input.discount = Some(dec("100"));
    let invoice = books.invoices().create(&admin(), input).await.unwrap();
    assert_eq!(invoice.total, dec("1050.00"));

    books.invoices().verify(&manager(), &invoice.id).await.unwrap();
    let approved = books.invoices().approve(&admin(), &invoice.id).await.unwrap();

    // Dr A/R 1050, Dr Discounts 100, Cr Revenue 1000, Cr Tax Payable 150
    let entry = books
        .journal()
        .get(&approved.journal_entry_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.lines.len(), 4);
    assert!(entry.is_balanced());
    assert_eq!(
        books.account_balance(codes::SALES_DISCOUNTS).await.unwrap(),
        dec("100.00")
    );
    assert_eq!(
        books.account_balance(codes::ACCOUNTS_RECEIVABLE).await.unwrap(),
        dec("1050.00")
    );
}

#[tokio::test]
async fn deactivated_account_rejects_new_entries() {
    let (books, _storage) = setup().await;
    books.chart().deactivate(&admin(), codes::CASH).await.unwrap();

    let result = books
        .journal()
        .create(
            &admin(),
            NewJournalEntry {
                date: date(2026, 2, 1),
                description: "Cash sale".to_string(),
                reference: None,
                lines: vec![
                    JournalLine::debit(codes::CASH, dec("100"), None),
                    JournalLine::credit(codes::SALES_REVENUE, dec("100"), None),
                ],
            },
        )
        .await;
    assert!(matches!(result, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn standard_chart_covers_the_posting_codes() {
    let (books, _storage) = setup().await;
    for code in [
        codes::CASH,
        codes::BANK,
        codes::ACCOUNTS_RECEIVABLE,
        codes::TAX_PAID,
        codes::ACCOUNTS_PAYABLE,
        codes::TAX_PAYABLE,
        codes::RETAINED_EARNINGS,
        codes::SALES_REVENUE,
        codes::SALES_DISCOUNTS,
        codes::EXPENSES,
    ] {
        let account: Option<Account> = books.chart().get_account(code).await.unwrap();
        assert!(account.is_some(), "missing {code}");
    }
    assert_eq!(
        books
            .chart()
            .get_account(codes::CASH)
            .await
            .unwrap()
            .unwrap()
            .category,
        AccountCategory::Asset
    );
}
