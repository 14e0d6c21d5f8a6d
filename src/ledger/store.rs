//! Append-only ledger store
//!
//! The sole writer of account balances. Posting appends one immutable ledger
//! row per journal line and moves the account's running balance by
//! (debit - credit); everything happens inside the caller's transaction so a
//! partial post can never become visible.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::traits::{require_account, StorageTx};
use crate::types::*;

/// A ledger row paired with the running balance recomputed at read time.
///
/// The recomputation is independent of the stored balance snapshot; over an
/// unrestricted window the two must agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub entry: LedgerEntry,
    pub running_balance: BigDecimal,
}

/// Mirror every line of `entry` into the ledger and move the affected
/// account balances. Re-validates the balance invariant before touching
/// anything; the engine has already checked it, the store checks again.
pub(crate) async fn append_lines<T: StorageTx>(
    tx: &mut T,
    entry: &JournalEntry,
) -> CoreResult<Vec<LedgerEntry>> {
    entry.validate()?;

    let now = chrono::Utc::now().naive_utc();
    let mut appended = Vec::with_capacity(entry.lines.len());

    for line in &entry.lines {
        let mut account = require_account(tx, &line.account_code).await?;
        let new_balance = round2(&(&account.balance + &line.debit - &line.credit));

        let ledger_entry = LedgerEntry {
            id: Uuid::new_v4().to_string(),
            seq: tx.next_ledger_seq().await?,
            account_code: line.account_code.clone(),
            journal_entry_id: entry.id.clone(),
            date: entry.date,
            description: line
                .description
                .clone()
                .unwrap_or_else(|| entry.description.clone()),
            reference: entry
                .reference
                .clone()
                .or_else(|| Some(entry.number.clone())),
            debit: line.debit.clone(),
            credit: line.credit.clone(),
            balance: new_balance.clone(),
            created_at: now,
        };

        tx.append_ledger_entry(&ledger_entry).await?;
        appended.push(ledger_entry);

        account.balance = new_balance;
        account.updated_at = now;
        tx.save_account(&account).await?;
    }

    Ok(appended)
}

/// Current cached balance of an account.
pub async fn account_balance<T: StorageTx>(tx: &T, code: &str) -> CoreResult<BigDecimal> {
    Ok(require_account(tx, code).await?.balance)
}

/// Ledger rows for one account ordered by date then insertion order, with a
/// display-time running balance computed over the selected window.
pub async fn account_ledger<T: StorageTx>(
    tx: &T,
    code: &str,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> CoreResult<Vec<LedgerLine>> {
    require_account(tx, code).await?;
    let entries = tx.ledger_entries(code, start_date, end_date).await?;

    let mut running = BigDecimal::from(0);
    let lines = entries
        .into_iter()
        .map(|entry| {
            running = round2(&(&running + &entry.debit - &entry.credit));
            LedgerLine {
                running_balance: running.clone(),
                entry,
            }
        })
        .collect();

    Ok(lines)
}

/// Net (debit - credit) movement of an account over a date window; used by
/// period reporting and year-end closing.
pub async fn movement<T: StorageTx>(
    tx: &T,
    code: &str,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> CoreResult<BigDecimal> {
    let entries = tx.ledger_entries(code, start_date, end_date).await?;
    let mut net = BigDecimal::from(0);
    for entry in &entries {
        net = &net + &entry.debit - &entry.credit;
    }
    Ok(round2(&net))
}
