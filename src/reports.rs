//! Financial reports
//!
//! Read-only aggregations over a single storage snapshot. The trial balance
//! reads the cached account balances; the profit and loss and balance sheet
//! replay ledger activity, so they stay correct for any date window
//! regardless of what has been posted since.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ledger::store;
use crate::traits::{Storage, StorageTx};
use crate::types::*;

/// One account's balance split into its debit or credit column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_code: String,
    pub account_name: String,
    pub category: AccountCategory,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
}

/// Trial balance over all accounts with activity. Its two totals are equal
/// whenever every posting went through the journal engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub rows: Vec<TrialBalanceRow>,
    pub total_debits: BigDecimal,
    pub total_credits: BigDecimal,
}

impl TrialBalance {
    /// Exact equality: all arithmetic is decimal, so no tolerance is needed.
    pub fn is_balanced(&self) -> bool {
        self.total_debits == self.total_credits
    }
}

/// One report line: an account and its signed amount for the statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLine {
    pub account_code: String,
    pub account_name: String,
    pub amount: BigDecimal,
}

/// Income statement over a date window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitAndLoss {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub revenue: Vec<ReportLine>,
    pub expenses: Vec<ReportLine>,
    pub total_revenue: BigDecimal,
    pub total_expenses: BigDecimal,
    pub net_income: BigDecimal,
}

/// Statement of financial position as of a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub as_of: NaiveDate,
    pub assets: Vec<ReportLine>,
    pub liabilities: Vec<ReportLine>,
    pub equity: Vec<ReportLine>,
    /// Revenue minus expenses up to `as_of` that has not been closed to
    /// retained earnings; listed under equity so the statement balances.
    pub current_earnings: BigDecimal,
    pub total_assets: BigDecimal,
    pub total_liabilities: BigDecimal,
    pub total_equity: BigDecimal,
}

impl BalanceSheet {
    pub fn is_balanced(&self) -> bool {
        self.total_assets == round2(&(&self.total_liabilities + &self.total_equity))
    }
}

/// Report builder over a storage backend
#[derive(Clone)]
pub struct Reports<S: Storage> {
    storage: S,
}

impl<S: Storage> Reports<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Trial balance from the cached account balances. An account with a
    /// balance against its normal side still lands in the column its sign
    /// dictates, so the totals always tie out.
    pub async fn trial_balance(&self) -> CoreResult<TrialBalance> {
        let tx = self.storage.begin().await?;
        let zero = BigDecimal::from(0);

        let mut rows = Vec::new();
        let mut total_debits = BigDecimal::from(0);
        let mut total_credits = BigDecimal::from(0);

        for account in tx.list_accounts(None).await? {
            if account.balance == zero {
                continue;
            }
            let (debit, credit) = if account.balance > zero {
                (account.balance.clone(), zero.clone())
            } else {
                (zero.clone(), account.balance.abs())
            };
            total_debits = round2(&(&total_debits + &debit));
            total_credits = round2(&(&total_credits + &credit));
            rows.push(TrialBalanceRow {
                account_code: account.code,
                account_name: account.name,
                category: account.category,
                debit,
                credit,
            });
        }

        Ok(TrialBalance {
            rows,
            total_debits,
            total_credits,
        })
    }

    /// Income statement over a date window, from ledger activity.
    pub async fn profit_and_loss(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> CoreResult<ProfitAndLoss> {
        let tx = self.storage.begin().await?;

        let revenue =
            category_lines(&tx, AccountCategory::Revenue, start_date, end_date).await?;
        let expenses =
            category_lines(&tx, AccountCategory::Expense, start_date, end_date).await?;

        let total_revenue: BigDecimal = revenue.iter().map(|l| &l.amount).sum();
        let total_expenses: BigDecimal = expenses.iter().map(|l| &l.amount).sum();
        let net_income = round2(&(&total_revenue - &total_expenses));

        Ok(ProfitAndLoss {
            start_date,
            end_date,
            revenue,
            expenses,
            total_revenue: round2(&total_revenue),
            total_expenses: round2(&total_expenses),
            net_income,
        })
    }

    /// Balance sheet as of a date, replayed from the ledger so historical
    /// dates report the position as it stood then.
    pub async fn balance_sheet(&self, as_of: NaiveDate) -> CoreResult<BalanceSheet> {
        let tx = self.storage.begin().await?;
        let end = Some(as_of);

        let assets = category_lines(&tx, AccountCategory::Asset, None, end).await?;
        let liabilities = category_lines(&tx, AccountCategory::Liability, None, end).await?;
        let equity = category_lines(&tx, AccountCategory::Equity, None, end).await?;

        // unclosed revenue and expense activity belongs to equity
        let revenue = category_lines(&tx, AccountCategory::Revenue, None, end).await?;
        let expenses = category_lines(&tx, AccountCategory::Expense, None, end).await?;
        let current_earnings = round2(
            &(revenue.iter().map(|l| &l.amount).sum::<BigDecimal>()
                - expenses.iter().map(|l| &l.amount).sum::<BigDecimal>()),
        );

        let total_assets: BigDecimal = assets.iter().map(|l| &l.amount).sum();
        let total_liabilities: BigDecimal = liabilities.iter().map(|l| &l.amount).sum();
        let equity_accounts: BigDecimal = equity.iter().map(|l| &l.amount).sum();
        let total_equity = round2(&(&equity_accounts + &current_earnings));

        Ok(BalanceSheet {
            as_of,
            assets,
            liabilities,
            equity,
            current_earnings,
            total_assets: round2(&total_assets),
            total_liabilities: round2(&total_liabilities),
            total_equity,
        })
    }
}

/// Per-account activity lines for one category, signed by the category's
/// normal side: debit-normal categories report (debit - credit), the rest
/// (credit - debit). Accounts with no activity in the window are omitted.
async fn category_lines<T: StorageTx>(
    tx: &T,
    category: AccountCategory,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> CoreResult<Vec<ReportLine>> {
    let zero = BigDecimal::from(0);
    let mut lines = Vec::new();

    for account in tx.list_accounts(Some(category)).await? {
        let net_debit = store::movement(tx, &account.code, start_date, end_date).await?;
        let amount = if category.is_debit_normal() {
            net_debit
        } else {
            -net_debit
        };
        if amount != zero {
            lines.push(ReportLine {
                account_code: account.code,
                account_name: account.name,
                amount,
            });
        }
    }

    Ok(lines)
}
