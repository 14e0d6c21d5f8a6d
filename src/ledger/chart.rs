//! Chart of accounts management
//!
//! Accounts form a flat store keyed by code with an optional parent code;
//! tree walks are repeated lookups. Self-parenting and re-parenting cycles
//! are rejected when written.

use std::collections::HashMap;
use std::sync::Arc;

use crate::audit::{emit, AuditAction, AuditEvent, AuditSink, NoopAuditSink};
use crate::traits::{require_account, Storage, StorageTx};
use crate::types::*;
use crate::utils::validation::{validate_account_code, validate_account_name};

/// Manager for chart-of-accounts operations
#[derive(Clone)]
pub struct ChartManager<S: Storage> {
    storage: S,
    audit: Arc<dyn AuditSink>,
}

impl<S: Storage> ChartManager<S> {
    pub fn new(storage: S) -> Self {
        Self::with_audit(storage, Arc::new(NoopAuditSink))
    }

    pub fn with_audit(storage: S, audit: Arc<dyn AuditSink>) -> Self {
        Self { storage, audit }
    }

    /// Create a new account with a zero opening balance.
    pub async fn create_account(
        &self,
        actor: &Actor,
        code: &str,
        name: &str,
        category: AccountCategory,
        parent_code: Option<String>,
    ) -> CoreResult<Account> {
        validate_account_code(code)?;
        validate_account_name(name)?;

        let mut tx = self.storage.begin().await?;

        if tx.account(code).await?.is_some() {
            return Err(CoreError::Conflict(format!(
                "account with code '{code}' already exists"
            )));
        }

        if let Some(ref parent) = parent_code {
            if parent == code {
                return Err(CoreError::Validation(
                    "an account cannot be its own parent".to_string(),
                ));
            }
            if tx.account(parent).await?.is_none() {
                return Err(CoreError::Validation(format!(
                    "parent account '{parent}' does not exist"
                )));
            }
        }

        let account = Account::new(code, name, category, parent_code);
        tx.save_account(&account).await?;
        tx.commit().await?;

        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::Created,
                "account",
                account.code.clone(),
                None,
                Some(account.name.clone()),
            ),
        );
        Ok(account)
    }

    /// Re-parent an account, rejecting self-reference and cycles of any
    /// length.
    pub async fn set_parent(
        &self,
        actor: &Actor,
        code: &str,
        parent_code: Option<String>,
    ) -> CoreResult<Account> {
        let mut tx = self.storage.begin().await?;
        let mut account = require_account(&tx, code).await?;

        if let Some(ref parent) = parent_code {
            if parent == code {
                return Err(CoreError::Validation(
                    "an account cannot be its own parent".to_string(),
                ));
            }
            // walk up from the proposed parent; seeing `code` again means
            // the new edge would close a cycle
            let mut cursor = Some(parent.clone());
            while let Some(current) = cursor {
                let node = require_account(&tx, &current).await?;
                if node.code == code {
                    return Err(CoreError::Validation(format!(
                        "re-parenting '{code}' under '{parent}' would create a cycle"
                    )));
                }
                cursor = node.parent_code;
            }
        }

        account.parent_code = parent_code;
        account.updated_at = chrono::Utc::now().naive_utc();
        tx.save_account(&account).await?;
        tx.commit().await?;

        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::Updated,
                "account",
                account.code.clone(),
                None,
                None,
            ),
        );
        Ok(account)
    }

    /// Deactivate an account. Inactive accounts keep their history and
    /// balance but reject new journal lines.
    pub async fn deactivate(&self, actor: &Actor, code: &str) -> CoreResult<Account> {
        let mut tx = self.storage.begin().await?;
        let mut account = require_account(&tx, code).await?;
        account.is_active = false;
        account.updated_at = chrono::Utc::now().naive_utc();
        tx.save_account(&account).await?;
        tx.commit().await?;

        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::Updated,
                "account",
                account.code.clone(),
                Some("active".to_string()),
                Some("inactive".to_string()),
            ),
        );
        Ok(account)
    }

    pub async fn get_account(&self, code: &str) -> CoreResult<Option<Account>> {
        let tx = self.storage.begin().await?;
        tx.account(code).await
    }

    pub async fn list_accounts(
        &self,
        category: Option<AccountCategory>,
    ) -> CoreResult<Vec<Account>> {
        let tx = self.storage.begin().await?;
        tx.list_accounts(category).await
    }

    /// Path from the root of the hierarchy down to `code`.
    pub async fn account_path(&self, code: &str) -> CoreResult<Vec<Account>> {
        let tx = self.storage.begin().await?;
        let mut path = Vec::new();
        let mut cursor = Some(code.to_string());

        while let Some(current) = cursor {
            let account = require_account(&tx, &current).await?;
            cursor = account.parent_code.clone();
            path.insert(0, account);
        }

        Ok(path)
    }

    /// Seed the chart codes the posting rules depend on.
    pub async fn setup_standard_chart(
        &self,
        actor: &Actor,
    ) -> CoreResult<HashMap<String, Account>> {
        let standard: [(&str, &str, AccountCategory); 11] = [
            ("1000", "Cash", AccountCategory::Asset),
            ("1100", "Bank", AccountCategory::Asset),
            ("1200", "Accounts Receivable", AccountCategory::Asset),
            ("1300", "Tax Paid", AccountCategory::Asset),
            ("2000", "Accounts Payable", AccountCategory::Liability),
            ("2100", "Tax Payable", AccountCategory::Liability),
            ("3000", "Owner's Equity", AccountCategory::Equity),
            ("3100", "Retained Earnings", AccountCategory::Equity),
            ("4000", "Sales Revenue", AccountCategory::Revenue),
            ("4300", "Sales Discounts", AccountCategory::Revenue),
            ("5000", "General Expenses", AccountCategory::Expense),
        ];

        let mut accounts = HashMap::new();
        for (code, name, category) in standard {
            let account = self
                .create_account(actor, code, name, category, None)
                .await?;
            accounts.insert(code.to_string(), account);
        }
        Ok(accounts)
    }
}
