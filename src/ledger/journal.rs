//! Journal entry engine
//!
//! Validates and persists journal entries, and posts them into the ledger
//! store. An entry is `DRAFT -> post() -> POSTED` and nothing transitions out
//! of POSTED; reversal entries are a deliberate non-feature for now.

use chrono::{Datelike, NaiveDate};
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::{emit, AuditAction, AuditEvent, AuditSink, NoopAuditSink};
use crate::ledger::store;
use crate::traits::{next_document_number, require_account, Storage, StorageTx};
use crate::types::*;
use crate::utils::validation::validate_description;

/// Input for creating a journal entry
#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    pub date: NaiveDate,
    pub description: String,
    pub reference: Option<String>,
    pub lines: Vec<JournalLine>,
}

/// Fields that may change while an entry is still a draft
#[derive(Debug, Clone, Default)]
pub struct JournalEntryUpdate {
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub lines: Option<Vec<JournalLine>>,
}

/// Engine for journal entry lifecycle and posting
#[derive(Clone)]
pub struct JournalEngine<S: Storage> {
    storage: S,
    audit: Arc<dyn AuditSink>,
}

impl<S: Storage> JournalEngine<S> {
    pub fn new(storage: S) -> Self {
        Self::with_audit(storage, Arc::new(NoopAuditSink))
    }

    pub fn with_audit(storage: S, audit: Arc<dyn AuditSink>) -> Self {
        Self { storage, audit }
    }

    /// Create a manual journal entry in DRAFT.
    pub async fn create(&self, actor: &Actor, new: NewJournalEntry) -> CoreResult<JournalEntry> {
        let mut tx = self.storage.begin().await?;
        let entry = create_in_tx(&mut tx, actor, new).await?;
        tx.commit().await?;

        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::Created,
                "journal_entry",
                entry.id.clone(),
                None,
                Some(entry.number.clone()),
            ),
        );
        Ok(entry)
    }

    /// Post a draft entry: mirror every line into the ledger, update account
    /// balances, and mark the entry POSTED, all in one transaction.
    pub async fn post(&self, actor: &Actor, entry_id: &str) -> CoreResult<JournalEntry> {
        let mut tx = self.storage.begin().await?;
        let mut entry = require_entry(&tx, entry_id).await?;
        post_in_tx(&mut tx, &mut entry).await?;
        tx.commit().await?;

        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::Posted,
                "journal_entry",
                entry.id.clone(),
                Some(JournalStatus::Draft.as_str().to_string()),
                Some(JournalStatus::Posted.as_str().to_string()),
            ),
        );
        Ok(entry)
    }

    /// Update a draft entry. Posted entries are immutable.
    pub async fn update(
        &self,
        actor: &Actor,
        entry_id: &str,
        update: JournalEntryUpdate,
    ) -> CoreResult<JournalEntry> {
        let mut tx = self.storage.begin().await?;
        let mut entry = require_entry(&tx, entry_id).await?;

        if entry.status != JournalStatus::Draft {
            return Err(CoreError::EntryLocked(entry.number));
        }

        if let Some(date) = update.date {
            entry.date = date;
        }
        if let Some(description) = update.description {
            validate_description(&description)?;
            entry.description = description;
        }
        if update.reference.is_some() {
            entry.reference = update.reference;
        }
        if let Some(lines) = update.lines {
            entry.lines = lines;
        }

        entry.validate()?;
        require_line_accounts(&tx, &entry.lines).await?;
        tx.save_journal_entry(&entry).await?;
        tx.commit().await?;

        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::Updated,
                "journal_entry",
                entry.id.clone(),
                None,
                Some(entry.number.clone()),
            ),
        );
        Ok(entry)
    }

    /// Delete a draft entry. Posted entries cannot be deleted.
    pub async fn delete(&self, actor: &Actor, entry_id: &str) -> CoreResult<()> {
        let mut tx = self.storage.begin().await?;
        let entry = require_entry(&tx, entry_id).await?;

        if entry.status != JournalStatus::Draft {
            return Err(CoreError::EntryLocked(entry.number));
        }

        tx.delete_journal_entry(entry_id).await?;
        tx.commit().await?;

        emit(
            self.audit.as_ref(),
            AuditEvent::new(
                actor,
                AuditAction::Deleted,
                "journal_entry",
                entry.id,
                Some(entry.number),
                None,
            ),
        );
        Ok(())
    }

    pub async fn get(&self, entry_id: &str) -> CoreResult<Option<JournalEntry>> {
        let tx = self.storage.begin().await?;
        tx.journal_entry(entry_id).await
    }
}

pub(crate) async fn require_entry<T: StorageTx>(tx: &T, id: &str) -> CoreResult<JournalEntry> {
    tx.journal_entry(id).await?.ok_or(CoreError::NotFound {
        entity: "journal entry",
        id: id.to_string(),
    })
}

async fn require_line_accounts<T: StorageTx>(tx: &T, lines: &[JournalLine]) -> CoreResult<()> {
    for line in lines {
        let account = require_account(tx, &line.account_code).await?;
        if !account.is_active {
            return Err(CoreError::Validation(format!(
                "account {} is inactive",
                account.code
            )));
        }
    }
    Ok(())
}

/// Create a journal entry inside an existing transaction. Used directly by
/// the document posting rules so a document transition and its entry commit
/// together.
pub(crate) async fn create_in_tx<T: StorageTx>(
    tx: &mut T,
    actor: &Actor,
    new: NewJournalEntry,
) -> CoreResult<JournalEntry> {
    validate_description(&new.description)?;

    let entry = JournalEntry {
        id: Uuid::new_v4().to_string(),
        number: next_document_number(tx, "JE", new.date.year()).await?,
        date: new.date,
        description: new.description,
        reference: new.reference,
        status: JournalStatus::Draft,
        lines: new.lines,
        created_by: actor.user_id.clone(),
        created_at: chrono::Utc::now().naive_utc(),
        posted_at: None,
    };

    entry.validate()?;
    require_line_accounts(tx, &entry.lines).await?;
    tx.save_journal_entry(&entry).await?;
    Ok(entry)
}

/// Post an entry inside an existing transaction. The status check shares the
/// transaction with the write, so two concurrent posts cannot both succeed.
pub(crate) async fn post_in_tx<T: StorageTx>(
    tx: &mut T,
    entry: &mut JournalEntry,
) -> CoreResult<()> {
    if entry.status == JournalStatus::Posted {
        return Err(CoreError::AlreadyPosted(entry.number.clone()));
    }

    if let Some(fy) = tx.fiscal_year_containing(entry.date).await? {
        if fy.is_locked {
            return Err(CoreError::LockedFiscalYear(fy.name));
        }
    }

    store::append_lines(tx, entry).await?;

    entry.status = JournalStatus::Posted;
    entry.posted_at = Some(chrono::Utc::now().naive_utc());
    tx.save_journal_entry(entry).await?;
    log::debug!("posted journal entry {}", entry.number);
    Ok(())
}

/// Create and immediately post in one transaction; the auto-post path the
/// document posting rules go through.
pub(crate) async fn create_posted_in_tx<T: StorageTx>(
    tx: &mut T,
    actor: &Actor,
    new: NewJournalEntry,
) -> CoreResult<JournalEntry> {
    let mut entry = create_in_tx(tx, actor, new).await?;
    post_in_tx(tx, &mut entry).await?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MemoryStorage;
    use bigdecimal::BigDecimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn admin() -> Actor {
        Actor::new("u-admin", Role::Admin)
    }

    async fn seed_accounts(storage: &MemoryStorage) {
        let mut tx = storage.begin().await.unwrap();
        tx.save_account(&Account::new("1000", "Cash", AccountCategory::Asset, None))
            .await
            .unwrap();
        tx.save_account(&Account::new(
            "4000",
            "Sales Revenue",
            AccountCategory::Revenue,
            None,
        ))
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    fn simple_lines(amount: i64) -> Vec<JournalLine> {
        vec![
            JournalLine::debit("1000", BigDecimal::from(amount), None),
            JournalLine::credit("4000", BigDecimal::from(amount), None),
        ]
    }

    #[tokio::test]
    async fn create_assigns_sequential_numbers() {
        let storage = MemoryStorage::new();
        seed_accounts(&storage).await;
        let engine = JournalEngine::new(storage);

        let first = engine
            .create(
                &admin(),
                NewJournalEntry {
                    date: date(2026, 3, 1),
                    description: "Sale one".to_string(),
                    reference: None,
                    lines: simple_lines(100),
                },
            )
            .await
            .unwrap();
        let second = engine
            .create(
                &admin(),
                NewJournalEntry {
                    date: date(2026, 3, 2),
                    description: "Sale two".to_string(),
                    reference: None,
                    lines: simple_lines(200),
                },
            )
            .await
            .unwrap();

        assert_eq!(first.number, "JE2026000001");
        assert_eq!(second.number, "JE2026000002");
        assert_eq!(first.status, JournalStatus::Draft);
    }

    #[tokio::test]
    async fn unbalanced_entry_is_rejected() {
        let storage = MemoryStorage::new();
        seed_accounts(&storage).await;
        let engine = JournalEngine::new(storage);

        let result = engine
            .create(
                &admin(),
                NewJournalEntry {
                    date: date(2026, 3, 1),
                    description: "Off by ten".to_string(),
                    reference: None,
                    lines: vec![
                        JournalLine::debit("1000", BigDecimal::from(100), None),
                        JournalLine::credit("4000", BigDecimal::from(90), None),
                    ],
                },
            )
            .await;
        assert!(matches!(result, Err(CoreError::UnbalancedEntry { .. })));
    }

    #[tokio::test]
    async fn single_line_entry_is_rejected() {
        let storage = MemoryStorage::new();
        seed_accounts(&storage).await;
        let engine = JournalEngine::new(storage);

        let result = engine
            .create(
                &admin(),
                NewJournalEntry {
                    date: date(2026, 3, 1),
                    description: "One sided".to_string(),
                    reference: None,
                    lines: vec![JournalLine::debit("1000", BigDecimal::from(100), None)],
                },
            )
            .await;
        assert!(matches!(result, Err(CoreError::InsufficientLines(1))));
    }

    #[tokio::test]
    async fn post_moves_balances_and_locks_entry() {
        let storage = MemoryStorage::new();
        seed_accounts(&storage).await;
        let engine = JournalEngine::new(storage.clone());

        let entry = engine
            .create(
                &admin(),
                NewJournalEntry {
                    date: date(2026, 3, 1),
                    description: "Cash sale".to_string(),
                    reference: None,
                    lines: simple_lines(500),
                },
            )
            .await
            .unwrap();
        let posted = engine.post(&admin(), &entry.id).await.unwrap();
        assert_eq!(posted.status, JournalStatus::Posted);

        let tx = storage.begin().await.unwrap();
        let cash = tx.account("1000").await.unwrap().unwrap();
        let revenue = tx.account("4000").await.unwrap().unwrap();
        assert_eq!(cash.balance, BigDecimal::from(500));
        assert_eq!(revenue.balance, BigDecimal::from(-500));

        // posted entries are immutable
        let update = engine
            .update(&admin(), &entry.id, JournalEntryUpdate::default())
            .await;
        assert!(matches!(update, Err(CoreError::EntryLocked(_))));
        let delete = engine.delete(&admin(), &entry.id).await;
        assert!(matches!(delete, Err(CoreError::EntryLocked(_))));
    }

    #[tokio::test]
    async fn double_post_fails_second_time() {
        let storage = MemoryStorage::new();
        seed_accounts(&storage).await;
        let engine = JournalEngine::new(storage);

        let entry = engine
            .create(
                &admin(),
                NewJournalEntry {
                    date: date(2026, 3, 1),
                    description: "Cash sale".to_string(),
                    reference: None,
                    lines: simple_lines(100),
                },
            )
            .await
            .unwrap();

        engine.post(&admin(), &entry.id).await.unwrap();
        let second = engine.post(&admin(), &entry.id).await;
        assert!(matches!(second, Err(CoreError::AlreadyPosted(_))));
    }

    #[tokio::test]
    async fn concurrent_posts_succeed_exactly_once() {
        let storage = MemoryStorage::new();
        seed_accounts(&storage).await;
        let engine = JournalEngine::new(storage.clone());

        let entry = engine
            .create(
                &admin(),
                NewJournalEntry {
                    date: date(2026, 3, 1),
                    description: "Raced".to_string(),
                    reference: None,
                    lines: simple_lines(100),
                },
            )
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            let id = entry.id.clone();
            handles.push(tokio::spawn(async move {
                engine.post(&admin(), &id).await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);

        // exactly one set of ledger entries
        let tx = storage.begin().await.unwrap();
        let rows = tx.ledger_entries("1000", None, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            tx.account("1000").await.unwrap().unwrap().balance,
            BigDecimal::from(100)
        );
    }

    #[tokio::test]
    async fn locked_fiscal_year_blocks_posting() {
        let storage = MemoryStorage::new();
        seed_accounts(&storage).await;
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
        let engine = JournalEngine::new(storage.clone());

        let entry = engine
            .create(
                &admin(),
                NewJournalEntry {
                    date: date(2024, 6, 15),
                    description: "Backdated".to_string(),
                    reference: None,
                    lines: simple_lines(100),
                },
            )
            .await
            .unwrap();

        let result = engine.post(&admin(), &entry.id).await;
        assert!(matches!(result, Err(CoreError::LockedFiscalYear(_))));

        // entry stays DRAFT, ledger untouched
        let tx = storage.begin().await.unwrap();
        let stored = tx.journal_entry(&entry.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JournalStatus::Draft);
        assert!(tx.ledger_entries("1000", None, None).await.unwrap().is_empty());
        assert_eq!(
            tx.account("1000").await.unwrap().unwrap().balance,
            BigDecimal::from(0)
        );
    }

    #[tokio::test]
    async fn concurrent_creations_have_gap_free_numbers() {
        let storage = MemoryStorage::new();
        seed_accounts(&storage).await;
        let engine = JournalEngine::new(storage);

        let mut handles = Vec::new();
        for i in 0..50 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .create(
                        &admin(),
                        NewJournalEntry {
                            date: date(2026, 3, 1),
                            description: format!("Entry {i}"),
                            reference: None,
                            lines: simple_lines(10),
                        },
                    )
                    .await
                    .unwrap()
                    .number
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), 50);
        assert_eq!(numbers.first().unwrap(), "JE2026000001");
        assert_eq!(numbers.last().unwrap(), "JE2026000050");
    }
}
