use std::cell::RefCell;
use std::collections::BTreeMap;

use karma_core::{Granularity, KarmaTarget, LedgerEntry};

use crate::store::{KarmaLedger, PeriodTotal};
use crate::LedgerError;

/// In-process ledger for single-instance deployments and tests.
///
/// Same semantics as [`crate::SqliteStore`], nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<Vec<LedgerEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KarmaLedger for MemoryStore {
    fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        self.entries.borrow_mut().push(entry.clone());
        Ok(())
    }

    fn sum_by_target(&self, name: &str) -> Result<i64, LedgerError> {
        Ok(self
            .entries
            .borrow()
            .iter()
            .filter(|e| e.target == name)
            .map(|e| e.delta)
            .sum())
    }

    fn sum_grouped_by_target(&self) -> Result<Vec<KarmaTarget>, LedgerError> {
        let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
        let entries = self.entries.borrow();
        for e in entries.iter() {
            *totals.entry(e.target.as_str()).or_default() += e.delta;
        }
        Ok(totals
            .into_iter()
            .map(|(name, total)| KarmaTarget::new(name, total))
            .collect())
    }

    fn sum_grouped_by_target_and_period(
        &self,
        granularity: Granularity,
    ) -> Result<Vec<PeriodTotal>, LedgerError> {
        let mut totals = BTreeMap::new();
        let entries = self.entries.borrow();
        for e in entries.iter() {
            let start = granularity.truncate(e.timestamp.date());
            *totals.entry((start, e.target.clone())).or_insert(0i64) += e.delta;
        }
        Ok(totals
            .into_iter()
            .map(|((period_start, name), total)| PeriodTotal {
                name,
                period_start,
                total,
            })
            .collect())
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.entries.borrow().clone())
    }
}
