use karma_core::{Granularity, KarmaTarget, LedgerEntry};
use time::Date;

use crate::LedgerError;

/// Net karma for one target within one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodTotal {
    pub name: String,
    /// First day of the period, as produced by [`Granularity::truncate`].
    pub period_start: Date,
    pub total: i64,
}

/// The append-only karma ledger.
///
/// Appends are independent and commutative. Every read is a single snapshot query so
/// a total and its rank come from the same state.
pub trait KarmaLedger {
    /// Record one delta. Entries are never updated or removed.
    fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError>;

    /// Sum of all deltas for `name`; 0 when the target has no entries.
    fn sum_by_target(&self, name: &str) -> Result<i64, LedgerError>;

    /// One row per target that has at least one entry.
    fn sum_grouped_by_target(&self) -> Result<Vec<KarmaTarget>, LedgerError>;

    /// One row per (target, period) pair with activity.
    fn sum_grouped_by_target_and_period(
        &self,
        granularity: Granularity,
    ) -> Result<Vec<PeriodTotal>, LedgerError>;

    /// Every entry in insertion order.
    fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError>;
}

impl<L: KarmaLedger + ?Sized> KarmaLedger for &L {
    fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        (**self).append(entry)
    }

    fn sum_by_target(&self, name: &str) -> Result<i64, LedgerError> {
        (**self).sum_by_target(name)
    }

    fn sum_grouped_by_target(&self) -> Result<Vec<KarmaTarget>, LedgerError> {
        (**self).sum_grouped_by_target()
    }

    fn sum_grouped_by_target_and_period(
        &self,
        granularity: Granularity,
    ) -> Result<Vec<PeriodTotal>, LedgerError> {
        (**self).sum_grouped_by_target_and_period(granularity)
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        (**self).entries()
    }
}
