use std::cmp::Ordering;

use karma_core::{KarmaTarget, RankDirection};
use karma_ledger::{KarmaLedger, LedgerError};

/// The `n` highest (or lowest) targets by total.
///
/// Only targets with at least one ledger entry can appear. Equal totals are ordered by
/// name so the result is deterministic.
pub fn rank_targets<L: KarmaLedger + ?Sized>(
    ledger: &L,
    n: usize,
    direction: RankDirection,
) -> Result<Vec<KarmaTarget>, LedgerError> {
    let totals = ledger.sum_grouped_by_target()?;
    Ok(rank(totals, n, direction))
}

/// Sort already-aggregated totals for `direction` and keep the first `n`.
pub fn rank(mut totals: Vec<KarmaTarget>, n: usize, direction: RankDirection) -> Vec<KarmaTarget> {
    totals.sort_by(|a, b| compare(a, b, direction));
    totals.truncate(n);
    totals
}

fn compare(a: &KarmaTarget, b: &KarmaTarget, direction: RankDirection) -> Ordering {
    let by_total = match direction {
        RankDirection::Top => b.total.cmp(&a.total),
        RankDirection::Bottom => a.total.cmp(&b.total),
    };
    by_total.then_with(|| a.name.cmp(&b.name))
}
