use std::path::Path;

use karma_core::message::karma_message;
use karma_core::LedgerEntry;
use karma_ledger::KarmaLedger;

/// Largest adjustment accepted in one entry; keeps ledger sums far from `i64` overflow.
const MAX_ADJUSTMENT: u64 = 1_000_000;

pub fn execute(db: &Path, target: &str, delta: i64, actor: &str) -> anyhow::Result<()> {
    let ledger = crate::open_ledger(db)?;
    println!("{}", give(&ledger, target, delta, actor)?);
    Ok(())
}

fn give(ledger: &dyn KarmaLedger, target: &str, delta: i64, actor: &str) -> anyhow::Result<String> {
    let target = target.trim();
    if target.is_empty() {
        anyhow::bail!("target must not be empty");
    }
    if delta == 0 {
        anyhow::bail!("delta must be non-zero");
    }
    if delta.unsigned_abs() > MAX_ADJUSTMENT {
        anyhow::bail!("delta must be within ±{MAX_ADJUSTMENT}, got {delta}");
    }
    ledger.append(&LedgerEntry::now(target, delta, actor))?;
    let total = ledger.sum_by_target(target)?;
    Ok(karma_message(false, delta, total, target))
}
