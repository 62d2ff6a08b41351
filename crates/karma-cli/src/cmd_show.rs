use std::path::Path;

use karma_core::message::ranking_message;
use karma_core::KarmaTarget;
use karma_ledger::KarmaLedger;

pub fn execute(db: &Path, target: &str) -> anyhow::Result<()> {
    let ledger = crate::open_ledger(db)?;
    let total = ledger.sum_by_target(target)?;
    println!("{}", ranking_message(&[KarmaTarget::new(target, total)]));
    Ok(())
}
