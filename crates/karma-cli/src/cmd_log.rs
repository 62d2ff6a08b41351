use std::path::Path;

use karma_core::LedgerEntry;
use karma_ledger::KarmaLedger;
use time::format_description::well_known::Rfc3339;

pub fn execute(db: &Path, limit: usize, json: bool) -> anyhow::Result<()> {
    let ledger = crate::open_ledger(db)?;
    let entries = recent(&ledger, limit)?;

    if entries.is_empty() {
        println!("The ledger is empty.");
        return Ok(());
    }

    if json {
        for e in &entries {
            println!("{}", serde_json::to_string(e)?);
        }
    } else {
        for e in &entries {
            println!("{}", format_entry(e)?);
        }
        println!("\n({} entries shown)", entries.len());
    }
    Ok(())
}

/// Newest first; `limit == 0` means everything.
fn recent(ledger: &dyn KarmaLedger, limit: usize) -> anyhow::Result<Vec<LedgerEntry>> {
    let mut entries = ledger.entries()?;
    entries.reverse();
    if limit > 0 {
        entries.truncate(limit);
    }
    Ok(entries)
}

fn format_entry(entry: &LedgerEntry) -> anyhow::Result<String> {
    Ok(format!(
        "{}  {:>+3}  {}  (by {})",
        entry.timestamp.format(&Rfc3339)?,
        entry.delta,
        entry.target,
        entry.actor
    ))
}
