use std::path::Path;

use karma_core::message::ranking_message;
use karma_core::{RankDirection, DEFAULT_RANK_SIZE};

pub fn execute(
    db: &Path,
    direction: RankDirection,
    n: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let ledger = crate::open_ledger(db)?;
    let ranked = karma_rank::rank_targets(&ledger, n.unwrap_or(DEFAULT_RANK_SIZE), direction)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
    } else {
        println!("{}", ranking_message(&ranked));
    }
    Ok(())
}
