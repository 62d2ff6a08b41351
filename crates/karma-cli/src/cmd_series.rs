use std::path::Path;

use karma_core::{Granularity, RankDirection};
use karma_rank::{RankedSeries, SeriesRequest};

pub struct SeriesParams<'a> {
    pub db: &'a Path,
    pub n: usize,
    pub buckets: usize,
    pub granularity: &'a str,
    pub bottom: bool,
    pub json: bool,
}

pub fn execute(params: &SeriesParams<'_>) -> anyhow::Result<()> {
    let granularity = Granularity::parse(params.granularity).ok_or_else(|| {
        anyhow::anyhow!(
            "unknown granularity '{}' (expected day, week or month)",
            params.granularity
        )
    })?;
    let request = SeriesRequest {
        n: params.n,
        max_buckets: params.buckets,
        direction: if params.bottom {
            RankDirection::Bottom
        } else {
            RankDirection::Top
        },
        granularity,
    };

    let ledger = crate::open_ledger(params.db)?;
    let series = karma_rank::ranked_time_series(&ledger, request)?;
    if params.json {
        println!("{}", serde_json::to_string_pretty(&series)?);
    } else {
        print!("{}", render_table(&series));
    }
    Ok(())
}

/// One row per period, one right-aligned column per target.
fn render_table(series: &RankedSeries) -> String {
    if series.buckets.is_empty() {
        return "No karma recorded yet.\n".to_string();
    }
    let label_width = series
        .buckets
        .iter()
        .map(|b| b.label.len())
        .max()
        .unwrap_or(0)
        .max("period".len());
    let widths: Vec<usize> = series
        .targets
        .iter()
        .map(|name| {
            series
                .buckets
                .iter()
                .map(|b| b.values.get(name).copied().unwrap_or(0).to_string().len())
                .max()
                .unwrap_or(0)
                .max(name.len())
        })
        .collect();

    let mut out = format!("{:<label_width$}", "period");
    for (name, width) in series.targets.iter().zip(widths.iter().copied()) {
        out.push_str(&format!("  {name:>width$}"));
    }
    out.push('\n');
    for bucket in &series.buckets {
        out.push_str(&format!("{:<label_width$}", bucket.label));
        for (name, width) in series.targets.iter().zip(widths.iter().copied()) {
            let value = bucket.values.get(name).copied().unwrap_or(0);
            out.push_str(&format!("  {value:>width$}"));
        }
        out.push('\n');
    }
    out
}
