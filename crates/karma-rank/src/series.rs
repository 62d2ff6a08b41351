//! Cumulative, gap-filled karma series for charting.

use std::collections::{BTreeMap, HashMap};

use karma_core::{Granularity, KarmaTarget, RankDirection};
use karma_ledger::{KarmaLedger, LedgerError, PeriodTotal};
use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::rank::rank;

/// Parameters for [`ranked_time_series`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesRequest {
    /// How many targets to follow.
    pub n: usize,
    /// How many trailing periods to return.
    pub max_buckets: usize,
    pub direction: RankDirection,
    pub granularity: Granularity,
}

/// Running totals at the end of one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub label: String,
    #[serde(skip)]
    pub start: Date,
    /// Cumulative total per ranked target, including every earlier period.
    pub values: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedSeries {
    pub granularity: Granularity,
    pub direction: RankDirection,
    /// Ranked target names, best first for `Top`, worst first for `Bottom`.
    pub targets: Vec<String>,
    /// Chronological, one bucket per period with no gaps.
    pub buckets: Vec<Bucket>,
}

/// Ranked cumulative series ending at the current period.
pub fn ranked_time_series<L: KarmaLedger + ?Sized>(
    ledger: &L,
    request: SeriesRequest,
) -> Result<RankedSeries, LedgerError> {
    ranked_time_series_at(ledger, request, OffsetDateTime::now_utc())
}

/// Same as [`ranked_time_series`] with an explicit "now".
pub fn ranked_time_series_at<L: KarmaLedger + ?Sized>(
    ledger: &L,
    request: SeriesRequest,
    now: OffsetDateTime,
) -> Result<RankedSeries, LedgerError> {
    let rows = ledger.sum_grouped_by_target_and_period(request.granularity)?;
    Ok(build_series(&rows, request, now.date()))
}

/// Build the series from per-(target, period) sums of one ledger snapshot.
///
/// Targets are ranked on their overall sums. Periods run contiguously from the earliest
/// observed one through `today` (or the latest observed, if later); each bucket's value is
/// the previous bucket's value plus the period's own delta. Only the last
/// `request.max_buckets` buckets are returned.
pub fn build_series(rows: &[PeriodTotal], request: SeriesRequest, today: Date) -> RankedSeries {
    let SeriesRequest {
        n,
        max_buckets,
        direction,
        granularity,
    } = request;

    let mut overall: BTreeMap<&str, i64> = BTreeMap::new();
    let mut deltas: HashMap<(Date, &str), i64> = HashMap::new();
    for row in rows {
        *overall.entry(row.name.as_str()).or_default() += row.total;
        *deltas.entry((row.period_start, row.name.as_str())).or_default() += row.total;
    }

    let totals = overall
        .into_iter()
        .map(|(name, total)| KarmaTarget::new(name, total))
        .collect();
    let targets: Vec<String> = rank(totals, n, direction)
        .into_iter()
        .map(|t| t.name)
        .collect();

    let mut series = RankedSeries {
        granularity,
        direction,
        targets,
        buckets: Vec::new(),
    };

    let first = rows.iter().map(|r| r.period_start).min();
    let last = rows.iter().map(|r| r.period_start).max();
    let (Some(first), Some(last)) = (first, last) else {
        return series;
    };
    if series.targets.is_empty() || max_buckets == 0 {
        return series;
    }
    let last = last.max(granularity.truncate(today));

    let start_values: BTreeMap<String, i64> =
        series.targets.iter().map(|t| (t.clone(), 0)).collect();
    let targets = &series.targets;

    let mut buckets: Vec<Bucket> = granularity
        .periods(first, last)
        .into_iter()
        .scan(start_values, |running, start| {
            for name in targets {
                let delta = deltas.get(&(start, name.as_str())).copied().unwrap_or(0);
                *running.entry(name.clone()).or_default() += delta;
            }
            Some(Bucket {
                label: granularity.label(start),
                start,
                values: running.clone(),
            })
        })
        .collect();

    let skip = buckets.len().saturating_sub(max_buckets);
    buckets.drain(..skip);
    series.buckets = buckets;
    series
}
