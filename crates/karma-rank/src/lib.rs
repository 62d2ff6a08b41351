//! Ranking engine: turns the flat karma ledger into leaderboards and running-total
//! series. Every operation reads the ledger once and is otherwise a pure transform.

mod rank;
mod series;

pub use rank::{rank, rank_targets};
pub use series::{
    build_series, ranked_time_series, ranked_time_series_at, Bucket, RankedSeries, SeriesRequest,
};
