//! SQLite-backed storage for the karma ledger.
//!
//! A single database file in WAL mode holding the `karma_transactions` table. Rows are
//! only ever inserted; every total is recomputed from them on read.

use std::path::Path;

use karma_core::{Granularity, KarmaTarget, LedgerEntry};
use rusqlite::{params, Connection};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::store::{KarmaLedger, PeriodTotal};
use crate::LedgerError;

const SCHEMA_SQL: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS karma_transactions (
    id INTEGER PRIMARY KEY,
    karma_target TEXT NOT NULL,
    delta INTEGER NOT NULL,
    actor TEXT NOT NULL,
    karma_date TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_karma_target ON karma_transactions(karma_target);
CREATE INDEX IF NOT EXISTS idx_karma_date ON karma_transactions(karma_date);
CREATE INDEX IF NOT EXISTS idx_karma_target_date
    ON karma_transactions(karma_target, karma_date);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const SCHEMA_VERSION: u32 = 1;

/// SQLite-backed storage engine.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the karma database with full schema.
    pub fn open_or_create(db_path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.apply_pragmas()?;
        store.apply_schema()?;
        tracing::debug!(path = %db_path.display(), "karma ledger opened");
        Ok(store)
    }

    fn apply_pragmas(&self) -> Result<(), LedgerError> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn apply_schema(&self) -> Result<(), LedgerError> {
        // Idempotent via IF NOT EXISTS / OR IGNORE
        self.conn.execute_batch(SCHEMA_SQL)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )?;
        Ok(())
    }
}

impl KarmaLedger for SqliteStore {
    fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let karma_date = format_ts(entry.timestamp)?;
        self.conn.execute(
            "INSERT INTO karma_transactions (karma_target, delta, actor, karma_date)
             VALUES (?1, ?2, ?3, ?4)",
            params![entry.target, entry.delta, entry.actor, karma_date],
        )?;
        tracing::debug!(
            karma_target = %entry.target,
            delta = entry.delta,
            actor = %entry.actor,
            "karma appended"
        );
        Ok(())
    }

    fn sum_by_target(&self, name: &str) -> Result<i64, LedgerError> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(delta), 0) FROM karma_transactions WHERE karma_target = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    fn sum_grouped_by_target(&self) -> Result<Vec<KarmaTarget>, LedgerError> {
        let mut stmt = self.conn.prepare(
            "SELECT karma_target, SUM(delta) FROM karma_transactions
             GROUP BY karma_target ORDER BY karma_target",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(KarmaTarget {
                    name: row.get(0)?,
                    total: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn sum_grouped_by_target_and_period(
        &self,
        granularity: Granularity,
    ) -> Result<Vec<PeriodTotal>, LedgerError> {
        let sql = match granularity {
            Granularity::Day => {
                "SELECT karma_target, date(karma_date) AS period, SUM(delta)
                 FROM karma_transactions
                 GROUP BY karma_target, period ORDER BY period, karma_target"
            }
            Granularity::Week => {
                "SELECT karma_target, date(karma_date, 'weekday 0', '-6 days') AS period, SUM(delta)
                 FROM karma_transactions
                 GROUP BY karma_target, period ORDER BY period, karma_target"
            }
            Granularity::Month => {
                "SELECT karma_target, strftime('%Y-%m-01', karma_date) AS period, SUM(delta)
                 FROM karma_transactions
                 GROUP BY karma_target, period ORDER BY period, karma_target"
            }
        };

        let mut stmt = self.conn.prepare(sql)?;
        let rows: Vec<(String, String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(name, period, total)| {
                Ok(PeriodTotal {
                    name,
                    period_start: parse_day(&period)?,
                    total,
                })
            })
            .collect()
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut stmt = self.conn.prepare(
            "SELECT karma_target, delta, actor, karma_date
             FROM karma_transactions ORDER BY id",
        )?;
        let rows: Vec<(String, i64, String, String)> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(target, delta, actor, ts)| {
                Ok(LedgerEntry {
                    target,
                    delta,
                    actor,
                    timestamp: parse_ts(&ts)?,
                })
            })
            .collect()
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        // Merge WAL back into main DB so a quiet ledger is a single file.
        let _ = self
            .conn
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
    }
}

// ── Internal helpers ────────────────────────────────────────────────

fn format_ts(ts: OffsetDateTime) -> Result<String, LedgerError> {
    let ts = ts.to_offset(UtcOffset::UTC);
    let ts = ts.replace_nanosecond(0).unwrap_or(ts);
    ts.format(&Rfc3339)
        .map_err(|e| LedgerError::InvalidTimestamp(e.to_string()))
}

fn parse_ts(raw: &str) -> Result<OffsetDateTime, LedgerError> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|_| LedgerError::InvalidTimestamp(raw.to_string()))
}

fn parse_day(raw: &str) -> Result<Date, LedgerError> {
    let format = time::format_description::parse("[year]-[month]-[day]")
        .map_err(|_| LedgerError::InvalidTimestamp(raw.to_string()))?;
    Date::parse(raw, &format).map_err(|_| LedgerError::InvalidTimestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use time::Month;

    fn tmp_db() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open_or_create(&dir.path().join("karma.db")).unwrap();
        (dir, store)
    }

    fn entry(target: &str, delta: i64, actor: &str, unix: i64) -> LedgerEntry {
        LedgerEntry::at(
            target,
            delta,
            actor,
            OffsetDateTime::from_unix_timestamp(unix).unwrap(),
        )
    }

    fn day(y: i32, m: Month, d: u8) -> Date {
        Date::from_calendar_date(y, m, d).unwrap()
    }

    #[test]
    fn schema_creation() {
        let (_dir, store) = tmp_db();
        let tables: Vec<String> = store
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert!(tables.contains(&"karma_transactions".to_string()));
        assert!(tables.contains(&"schema_meta".to_string()));

        let version: String = store
            .conn
            .query_row("SELECT value FROM schema_meta WHERE key = 'version'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION.to_string());

        let indexes: Vec<String> = store
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        for name in ["idx_karma_target", "idx_karma_date", "idx_karma_target_date"] {
            assert!(indexes.contains(&name.to_string()), "missing {name}");
        }
    }

    #[test]
    fn total_for_unknown_target_is_zero() {
        let (_dir, store) = tmp_db();
        assert_eq!(store.sum_by_target("Claudio").unwrap(), 0);
    }

    #[test]
    fn total_sums_every_delta() {
        let (_dir, store) = tmp_db();
        store.append(&entry("Claudio", 3, "Ken", 0)).unwrap();
        store.append(&entry("Claudio", -1, "Someone Else", 5)).unwrap();
        store.append(&entry("Ken", 4, "Claudio", 9)).unwrap();
        assert_eq!(store.sum_by_target("Claudio").unwrap(), 2);
        assert_eq!(store.sum_by_target("Ken").unwrap(), 4);
    }

    #[test]
    fn append_records_actor_and_time() {
        let (_dir, store) = tmp_db();
        store.append(&entry("Claudio", 3, "Ken", 1_700_000_000)).unwrap();
        store.append(&entry("Claudio", -2, "Someone Else", 1_700_000_060)).unwrap();

        let rows = store.entries().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].actor, "Ken");
        assert_eq!(rows[0].delta, 3);
        assert_eq!(rows[0].timestamp.unix_timestamp(), 1_700_000_000);
        assert_eq!(rows[1].actor, "Someone Else");
        assert_eq!(rows[1].delta, -2);
    }

    #[test]
    fn stored_timestamps_are_utc_seconds() {
        let (_dir, store) = tmp_db();
        store.append(&entry("Ken", 1, "U1", 0)).unwrap();
        let raw: String = store
            .conn
            .query_row("SELECT karma_date FROM karma_transactions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(raw, "1970-01-01T00:00:00Z");
    }

    #[test]
    fn grouped_totals_include_net_zero_targets() {
        let (_dir, store) = tmp_db();
        assert!(store.sum_grouped_by_target().unwrap().is_empty());

        store.append(&entry("E1", 2, "User", 0)).unwrap();
        store.append(&entry("E2", 1, "User", 0)).unwrap();
        store.append(&entry("E2", -1, "User", 0)).unwrap();

        let rows = store.sum_grouped_by_target().unwrap();
        assert_eq!(
            rows,
            vec![KarmaTarget::new("E1", 2), KarmaTarget::new("E2", 0)]
        );
    }

    #[test]
    fn period_grouping_by_day_week_month() {
        let (_dir, store) = tmp_db();
        // 2026-10-19 (Mon), 2026-10-25 (Sun), 2026-10-26 (Mon), 2026-11-02 (Mon)
        let mon = 1_792_368_000;
        store.append(&entry("Ken", 1, "U1", mon + 3_600)).unwrap();
        store.append(&entry("Ken", 2, "U1", mon + 6 * 86_400 + 7_200)).unwrap();
        store.append(&entry("Ken", 4, "U1", mon + 7 * 86_400)).unwrap();
        store.append(&entry("Ken", -3, "U1", mon + 14 * 86_400)).unwrap();

        let days = store.sum_grouped_by_target_and_period(Granularity::Day).unwrap();
        assert_eq!(days.len(), 4);
        assert_eq!(days[0].period_start, day(2026, Month::October, 19));
        assert_eq!(days[1].period_start, day(2026, Month::October, 25));

        let weeks = store.sum_grouped_by_target_and_period(Granularity::Week).unwrap();
        let weeks: Vec<(Date, i64)> = weeks.iter().map(|r| (r.period_start, r.total)).collect();
        assert_eq!(
            weeks,
            vec![
                (day(2026, Month::October, 19), 3),
                (day(2026, Month::October, 26), 4),
                (day(2026, Month::November, 2), -3),
            ]
        );

        let months = store.sum_grouped_by_target_and_period(Granularity::Month).unwrap();
        let months: Vec<(Date, i64)> = months.iter().map(|r| (r.period_start, r.total)).collect();
        assert_eq!(
            months,
            vec![
                (day(2026, Month::October, 1), 7),
                (day(2026, Month::November, 1), -3),
            ]
        );
    }

    #[test]
    fn sql_periods_agree_with_calendar_truncation() {
        let (_dir, store) = tmp_db();
        let memory = crate::MemoryStore::new();
        for i in 0..60 {
            let target = if i % 3 == 0 { "a" } else { "b" };
            let e = entry(target, i % 5 - 2, "U1", 1_790_000_000 + i * 50_000);
            store.append(&e).unwrap();
            memory.append(&e).unwrap();
        }
        for g in [Granularity::Day, Granularity::Week, Granularity::Month] {
            let mut sql = store.sum_grouped_by_target_and_period(g).unwrap();
            let mut mem = memory.sum_grouped_by_target_and_period(g).unwrap();
            sql.sort_by(|x, y| (x.period_start, &x.name).cmp(&(y.period_start, &y.name)));
            mem.sort_by(|x, y| (x.period_start, &x.name).cmp(&(y.period_start, &y.name)));
            assert_eq!(sql, mem, "granularity {}", g.as_str());
        }
    }

    #[test]
    fn replay_in_any_order_gives_same_totals() {
        let mut entries: Vec<LedgerEntry> = (0..40)
            .map(|i| entry(["x", "y", "z"][i % 3], (i as i64 % 9) - 4, "U1", i as i64))
            .collect();

        let (_dir_a, a) = tmp_db();
        for e in &entries {
            a.append(e).unwrap();
        }
        entries.shuffle(&mut rand::thread_rng());
        let (_dir_b, b) = tmp_db();
        for e in &entries {
            b.append(e).unwrap();
        }

        assert_eq!(a.sum_grouped_by_target().unwrap(), b.sum_grouped_by_target().unwrap());
    }

    #[test]
    fn corrupt_timestamp_is_reported() {
        let (_dir, store) = tmp_db();
        store
            .conn
            .execute(
                "INSERT INTO karma_transactions (karma_target, delta, actor, karma_date)
                 VALUES ('Ken', 1, 'U1', 'yesterday')",
                [],
            )
            .unwrap();
        let err = store.entries().unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTimestamp(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn idempotent_schema_apply() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("karma.db");

        let store1 = SqliteStore::open_or_create(&db_path).unwrap();
        store1.append(&entry("Ken", 2, "U1", 0)).unwrap();
        drop(store1);

        let store2 = SqliteStore::open_or_create(&db_path).unwrap();
        assert_eq!(store2.sum_by_target("Ken").unwrap(), 2);
    }

    #[test]
    fn wal_checkpoint_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("karma.db");
        {
            let store = SqliteStore::open_or_create(&db_path).unwrap();
            store.append(&entry("Ken", 1, "U1", 0)).unwrap();
        }
        assert!(db_path.exists());
        let wal_path = dir.path().join("karma.db-wal");
        if wal_path.exists() {
            let size = std::fs::metadata(&wal_path).unwrap().len();
            assert_eq!(size, 0, "WAL file should be empty after checkpoint");
        }
    }

    #[test]
    fn open_missing_parent_dirs_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("deeper").join("karma.db");
        let store = SqliteStore::open_or_create(&db_path).unwrap();
        assert_eq!(store.sum_by_target("anyone").unwrap(), 0);
        assert!(db_path.exists());
    }
}
