use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::admission::AdmissionPolicy;
use crate::error::{Error, Result};
use crate::models::{
    Item, ItemWithSrs, Pool, PoolBudget, ReviewOutcome, ReviewResult, SetOverview, SrsRecord,
    Stats, StudySet,
};
use crate::srs;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ITEM_COLUMNS: &str = r#"
    i.id, i.set_id, i.term, i.reading, i.meaning, i.examples, i.created_at,
    r.item_id, r.level, r.last_event_at, r.times_reviewed, r.times_correct
"#;

impl ToSql for Pool {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Pool {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Pool::from_str(s).ok_or_else(|| FromSqlError::Other(format!("unknown pool '{}'", s).into()))
    }
}

impl ToSql for ReviewOutcome {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for ReviewOutcome {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        ReviewOutcome::from_str(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown outcome '{}'", s).into()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub term: String,
    pub reading: Option<String>,
    pub meaning: String,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ReviewEntry {
    pub outcome: ReviewOutcome,
    pub level_before: i64,
    pub level_after: i64,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LearnResult {
    pub admitted: Vec<ItemWithSrs>,
    pub learn_new_left: i64,
}

pub struct Database {
    conn: Connection,
    policy: AdmissionPolicy,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn,
            policy: AdmissionPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: AdmissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS study_sets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                owner TEXT NOT NULL,
                pool TEXT NOT NULL CHECK(pool IN ('vocabulary', 'grammar')),
                srs_enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                set_id INTEGER NOT NULL,
                term TEXT NOT NULL,
                reading TEXT,
                meaning TEXT NOT NULL,
                examples TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                FOREIGN KEY (set_id) REFERENCES study_sets(id) ON DELETE CASCADE
            );

            -- One row per item that has entered the review cycle
            CREATE TABLE IF NOT EXISTS srs_records (
                item_id INTEGER PRIMARY KEY,
                level INTEGER NOT NULL,
                last_event_at TEXT NOT NULL,
                times_reviewed INTEGER NOT NULL DEFAULT 0,
                times_correct INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS review_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_id INTEGER NOT NULL,
                outcome TEXT NOT NULL CHECK(outcome IN ('correct', 'partial', 'incorrect')),
                level_before INTEGER NOT NULL,
                level_after INTEGER NOT NULL,
                reviewed_at TEXT NOT NULL,
                FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE CASCADE
            );

            -- New-item admissions per owner, pool and calendar day
            CREATE TABLE IF NOT EXISTS daily_admissions (
                owner TEXT NOT NULL,
                pool TEXT NOT NULL,
                day TEXT NOT NULL,
                admitted INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (owner, pool, day)
            );

            CREATE INDEX IF NOT EXISTS idx_items_set ON items(set_id);
            CREATE INDEX IF NOT EXISTS idx_review_history_item ON review_history(item_id);
            "#,
        )?;
        Ok(())
    }

    // Set operations
    pub fn add_set(&self, name: &str, pool: Pool, owner: &str, now: DateTime<Utc>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO study_sets (name, owner, pool, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![name, owner, pool, now],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(set_id = id, %pool, "created set '{}'", name);
        Ok(id)
    }

    pub fn get_set(&self, id: i64) -> Result<Option<StudySet>> {
        let set = self
            .conn
            .query_row(
                "SELECT id, name, owner, pool, srs_enabled, created_at FROM study_sets WHERE id = ?1",
                params![id],
                row_to_set,
            )
            .optional()?;
        Ok(set)
    }

    fn require_set(&self, id: i64) -> Result<StudySet> {
        self.get_set(id)?.ok_or_else(|| Error::not_found("set", id))
    }

    pub fn list_sets(&self) -> Result<Vec<StudySet>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, owner, pool, srs_enabled, created_at FROM study_sets ORDER BY name",
        )?;
        let rows = stmt.query_map([], row_to_set)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn delete_set(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM study_sets WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Records are kept; scheduling skips them while disabled
    pub fn set_srs_enabled(&self, id: i64, enabled: bool) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE study_sets SET srs_enabled = ?1 WHERE id = ?2",
            params![enabled, id],
        )?;
        if rows == 0 {
            return Err(Error::not_found("set", id));
        }
        tracing::info!(set_id = id, enabled, "updated spaced repetition setting");
        Ok(())
    }

    // Item operations
    pub fn add_item(&self, set_id: i64, item: &NewItem, now: DateTime<Utc>) -> Result<i64> {
        self.require_set(set_id)?;
        let examples = serde_json::to_string(&item.examples)?;
        self.conn.execute(
            r#"
            INSERT INTO items (set_id, term, reading, meaning, examples, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![set_id, item.term, item.reading, item.meaning, examples, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_item(&self, id: i64) -> Result<Option<ItemWithSrs>> {
        let query = format!(
            "SELECT {} FROM items i LEFT JOIN srs_records r ON r.item_id = i.id WHERE i.id = ?1",
            ITEM_COLUMNS
        );
        let item = self
            .conn
            .query_row(&query, params![id], row_to_item_with_srs)
            .optional()?;
        Ok(item)
    }

    pub fn list_items(&self, set_id: i64) -> Result<Vec<ItemWithSrs>> {
        self.require_set(set_id)?;
        let query = format!(
            r#"
            SELECT {}
            FROM items i
            LEFT JOIN srs_records r ON r.item_id = i.id
            WHERE i.set_id = ?1
            ORDER BY i.created_at, i.id
            "#,
            ITEM_COLUMNS
        );
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params![set_id], row_to_item_with_srs)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn delete_item(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM items WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn review_history(&self, item_id: i64) -> Result<Vec<ReviewEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT outcome, level_before, level_after, reviewed_at
            FROM review_history
            WHERE item_id = ?1
            ORDER BY reviewed_at DESC, id DESC
            "#,
        )?;
        let rows = stmt.query_map(params![item_id], |row| {
            Ok(ReviewEntry {
                outcome: row.get(0)?,
                level_before: row.get(1)?,
                level_after: row.get(2)?,
                reviewed_at: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Scheduling
    //
    // Due status is evaluated here rather than in SQL so that stored levels
    // outside the interval table drop out exactly as `srs::due_at` says.

    fn scheduled_items(&self, set_id: Option<i64>) -> Result<Vec<ItemWithSrs>> {
        let query = format!(
            r#"
            SELECT {}
            FROM items i
            JOIN srs_records r ON r.item_id = i.id
            JOIN study_sets s ON s.id = i.set_id
            WHERE s.srs_enabled = 1 AND (?1 IS NULL OR i.set_id = ?1)
            "#,
            ITEM_COLUMNS
        );
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params![set_id], row_to_item_with_srs)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Most overdue first
    pub fn due_items(&self, set_id: i64, now: DateTime<Utc>) -> Result<Vec<ItemWithSrs>> {
        self.require_set(set_id)?;
        Ok(collect_due(self.scheduled_items(Some(set_id))?, now))
    }

    pub fn all_due_items(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ItemWithSrs>> {
        let mut due = collect_due(self.scheduled_items(None)?, now);
        due.truncate(limit);
        Ok(due)
    }

    pub fn next_due(&self, set_id: i64) -> Result<Option<DateTime<Utc>>> {
        let items = self.scheduled_items(Some(set_id))?;
        Ok(srs::next_due(items.iter().filter_map(|i| i.srs.as_ref())))
    }

    pub fn learnable_items(
        &self,
        set_id: i64,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ItemWithSrs>> {
        let set = self.require_set(set_id)?;
        let left = self.budget_left(&set, now)?;
        if left <= 0 || limit == 0 {
            return Ok(Vec::new());
        }
        let bound = limit.min(left as usize);

        let query = format!(
            r#"
            SELECT {}
            FROM items i
            LEFT JOIN srs_records r ON r.item_id = i.id
            WHERE i.set_id = ?1 AND r.item_id IS NULL
            ORDER BY i.created_at, i.id
            LIMIT ?2
            "#,
            ITEM_COLUMNS
        );
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params![set_id, bound as i64], row_to_item_with_srs)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn count_learnable(&self, set_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM items i
            LEFT JOIN srs_records r ON r.item_id = i.id
            WHERE i.set_id = ?1 AND r.item_id IS NULL
            "#,
            params![set_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // Admission gate
    pub fn admitted_today(&self, owner: &str, pool: Pool, now: DateTime<Utc>) -> Result<i64> {
        let day = self.policy.day(now);
        let admitted = self
            .conn
            .query_row(
                "SELECT admitted FROM daily_admissions WHERE owner = ?1 AND pool = ?2 AND day = ?3",
                params![owner, pool, day],
                |row| row.get(0),
            )
            .optional()?;
        Ok(admitted.unwrap_or(0))
    }

    pub fn learn_new_left_for(&self, owner: &str, pool: Pool, now: DateTime<Utc>) -> Result<i64> {
        let admitted = self.admitted_today(owner, pool, now)?;
        Ok(self.policy.remaining(pool, admitted))
    }

    pub fn learn_new_left(&self, set_id: i64, now: DateTime<Utc>) -> Result<i64> {
        let set = self.require_set(set_id)?;
        self.budget_left(&set, now)
    }

    fn budget_left(&self, set: &StudySet, now: DateTime<Utc>) -> Result<i64> {
        if !set.srs_enabled {
            return Ok(0);
        }
        self.learn_new_left_for(&set.owner, set.pool, now)
    }

    // Check and decrement are one conditional upsert under an immediate
    // transaction
    pub fn admit_item(&mut self, item_id: i64, now: DateTime<Utc>) -> Result<SrsRecord> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (set_id, owner, pool, srs_enabled, adopted): (i64, String, Pool, bool, bool) = tx
            .query_row(
                r#"
                SELECT s.id, s.owner, s.pool, s.srs_enabled, r.item_id IS NOT NULL
                FROM items i
                JOIN study_sets s ON s.id = i.set_id
                LEFT JOIN srs_records r ON r.item_id = i.id
                WHERE i.id = ?1
                "#,
                params![item_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?
            .ok_or_else(|| Error::not_found("item", item_id))?;

        if !srs_enabled {
            return Err(Error::SrsDisabled(set_id));
        }
        if adopted {
            return Err(Error::AlreadyAdopted(item_id));
        }

        let limit = self.policy.limit(pool);
        let day = self.policy.day(now);
        let taken = if limit > 0 {
            tx.execute(
                r#"
                INSERT INTO daily_admissions (owner, pool, day, admitted)
                VALUES (?1, ?2, ?3, 1)
                ON CONFLICT(owner, pool, day)
                DO UPDATE SET admitted = admitted + 1 WHERE admitted < ?4
                "#,
                params![owner, pool, day, limit],
            )?
        } else {
            0
        };

        if taken == 0 {
            tracing::warn!(%owner, %pool, %day, "daily learning limit reached");
            return Err(Error::BudgetExhausted { pool });
        }

        tx.execute(
            "INSERT INTO srs_records (item_id, level, last_event_at) VALUES (?1, ?2, ?3)",
            params![item_id, srs::MIN_LEVEL, now],
        )?;
        tx.commit()?;

        tracing::info!(item_id, %owner, %pool, "admitted item into review cycle");
        Ok(SrsRecord {
            item_id,
            level: srs::MIN_LEVEL,
            last_event_at: now,
            times_reviewed: 0,
            times_correct: 0,
        })
    }

    pub fn learn(&mut self, set_id: i64, limit: usize, now: DateTime<Utc>) -> Result<LearnResult> {
        let set = self.require_set(set_id)?;
        if !set.srs_enabled {
            return Err(Error::SrsDisabled(set_id));
        }

        let candidates = self.learnable_items(set_id, limit, now)?;
        let mut admitted = Vec::with_capacity(candidates.len());
        for mut candidate in candidates {
            match self.admit_item(candidate.item.id, now) {
                Ok(record) => {
                    candidate.srs = Some(record);
                    admitted.push(candidate);
                }
                Err(Error::BudgetExhausted { .. }) => break,
                // Another process got to it first
                Err(Error::AlreadyAdopted(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        let learn_new_left = self.budget_left(&set, now)?;
        Ok(LearnResult {
            admitted,
            learn_new_left,
        })
    }

    // Review operations
    pub fn record_review(
        &mut self,
        item_id: i64,
        outcome: ReviewOutcome,
        now: DateTime<Utc>,
    ) -> Result<ReviewResult> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (set_id, srs_enabled, level): (i64, bool, Option<i64>) = tx
            .query_row(
                r#"
                SELECT s.id, s.srs_enabled, r.level
                FROM items i
                JOIN study_sets s ON s.id = i.set_id
                LEFT JOIN srs_records r ON r.item_id = i.id
                WHERE i.id = ?1
                "#,
                params![item_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
            .ok_or_else(|| Error::not_found("item", item_id))?;

        if !srs_enabled {
            return Err(Error::SrsDisabled(set_id));
        }
        let previous_level = level.ok_or(Error::NotAdopted(item_id))?;
        let new_level = srs::next_level(previous_level, outcome);
        let correct = matches!(outcome, ReviewOutcome::Correct);

        tx.execute(
            r#"
            UPDATE srs_records
            SET level = ?1,
                last_event_at = ?2,
                times_reviewed = times_reviewed + 1,
                times_correct = times_correct + ?3
            WHERE item_id = ?4
            "#,
            params![new_level, now, correct as i64, item_id],
        )?;
        tx.execute(
            r#"
            INSERT INTO review_history (item_id, outcome, level_before, level_after, reviewed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![item_id, outcome, previous_level, new_level, now],
        )?;
        tx.commit()?;

        tracing::info!(item_id, outcome = outcome.as_str(), previous_level, new_level, "recorded review");
        Ok(ReviewResult {
            item_id,
            outcome,
            previous_level,
            level: new_level,
            due_at: srs::due_at(new_level, now),
        })
    }

    pub fn pick_next_due(
        &self,
        set_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Option<ItemWithSrs>> {
        if let Some(id) = set_id {
            self.require_set(id)?;
        }
        let due = collect_due(self.scheduled_items(set_id)?, now);
        if due.is_empty() {
            return Ok(None);
        }

        let weights: Vec<f64> = due
            .iter()
            .map(|i| {
                i.srs
                    .as_ref()
                    .map(|r| srs::selection_weight(r, now))
                    .unwrap_or(1.0)
            })
            .collect();

        let total_weight: f64 = weights.iter().sum();
        let mut rng = rand::thread_rng();
        let mut random_point = rng.gen::<f64>() * total_weight;

        for (i, weight) in weights.iter().enumerate() {
            random_point -= weight;
            if random_point <= 0.0 {
                return Ok(due.into_iter().nth(i));
            }
        }

        // Fallback to most overdue
        Ok(due.into_iter().next())
    }

    // Overviews and stats
    pub fn set_overview(&self, set_id: i64, now: DateTime<Utc>) -> Result<SetOverview> {
        let set = self.require_set(set_id)?;
        self.overview_for(set, now)
    }

    pub fn list_overviews(&self, now: DateTime<Utc>) -> Result<Vec<SetOverview>> {
        self.list_sets()?
            .into_iter()
            .map(|set| self.overview_for(set, now))
            .collect()
    }

    fn overview_for(&self, set: StudySet, now: DateTime<Utc>) -> Result<SetOverview> {
        let total_items: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM items WHERE set_id = ?1",
            params![set.id],
            |row| row.get(0),
        )?;
        let learnable = self.count_learnable(set.id)?;
        let scheduled = self.scheduled_items(Some(set.id))?;
        let records: Vec<&SrsRecord> = scheduled.iter().filter_map(|i| i.srs.as_ref()).collect();
        let learn_new_left = self.budget_left(&set, now)?;

        Ok(SetOverview {
            total_items: total_items as usize,
            in_review: total_items as usize - learnable,
            learnable,
            due_count: srs::due_count(records.iter().copied(), now),
            next_due: srs::next_due(records.iter().copied()),
            learn_new_left,
            set,
        })
    }

    pub fn get_stats(&self, owner: &str, now: DateTime<Utc>) -> Result<Stats> {
        let total_sets: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM study_sets", [], |row| row.get(0))?;

        let total_items: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;

        let total_reviews: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM review_history", [], |row| row.get(0))?;

        let scheduled = self.scheduled_items(None)?;
        let records: Vec<&SrsRecord> = scheduled.iter().filter_map(|i| i.srs.as_ref()).collect();

        // Out-of-range levels are unscheduled and stay out of level stats
        let leveled: Vec<&SrsRecord> = records
            .iter()
            .copied()
            .filter(|r| srs::interval(r.level).is_some())
            .collect();
        let mastered = leveled.iter().filter(|r| r.level == srs::MAX_LEVEL).count() as i64;
        let avg_level = if leveled.is_empty() {
            0.0
        } else {
            leveled.iter().map(|r| r.level as f64).sum::<f64>() / leveled.len() as f64
        };

        let budgets = Pool::ALL
            .iter()
            .map(|&pool| {
                Ok(PoolBudget {
                    pool,
                    limit: self.policy.limit(pool),
                    learn_new_left: self.learn_new_left_for(owner, pool, now)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Stats {
            total_sets,
            total_items,
            in_review: records.len() as i64,
            total_reviews,
            mastered,
            due_now: srs::due_count(records.iter().copied(), now) as i64,
            avg_level,
            budgets,
        })
    }
}

fn collect_due(items: Vec<ItemWithSrs>, now: DateTime<Utc>) -> Vec<ItemWithSrs> {
    let mut due: Vec<ItemWithSrs> = items.into_iter().filter(|i| i.is_due(now)).collect();
    due.sort_by_key(|i| (i.due_at(), i.item.id));
    due
}

fn row_to_set(row: &Row<'_>) -> rusqlite::Result<StudySet> {
    Ok(StudySet {
        id: row.get(0)?,
        name: row.get(1)?,
        owner: row.get(2)?,
        pool: row.get(3)?,
        srs_enabled: row.get(4)?,
        created_at: row.get(5)?,
    })
}

// Expects the column order of ITEM_COLUMNS
fn row_to_item_with_srs(row: &Row<'_>) -> rusqlite::Result<ItemWithSrs> {
    let examples_json: String = row.get(5)?;
    let examples: Vec<String> = serde_json::from_str(&examples_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    let record_id: Option<i64> = row.get(7)?;
    let srs = match record_id {
        Some(item_id) => Some(SrsRecord {
            item_id,
            level: row.get(8)?,
            last_event_at: row.get(9)?,
            times_reviewed: row.get(10)?,
            times_correct: row.get(11)?,
        }),
        None => None,
    };

    Ok(ItemWithSrs {
        item: Item {
            id: row.get(0)?,
            set_id: row.get(1)?,
            term: row.get(2)?,
            reading: row.get(3)?,
            meaning: row.get(4)?,
            examples,
            created_at: row.get(6)?,
        },
        srs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::DailyLimits;
    use chrono::Duration as ChronoDuration;

    fn setup_db() -> Database {
        let db = Database::open(":memory:").expect("Failed to create in-memory database");
        db.init().expect("Failed to initialize database");
        db
    }

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn t0() -> DateTime<Utc> {
        ts("2024-01-01T00:00:00Z")
    }

    fn word(term: &str) -> NewItem {
        NewItem {
            term: term.to_string(),
            reading: None,
            meaning: format!("meaning of {}", term),
            examples: vec![],
        }
    }

    fn add_words(db: &Database, set_id: i64, n: usize) -> Vec<i64> {
        (0..n)
            .map(|i| db.add_item(set_id, &word(&format!("語{}", i)), t0()).unwrap())
            .collect()
    }

    fn vocab_set(db: &Database) -> i64 {
        db.add_set("N5 Vocabulary", Pool::Vocabulary, "default", t0())
            .unwrap()
    }

    fn count(db: &Database, sql: &str) -> i64 {
        db.conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    mod init_tests {
        use super::*;

        #[test]
        fn init_creates_tables() {
            let db = setup_db();
            for table in [
                "study_sets",
                "items",
                "srs_records",
                "review_history",
                "daily_admissions",
            ] {
                let n = count(&db, &format!("SELECT COUNT(*) FROM {}", table));
                assert_eq!(n, 0, "{} should exist and be empty", table);
            }
        }

        #[test]
        fn init_is_idempotent() {
            let db = setup_db();
            db.init().expect("second init should succeed");
        }
    }

    mod set_tests {
        use super::*;

        #[test]
        fn add_and_get_set() {
            let db = setup_db();
            let id = db
                .add_set("Genki grammar", Pool::Grammar, "hana", t0())
                .unwrap();

            let set = db.get_set(id).unwrap().unwrap();
            assert_eq!(set.name, "Genki grammar");
            assert_eq!(set.owner, "hana");
            assert_eq!(set.pool, Pool::Grammar);
            assert!(set.srs_enabled);
            assert_eq!(set.created_at, t0());
        }

        #[test]
        fn duplicate_set_name_fails() {
            let db = setup_db();
            vocab_set(&db);
            let result = db.add_set("N5 Vocabulary", Pool::Vocabulary, "default", t0());
            assert!(matches!(result, Err(Error::Database(_))));
        }

        #[test]
        fn get_set_not_found() {
            let db = setup_db();
            assert!(db.get_set(999).unwrap().is_none());
        }

        #[test]
        fn list_sets_sorted_by_name() {
            let db = setup_db();
            db.add_set("b", Pool::Vocabulary, "default", t0()).unwrap();
            db.add_set("a", Pool::Grammar, "default", t0()).unwrap();
            let names: Vec<String> = db.list_sets().unwrap().into_iter().map(|s| s.name).collect();
            assert_eq!(names, vec!["a", "b"]);
        }

        #[test]
        fn delete_set_cascades_to_items() {
            let db = setup_db();
            let set_id = vocab_set(&db);
            add_words(&db, set_id, 3);

            assert!(db.delete_set(set_id).unwrap());
            assert_eq!(count(&db, "SELECT COUNT(*) FROM items"), 0);
            assert!(!db.delete_set(set_id).unwrap());
        }

        #[test]
        fn toggle_srs_missing_set() {
            let db = setup_db();
            assert!(matches!(
                db.set_srs_enabled(42, false),
                Err(Error::NotFound { kind: "set", id: 42 })
            ));
        }
    }

    mod item_tests {
        use super::*;

        #[test]
        fn add_item_stores_fields() {
            let db = setup_db();
            let set_id = vocab_set(&db);
            let id = db
                .add_item(
                    set_id,
                    &NewItem {
                        term: String::from("食べる"),
                        reading: Some(String::from("たべる")),
                        meaning: String::from("to eat"),
                        examples: vec![String::from("りんごを食べる。")],
                    },
                    t0(),
                )
                .unwrap();

            let item = db.get_item(id).unwrap().unwrap();
            assert_eq!(item.item.term, "食べる");
            assert_eq!(item.item.reading.as_deref(), Some("たべる"));
            assert_eq!(item.item.examples, vec!["りんごを食べる。"]);
            assert!(item.srs.is_none());
        }

        #[test]
        fn add_item_to_missing_set_fails() {
            let db = setup_db();
            let result = db.add_item(7, &word("水"), t0());
            assert!(matches!(result, Err(Error::NotFound { kind: "set", .. })));
        }

        #[test]
        fn list_items_in_creation_order() {
            let db = setup_db();
            let set_id = vocab_set(&db);
            let ids = add_words(&db, set_id, 3);
            let listed: Vec<i64> = db
                .list_items(set_id)
                .unwrap()
                .into_iter()
                .map(|i| i.item.id)
                .collect();
            assert_eq!(listed, ids);
        }

        #[test]
        fn delete_item() {
            let db = setup_db();
            let set_id = vocab_set(&db);
            let id = add_words(&db, set_id, 1)[0];
            assert!(db.delete_item(id).unwrap());
            assert!(db.get_item(id).unwrap().is_none());
            assert!(!db.delete_item(id).unwrap());
        }
    }

    mod admission_tests {
        use super::*;

        #[test]
        fn admit_creates_level_one_record() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let id = add_words(&db, set_id, 1)[0];

            let record = db.admit_item(id, t0()).unwrap();
            assert_eq!(record.level, 1);
            assert_eq!(record.last_event_at, t0());

            let item = db.get_item(id).unwrap().unwrap();
            assert_eq!(item.srs.unwrap().level, 1);
            assert_eq!(db.learn_new_left(set_id, t0()).unwrap(), 4);
        }

        #[test]
        fn admit_twice_rejected_without_consuming_budget() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let id = add_words(&db, set_id, 1)[0];

            db.admit_item(id, t0()).unwrap();
            assert!(matches!(
                db.admit_item(id, t0()),
                Err(Error::AlreadyAdopted(_))
            ));
            assert_eq!(db.learn_new_left(set_id, t0()).unwrap(), 4);
        }

        #[test]
        fn admit_missing_item() {
            let mut db = setup_db();
            assert!(matches!(
                db.admit_item(5, t0()),
                Err(Error::NotFound { kind: "item", id: 5 })
            ));
        }

        #[test]
        fn budget_exhausted_after_limit() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let ids = add_words(&db, set_id, 6);

            for &id in &ids[..5] {
                db.admit_item(id, t0()).unwrap();
            }
            assert_eq!(db.learn_new_left(set_id, t0()).unwrap(), 0);
            assert!(matches!(
                db.admit_item(ids[5], t0()),
                Err(Error::BudgetExhausted {
                    pool: Pool::Vocabulary
                })
            ));
            assert!(db.get_item(ids[5]).unwrap().unwrap().srs.is_none());
        }

        #[test]
        fn budget_resets_next_day() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let ids = add_words(&db, set_id, 6);
            for &id in &ids[..5] {
                db.admit_item(id, t0()).unwrap();
            }

            let tomorrow = ts("2024-01-02T00:00:00Z");
            assert_eq!(db.learn_new_left(set_id, tomorrow).unwrap(), 5);
            db.admit_item(ids[5], tomorrow).unwrap();
        }

        #[test]
        fn pools_are_independent() {
            let mut db = setup_db();
            let vocab = vocab_set(&db);
            let grammar = db
                .add_set("Grammar", Pool::Grammar, "default", t0())
                .unwrap();
            for id in add_words(&db, vocab, 5) {
                db.admit_item(id, t0()).unwrap();
            }
            assert_eq!(db.learn_new_left(vocab, t0()).unwrap(), 0);
            assert_eq!(db.learn_new_left(grammar, t0()).unwrap(), 5);
        }

        #[test]
        fn sets_of_same_owner_and_pool_share_budget() {
            let mut db = setup_db();
            let a = vocab_set(&db);
            let b = db
                .add_set("N4 Vocabulary", Pool::Vocabulary, "default", t0())
                .unwrap();
            for id in add_words(&db, a, 3) {
                db.admit_item(id, t0()).unwrap();
            }
            assert_eq!(db.learn_new_left(b, t0()).unwrap(), 2);
        }

        #[test]
        fn owners_have_separate_budgets() {
            let mut db = setup_db();
            let mine = vocab_set(&db);
            let theirs = db
                .add_set("Other", Pool::Vocabulary, "ken", t0())
                .unwrap();
            for id in add_words(&db, mine, 5) {
                db.admit_item(id, t0()).unwrap();
            }
            assert_eq!(db.learn_new_left(theirs, t0()).unwrap(), 5);
        }

        #[test]
        fn zero_limit_never_admits() {
            let limits = DailyLimits {
                vocabulary: 0,
                grammar: 5,
            };
            let mut db = setup_db().with_policy(AdmissionPolicy::new(limits, 0).unwrap());
            let set_id = vocab_set(&db);
            let id = add_words(&db, set_id, 1)[0];
            assert!(matches!(
                db.admit_item(id, t0()),
                Err(Error::BudgetExhausted { .. })
            ));
            assert_eq!(count(&db, "SELECT COUNT(*) FROM daily_admissions"), 0);
        }

        #[test]
        fn day_boundary_follows_offset() {
            let tokyo = AdmissionPolicy::new(DailyLimits::default(), 9 * 60).unwrap();
            let mut db = setup_db().with_policy(tokyo);
            let set_id = vocab_set(&db);
            let ids = add_words(&db, set_id, 6);

            // 14:00 UTC is 23:00 in Tokyo
            let late = ts("2024-01-01T14:00:00Z");
            for &id in &ids[..5] {
                db.admit_item(id, late).unwrap();
            }
            // 15:00 UTC is midnight in Tokyo
            let next_day = ts("2024-01-01T15:00:00Z");
            assert_eq!(db.learn_new_left(set_id, next_day).unwrap(), 5);
            db.admit_item(ids[5], next_day).unwrap();
        }

        #[test]
        fn concurrent_admissions_never_exceed_limit() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("kioku.db");
            let ids = {
                let db = Database::open(&path).unwrap();
                db.init().unwrap();
                let set_id = vocab_set(&db);
                add_words(&db, set_id, 12)
            };

            let handles: Vec<_> = ids
                .into_iter()
                .map(|id| {
                    let path = path.clone();
                    std::thread::spawn(move || {
                        let mut db = Database::open(&path).unwrap();
                        db.admit_item(id, t0())
                    })
                })
                .collect();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let admitted = results.iter().filter(|r| r.is_ok()).count();
            let refused = results
                .iter()
                .filter(|r| matches!(r, Err(Error::BudgetExhausted { .. })))
                .count();

            assert_eq!(admitted, 5);
            assert_eq!(refused, 7);

            let db = Database::open(&path).unwrap();
            assert_eq!(count(&db, "SELECT COUNT(*) FROM srs_records"), 5);
            assert_eq!(count(&db, "SELECT admitted FROM daily_admissions"), 5);
        }
    }

    mod learn_tests {
        use super::*;

        #[test]
        fn learnable_bounded_by_limit_and_budget() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let ids = add_words(&db, set_id, 8);

            assert_eq!(db.learnable_items(set_id, 3, t0()).unwrap().len(), 3);
            assert_eq!(db.learnable_items(set_id, 20, t0()).unwrap().len(), 5);

            db.admit_item(ids[0], t0()).unwrap();
            db.admit_item(ids[1], t0()).unwrap();
            let learnable = db.learnable_items(set_id, 20, t0()).unwrap();
            assert_eq!(learnable.len(), 3);
            assert_eq!(learnable[0].item.id, ids[2]);
        }

        #[test]
        fn learnable_empty_when_budget_spent() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let ids = add_words(&db, set_id, 7);
            for &id in &ids[..5] {
                db.admit_item(id, t0()).unwrap();
            }
            assert!(db.learnable_items(set_id, 10, t0()).unwrap().is_empty());
        }

        #[test]
        fn learn_admits_oldest_first() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let ids = add_words(&db, set_id, 4);

            let result = db.learn(set_id, 2, t0()).unwrap();
            let admitted: Vec<i64> = result.admitted.iter().map(|i| i.item.id).collect();
            assert_eq!(admitted, ids[..2].to_vec());
            assert!(result.admitted.iter().all(|i| i.srs.is_some()));
            assert_eq!(result.learn_new_left, 3);
        }

        #[test]
        fn learn_stops_at_budget() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            add_words(&db, set_id, 9);

            let first = db.learn(set_id, 10, t0()).unwrap();
            assert_eq!(first.admitted.len(), 5);
            assert_eq!(first.learn_new_left, 0);

            let second = db.learn(set_id, 10, t0()).unwrap();
            assert!(second.admitted.is_empty());
        }

        #[test]
        fn learn_rejected_when_srs_disabled() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            add_words(&db, set_id, 2);
            db.set_srs_enabled(set_id, false).unwrap();

            assert!(matches!(
                db.learn(set_id, 5, t0()),
                Err(Error::SrsDisabled(_))
            ));
            assert_eq!(db.learn_new_left(set_id, t0()).unwrap(), 0);
        }
    }

    mod due_tests {
        use super::*;

        #[test]
        fn level_two_item_due_after_a_day() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let id = add_words(&db, set_id, 1)[0];
            db.admit_item(id, t0()).unwrap();
            db.conn
                .execute("UPDATE srs_records SET level = 2 WHERE item_id = ?1", params![id])
                .unwrap();

            assert!(db
                .due_items(set_id, ts("2024-01-01T23:00:00Z"))
                .unwrap()
                .is_empty());
            let due = db.due_items(set_id, ts("2024-01-02T00:00:01Z")).unwrap();
            assert_eq!(due.len(), 1);
            assert_eq!(due[0].item.id, id);
        }

        #[test]
        fn unadmitted_items_never_due() {
            let db = setup_db();
            let set_id = vocab_set(&db);
            add_words(&db, set_id, 3);
            assert!(db
                .due_items(set_id, ts("2030-01-01T00:00:00Z"))
                .unwrap()
                .is_empty());
            assert_eq!(db.next_due(set_id).unwrap(), None);
        }

        #[test]
        fn out_of_range_level_excluded_from_due_and_next_due() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let ids = add_words(&db, set_id, 2);
            db.admit_item(ids[0], t0()).unwrap();
            db.admit_item(ids[1], t0()).unwrap();
            db.conn
                .execute("UPDATE srs_records SET level = 0 WHERE item_id = ?1", params![ids[0]])
                .unwrap();
            db.conn
                .execute("UPDATE srs_records SET level = 3 WHERE item_id = ?1", params![ids[1]])
                .unwrap();

            assert_eq!(
                db.next_due(set_id).unwrap(),
                Some(t0() + ChronoDuration::days(3))
            );
            let due = db.due_items(set_id, ts("2025-01-01T00:00:00Z")).unwrap();
            assert_eq!(due.len(), 1);
            assert_eq!(due[0].item.id, ids[1]);
        }

        #[test]
        fn due_items_sorted_most_overdue_first() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let ids = add_words(&db, set_id, 2);
            db.admit_item(ids[0], ts("2024-01-01T01:00:00Z")).unwrap();
            db.admit_item(ids[1], t0()).unwrap();

            let due = db.due_items(set_id, ts("2024-01-01T02:00:00Z")).unwrap();
            let order: Vec<i64> = due.iter().map(|i| i.item.id).collect();
            assert_eq!(order, vec![ids[1], ids[0]]);
        }

        #[test]
        fn disabling_srs_hides_schedule_but_keeps_records() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let id = add_words(&db, set_id, 1)[0];
            db.admit_item(id, t0()).unwrap();
            let later = ts("2024-01-01T01:00:00Z");

            db.set_srs_enabled(set_id, false).unwrap();
            assert!(db.due_items(set_id, later).unwrap().is_empty());
            assert_eq!(db.next_due(set_id).unwrap(), None);
            assert!(db.get_item(id).unwrap().unwrap().srs.is_some());
            assert_eq!(count(&db, "SELECT COUNT(*) FROM items"), 1);

            db.set_srs_enabled(set_id, true).unwrap();
            assert_eq!(db.due_items(set_id, later).unwrap().len(), 1);
        }

        #[test]
        fn all_due_items_spans_sets_and_limits() {
            let mut db = setup_db();
            let a = vocab_set(&db);
            let b = db.add_set("Grammar", Pool::Grammar, "default", t0()).unwrap();
            for id in add_words(&db, a, 3) {
                db.admit_item(id, t0()).unwrap();
            }
            for id in add_words(&db, b, 2) {
                db.admit_item(id, t0()).unwrap();
            }
            let later = ts("2024-01-01T01:00:00Z");
            assert_eq!(db.all_due_items(later, 10).unwrap().len(), 5);
            assert_eq!(db.all_due_items(later, 4).unwrap().len(), 4);
        }
    }

    mod review_tests {
        use super::*;

        fn admitted_item(db: &mut Database) -> (i64, i64) {
            let set_id = vocab_set(db);
            let id = add_words(db, set_id, 1)[0];
            db.admit_item(id, t0()).unwrap();
            (set_id, id)
        }

        #[test]
        fn correct_review_advances_level_and_resets_clock() {
            let mut db = setup_db();
            let (_, id) = admitted_item(&mut db);
            let now = ts("2024-01-01T00:20:00Z");

            let result = db.record_review(id, ReviewOutcome::Correct, now).unwrap();
            assert_eq!(result.previous_level, 1);
            assert_eq!(result.level, 2);
            assert_eq!(result.due_at, Some(now + ChronoDuration::days(1)));

            let record = db.get_item(id).unwrap().unwrap().srs.unwrap();
            assert_eq!(record.level, 2);
            assert_eq!(record.last_event_at, now);
            assert_eq!(record.times_reviewed, 1);
            assert_eq!(record.times_correct, 1);
        }

        #[test]
        fn incorrect_review_floors_at_level_one() {
            let mut db = setup_db();
            let (_, id) = admitted_item(&mut db);
            let result = db.record_review(id, ReviewOutcome::Incorrect, t0()).unwrap();
            assert_eq!(result.level, 1);

            let record = db.get_item(id).unwrap().unwrap().srs.unwrap();
            assert_eq!(record.times_reviewed, 1);
            assert_eq!(record.times_correct, 0);
        }

        #[test]
        fn review_caps_at_level_nine() {
            let mut db = setup_db();
            let (_, id) = admitted_item(&mut db);
            for _ in 0..12 {
                db.record_review(id, ReviewOutcome::Correct, t0()).unwrap();
            }
            assert_eq!(db.get_item(id).unwrap().unwrap().srs.unwrap().level, 9);
        }

        #[test]
        fn review_creates_history() {
            let mut db = setup_db();
            let (_, id) = admitted_item(&mut db);
            db.record_review(id, ReviewOutcome::Correct, t0()).unwrap();
            db.record_review(id, ReviewOutcome::Partial, ts("2024-01-02T00:00:00Z"))
                .unwrap();

            let history = db.review_history(id).unwrap();
            assert_eq!(history.len(), 2);
            assert_eq!(history[0].outcome, ReviewOutcome::Partial);
            assert_eq!(history[0].level_before, 2);
            assert_eq!(history[0].level_after, 2);
            assert_eq!(history[1].outcome, ReviewOutcome::Correct);
        }

        #[test]
        fn review_requires_admission() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let id = add_words(&db, set_id, 1)[0];
            assert!(matches!(
                db.record_review(id, ReviewOutcome::Correct, t0()),
                Err(Error::NotAdopted(_))
            ));
        }

        #[test]
        fn review_rejected_when_srs_disabled() {
            let mut db = setup_db();
            let (set_id, id) = admitted_item(&mut db);
            db.set_srs_enabled(set_id, false).unwrap();
            assert!(matches!(
                db.record_review(id, ReviewOutcome::Correct, t0()),
                Err(Error::SrsDisabled(_))
            ));
            assert!(db.review_history(id).unwrap().is_empty());
        }

        #[test]
        fn concurrent_reviews_all_apply() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("kioku.db");
            let id = {
                let mut db = Database::open(&path).unwrap();
                db.init().unwrap();
                admitted_item(&mut db).1
            };

            let handles: Vec<_> = (0..6)
                .map(|_| {
                    let path = path.clone();
                    std::thread::spawn(move || {
                        let mut db = Database::open(&path).unwrap();
                        db.record_review(id, ReviewOutcome::Correct, t0())
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap().unwrap();
            }

            let db = Database::open(&path).unwrap();
            let record = db.get_item(id).unwrap().unwrap().srs.unwrap();
            assert_eq!(record.level, 7);
            assert_eq!(record.times_reviewed, 6);
            assert_eq!(db.review_history(id).unwrap().len(), 6);
        }

        #[test]
        fn review_missing_item() {
            let mut db = setup_db();
            assert!(matches!(
                db.record_review(3, ReviewOutcome::Correct, t0()),
                Err(Error::NotFound { kind: "item", .. })
            ));
        }
    }

    mod next_item_tests {
        use super::*;

        #[test]
        fn pick_next_due_empty() {
            let db = setup_db();
            assert!(db.pick_next_due(None, t0()).unwrap().is_none());
        }

        #[test]
        fn pick_next_due_returns_a_due_item() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let ids = add_words(&db, set_id, 3);
            db.admit_item(ids[0], t0()).unwrap();
            db.admit_item(ids[1], t0()).unwrap();

            let later = ts("2024-01-01T01:00:00Z");
            let picked = db.pick_next_due(Some(set_id), later).unwrap().unwrap();
            assert!(picked.item.id == ids[0] || picked.item.id == ids[1]);
        }

        #[test]
        fn pick_next_due_ignores_items_not_due() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let id = add_words(&db, set_id, 1)[0];
            db.admit_item(id, t0()).unwrap();
            assert!(db
                .pick_next_due(Some(set_id), ts("2024-01-01T00:05:00Z"))
                .unwrap()
                .is_none());
        }

        #[test]
        fn pick_next_due_missing_set() {
            let db = setup_db();
            assert!(matches!(
                db.pick_next_due(Some(9), t0()),
                Err(Error::NotFound { .. })
            ));
        }
    }

    mod overview_tests {
        use super::*;

        #[test]
        fn overview_counts() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let ids = add_words(&db, set_id, 4);
            db.admit_item(ids[0], t0()).unwrap();
            db.admit_item(ids[1], ts("2024-01-01T00:30:00Z")).unwrap();

            let now = ts("2024-01-01T00:15:00Z");
            let overview = db.set_overview(set_id, now).unwrap();
            assert_eq!(overview.total_items, 4);
            assert_eq!(overview.in_review, 2);
            assert_eq!(overview.learnable, 2);
            assert_eq!(overview.due_count, 1);
            assert_eq!(overview.next_due, Some(t0() + ChronoDuration::minutes(10)));
            assert_eq!(overview.learn_new_left, 3);
        }

        #[test]
        fn list_overviews_covers_every_set() {
            let db = setup_db();
            vocab_set(&db);
            db.add_set("Grammar", Pool::Grammar, "default", t0()).unwrap();
            assert_eq!(db.list_overviews(t0()).unwrap().len(), 2);
        }
    }

    mod stats_tests {
        use super::*;

        #[test]
        fn stats_empty_db() {
            let db = setup_db();
            let stats = db.get_stats("default", t0()).unwrap();

            assert_eq!(stats.total_sets, 0);
            assert_eq!(stats.total_items, 0);
            assert_eq!(stats.in_review, 0);
            assert_eq!(stats.total_reviews, 0);
            assert_eq!(stats.due_now, 0);
            assert_eq!(stats.avg_level, 0.0);
            assert_eq!(stats.budgets.len(), 2);
            assert!(stats.budgets.iter().all(|b| b.learn_new_left == 5));
        }

        #[test]
        fn stats_counts_reviews_and_levels() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let ids = add_words(&db, set_id, 3);
            db.admit_item(ids[0], t0()).unwrap();
            db.admit_item(ids[1], t0()).unwrap();
            db.record_review(ids[0], ReviewOutcome::Correct, t0()).unwrap();

            let stats = db.get_stats("default", ts("2024-01-01T00:11:00Z")).unwrap();
            assert_eq!(stats.total_items, 3);
            assert_eq!(stats.in_review, 2);
            assert_eq!(stats.total_reviews, 1);
            assert_eq!(stats.due_now, 1);
            assert_eq!(stats.avg_level, 1.5);

            let vocab = stats
                .budgets
                .iter()
                .find(|b| b.pool == Pool::Vocabulary)
                .unwrap();
            assert_eq!(vocab.learn_new_left, 3);
        }

        #[test]
        fn stats_ignore_out_of_range_levels() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let ids = add_words(&db, set_id, 3);
            for &id in &ids {
                db.admit_item(id, t0()).unwrap();
            }
            for (id, level) in [(ids[0], 0), (ids[1], 42), (ids[2], 3)] {
                db.conn
                    .execute(
                        "UPDATE srs_records SET level = ?1 WHERE item_id = ?2",
                        params![level, id],
                    )
                    .unwrap();
            }

            let stats = db.get_stats("default", t0()).unwrap();
            assert_eq!(stats.in_review, 3);
            assert_eq!(stats.mastered, 0);
            assert_eq!(stats.avg_level, 3.0);
            assert_eq!(stats.due_now, 0);
        }

        #[test]
        fn stats_count_level_nine_as_mastered() {
            let mut db = setup_db();
            let set_id = vocab_set(&db);
            let id = add_words(&db, set_id, 1)[0];
            db.admit_item(id, t0()).unwrap();
            for _ in 0..8 {
                db.record_review(id, ReviewOutcome::Correct, t0()).unwrap();
            }

            let stats = db.get_stats("default", t0()).unwrap();
            assert_eq!(stats.mastered, 1);
            assert_eq!(stats.avg_level, 9.0);
        }
    }
}
