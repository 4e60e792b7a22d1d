use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::admission::LearnNew;
use crate::srs;

// Item pools tracked separately for the daily admission limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pool {
    Vocabulary,
    Grammar,
}

impl Pool {
    pub const ALL: [Pool; 2] = [Pool::Vocabulary, Pool::Grammar];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pool::Vocabulary => "vocabulary",
            Pool::Grammar => "grammar",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "vocabulary" | "vocab" | "v" => Some(Pool::Vocabulary),
            "grammar" | "g" => Some(Pool::Grammar),
            _ => None,
        }
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySet {
    pub id: i64,
    pub name: String,
    pub owner: String,
    pub pool: Pool,
    pub srs_enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub set_id: i64,
    pub term: String,
    pub reading: Option<String>,
    pub meaning: String,
    pub examples: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrsRecord {
    pub item_id: i64,
    pub level: i64,
    pub last_event_at: DateTime<Utc>,
    pub times_reviewed: i64,
    pub times_correct: i64,
}

impl SrsRecord {
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        srs::due_at(self.level, self.last_event_at)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        srs::is_due(self.level, self.last_event_at, now)
    }

    pub fn level_label(&self) -> &'static str {
        match self.level {
            1 | 2 => "Learning",
            3 | 4 => "Familiar",
            5 | 6 => "Comfortable",
            7 | 8 => "Proficient",
            9 => "Mastered",
            _ => "Unscheduled",
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.times_reviewed == 0 {
            0.0
        } else {
            (self.times_correct as f64 / self.times_reviewed as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemWithSrs {
    pub item: Item,
    pub srs: Option<SrsRecord>,
}

impl ItemWithSrs {
    pub fn is_learnable(&self) -> bool {
        self.srs.is_none()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.srs.as_ref().is_some_and(|r| r.is_due(now))
    }

    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.srs.as_ref().and_then(SrsRecord::due_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewOutcome {
    Correct,
    Partial,
    Incorrect,
}

impl ReviewOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewOutcome::Correct => "correct",
            ReviewOutcome::Partial => "partial",
            ReviewOutcome::Incorrect => "incorrect",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "correct" | "c" | "yes" | "y" | "good" | "1" => Some(ReviewOutcome::Correct),
            "partial" | "p" | "ok" | "2" => Some(ReviewOutcome::Partial),
            "incorrect" | "i" | "no" | "n" | "bad" | "0" => Some(ReviewOutcome::Incorrect),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewResult {
    pub item_id: i64,
    pub outcome: ReviewOutcome,
    pub previous_level: i64,
    pub level: i64,
    pub due_at: Option<DateTime<Utc>>,
}

// Per-set scheduling summary used by the dashboard and `set show`
#[derive(Debug, Clone, Serialize)]
pub struct SetOverview {
    pub set: StudySet,
    pub total_items: usize,
    pub in_review: usize,
    pub learnable: usize,
    pub due_count: usize,
    pub next_due: Option<DateTime<Utc>>,
    pub learn_new_left: i64,
}

// Payload of the `due` and `learn` responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyData {
    pub items: Vec<ItemWithSrs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learn_new_left: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_due: Option<DateTime<Utc>>,
    // Absent means enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srs_enabled: Option<bool>,
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

pub const LOAD_ERROR: &str = "Failed to load study data";

// Failed or empty responses degrade to the placeholder panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudyPanel {
    pub due_count: usize,
    pub learn_new: LearnNew,
    pub next_due: Option<String>,
    pub error: Option<String>,
}

impl StudyPanel {
    pub fn new(
        due_count: usize,
        next_due: Option<DateTime<Utc>>,
        learn_new: LearnNew,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            due_count,
            learn_new,
            next_due: next_due.map(|due| srs::countdown(due, now)),
            error: None,
        }
    }

    pub fn from_overview(overview: &SetOverview, now: DateTime<Utc>) -> Self {
        let learn_new = LearnNew::for_set(
            overview.set.srs_enabled,
            overview.learn_new_left,
            overview.learnable,
        );
        Self::new(overview.due_count, overview.next_due, learn_new, now)
    }

    // Without a reported next_due, fall back to the listed items
    pub fn from_responses(
        due: &JsonOutput<StudyData>,
        learn: &JsonOutput<StudyData>,
        now: DateTime<Utc>,
    ) -> Self {
        let (Some(due_data), Some(learn_data)) = (
            due.data.as_ref().filter(|_| due.success),
            learn.data.as_ref().filter(|_| learn.success),
        ) else {
            return Self::placeholder(LOAD_ERROR);
        };

        let due_count = due_data.items.iter().filter(|i| i.is_due(now)).count();
        let next_due = due_data
            .next_due
            .or_else(|| srs::next_due(due_data.items.iter().filter_map(|i| i.srs.as_ref())));
        let candidates = learn_data.items.iter().filter(|i| i.is_learnable()).count();
        let learn_new = LearnNew::for_set(
            learn_data.srs_enabled.unwrap_or(true),
            learn_data.learn_new_left.unwrap_or(0),
            candidates,
        );

        Self::new(due_count, next_due, learn_new, now)
    }

    pub fn placeholder(error: &str) -> Self {
        Self {
            due_count: 0,
            learn_new: LearnNew::evaluate(0, 0),
            next_due: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolBudget {
    pub pool: Pool,
    pub limit: i64,
    pub learn_new_left: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_sets: i64,
    pub total_items: i64,
    pub in_review: i64,
    pub total_reviews: i64,
    pub mastered: i64,
    pub due_now: i64,
    pub avg_level: f64,
    pub budgets: Vec<PoolBudget>,
}
