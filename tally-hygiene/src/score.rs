//! Scorecard and trend output types.

use crate::band::{banded_score, percent_of, weighted_score};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One category's snapshot score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub weight: f64,
    #[serde(rename = "total_tickets")]
    pub matched_count: u64,
    #[serde(rename = "all_tickets")]
    pub total_count: u64,
    /// Weighted score, rounded.
    pub score: u32,
    /// Share of the weight that was earned, floored.
    pub score_percent: u32,
    #[serde(rename = "stack_data", default, skip_serializing_if = "Option::is_none")]
    pub stack_breakdown: Option<BTreeMap<String, u64>>,
}

impl ScoreRecord {
    pub fn compute(
        label: impl Into<String>,
        id: Option<String>,
        weight: f64,
        matched_count: u64,
        total_count: u64,
    ) -> Self {
        let raw = weighted_score(matched_count, total_count, weight);
        // floor(raw * 100 / weight) is the band itself; taken exactly.
        let score_percent = if total_count == 0 {
            0
        } else {
            u32::from(banded_score(percent_of(matched_count, total_count)))
        };
        Self {
            label: label.into(),
            id,
            weight,
            matched_count,
            total_count,
            score: raw.round() as u32,
            score_percent,
            stack_breakdown: None,
        }
    }

    pub fn with_stack(mut self, stack: Option<BTreeMap<String, u64>>) -> Self {
        self.stack_breakdown = stack;
        self
    }

    /// Placeholder for a category whose request failed: everything zero.
    pub fn failed(label: impl Into<String>, id: Option<String>) -> Self {
        Self {
            label: label.into(),
            id,
            weight: 0.0,
            matched_count: 0,
            total_count: 0,
            score: 0,
            score_percent: 0,
            stack_breakdown: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.weight == 0.0
    }
}

/// Snapshot scores keyed by category label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scorecard(BTreeMap<String, ScoreRecord>);

impl Scorecard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ScoreRecord) {
        self.0.insert(record.label.clone(), record);
    }

    pub fn get(&self, label: &str) -> Option<&ScoreRecord> {
        self.0.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains_key(label)
    }

    /// Sum of rounded scores.
    pub fn total_score(&self) -> u32 {
        self.0.values().map(|r| r.score).sum()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ScoreRecord)> {
        self.0.iter()
    }
}

impl std::ops::Index<&str> for Scorecard {
    type Output = ScoreRecord;

    fn index(&self, label: &str) -> &ScoreRecord {
        &self.0[label]
    }
}

/// Scores for one trend period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendBucket {
    /// Period start, epoch seconds.
    pub key: i64,
    #[serde(rename = "name")]
    pub label: String,
    /// Unrounded score per category key.
    pub scores: BTreeMap<String, f64>,
    pub total_score: f64,
    pub total_tickets: u64,
}

impl TrendBucket {
    pub fn new(key: i64, total_tickets: u64) -> Self {
        Self {
            key,
            label: key.to_string(),
            scores: BTreeMap::new(),
            total_score: 0.0,
            total_tickets,
        }
    }

    pub fn record(&mut self, category_key: &str, score: f64) {
        self.scores.insert(category_key.to_string(), score);
        self.total_score = self.scores.values().sum();
    }
}

/// Trend series ordered by bucket key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HygieneTrend {
    pub buckets: Vec<TrendBucket>,
    /// Custom category id to display name.
    #[serde(rename = "hygiene_mapping")]
    pub label_mapping: BTreeMap<String, String>,
}
