//! Snapshot and trend computation over one coordinator join.

use crate::band::weighted_score;
use crate::category::{custom_from_configs, HygieneCategory};
use crate::interval::{TrendInterval, WeekLabel};
use crate::profile::ReportProfile;
use crate::score::{HygieneTrend, ScoreRecord, Scorecard, TrendBucket};
use crate::weights::WeightMap;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tally_core::{RequestDescriptor, TallyConfig, TallyResult, DEFAULT_CATEGORY_WEIGHT};
use tally_dispatch::{Coordinator, DispatchOptions, Outcomes};

// ============================================================================
// PHASES
// ============================================================================

/// Progress of one computation. Each call starts at `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    Dispatching,
    Scoring,
    Done,
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnginePhase::Idle => "IDLE",
            EnginePhase::Dispatching => "DISPATCHING",
            EnginePhase::Scoring => "SCORING",
            EnginePhase::Done => "DONE",
        };
        f.write_str(name)
    }
}

struct PhaseLog<'a> {
    widget_id: &'a str,
    phase: EnginePhase,
}

impl<'a> PhaseLog<'a> {
    fn start(widget_id: &'a str) -> Self {
        Self {
            widget_id,
            phase: EnginePhase::Idle,
        }
    }

    fn advance(&mut self, next: EnginePhase) {
        tracing::debug!(
            widget_id = self.widget_id,
            from = %self.phase,
            to = %next,
            "Hygiene phase"
        );
        self.phase = next;
    }
}

// ============================================================================
// REQUEST
// ============================================================================

/// Inputs for one hygiene computation.
#[derive(Debug, Clone, PartialEq)]
pub struct HygieneRequest {
    pub widget_id: String,
    /// Widget query: `filter`, `across`, `interval`, organisation unit fields.
    pub base_filter: Value,
    /// Categories to score; `None` means the profile's built-in set.
    pub categories: Option<Vec<HygieneCategory>>,
    /// Custom category ids to load from integration configs.
    pub custom_ids: Vec<String>,
    pub weights: WeightMap,
}

impl HygieneRequest {
    pub fn new(widget_id: impl Into<String>, base_filter: Value) -> Self {
        Self {
            widget_id: widget_id.into(),
            base_filter,
            categories: None,
            custom_ids: Vec::new(),
            weights: WeightMap::new(),
        }
    }

    pub fn with_categories(mut self, categories: Vec<HygieneCategory>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn with_custom_ids(mut self, ids: Vec<String>) -> Self {
        self.custom_ids = ids;
        self
    }

    pub fn with_weights(mut self, weights: WeightMap) -> Self {
        self.weights = weights;
        self
    }
}

/// Take-latest key shared by every computation for a widget.
pub fn trigger_key(widget_id: &str) -> String {
    format!("hygiene_score_{}", widget_id)
}

fn category_request_id(category: &HygieneCategory, widget_id: &str) -> String {
    format!("{}_{}", category.key(), widget_id)
}

// ============================================================================
// ENGINE
// ============================================================================

/// Weighted hygiene scoring for one report profile.
///
/// Every computation is one fan-out: the unfiltered total plus one request
/// per active category, joined before scoring. A newer computation for the
/// same widget makes an older one return `Superseded`.
pub struct HygieneEngine {
    coordinator: Arc<Coordinator>,
    profile: ReportProfile,
    default_weight: f64,
    options: DispatchOptions,
}

impl HygieneEngine {
    /// Requests bypass the cache read since request ids do not capture the
    /// filter; results are still written back.
    pub fn new(coordinator: Arc<Coordinator>, profile: ReportProfile) -> Self {
        Self {
            coordinator,
            profile,
            default_weight: DEFAULT_CATEGORY_WEIGHT,
            options: DispatchOptions::new().force_load(true),
        }
    }

    pub fn from_config(
        coordinator: Arc<Coordinator>,
        profile: ReportProfile,
        config: &TallyConfig,
    ) -> Self {
        Self::new(coordinator, profile).with_default_weight(config.default_weight)
    }

    pub fn with_default_weight(mut self, weight: f64) -> Self {
        self.default_weight = weight;
        self
    }

    pub fn with_dispatch_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn profile(&self) -> &ReportProfile {
        &self.profile
    }

    pub fn default_weight(&self) -> f64 {
        self.default_weight
    }

    /// Point-in-time scorecard keyed by category label.
    pub async fn compute_snapshot(&self, request: &HygieneRequest) -> TallyResult<Scorecard> {
        let triggers = self.coordinator.triggers();
        let ticket = triggers.begin(&trigger_key(&request.widget_id));
        let mut phase = PhaseLog::start(&request.widget_id);

        let categories = self.resolve_categories(request).await?;
        let base = &request.base_filter;

        let mut requests = vec![RequestDescriptor::list(
            self.profile.total_resource.clone(),
            request.widget_id.clone(),
            self.profile.snapshot_total_body(base),
        )];
        requests.extend(categories.iter().map(|(category, _)| {
            RequestDescriptor::list(
                self.profile.category_resource.clone(),
                category_request_id(category, &request.widget_id),
                self.profile.snapshot_category_body(category, base),
            )
        }));

        phase.advance(EnginePhase::Dispatching);
        let outcomes = self.coordinator.dispatch(requests, &self.options).await?;
        triggers.ensure_current(&ticket)?;

        phase.advance(EnginePhase::Scoring);
        let total = self.total_count(&outcomes, &request.widget_id);
        let mut scorecard = Scorecard::new();
        for (category, weight) in categories {
            let request_id = category_request_id(&category, &request.widget_id);
            let record = match outcomes.list(&request_id) {
                Some(list) => {
                    let (matched, stack) = self.profile.matched(list);
                    ScoreRecord::compute(category.label, category.id, weight, matched, total)
                        .with_stack(stack)
                }
                None => {
                    tracing::warn!(
                        widget_id = %request.widget_id,
                        category = %category.label,
                        error = ?outcomes.error(&request_id),
                        "Category request failed, scoring as zero"
                    );
                    ScoreRecord::failed(category.label, category.id)
                }
            };
            scorecard.insert(record);
        }

        phase.advance(EnginePhase::Done);
        tracing::info!(
            widget_id = %request.widget_id,
            categories = scorecard.len(),
            total,
            total_score = scorecard.total_score(),
            "Hygiene snapshot computed"
        );
        Ok(scorecard)
    }

    /// Scores per time bucket. `interval` defaults to the base filter's
    /// `interval`, then to monthly.
    pub async fn compute_trend(
        &self,
        request: &HygieneRequest,
        interval: Option<TrendInterval>,
        week_label: WeekLabel,
    ) -> TallyResult<HygieneTrend> {
        let triggers = self.coordinator.triggers();
        let ticket = triggers.begin(&trigger_key(&request.widget_id));
        let mut phase = PhaseLog::start(&request.widget_id);

        let base = &request.base_filter;
        let interval = match interval {
            Some(interval) => interval,
            None => match base.get("interval").and_then(Value::as_str) {
                Some(raw) => raw.parse()?,
                None => TrendInterval::default(),
            },
        };
        let categories = self.resolve_categories(request).await?;

        let mut requests = vec![RequestDescriptor::list(
            self.profile.trend_resource.clone(),
            request.widget_id.clone(),
            self.profile.trend_total_body(base),
        )];
        requests.extend(categories.iter().map(|(category, _)| {
            RequestDescriptor::list(
                self.profile.trend_resource.clone(),
                category_request_id(category, &request.widget_id),
                self.profile.trend_category_body(category, base, interval.as_str()),
            )
        }));

        phase.advance(EnginePhase::Dispatching);
        let outcomes = self.coordinator.dispatch(requests, &self.options).await?;
        triggers.ensure_current(&ticket)?;

        phase.advance(EnginePhase::Scoring);
        let mut buckets: BTreeMap<i64, TrendBucket> = BTreeMap::new();
        match outcomes.list(&request.widget_id) {
            Some(list) => {
                for (key, tickets) in self.profile.trend_points(list) {
                    buckets.insert(key, TrendBucket::new(key, tickets));
                }
            }
            None => tracing::warn!(
                widget_id = %request.widget_id,
                error = ?outcomes.error(&request.widget_id),
                "Trend total request failed, buckets have no tickets"
            ),
        }

        for (category, weight) in &categories {
            let request_id = category_request_id(category, &request.widget_id);
            let Some(list) = outcomes.list(&request_id) else {
                tracing::warn!(
                    widget_id = %request.widget_id,
                    category = %category.label,
                    error = ?outcomes.error(&request_id),
                    "Category trend request failed, leaving it out"
                );
                continue;
            };
            for (key, tickets) in self.profile.trend_points(list) {
                let bucket = buckets
                    .entry(key)
                    .or_insert_with(|| TrendBucket::new(key, 0));
                let score = weighted_score(tickets, bucket.total_tickets, *weight);
                bucket.record(category.key(), score);
            }
        }

        let buckets: Vec<TrendBucket> = buckets
            .into_values()
            .map(|mut bucket| {
                bucket.label = interval.label(bucket.key, week_label);
                bucket
            })
            .collect();
        let label_mapping = categories
            .iter()
            .filter_map(|(category, _)| Some((category.id.clone()?, category.label.clone())))
            .collect();

        phase.advance(EnginePhase::Done);
        tracing::info!(
            widget_id = %request.widget_id,
            %interval,
            buckets = buckets.len(),
            categories = categories.len(),
            "Hygiene trend computed"
        );
        Ok(HygieneTrend {
            buckets,
            label_mapping,
        })
    }

    /// Custom categories listed in the integration configs of the base
    /// filter's `integration_ids`, narrowed to `wanted`.
    ///
    /// A failed config lookup yields no custom categories.
    pub async fn load_custom_categories(
        &self,
        widget_id: &str,
        base: &Value,
        wanted: &[String],
    ) -> TallyResult<Vec<HygieneCategory>> {
        let integration_ids = base
            .pointer("/filter/integration_ids")
            .or_else(|| base.get("integration_ids"))
            .cloned()
            .unwrap_or_else(|| json!([]));
        let request = RequestDescriptor::list(
            self.profile.config_resource.clone(),
            format!("custom_hygienes_{}", widget_id),
            json!({ "filter": { "integration_ids": integration_ids } }),
        );
        let request_id = request.request_id.clone();

        let outcomes = self
            .coordinator
            .dispatch(vec![request], &DispatchOptions::new().force_load(true))
            .await?;
        match outcomes.list(request_id.as_str()) {
            Some(list) => {
                let customs = custom_from_configs(&list.records, wanted);
                tracing::debug!(
                    widget_id,
                    wanted = wanted.len(),
                    found = customs.len(),
                    "Loaded custom categories"
                );
                Ok(customs)
            }
            None => {
                tracing::warn!(
                    widget_id,
                    error = ?outcomes.error(request_id.as_str()),
                    "Custom category lookup failed, continuing without them"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Categories to dispatch with their effective weights.
    ///
    /// Drops repeated keys, categories excluded by the base filter, and
    /// categories whose weight is not positive. Exclusions match the label
    /// or key exactly.
    pub fn select_categories(
        &self,
        categories: Vec<HygieneCategory>,
        base: &Value,
        weights: &WeightMap,
    ) -> Vec<(HygieneCategory, f64)> {
        let excluded = self.profile.excluded(base);
        let mut seen = HashSet::new();
        categories
            .into_iter()
            .filter_map(|category| {
                if !seen.insert(category.key().to_string()) {
                    tracing::debug!(category = %category.label, "Skipping repeated category");
                    return None;
                }
                if excluded
                    .iter()
                    .any(|e| *e == category.label || e == category.key())
                {
                    tracing::debug!(category = %category.label, "Skipping excluded category");
                    return None;
                }
                if !weights.is_active(category.key(), self.default_weight) {
                    tracing::debug!(category = %category.label, "Skipping category without weight");
                    return None;
                }
                let weight = weights.effective(category.key(), self.default_weight);
                Some((category, weight))
            })
            .collect()
    }

    async fn resolve_categories(
        &self,
        request: &HygieneRequest,
    ) -> TallyResult<Vec<(HygieneCategory, f64)>> {
        let mut categories = request
            .categories
            .clone()
            .unwrap_or_else(|| self.profile.builtin_categories());
        if !request.custom_ids.is_empty() {
            let customs = self
                .load_custom_categories(&request.widget_id, &request.base_filter, &request.custom_ids)
                .await?;
            categories.extend(customs);
        }
        Ok(self.select_categories(categories, &request.base_filter, &request.weights))
    }

    fn total_count(&self, outcomes: &Outcomes, widget_id: &str) -> u64 {
        match outcomes.list(widget_id) {
            Some(list) => list.total_count,
            None => {
                tracing::warn!(
                    widget_id,
                    error = ?outcomes.error(widget_id),
                    "Total request failed, scoring against zero"
                );
                0
            }
        }
    }
}

impl fmt::Debug for HygieneEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HygieneEngine")
            .field("profile", &self.profile.name)
            .field("default_weight", &self.default_weight)
            .finish()
    }
}
