//! End-to-end hygiene computations against scripted report resources.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tally_hygiene::{
    banded_score, HygieneCategory, HygieneEngine, HygieneRequest, ReportProfile, ScoreRecord,
    TrendInterval, WeekLabel, WeightMap, BANDS,
};
use tally_test_utils::{
    fixtures, generators, init_test_tracing, Gate, ListResponse, Resource, ResourceError,
    ScriptedResource, TallyConfig,
};

const JAN: i64 = 1_704_067_200;
const FEB: i64 = 1_706_745_600;

fn support() -> ReportProfile {
    ReportProfile::support("support_hygiene", "tickets", "tickets_trend")
}

fn builtins(labels: &[&str]) -> Vec<HygieneCategory> {
    labels.iter().map(|l| HygieneCategory::builtin(*l)).collect()
}

fn category_of(filter: &Value) -> Option<&str> {
    filter["filter"]["hygiene_types"]
        .as_array()
        .and_then(|cats| cats.first())
        .and_then(Value::as_str)
}

async fn engine(profile: ReportProfile, resources: Vec<Arc<dyn Resource>>) -> HygieneEngine {
    init_test_tracing();
    HygieneEngine::new(fixtures::coordinator(resources).await, profile)
}

#[tokio::test]
async fn test_snapshot_end_to_end() {
    let tickets = Arc::new(fixtures::count_report(
        "tickets",
        "hygiene_types",
        100,
        &[("A", 5), ("B", 50)],
    ));
    let engine = engine(support(), vec![tickets.clone()]).await;

    let request = HygieneRequest::new("w1", json!({"filter": {"projects": ["CORE"]}}))
        .with_categories(builtins(&["A", "B"]))
        .with_weights(WeightMap::new().with("A", 50.0).with("B", 50.0));
    let scorecard = engine.compute_snapshot(&request).await.unwrap();

    assert_eq!(scorecard.labels(), vec!["A", "B"]);
    assert_eq!(scorecard["A"].score, 38);
    assert_eq!(scorecard["A"].score_percent, 75);
    assert_eq!(scorecard["A"].matched_count, 5);
    assert_eq!(scorecard["A"].total_count, 100);
    assert_eq!(scorecard["B"].score, 3);
    assert_eq!(scorecard["B"].score_percent, 5);
    assert_eq!(tickets.call_count(), 3);

    // The total request keeps the base filter and asks across hygiene types.
    let total = tickets
        .filters()
        .into_iter()
        .find(|f| category_of(f).is_none())
        .unwrap();
    assert_eq!(total["across"], "hygiene_type");
    assert_eq!(total["filter"]["projects"], json!(["CORE"]));
}

#[tokio::test]
async fn test_zero_weight_categories_are_never_requested() {
    let tickets = Arc::new(fixtures::count_report(
        "tickets",
        "hygiene_types",
        100,
        &[("A", 5), ("B", 50)],
    ));
    let engine = engine(support(), vec![tickets.clone()]).await;

    let request = HygieneRequest::new("w1", json!({}))
        .with_categories(builtins(&["A", "B", "C"]))
        .with_weights(WeightMap::new().with("B", 0.0).with("C", -1.0));
    let scorecard = engine.compute_snapshot(&request).await.unwrap();

    let requested: Vec<Option<String>> = tickets
        .filters()
        .iter()
        .map(|f| category_of(f).map(str::to_string))
        .collect();
    assert_eq!(requested.len(), 2);
    assert!(requested.contains(&Some("A".to_string())));
    assert!(!requested.contains(&Some("B".to_string())));
    assert!(!scorecard.contains("B"));
    assert!(!scorecard.contains("C"));
    // Unspecified weight falls back to the default.
    assert_eq!(scorecard["A"].weight, 12.5);
}

#[tokio::test]
async fn test_zero_total_scores_zero() {
    let tickets = Arc::new(fixtures::count_report("tickets", "hygiene_types", 0, &[("A", 7)]));
    let engine = engine(support(), vec![tickets]).await;

    let request = HygieneRequest::new("w1", json!({})).with_categories(builtins(&["A"]));
    let scorecard = engine.compute_snapshot(&request).await.unwrap();

    assert_eq!(scorecard["A"].score, 0);
    assert_eq!(scorecard["A"].score_percent, 0);
    assert_eq!(scorecard["A"].matched_count, 7);
}

#[tokio::test]
async fn test_failed_category_gets_zero_sentinel() {
    let tickets = Arc::new(ScriptedResource::new("tickets", |filter| {
        match category_of(filter) {
            Some("B") => Err(ResourceError::RequestFailed {
                resource: "tickets".to_string(),
                status: 502,
                message: "bad gateway".to_string(),
            }
            .into()),
            Some(_) => Ok(ListResponse::new(vec![], 0)),
            None => Ok(ListResponse::new(vec![], 40)),
        }
    }));
    let engine = engine(support(), vec![tickets]).await;

    let request = HygieneRequest::new("w1", json!({})).with_categories(builtins(&["A", "B"]));
    let scorecard = engine.compute_snapshot(&request).await.unwrap();

    assert!(scorecard["B"].is_failed());
    assert_eq!(scorecard["B"].score, 0);
    assert_eq!(scorecard["B"].total_count, 0);
    // No problem tickets is a perfect band.
    assert_eq!(scorecard["A"].score, 13);
    assert_eq!(scorecard["A"].score_percent, 100);
}

#[tokio::test]
async fn test_exclusions_and_org_unit_fields() {
    let tickets = Arc::new(fixtures::count_report("tickets", "hygiene_types", 10, &[]));
    let engine = engine(support(), vec![tickets.clone()]).await;

    let base = json!({
        "filter": {"exclude": {"hygiene_types": ["IDLE"]}},
        "ou_ids": ["ou-7"],
        "ou_user_filter_designation": {"sprint": ["x"]}
    });
    let scorecard = engine
        .compute_snapshot(&HygieneRequest::new("w1", base))
        .await
        .unwrap();

    assert!(!scorecard.contains("IDLE"));
    assert_eq!(
        scorecard.labels(),
        vec!["MISSED_RESOLUTION_TIME", "NO_CONTACT", "POOR_DESCRIPTION"]
    );
    for filter in tickets.filters() {
        assert_eq!(filter["ou_ids"], json!(["ou-7"]));
        assert_eq!(filter["ou_user_filter_designation"], json!({"sprint": ["x"]}));
    }
}

#[tokio::test]
async fn test_custom_categories_loaded_from_config() {
    let config = Arc::new(ScriptedResource::with_records(
        "jira_integration_config",
        vec![json!({"custom_hygienes": [
            {"id": "c1", "name": "Missing epic", "filter": {"epic_missing": true}},
            {"id": "c2", "name": "Unwanted", "filter": {}}
        ]})],
    ));
    let tickets = Arc::new(ScriptedResource::new("tickets", |filter| {
        if filter["filter"].get("epic_missing").is_some() {
            Ok(ListResponse::new(vec![], 20))
        } else {
            Ok(ListResponse::new(vec![], 100))
        }
    }));
    let engine = engine(support(), vec![config.clone(), tickets.clone()]).await;

    let request = HygieneRequest::new(
        "w1",
        json!({"filter": {"integration_ids": ["i1"], "projects": ["CORE"]}}),
    )
    .with_categories(Vec::new())
    .with_custom_ids(vec!["c1".to_string(), "c2".to_string()])
    .with_weights(WeightMap::new().with("c1", 25.0).with("c2", 0.0));
    let scorecard = engine.compute_snapshot(&request).await.unwrap();

    assert_eq!(
        config.filters(),
        vec![json!({"filter": {"integration_ids": ["i1"]}})]
    );
    assert_eq!(scorecard.labels(), vec!["Missing_epic"]);
    let record = &scorecard["Missing_epic"];
    assert_eq!(record.id.as_deref(), Some("c1"));
    assert_eq!(record.score, 14);
    assert_eq!(record.score_percent, 55);

    let custom_filter = tickets
        .filters()
        .into_iter()
        .find(|f| f["filter"].get("epic_missing").is_some())
        .unwrap();
    assert_eq!(custom_filter["page_size"], 0);
    assert_eq!(custom_filter["filter"]["projects"], json!(["CORE"]));
    assert_eq!(custom_filter["filter"]["hygiene_types"], json!([]));
}

#[tokio::test]
async fn test_failed_config_lookup_scores_builtins_only() {
    let config = Arc::new(ScriptedResource::failing("jira_integration_config", 500));
    let tickets = Arc::new(fixtures::count_report("tickets", "hygiene_types", 10, &[]));
    let engine = engine(support(), vec![config, tickets]).await;

    let request = HygieneRequest::new("w1", json!({}))
        .with_categories(builtins(&["IDLE"]))
        .with_custom_ids(vec!["c1".to_string()]);
    let scorecard = engine.compute_snapshot(&request).await.unwrap();

    assert_eq!(scorecard.labels(), vec!["IDLE"]);
}

#[tokio::test]
async fn test_nested_shape_with_stack_breakdown() {
    let total = Arc::new(ScriptedResource::new("issue_management_list", |_| {
        Ok(ListResponse::new(vec![], 50))
    }));
    let report = Arc::new(ScriptedResource::new(
        "issue_management_tickets_report",
        |_| {
            Ok(ListResponse::new(
                vec![json!({"no_due_date": {"records": [
                    {"key": "open", "total_tickets": 3},
                    {"key": "closed", "total_tickets": 2}
                ]}})],
                1,
            ))
        },
    ));
    let engine = engine(ReportProfile::work_items(), vec![total, report.clone()]).await;

    let request =
        HygieneRequest::new("w1", json!({})).with_categories(builtins(&["NO_DUE_DATE"]));
    let scorecard = engine.compute_snapshot(&request).await.unwrap();

    let record = &scorecard["NO_DUE_DATE"];
    assert_eq!(record.matched_count, 5);
    assert_eq!(record.score, 9);
    assert_eq!(record.score_percent, 75);
    let stack = record.stack_breakdown.as_ref().unwrap();
    assert_eq!(stack["open"], 3);
    assert_eq!(stack["closed"], 2);
    assert_eq!(
        report.filters()[0]["filter"]["workitem_hygiene_types"],
        json!(["no_due_date"])
    );
}

#[tokio::test]
async fn test_trend_buckets() {
    let trend = Arc::new(ScriptedResource::new("tickets_trend", |filter| {
        let records = match category_of(filter) {
            None => vec![
                json!({"key": FEB.to_string(), "total_tickets": 10}),
                json!({"key": JAN.to_string(), "total_tickets": 100}),
            ],
            Some("IDLE") => vec![
                json!({"key": JAN.to_string(), "total_tickets": 5}),
                json!({"key": FEB.to_string(), "total_tickets": 0}),
            ],
            Some(_) => vec![json!({"key": FEB.to_string(), "total_tickets": 10})],
        };
        Ok(ListResponse::from_records(records))
    }));
    let engine = engine(support(), vec![trend.clone()]).await;

    let request = HygieneRequest::new("w1", json!({"filter": {}}))
        .with_categories(builtins(&["IDLE", "NO_CONTACT"]))
        .with_weights(WeightMap::new().with("IDLE", 50.0).with("NO_CONTACT", 50.0));
    let result = engine
        .compute_trend(&request, None, WeekLabel::StartDate)
        .await
        .unwrap();

    let keys: Vec<i64> = result.buckets.iter().map(|b| b.key).collect();
    assert_eq!(keys, vec![JAN, FEB]);

    let jan = &result.buckets[0];
    assert_eq!(jan.label, "Jan 2024");
    assert_eq!(jan.scores["IDLE"], 37.5);
    assert!(!jan.scores.contains_key("NO_CONTACT"));
    assert_eq!(jan.total_score, 37.5);

    let feb = &result.buckets[1];
    assert_eq!(feb.label, "Feb 2024");
    assert_eq!(feb.scores["IDLE"], 50.0);
    assert_eq!(feb.scores["NO_CONTACT"], 2.5);
    assert_eq!(feb.total_score, 52.5);

    for filter in trend.filters() {
        assert_eq!(filter["across"], "trend");
        if category_of(&filter).is_some() {
            assert_eq!(filter["interval"], "month");
            assert_eq!(filter["page_size"], 1);
        }
    }
    assert!(result.label_mapping.is_empty());
}

#[tokio::test]
async fn test_trend_interval_from_base_filter() {
    let trend = Arc::new(ScriptedResource::new("tickets_trend", |_| {
        Ok(ListResponse::from_records(vec![
            json!({"key": JAN, "total_tickets": 4}),
        ]))
    }));
    let engine = engine(support(), vec![trend.clone()]).await;

    let request = HygieneRequest::new("w1", json!({"interval": "quarter"}))
        .with_categories(builtins(&["IDLE"]));
    let result = engine
        .compute_trend(&request, None, WeekLabel::StartDate)
        .await
        .unwrap();
    assert_eq!(result.buckets[0].label, "Q1-2024");

    let bad = HygieneRequest::new("w2", json!({"interval": "fortnight"}));
    assert!(engine
        .compute_trend(&bad, None, WeekLabel::StartDate)
        .await
        .is_err());

    let weekly = engine
        .compute_trend(&request, Some(TrendInterval::Week), WeekLabel::Number)
        .await
        .unwrap();
    assert_eq!(weekly.buckets[0].label, "1-2024");
}

#[tokio::test]
async fn test_newer_run_for_same_widget_wins() {
    let gate = Gate::new();
    let tickets = Arc::new(
        fixtures::count_report("tickets", "hygiene_types", 100, &[("A", 5)]).with_gate(gate.clone()),
    );
    let engine = Arc::new(engine(support(), vec![tickets.clone()]).await);
    let request = HygieneRequest::new("w1", json!({})).with_categories(builtins(&["A"]));

    let stale = {
        let engine = engine.clone();
        let request = request.clone();
        tokio::spawn(async move { engine.compute_snapshot(&request).await })
    };
    while tickets.call_count() < 2 {
        tokio::task::yield_now().await;
    }

    let fresh = {
        let engine = engine.clone();
        let request = request.clone();
        tokio::spawn(async move { engine.compute_snapshot(&request).await })
    };
    while tickets.call_count() < 4 {
        tokio::task::yield_now().await;
    }
    gate.open();

    let stale = stale.await.unwrap();
    assert!(stale.unwrap_err().is_superseded());
    let fresh = fresh.await.unwrap().unwrap();
    assert_eq!(fresh["A"].score, 9);

    // Another widget is unaffected.
    let other = engine
        .compute_snapshot(&HygieneRequest::new("w2", json!({})).with_categories(builtins(&["A"])))
        .await
        .unwrap();
    assert_eq!(other["A"].score, 9);
}

#[tokio::test]
async fn test_default_weight_from_config() {
    let tickets = Arc::new(fixtures::count_report("tickets", "hygiene_types", 100, &[]));
    let coordinator = fixtures::coordinator(vec![tickets]).await;
    let config = TallyConfig {
        default_weight: 20.0,
        ..TallyConfig::default()
    };
    let engine = HygieneEngine::from_config(coordinator, support(), &config);

    let request = HygieneRequest::new("w1", json!({})).with_categories(builtins(&["IDLE"]));
    let scorecard = engine.compute_snapshot(&request).await.unwrap();
    assert_eq!(scorecard["IDLE"].weight, 20.0);
    assert_eq!(scorecard["IDLE"].score, 20);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_banded_score_is_a_band(percent in generators::arb_percent()) {
        prop_assert!(BANDS.contains(&banded_score(percent)));
    }

    #[test]
    fn prop_score_never_exceeds_weight(
        total in 1u64..10_000,
        share in 0.0f64..=1.0,
        weight in 0.5f64..100.0,
    ) {
        let matched = (total as f64 * share) as u64;
        let record = ScoreRecord::compute("X", None, weight, matched, total);
        prop_assert!(f64::from(record.score) <= weight.round());
        prop_assert!(BANDS.contains(&(record.score_percent as u8)));
    }
}
