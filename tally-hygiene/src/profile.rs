//! Report profiles: where a hygiene report's numbers come from and how
//! its requests and responses are shaped.

use crate::category::{HygieneCategory, ISSUE_CATEGORIES, SUPPORT_CATEGORIES};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tally_core::{ListResponse, ResourceName};

/// Base-filter fields describing an organisation unit. They ride along on
/// every category request when `ou_ids` is present.
pub const OU_FIELDS: [&str; 2] = ["ou_ids", "ou_user_filter_designation"];

/// How a report response carries the matched-ticket count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportShape {
    /// `_metadata.total_count` is the count.
    TotalCount,
    /// Rows of `{key, total_tickets}`, summed; rows form the stack breakdown.
    PerRecord,
    /// Like `PerRecord`, but rows sit under the first value of the first
    /// record: `records[0].<group>.records`.
    Nested,
}

/// Resources and conventions for one family of hygiene reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProfile {
    pub name: String,
    /// Answers the unfiltered total for snapshots.
    pub total_resource: ResourceName,
    /// Answers per-category snapshot counts.
    pub category_resource: ResourceName,
    /// Answers both total and category trend series.
    pub trend_resource: ResourceName,
    /// Integration configs listing custom categories.
    pub config_resource: ResourceName,
    /// `across` value of the snapshot total request.
    pub snapshot_across: String,
    /// Filter key narrowing a request to one category.
    pub category_key: String,
    /// Filter key holding custom field matches.
    pub custom_fields_key: String,
    /// Send built-in category values lowercased.
    pub lowercase_categories: bool,
    pub shape: ReportShape,
    pub builtin: Vec<String>,
}

impl ReportProfile {
    /// Issue-tracker report counted per record, with a stack breakdown.
    pub fn issues() -> Self {
        Self {
            name: "hygiene_report".to_string(),
            total_resource: ResourceName::new("jira_tickets"),
            category_resource: ResourceName::new("hygiene_report"),
            trend_resource: ResourceName::new("hygiene_report_trend"),
            config_resource: ResourceName::new("jira_integration_config"),
            snapshot_across: "hygiene_type".to_string(),
            category_key: "hygiene_types".to_string(),
            custom_fields_key: "custom_fields".to_string(),
            lowercase_categories: false,
            shape: ReportShape::PerRecord,
            builtin: to_strings(ISSUE_CATEGORIES),
        }
    }

    /// Work-item report with grouped responses and lowercase categories.
    pub fn work_items() -> Self {
        Self {
            name: "azure_hygiene_report".to_string(),
            total_resource: ResourceName::new("issue_management_list"),
            category_resource: ResourceName::new("issue_management_tickets_report"),
            trend_resource: ResourceName::new("issue_management_tickets_report"),
            config_resource: ResourceName::new("jira_integration_config"),
            snapshot_across: "workitem_hygiene_type".to_string(),
            category_key: "workitem_hygiene_types".to_string(),
            custom_fields_key: "workitem_custom_fields".to_string(),
            lowercase_categories: true,
            shape: ReportShape::Nested,
            builtin: to_strings(ISSUE_CATEGORIES),
        }
    }

    /// Support-desk report counted by total.
    pub fn support(name: &str, resource: &str, trend_resource: &str) -> Self {
        Self {
            name: name.to_string(),
            total_resource: ResourceName::new(resource),
            category_resource: ResourceName::new(resource),
            trend_resource: ResourceName::new(trend_resource),
            config_resource: ResourceName::new("jira_integration_config"),
            snapshot_across: "hygiene_type".to_string(),
            category_key: "hygiene_types".to_string(),
            custom_fields_key: "custom_fields".to_string(),
            lowercase_categories: false,
            shape: ReportShape::TotalCount,
            builtin: to_strings(SUPPORT_CATEGORIES),
        }
    }

    pub fn builtin_categories(&self) -> Vec<HygieneCategory> {
        self.builtin.iter().map(HygieneCategory::builtin).collect()
    }

    /// Labels listed under `filter.exclude.<category_key>`.
    pub fn excluded(&self, base: &Value) -> Vec<String> {
        base.pointer(&format!("/filter/exclude/{}", self.category_key))
            .and_then(Value::as_array)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Base filter narrowed to one category: built-ins by value under the
    /// category key, custom ones by merging their fragment.
    pub fn category_filter(&self, category: &HygieneCategory, base: &Value) -> Value {
        if category.is_custom() {
            return Value::Object(self.merge_custom_filter(category, base));
        }
        let mut filter = object_at(base, "filter");
        let value = if self.lowercase_categories {
            category.label.to_lowercase()
        } else {
            category.label.clone()
        };
        filter.insert(self.category_key.clone(), json!([value]));
        Value::Object(filter)
    }

    /// Custom fragment under the base filter. Base keys win, except the
    /// nested maps (`missing_fields`, `exclude`, custom fields) which are
    /// unioned. The category key is cleared.
    pub fn merge_custom_filter(&self, category: &HygieneCategory, base: &Value) -> Map<String, Value> {
        let fragment = category.filter.clone().unwrap_or_default();
        let base_filter = object_at(base, "filter");
        let fragment_exclude = map_at(&fragment, "exclude");
        let base_exclude = map_at(&base_filter, "exclude");

        let missing_fields = union(
            category.missing_fields.clone().unwrap_or_default(),
            object_at(base, "missing_fields"),
        );
        let excluded_fields = union(
            map_at(&fragment_exclude, &self.custom_fields_key),
            map_at(&base_exclude, &self.custom_fields_key),
        );
        let mut exclude = union(fragment_exclude, base_exclude);
        exclude.insert(self.custom_fields_key.clone(), Value::Object(excluded_fields));
        let custom_fields = union(
            map_at(&fragment, &self.custom_fields_key),
            map_at(&base_filter, &self.custom_fields_key),
        );

        let mut merged = union(fragment, base_filter);
        merged.insert("missing_fields".to_string(), Value::Object(missing_fields));
        merged.insert("exclude".to_string(), Value::Object(exclude));
        merged.insert(self.custom_fields_key.clone(), Value::Object(custom_fields));
        merged.insert(self.category_key.clone(), json!([]));
        merged
    }

    /// Request body for the snapshot total.
    pub fn snapshot_total_body(&self, base: &Value) -> Value {
        let mut body = as_object(base);
        body.insert("across".to_string(), json!(self.snapshot_across));
        Value::Object(body)
    }

    /// Request body for one category's snapshot count.
    pub fn snapshot_category_body(&self, category: &HygieneCategory, base: &Value) -> Value {
        let mut body = Map::new();
        if category.is_custom() {
            body.insert("page_size".to_string(), json!(0));
            body.insert("page".to_string(), json!(0));
        }
        body.insert("across".to_string(), json!(base_across(base)));
        body.insert("filter".to_string(), self.category_filter(category, base));
        with_ou(body, base)
    }

    /// Request body for the trend total.
    pub fn trend_total_body(&self, base: &Value) -> Value {
        let mut body = as_object(base);
        body.insert("across".to_string(), json!("trend"));
        body.insert("page_size".to_string(), json!(1));
        body.insert("page".to_string(), json!(0));
        Value::Object(body)
    }

    /// Request body for one category's trend series.
    pub fn trend_category_body(&self, category: &HygieneCategory, base: &Value, interval: &str) -> Value {
        let page_size = if category.is_custom() { 0 } else { 1 };
        let mut body = Map::new();
        body.insert("page_size".to_string(), json!(page_size));
        body.insert("page".to_string(), json!(0));
        body.insert("across".to_string(), json!("trend"));
        body.insert("interval".to_string(), json!(interval));
        body.insert("filter".to_string(), self.category_filter(category, base));
        with_ou(body, base)
    }

    /// Rows of a per-record or nested response.
    pub fn rows<'a>(&self, response: &'a ListResponse) -> &'a [Value] {
        match self.shape {
            ReportShape::Nested => nested_rows(response),
            ReportShape::TotalCount | ReportShape::PerRecord => &response.records,
        }
    }

    /// Matched count and optional stack breakdown of a category response.
    pub fn matched(&self, response: &ListResponse) -> (u64, Option<BTreeMap<String, u64>>) {
        match self.shape {
            ReportShape::TotalCount => (response.total_count, None),
            ReportShape::PerRecord | ReportShape::Nested => {
                let rows = self.rows(response);
                let total = rows.iter().map(row_tickets).sum();
                let stack = rows
                    .iter()
                    .filter_map(|row| Some((row_key(row)?, row_tickets(row))))
                    .collect();
                (total, Some(stack))
            }
        }
    }

    /// `(bucket key, tickets)` pairs of a trend response. Rows without a
    /// numeric key are skipped.
    pub fn trend_points(&self, response: &ListResponse) -> Vec<(i64, u64)> {
        self.rows(response)
            .iter()
            .filter_map(|row| {
                let key = row_key(row)?.parse::<i64>().ok()?;
                Some((key, row_tickets(row)))
            })
            .collect()
    }
}

fn to_strings(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|s| s.to_string()).collect()
}

fn as_object(value: &Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn object_at(value: &Value, key: &str) -> Map<String, Value> {
    value
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn map_at(map: &Map<String, Value>, key: &str) -> Map<String, Value> {
    map.get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// `first` overlaid with `second`.
fn union(mut first: Map<String, Value>, second: Map<String, Value>) -> Map<String, Value> {
    first.extend(second);
    first
}

fn base_across(base: &Value) -> &str {
    base.get("across").and_then(Value::as_str).unwrap_or_default()
}

fn with_ou(mut body: Map<String, Value>, base: &Value) -> Value {
    if let Some(ou_ids) = base.get(OU_FIELDS[0]) {
        body.insert(OU_FIELDS[0].to_string(), ou_ids.clone());
        let designation = base
            .get(OU_FIELDS[1])
            .cloned()
            .unwrap_or_else(|| json!({}));
        body.insert(OU_FIELDS[1].to_string(), designation);
    }
    Value::Object(body)
}

fn nested_rows(response: &ListResponse) -> &[Value] {
    response
        .records
        .first()
        .and_then(Value::as_object)
        .and_then(|group| group.values().next())
        .and_then(|inner| inner.get("records"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn row_tickets(row: &Value) -> u64 {
    row.get("total_tickets").and_then(Value::as_u64).unwrap_or(0)
}

fn row_key(row: &Value) -> Option<String> {
    match row.get("key")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
