//! Report request parameters and result rows.
//!
//! A [`ReportRequest`] is fixed for a whole extraction run: every account is
//! asked for the same fields at the same aggregation level and date range.
//! Each job answers with a sequence of [`Record`]s whose keys vary per account.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Insight fields the pipeline knows how to post-process.
///
/// Rows may carry any other key as well; this list only drives numeric
/// coercion and column ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownField {
    CampaignName,
    AdsetName,
    AdName,
    DateStart,
    DateStop,
    Spend,
    InlineLinkClicks,
    Reach,
    Impressions,
    Ctr,
    Cpc,
}

impl KnownField {
    pub const ALL: [KnownField; 11] = [
        KnownField::CampaignName,
        KnownField::AdsetName,
        KnownField::AdName,
        KnownField::DateStart,
        KnownField::DateStop,
        KnownField::Spend,
        KnownField::InlineLinkClicks,
        KnownField::Reach,
        KnownField::Impressions,
        KnownField::Ctr,
        KnownField::Cpc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            KnownField::CampaignName => "campaign_name",
            KnownField::AdsetName => "adset_name",
            KnownField::AdName => "ad_name",
            KnownField::DateStart => "date_start",
            KnownField::DateStop => "date_stop",
            KnownField::Spend => "spend",
            KnownField::InlineLinkClicks => "inline_link_clicks",
            KnownField::Reach => "reach",
            KnownField::Impressions => "impressions",
            KnownField::Ctr => "ctr",
            KnownField::Cpc => "cpc",
        }
    }

    /// Metric fields arrive as decimal strings and are coerced on export.
    pub fn is_metric(self) -> bool {
        matches!(
            self,
            KnownField::Spend
                | KnownField::InlineLinkClicks
                | KnownField::Reach
                | KnownField::Impressions
                | KnownField::Ctr
                | KnownField::Cpc
        )
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

/// One result row: field name to value, with an open set of keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

#[cfg(test)]
impl Record {
    pub fn known(&self, field: KnownField) -> Option<&Value> {
        self.0.get(field.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Date window of a report: a platform preset or an explicit range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateRange {
    /// Inclusive range in `YYYY-MM-DD` form.
    Window {
        since: chrono::NaiveDate,
        until: chrono::NaiveDate,
    },
    /// Named preset such as `last_90d` or `yesterday`.
    Preset(String),
}

impl Default for DateRange {
    fn default() -> Self {
        DateRange::Preset("last_90d".to_string())
    }
}

/// Parameters shared by every job of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportParams {
    /// Aggregation level (`account`, `campaign`, `adset`, `ad`).
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub date_range: DateRange,

    /// Days per row (`"1"` for daily), or `monthly` / `all_days`.
    #[serde(default = "default_time_increment")]
    pub time_increment: String,

    /// Page size used when submitting and when paging results.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_level() -> String {
    "adset".to_string()
}

fn default_time_increment() -> String {
    "1".to_string()
}

fn default_limit() -> u32 {
    2000
}

impl Default for ReportParams {
    fn default() -> Self {
        Self {
            level: default_level(),
            date_range: DateRange::default(),
            time_increment: default_time_increment(),
            limit: default_limit(),
        }
    }
}

/// Fields plus parameters; constant for a whole extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,

    #[serde(flatten)]
    pub params: ReportParams,
}

fn default_fields() -> Vec<String> {
    [
        KnownField::CampaignName,
        KnownField::Spend,
        KnownField::InlineLinkClicks,
        KnownField::Reach,
        KnownField::Impressions,
        KnownField::Ctr,
        KnownField::Cpc,
    ]
    .into_iter()
    .map(|f| f.as_str().to_string())
    .collect()
}

impl Default for ReportRequest {
    fn default() -> Self {
        Self {
            fields: default_fields(),
            params: ReportParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_request_matches_insight_defaults() {
        let req = ReportRequest::default();
        assert_eq!(req.fields.len(), 7);
        assert_eq!(req.fields[0], "campaign_name");
        assert_eq!(req.params.level, "adset");
        assert_eq!(req.params.date_range, DateRange::Preset("last_90d".into()));
        assert_eq!(req.params.time_increment, "1");
        assert_eq!(req.params.limit, 2000);
    }

    #[test]
    fn request_deserializes_flattened_params() {
        let toml_str = r#"
            fields = ["ad_name", "spend"]
            level = "ad"
            limit = 500
        "#;
        let req: ReportRequest = toml::from_str(toml_str).unwrap();
        assert_eq!(req.fields, vec!["ad_name", "spend"]);
        assert_eq!(req.params.level, "ad");
        assert_eq!(req.params.limit, 500);
        assert_eq!(req.params.time_increment, "1");
    }

    #[test]
    fn date_range_accepts_preset_or_window() {
        let preset: DateRange = serde_json::from_value(json!("yesterday")).unwrap();
        assert_eq!(preset, DateRange::Preset("yesterday".into()));

        let window: DateRange =
            serde_json::from_value(json!({"since": "2024-01-01", "until": "2024-01-31"})).unwrap();
        match window {
            DateRange::Window { since, until } => {
                assert_eq!(since.to_string(), "2024-01-01");
                assert_eq!(until.to_string(), "2024-01-31");
            }
            other => panic!("expected window, got {other:?}"),
        }
    }

    #[test]
    fn record_is_transparent_map() {
        let rec: Record =
            serde_json::from_value(json!({"campaign_name": "Spring", "spend": "12.50"})).unwrap();
        assert_eq!(rec.len(), 2);
        assert_eq!(rec.known(KnownField::Spend), Some(&json!("12.50")));
        assert_eq!(
            serde_json::to_value(&rec).unwrap(),
            json!({"campaign_name": "Spring", "spend": "12.50"})
        );
    }

    #[test]
    fn known_field_lookup() {
        assert_eq!(KnownField::parse("ctr"), Some(KnownField::Ctr));
        assert_eq!(KnownField::parse("actions"), None);
        assert!(KnownField::Reach.is_metric());
        assert!(!KnownField::DateStart.is_metric());
    }
}
